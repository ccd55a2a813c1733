use super::connection::{DbPool, get_connection_with_retry};
use crate::error::RegistryError;
use crate::models::kv::NewSetMember;
use crate::schema::kv_sets;
use diesel::dsl::exists;
use diesel::prelude::*;

/// Set operations over the `kv_sets` table
pub struct SetOperations<'a> {
    pool: &'a DbPool,
}

impl<'a> SetOperations<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Adds a member, relying on the unique index to make the claim atomic
    pub fn add(&self, key: &str, member: &str) -> Result<bool, RegistryError> {
        let mut conn = get_connection_with_retry(self.pool)?;

        let inserted = diesel::insert_or_ignore_into(kv_sets::table)
            .values(&NewSetMember {
                store_key: key,
                member,
            })
            .execute(&mut conn)?;

        Ok(inserted > 0)
    }

    pub fn remove(&self, key: &str, member: &str) -> Result<bool, RegistryError> {
        let mut conn = get_connection_with_retry(self.pool)?;

        let removed = diesel::delete(
            kv_sets::table
                .filter(kv_sets::store_key.eq(key))
                .filter(kv_sets::member.eq(member)),
        )
        .execute(&mut conn)?;

        Ok(removed > 0)
    }

    pub fn members(&self, key: &str) -> Result<Vec<String>, RegistryError> {
        let mut conn = get_connection_with_retry(self.pool)?;

        let members = kv_sets::table
            .filter(kv_sets::store_key.eq(key))
            .order(kv_sets::id.asc())
            .select(kv_sets::member)
            .load::<String>(&mut conn)?;

        Ok(members)
    }

    pub fn contains(&self, key: &str, member: &str) -> Result<bool, RegistryError> {
        let mut conn = get_connection_with_retry(self.pool)?;

        let found = diesel::select(exists(
            kv_sets::table
                .filter(kv_sets::store_key.eq(key))
                .filter(kv_sets::member.eq(member)),
        ))
        .get_result::<bool>(&mut conn)?;

        Ok(found)
    }

    pub fn count(&self, key: &str) -> Result<usize, RegistryError> {
        let mut conn = get_connection_with_retry(self.pool)?;

        let count = kv_sets::table
            .filter(kv_sets::store_key.eq(key))
            .count()
            .get_result::<i64>(&mut conn)?;

        Ok(count as usize)
    }
}

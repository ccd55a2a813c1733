use super::connection::{DbPool, get_connection_with_retry};
use crate::error::RegistryError;
use crate::models::kv::NewHashField;
use crate::schema::kv_hashes;
use diesel::prelude::*;
use std::collections::BTreeMap;

/// Hash operations over the `kv_hashes` table
pub struct HashOperations<'a> {
    pool: &'a DbPool,
}

impl<'a> HashOperations<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    pub fn get(&self, key: &str, field: &str) -> Result<Option<String>, RegistryError> {
        let mut conn = get_connection_with_retry(self.pool)?;

        let value = kv_hashes::table
            .filter(kv_hashes::store_key.eq(key))
            .filter(kv_hashes::field.eq(field))
            .select(kv_hashes::value)
            .first::<String>(&mut conn)
            .optional()?;

        Ok(value)
    }

    /// Sets a single field, replacing any previous value
    pub fn set(&self, key: &str, field: &str, value: &str) -> Result<(), RegistryError> {
        let mut conn = get_connection_with_retry(self.pool)?;

        diesel::replace_into(kv_hashes::table)
            .values(&NewHashField {
                store_key: key,
                field,
                value,
            })
            .execute(&mut conn)?;

        Ok(())
    }

    pub fn delete(&self, key: &str, field: &str) -> Result<bool, RegistryError> {
        let mut conn = get_connection_with_retry(self.pool)?;

        let removed = diesel::delete(
            kv_hashes::table
                .filter(kv_hashes::store_key.eq(key))
                .filter(kv_hashes::field.eq(field)),
        )
        .execute(&mut conn)?;

        Ok(removed > 0)
    }

    /// Sets several fields inside one transaction
    pub fn set_all(
        &self,
        key: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<(), RegistryError> {
        let mut conn = get_connection_with_retry(self.pool)?;

        conn.transaction::<_, RegistryError, _>(|conn| {
            for (field, value) in fields {
                diesel::replace_into(kv_hashes::table)
                    .values(&NewHashField {
                        store_key: key,
                        field,
                        value,
                    })
                    .execute(conn)?;
            }
            Ok(())
        })
    }

    pub fn get_all(&self, key: &str) -> Result<BTreeMap<String, String>, RegistryError> {
        let mut conn = get_connection_with_retry(self.pool)?;

        let rows = kv_hashes::table
            .filter(kv_hashes::store_key.eq(key))
            .select((kv_hashes::field, kv_hashes::value))
            .load::<(String, String)>(&mut conn)?;

        Ok(rows.into_iter().collect())
    }
}

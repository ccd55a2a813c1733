use super::connection::{DbPool, get_connection_with_retry};
use crate::error::RegistryError;
use crate::schema::{kv_hashes, kv_lists, kv_sets};
use diesel::dsl::exists;
use diesel::prelude::*;

/// Whole-key operations that do not care which type a key holds
pub struct KeyOperations<'a> {
    pool: &'a DbPool,
}

impl<'a> KeyOperations<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    pub fn exists(&self, key: &str) -> Result<bool, RegistryError> {
        let mut conn = get_connection_with_retry(self.pool)?;

        let in_hashes = diesel::select(exists(
            kv_hashes::table.filter(kv_hashes::store_key.eq(key)),
        ))
        .get_result::<bool>(&mut conn)?;
        if in_hashes {
            return Ok(true);
        }

        let in_sets = diesel::select(exists(kv_sets::table.filter(kv_sets::store_key.eq(key))))
            .get_result::<bool>(&mut conn)?;
        if in_sets {
            return Ok(true);
        }

        let in_lists = diesel::select(exists(
            kv_lists::table.filter(kv_lists::store_key.eq(key)),
        ))
        .get_result::<bool>(&mut conn)?;

        Ok(in_lists)
    }

    pub fn delete(&self, key: &str) -> Result<bool, RegistryError> {
        let mut conn = get_connection_with_retry(self.pool)?;

        conn.transaction::<_, RegistryError, _>(|conn| {
            let mut removed =
                diesel::delete(kv_hashes::table.filter(kv_hashes::store_key.eq(key)))
                    .execute(conn)?;
            removed +=
                diesel::delete(kv_sets::table.filter(kv_sets::store_key.eq(key))).execute(conn)?;
            removed += diesel::delete(kv_lists::table.filter(kv_lists::store_key.eq(key)))
                .execute(conn)?;
            Ok(removed > 0)
        })
    }
}

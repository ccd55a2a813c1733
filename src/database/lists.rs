use super::connection::{DbPool, get_connection_with_retry};
use crate::database::store::resolve_range;
use crate::error::RegistryError;
use crate::models::kv::NewListEntry;
use crate::schema::kv_lists;
use diesel::prelude::*;

/// List operations over the `kv_lists` table.
///
/// The head of a list is its most recently inserted row, so reads walk ids
/// in descending order.
pub struct ListOperations<'a> {
    pool: &'a DbPool,
}

impl<'a> ListOperations<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    pub fn push_front(&self, key: &str, value: &str) -> Result<usize, RegistryError> {
        let mut conn = get_connection_with_retry(self.pool)?;

        conn.transaction::<_, RegistryError, _>(|conn| {
            diesel::insert_into(kv_lists::table)
                .values(&NewListEntry {
                    store_key: key,
                    value,
                })
                .execute(conn)?;

            let len = kv_lists::table
                .filter(kv_lists::store_key.eq(key))
                .count()
                .get_result::<i64>(conn)?;

            Ok(len as usize)
        })
    }

    pub fn range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, RegistryError> {
        let mut conn = get_connection_with_retry(self.pool)?;

        let values = kv_lists::table
            .filter(kv_lists::store_key.eq(key))
            .order(kv_lists::id.desc())
            .select(kv_lists::value)
            .load::<String>(&mut conn)?;

        Ok(match resolve_range(values.len(), start, stop) {
            Some((from, to)) => values[from..=to].to_vec(),
            None => Vec::new(),
        })
    }
}

use crate::schema::{kv_hashes, kv_lists, kv_sets};
use diesel::prelude::*;

// Row models backing the key-value tables
#[derive(Insertable, Debug)]
#[diesel(table_name = kv_hashes)]
pub struct NewHashField<'a> {
    pub store_key: &'a str,
    pub field: &'a str,
    pub value: &'a str,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = kv_sets)]
pub struct NewSetMember<'a> {
    pub store_key: &'a str,
    pub member: &'a str,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = kv_lists)]
pub struct NewListEntry<'a> {
    pub store_key: &'a str,
    pub value: &'a str,
}

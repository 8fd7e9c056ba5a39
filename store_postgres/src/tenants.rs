//! tenant row mapping (spec §3).

use crate::schema::tenants;
use app_core::Tenant;
use diesel::prelude::{AsChangeset, Insertable, Queryable};

#[derive(Debug, Queryable)]
pub struct DbTenant {
    pub id: i64,
    pub name: String,
    pub disabled: bool,
}

impl From<DbTenant> for Tenant {
    fn from(r: DbTenant) -> Self {
        Tenant {
            id: r.id,
            name: r.name,
            disabled: r.disabled,
        }
    }
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = tenants)]
pub struct WriteDbTenant<'a> {
    pub id: i64,
    pub name: &'a str,
    pub disabled: bool,
}

impl<'a> From<&'a Tenant> for WriteDbTenant<'a> {
    fn from(t: &'a Tenant) -> Self {
        WriteDbTenant {
            id: t.id,
            name: &t.name,
            disabled: t.disabled,
        }
    }
}

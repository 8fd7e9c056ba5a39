//! Tenant: owns every other entity except global settings (spec §3).

use serde::{Deserialize, Serialize};

pub type TenantId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    /// soft-disabled tenants are never destroyed while referenced
    pub disabled: bool,
}

impl Tenant {
    pub fn new(id: TenantId, name: impl Into<String>) -> Self {
        Tenant {
            id,
            name: name.into(),
            disabled: false,
        }
    }
}

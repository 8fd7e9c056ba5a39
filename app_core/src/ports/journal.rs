//! Activity Journal port (C9, spec §4.9).

use crate::model::{ActivityCategory, ActivityEntry, TenantId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum JournalError {
    #[error("journal io error: {0}")]
    Io(String),
    #[error("journal error: {0}")]
    Other(String),
}

pub type JournalResult<T> = Result<T, JournalError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JournalFilter {
    pub category: Option<ActivityCategory>,
    /// substring search over actor/action/details
    pub query: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Pagination {
    pub offset: usize,
    pub limit: usize,
}

#[async_trait]
pub trait JournalPort: Send + Sync {
    /// assigns a monotonic id, stamps the timestamp, infers the category,
    /// appends to the bounded ring + durable file, and notifies subscribed
    /// dashboards via the push port (spec §4.9)
    async fn append(
        &self,
        tenant_id: TenantId,
        actor: String,
        action: String,
        details: HashMap<String, serde_json::Value>,
    ) -> JournalResult<ActivityEntry>;

    async fn query(
        &self,
        tenant_id: TenantId,
        filter: JournalFilter,
        pagination: Pagination,
    ) -> JournalResult<Vec<ActivityEntry>>;
}

impl ActivityCategory {
    pub fn matches_filter(&self, filter: &JournalFilter) -> bool {
        filter.category.is_none_or(|c| c == *self)
    }
}

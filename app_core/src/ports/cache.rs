//! Media-State Cache port (C8, spec §4.8).

use crate::model::{PushEnvelope, TenantId};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(String),
    #[error("corrupt cache entry: {0}")]
    Corrupt(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

#[async_trait]
pub trait MediaCachePort: Send + Sync {
    /// write-temp-then-rename (spec §4.8)
    async fn save(&self, tenant_id: TenantId, envelope: &PushEnvelope) -> CacheResult<()>;

    /// best-effort: corrupt files are logged and ignored, returning `None`
    /// rather than propagating the error (spec §4.8)
    async fn load(&self, tenant_id: TenantId) -> Option<PushEnvelope>;
}

//! Sponsor state persistence port (spec §3 Sponsor State, §6 "Persisted
//! state layout"). Exclusively owned by the Timer Scheduler (C4) per spec
//! §5's shared-resource policy; no other component writes this file.

use crate::model::{SponsorState, TenantId};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SponsorStateError {
    #[error("sponsor state io error: {0}")]
    Io(String),
    #[error("corrupt sponsor state: {0}")]
    Corrupt(String),
}

pub type SponsorStateResult<T> = Result<T, SponsorStateError>;

#[async_trait]
pub trait SponsorStatePort: Send + Sync {
    /// Loads the tenant-scoped file (`sponsor-state-<tenantId>`); for
    /// tenant 1, falls back to the legacy un-suffixed file when a
    /// tenant-scoped one doesn't exist yet (spec §6).
    async fn load(&self, tenant_id: TenantId) -> SponsorStateResult<Option<SponsorState>>;

    /// write-temp-then-rename (spec §9 Design Notes: ambient file paths
    /// replaced by an explicit storage port).
    async fn save(&self, state: &SponsorState) -> SponsorStateResult<()>;
}

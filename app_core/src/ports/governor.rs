//! Rate Governor port (C7, spec §4.7).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GovernorMode {
    Idle,
    Upcoming,
    Active,
    /// disables regulation entirely until the recorded expiry
    DevBypass,
}

#[derive(Debug, Clone, Error)]
pub enum GovernorError {
    #[error("task rejected: governor lane closed")]
    Closed,
    #[error("upstream call failed: {0}")]
    Upstream(String),
}

pub type GovernorResult<T> = Result<T, GovernorError>;

#[derive(Debug, Clone, Copy)]
pub struct ManualOverride {
    pub mode: GovernorMode,
}

#[derive(Debug, Clone, Copy)]
pub struct DevBypassState {
    pub activated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Regulates outbound calls to external services (spec §4.7). `submit`
/// enqueues a unit of work FIFO and returns once the governor's current
/// effective rate has admitted it; the caller still performs the upstream
/// call and owns its result — the governor never retries.
#[async_trait]
pub trait RateGovernorPort: Send + Sync {
    /// blocks (cooperatively) until the task may proceed at the current
    /// effective rate, or returns `Closed` if the lane has been shut down
    async fn admit(&self, tenant_id: crate::model::TenantId) -> GovernorResult<()>;

    async fn current_mode(&self, tenant_id: crate::model::TenantId) -> GovernorMode;

    async fn set_override(&self, tenant_id: crate::model::TenantId, over: Option<ManualOverride>);

    /// activates the time-boxed development bypass (spec: fixed 3h duration)
    async fn activate_dev_bypass(&self, tenant_id: crate::model::TenantId);

    async fn deactivate_dev_bypass(&self, tenant_id: crate::model::TenantId);
}

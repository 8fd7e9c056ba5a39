//! Tenant Poller port (C6, spec §4.6): the one entry point the Coordinator
//! uses to "request an immediate poll for a single tenant" after a
//! state-mutating command, bypassing the regular interval.

use crate::model::TenantId;
use async_trait::async_trait;

#[async_trait]
pub trait PollerPort: Send + Sync {
    async fn poll_now(&self, tenant_id: TenantId);
}

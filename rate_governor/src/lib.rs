//! In-process `RateGovernorPort` implementation (C7, spec §4.7). Token
//! bucket rate limiting is delegated to the `governor` crate's keyed
//! limiter (the same crate the workspace depends on for this purpose),
//! re-armed with a new quota whenever a tenant's effective mode changes.
//!
//! Mode selection (spec §4.7: "automatic on a rechecked interval using a
//! tenant-scoped projection ... unless a manual override is in place") is
//! computed lazily on every `admit`/`current_mode` call by asking the
//! match store for the tenant's tournament states, rather than via a
//! separate periodic task: since mode only changes the rate a caller is
//! admitted at, recomputing on the access path is equivalent to polling on
//! an interval short enough that no caller observes staleness, and avoids
//! a redundant background loop.

use app_core::{DbResult, GovernorError, GovernorMode, GovernorResult, ManualOverride, RateGovernorPort, StorePort, TenantId, TournamentState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use governor::{Quota, RateLimiter};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::clock::DefaultClock;
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

#[derive(Debug, Clone, Copy)]
pub struct DevBypassState {
    pub activated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct GovernorRates {
    pub idle_rps: f64,
    pub upcoming_rps: f64,
    pub active_rps: f64,
}

impl Default for GovernorRates {
    fn default() -> Self {
        GovernorRates { idle_rps: 1.0, upcoming_rps: 5.0, active_rps: 20.0 }
    }
}

fn rps_to_quota(rps: f64) -> Quota {
    let per_sec = rps.max(1.0).round() as u32;
    let nz = NonZeroU32::new(per_sec).unwrap_or(nonzero!(1u32));
    Quota::per_second(nz)
}

type KeyedLimiter = RateLimiter<TenantId, DefaultKeyedStateStore<TenantId>, DefaultClock>;

/// Per-tenant FIFO rate governor (spec §4.7). `submit`/`admit` callers are
/// cooperatively delayed until the current effective rate has room; task
/// failures before dispatch therefore never consumed budget, matching the
/// spec's "task failures do not consume rate budget if they occurred
/// before dispatch" rule trivially (the governor has already returned by
/// the time the caller can fail).
pub struct RateGovernor {
    store: Arc<dyn StorePort>,
    rates: GovernorRates,
    dev_bypass_duration: Duration,
    limiter: DashMap<GovernorMode, Arc<KeyedLimiter>>,
    overrides: DashMap<TenantId, ManualOverride>,
    dev_bypass: DashMap<TenantId, DevBypassState>,
    closed: std::sync::atomic::AtomicBool,
}

impl RateGovernor {
    pub fn new(store: Arc<dyn StorePort>, rates: GovernorRates, dev_bypass_duration: Duration) -> Self {
        RateGovernor {
            store,
            rates,
            dev_bypass_duration,
            limiter: DashMap::new(),
            overrides: DashMap::new(),
            dev_bypass: DashMap::new(),
            closed: std::sync::atomic::AtomicBool::new(false),
        }
    }

    fn limiter_for(&self, mode: GovernorMode) -> Arc<KeyedLimiter> {
        self.limiter
            .entry(mode)
            .or_insert_with(|| {
                let rps = match mode {
                    GovernorMode::Idle => self.rates.idle_rps,
                    GovernorMode::Upcoming => self.rates.upcoming_rps,
                    GovernorMode::Active => self.rates.active_rps,
                    // unreachable in practice: dev bypass never reaches the limiter
                    GovernorMode::DevBypass => self.rates.active_rps,
                };
                Arc::new(RateLimiter::dashmap(rps_to_quota(rps)))
            })
            .clone()
    }

    async fn project_mode(&self, tenant_id: TenantId) -> DbResult<GovernorMode> {
        let tournaments = self.tenant_tournament_states(tenant_id).await?;
        if tournaments.iter().any(|s| *s == TournamentState::Underway) {
            return Ok(GovernorMode::Active);
        }
        if tournaments.iter().any(|s| *s == TournamentState::Pending) {
            return Ok(GovernorMode::Upcoming);
        }
        Ok(GovernorMode::Idle)
    }

    async fn tenant_tournament_states(&self, tenant_id: TenantId) -> DbResult<Vec<TournamentState>> {
        let tournaments = self.store.list_tournaments_by_tenant(tenant_id).await?;
        Ok(tournaments.into_iter().map(|t| t.state).collect())
    }

    fn dev_bypass_active(&self, tenant_id: TenantId, now: DateTime<Utc>) -> bool {
        match self.dev_bypass.get(&tenant_id) {
            Some(state) if state.expires_at > now => true,
            Some(_) => {
                self.dev_bypass.remove(&tenant_id);
                false
            }
            None => false,
        }
    }

    async fn effective_mode(&self, tenant_id: TenantId) -> GovernorResult<GovernorMode> {
        if self.dev_bypass_active(tenant_id, Utc::now()) {
            return Ok(GovernorMode::DevBypass);
        }
        if let Some(over) = self.overrides.get(&tenant_id) {
            return Ok(over.mode);
        }
        self.project_mode(tenant_id)
            .await
            .map_err(|e| GovernorError::Upstream(e.to_string()))
    }
}

#[async_trait]
impl RateGovernorPort for RateGovernor {
    #[instrument(name = "governor.admit", skip(self))]
    async fn admit(&self, tenant_id: TenantId) -> GovernorResult<()> {
        if self.closed.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(GovernorError::Closed);
        }
        let mode = self.effective_mode(tenant_id).await?;
        if mode == GovernorMode::DevBypass {
            return Ok(());
        }
        let limiter = self.limiter_for(mode);
        limiter.until_key_ready(&tenant_id).await;
        Ok(())
    }

    #[instrument(name = "governor.current_mode", skip(self))]
    async fn current_mode(&self, tenant_id: TenantId) -> GovernorMode {
        self.effective_mode(tenant_id).await.unwrap_or_else(|e| {
            warn!(error = %e, "governor_mode_projection_failed, defaulting to idle");
            GovernorMode::Idle
        })
    }

    #[instrument(name = "governor.set_override", skip(self))]
    async fn set_override(&self, tenant_id: TenantId, over: Option<ManualOverride>) {
        match over {
            Some(o) => {
                self.overrides.insert(tenant_id, o);
            }
            None => {
                self.overrides.remove(&tenant_id);
            }
        }
    }

    #[instrument(name = "governor.activate_dev_bypass", skip(self))]
    async fn activate_dev_bypass(&self, tenant_id: TenantId) {
        let now = Utc::now();
        self.dev_bypass.insert(
            tenant_id,
            DevBypassState { activated_at: now, expires_at: now + self.dev_bypass_duration },
        );
    }

    #[instrument(name = "governor.deactivate_dev_bypass", skip(self))]
    async fn deactivate_dev_bypass(&self, tenant_id: TenantId) {
        self.dev_bypass.remove(&tenant_id);
    }
}

impl RateGovernor {
    /// graceful shutdown step (spec §5): reject further admits.
    pub fn close(&self) {
        self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use app_core::{Tenant, Tournament, TournamentId};
    use store_fake::FakeStore;
    use uuid::Uuid;

    fn tournament(tenant_id: TenantId, state: TournamentState) -> Tournament {
        Tournament {
            id: Uuid::new_v4(),
            tenant_id,
            slug: "t".into(),
            name: "t".into(),
            format: app_core::Format::SingleElimination,
            state,
            format_options: Default::default(),
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    async fn governor_with_tournament(state: TournamentState) -> (RateGovernor, TenantId) {
        let store = Arc::new(FakeStore::new());
        store.seed_tenant(Tenant::new(1, "t1"));
        let t = tournament(1, TournamentState::Pending);
        let created = store.create_tournament(t).await.unwrap();
        if state == TournamentState::Underway {
            store.set_tournament_state(created.id, TournamentState::Underway).await.unwrap();
        }
        (RateGovernor::new(store, GovernorRates::default(), Duration::from_secs(3 * 3600)), 1)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_underway_tournament_when_mode_checked_then_active() {
        let (gov, tenant) = governor_with_tournament(TournamentState::Underway).await;
        assert_eq!(gov.current_mode(tenant).await, GovernorMode::Active);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_pending_tournament_when_mode_checked_then_upcoming() {
        let (gov, tenant) = governor_with_tournament(TournamentState::Pending).await;
        assert_eq!(gov.current_mode(tenant).await, GovernorMode::Upcoming);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_manual_override_when_set_then_supersedes_projection() {
        let (gov, tenant) = governor_with_tournament(TournamentState::Underway).await;
        gov.set_override(tenant, Some(ManualOverride { mode: GovernorMode::Idle })).await;
        assert_eq!(gov.current_mode(tenant).await, GovernorMode::Idle);
        gov.set_override(tenant, None).await;
        assert_eq!(gov.current_mode(tenant).await, GovernorMode::Active);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_dev_bypass_active_when_mode_checked_then_bypass_wins_over_override() {
        let (gov, tenant) = governor_with_tournament(TournamentState::Underway).await;
        gov.set_override(tenant, Some(ManualOverride { mode: GovernorMode::Idle })).await;
        gov.activate_dev_bypass(tenant).await;
        assert_eq!(gov.current_mode(tenant).await, GovernorMode::DevBypass);
        gov.deactivate_dev_bypass(tenant).await;
        assert_eq!(gov.current_mode(tenant).await, GovernorMode::Idle);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_dev_bypass_when_admit_then_returns_immediately_without_waiting_on_limiter() {
        let (gov, tenant) = governor_with_tournament(TournamentState::Complete).await;
        gov.activate_dev_bypass(tenant).await;
        gov.admit(tenant).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_closed_governor_when_admit_then_rejected() {
        let (gov, tenant) = governor_with_tournament(TournamentState::Underway).await;
        gov.close();
        assert!(matches!(gov.admit(tenant).await, Err(GovernorError::Closed)));
    }
}

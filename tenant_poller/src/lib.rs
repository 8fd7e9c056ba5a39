//! Tenant Poller (C6, spec §4.6): a per-tenant loop that, at a cadence,
//! snapshots the active tournament and hands a payload to the Push Fabric.
//!
//! Runs in one of two modes (spec §4.6): single-tenant legacy mode polls
//! one configured tournament; multi-tenant mode (default) scans every
//! tenant each tick and snapshots the ones with an `underway` active
//! tournament. Either way a tick for tenant T only starts its next
//! iteration once the current one has finished (spec §5: "completes tick
//! T+1 only after tick T finishes (no overlap per tenant; concurrent
//! across tenants)"); tenants run concurrently with each other via
//! `futures_util::future::join_all`.
//!
//! [`PollerPort::poll_now`] implements the Coordinator's "immediate
//! re-snapshot" request (spec §4.3, §4.6) by `tokio::spawn`-ing the
//! snapshot outside the regular interval — literally "the next scheduler
//! tick" in the sense that a spawned task is polled at the runtime's next
//! opportunity, not held until the periodic timer fires. The shared state
//! lives behind one inner `Arc` so both the periodic loop and an on-demand
//! `poll_now` task can own a handle to it independently of `&self`'s
//! lifetime.

use app_core::{
    EnvelopeCounters, EnvelopeSource, MatchFilter, MatchState, MediaCachePort, PollerPort,
    PushEnvelope, PushPort, StorePort, TenantId, TournamentId, TournamentState,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

#[derive(Debug, Clone)]
pub enum PollerMode {
    /// one fixed tournament, polled regardless of tenant scanning (spec
    /// §4.6 "Single-tenant legacy mode")
    SingleTenant { tenant_id: TenantId, tournament_id: TournamentId },
    /// scans every tenant each tick; default (spec §4.6)
    MultiTenant,
}

/// Per-tenant single-writer lane for snapshot/push, mirroring the pattern
/// `coordinator` uses for mutations (spec §5): guarantees tick T+1 for a
/// tenant never starts before tick T's snapshot+push has finished, and
/// that an on-demand `poll_now` never races the periodic tick for the
/// same tenant.
struct Lane {
    lock: tokio::sync::Mutex<()>,
}

struct Inner {
    store: Arc<dyn StorePort>,
    push: Arc<dyn PushPort>,
    cache: Arc<dyn MediaCachePort>,
    mode: PollerMode,
    stale_threshold_ms: u64,
    lanes: DashMap<TenantId, Arc<Lane>>,
    /// tenants whose active tournament reached completion for polling
    /// purposes (spec §4.6: "after a final push, polling for that tenant
    /// is suspended")
    suspended: DashSet<TenantId>,
}

impl Inner {
    fn lane(&self, tenant_id: TenantId) -> Arc<Lane> {
        self.lanes
            .entry(tenant_id)
            .or_insert_with(|| Arc::new(Lane { lock: tokio::sync::Mutex::new(()) }))
            .clone()
    }

    async fn tick(&self) {
        match &self.mode {
            PollerMode::SingleTenant { tenant_id, tournament_id } => {
                self.poll_tenant(*tenant_id, Some(*tournament_id)).await;
            }
            PollerMode::MultiTenant => {
                let tenants = match self.store.list_tenants_with_active_tournament().await {
                    Ok(t) => t,
                    Err(e) => {
                        warn!(error = %e, "poller_list_tenants_failed");
                        return;
                    }
                };
                let futures = tenants
                    .into_iter()
                    .filter(|t| !self.suspended.contains(t))
                    .map(|tenant_id| self.poll_tenant(tenant_id, None));
                futures_util::future::join_all(futures).await;
            }
        }
    }

    async fn poll_tenant(&self, tenant_id: TenantId, fixed_tournament_id: Option<TournamentId>) {
        let lane = self.lane(tenant_id);
        let _permit = lane.lock.lock().await;
        self.snapshot_and_push(tenant_id, fixed_tournament_id).await;
    }

    #[instrument(name = "poller.snapshot_and_push", skip(self), fields(tenant_id))]
    async fn snapshot_and_push(&self, tenant_id: TenantId, fixed_tournament_id: Option<TournamentId>) {
        let envelope = match self.build_envelope(tenant_id, fixed_tournament_id).await {
            Ok(Some(envelope)) => envelope,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, tenant_id, "poller_snapshot_failed_falling_back_to_cache");
                match self.cache.load(tenant_id).await {
                    Some(cached) => self.mark_stale(cached),
                    None => return,
                }
            }
        };

        if envelope.source == EnvelopeSource::Local {
            if let Err(e) = self.cache.save(tenant_id, &envelope).await {
                warn!(error = %e, tenant_id, "poller_cache_save_failed");
            }
            if envelope.counters.total > 0 && envelope.podium.is_some() {
                self.suspended.insert(tenant_id);
            } else {
                self.suspended.remove(&tenant_id);
            }
        }

        if let Err(e) = self.push.publish_envelope(envelope).await {
            warn!(error = %e, tenant_id, "poller_publish_failed");
        }
    }

    fn mark_stale(&self, mut cached: PushEnvelope) -> PushEnvelope {
        let age_ms = (Utc::now() - cached.timestamp).num_milliseconds().max(0) as u64;
        cached.source = EnvelopeSource::Cache;
        cached.is_stale = age_ms > self.stale_threshold_ms;
        cached.cache_age_ms = Some(age_ms);
        cached
    }

    async fn build_envelope(
        &self,
        tenant_id: TenantId,
        fixed_tournament_id: Option<TournamentId>,
    ) -> app_core::DbResult<Option<PushEnvelope>> {
        let tournament = match fixed_tournament_id {
            Some(id) => self.store.get_tournament(id).await?,
            None => self.store.get_active_tournament(tenant_id).await?,
        };
        let Some(tournament) = tournament else {
            return Ok(None);
        };
        if tournament.state != TournamentState::Underway && fixed_tournament_id.is_none() {
            return Ok(None);
        }

        let participants = self.store.get_participants(tournament.id).await?;
        let matches = self
            .store
            .get_matches_by_tournament(tournament.id, MatchFilter::default())
            .await?;
        let stations = self.store.get_stations(tournament.id).await?;

        let counters = EnvelopeCounters::from_matches(&matches);
        // A conditional grand-finals reset (spec §4.1) that never activated
        // stays pending and unfilled forever once its prereq decides against
        // it; that must not hold the tournament open indefinitely.
        let all_non_bye_complete = !matches.is_empty()
            && matches.iter().all(|m| {
                m.is_bye
                    || m.state == MatchState::Complete
                    || (m.is_conditional && m.player1_id.is_none() && m.player2_id.is_none())
            });
        let is_complete = tournament.is_explicitly_complete() || all_non_bye_complete;

        let podium = if is_complete {
            app_core::calculate_final_ranks(tournament.format, &matches, &participants, &tournament.format_options, &[])
                .ok()
                .map(|ranks| ranks.into_iter().map(|r| (r.participant_id, r.rank)).collect())
        } else {
            None
        };

        let next_suggested_match = matches
            .iter()
            .filter(|m| m.state == MatchState::Open)
            .filter_map(|m| m.suggested_play_order.map(|order| (order, m.id)))
            .min_by_key(|(order, _)| *order)
            .map(|(_, id)| id);

        let available_stations = stations.iter().filter(|s| s.is_available()).map(|s| s.id).collect();

        let payload_hash = PushEnvelope::compute_hash(&matches, &podium);
        Ok(Some(PushEnvelope {
            tenant_id,
            tournament_id: tournament.id,
            tournament_slug: tournament.slug.clone(),
            matches,
            podium,
            next_suggested_match,
            available_stations,
            counters,
            source: EnvelopeSource::Local,
            is_stale: false,
            cache_age_ms: None,
            timestamp: Utc::now(),
            payload_hash,
        }))
    }
}

pub struct TenantPoller {
    inner: Arc<Inner>,
    poll_interval: Duration,
}

impl TenantPoller {
    pub fn new(
        store: Arc<dyn StorePort>,
        push: Arc<dyn PushPort>,
        cache: Arc<dyn MediaCachePort>,
        mode: PollerMode,
        poll_interval: Duration,
        stale_threshold_ms: u64,
    ) -> Self {
        TenantPoller {
            inner: Arc::new(Inner {
                store,
                push,
                cache,
                mode,
                stale_threshold_ms,
                lanes: DashMap::new(),
                suspended: DashSet::new(),
            }),
            poll_interval,
        }
    }

    /// Spawns the periodic tick loop. The returned handle is owned by the
    /// caller (the `server` composition root), which aborts it as part of
    /// graceful shutdown step 2 (spec §5).
    pub fn spawn(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let interval = self.poll_interval;
        tokio::spawn(async move {
            loop {
                inner.tick().await;
                tokio::time::sleep(interval).await;
            }
        })
    }

    #[cfg(test)]
    async fn tick(&self) {
        self.inner.tick().await;
    }

    #[cfg(test)]
    fn is_suspended(&self, tenant_id: TenantId) -> bool {
        self.inner.suspended.contains(&tenant_id)
    }
}

#[async_trait]
impl PollerPort for TenantPoller {
    #[instrument(name = "poller.poll_now", skip(self), fields(tenant_id))]
    async fn poll_now(&self, tenant_id: TenantId) {
        let fixed = match &self.inner.mode {
            PollerMode::SingleTenant { tenant_id: t, tournament_id } if *t == tenant_id => Some(*tournament_id),
            PollerMode::SingleTenant { .. } => return,
            PollerMode::MultiTenant => None,
        };
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.poll_tenant(tenant_id, fixed).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use app_core::{Format, FormatOptions, Match, MatchScores, Participant, Tenant, Tournament};
    use media_cache::MediaCache;
    use push_fabric::PushFabric;
    use store_fake::FakeStore;
    use uuid::Uuid;

    fn tournament(tenant_id: TenantId, state: TournamentState) -> Tournament {
        Tournament {
            id: Uuid::new_v4(),
            tenant_id,
            slug: "t".into(),
            name: "t".into(),
            format: Format::SingleElimination,
            state,
            format_options: FormatOptions::default(),
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    fn open_match(tournament_id: TournamentId, p1: Uuid, p2: Uuid, order: u32) -> Match {
        Match {
            id: Uuid::new_v4(),
            tournament_id,
            identifier: "W1-1".into(),
            round: 1,
            bracket_position: 0,
            is_losers_bracket: false,
            player1_id: Some(p1),
            player2_id: Some(p2),
            prereq_match_id_p1: None,
            prereq_match_id_p2: None,
            is_prereq_loser_p1: false,
            is_prereq_loser_p2: false,
            suggested_play_order: Some(order),
            scores: MatchScores::default(),
            winner_id: None,
            loser_id: None,
            state: MatchState::Open,
            underway_at: None,
            completed_at: None,
            is_bye: false,
            is_grand_finals: false,
            is_grand_finals_reset: false,
            is_conditional: false,
            station_id: None,
            lobby_participants: Vec::new(),
            placements: Vec::new(),
        }
    }

    async fn seeded_poller(dir: &std::path::Path) -> (Arc<TenantPoller>, Arc<FakeStore>, Arc<PushFabric>, TournamentId) {
        let store = Arc::new(FakeStore::new());
        store.seed_tenant(Tenant::new(1, "t1"));
        let mut t = tournament(1, TournamentState::Pending);
        t = store.create_tournament(t).await.unwrap();
        store.set_tournament_state(t.id, TournamentState::Underway).await.unwrap();
        let p1 = store.create_participant(Participant::new(t.id, "A")).await.unwrap();
        let p2 = store.create_participant(Participant::new(t.id, "B")).await.unwrap();
        store.bulk_create_matches(vec![open_match(t.id, p1.id, p2.id, 0)]).await.unwrap();

        let push = Arc::new(PushFabric::default());
        let cache = Arc::new(MediaCache::new(dir));
        let poller = Arc::new(TenantPoller::new(
            store.clone(),
            push.clone(),
            cache,
            PollerMode::MultiTenant,
            Duration::from_millis(10),
            60_000,
        ));
        (poller, store, push, t.id)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_underway_tournament_when_ticked_then_envelope_cached_and_pushed() {
        let dir = tempfile::tempdir().unwrap();
        let (poller, _store, push, tournament_id) = seeded_poller(dir.path()).await;
        let room = app_core::DisplayRoom { tenant_id: 1, kind: app_core::DisplayKind::Match };
        let display_id = Uuid::new_v4();
        let _stream = push.connect(room, display_id).await;

        poller.tick().await;

        let cache = MediaCache::new(dir.path());
        let cached = cache.load(1).await.expect("envelope cached");
        assert_eq!(cached.tournament_id, tournament_id);
        assert_eq!(cached.counters.open, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_no_active_tournament_when_ticked_then_nothing_pushed() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::new());
        store.seed_tenant(Tenant::new(2, "t2"));
        let push = Arc::new(PushFabric::default());
        let cache = Arc::new(MediaCache::new(dir.path()));
        let poller = TenantPoller::new(store, push, cache.clone(), PollerMode::MultiTenant, Duration::from_millis(10), 60_000);
        poller.tick().await;
        assert!(cache.load(2).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_all_matches_complete_when_ticked_twice_then_tenant_suspended() {
        let dir = tempfile::tempdir().unwrap();
        let (poller, store, _push, tournament_id) = seeded_poller(dir.path()).await;
        let matches = store.snapshot_matches(tournament_id);
        let m = &matches[0];
        store.set_winner(m.id, m.player1_id.unwrap(), MatchScores { p1: 2, p2: 0, csv: None }).await.unwrap();

        poller.tick().await;
        assert!(poller.is_suspended(1));

        // a suspended tenant is skipped on the next tick: the cache entry
        // from the completing tick is left untouched rather than re-pushed.
        let cache = MediaCache::new(dir.path());
        let before = cache.load(1).await.unwrap().payload_hash;
        poller.tick().await;
        let after = cache.load(1).await.unwrap().payload_hash;
        assert_eq!(before, after);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_store_error_when_ticked_then_falls_back_to_cache() {
        let dir = tempfile::tempdir().unwrap();
        let (poller, store, _push, tournament_id) = seeded_poller(dir.path()).await;
        poller.tick().await;

        store.fail_next_call(app_core::DbError::SerializationFailure);
        poller.tick().await;

        let cache = MediaCache::new(dir.path());
        let cached = cache.load(1).await.unwrap();
        assert_eq!(cached.tournament_id, tournament_id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_single_tenant_mode_when_ticked_then_polls_configured_tournament_even_if_not_flagged_active() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::new());
        store.seed_tenant(Tenant::new(9, "t9"));
        let t = tournament(9, TournamentState::Underway);
        let created = store.create_tournament(t).await.unwrap();
        let push = Arc::new(PushFabric::default());
        let cache = Arc::new(MediaCache::new(dir.path()));
        let poller = TenantPoller::new(
            store,
            push,
            cache.clone(),
            PollerMode::SingleTenant { tenant_id: 9, tournament_id: created.id },
            Duration::from_millis(10),
            60_000,
        );
        poller.tick().await;
        assert!(cache.load(9).await.is_some());
    }
}

//! Timer Scheduler (C4, spec §4.4): DQ countdown timers plus sponsor
//! rotation and visibility cycling. Grounded in the teacher's background
//! task style (spawned `tokio::time` workers registered in a shared map,
//! torn down on cancellation) and in `coordinator`'s per-tenant lane
//! pattern, generalized here to per-key timer bookkeeping instead of a
//! single lock per tenant.
//!
//! DQ timer cancellation is deliberately not `JoinHandle::abort`-based:
//! spec §4.4 requires that "cancelling a timer whose deadline has already
//! fired but whose side-effect hasn't completed is a no-op; side-effect
//! completion is atomic." A cancellation flag checked once, right after
//! the sleep and before the side effect starts, gets this right without
//! ever interrupting a side effect partway through. Sponsor rotation and
//! the timer-view cycle carry no such atomicity requirement (spec: "in-
//! flight phase ticks are not retried" on cancellation) so those use plain
//! `JoinHandle::abort`.

use app_core::{
    AutoDqAction, CoordinatorPort, DisplayKind, DqTimerKey, DqTimerRecord, PushPort,
    PushTopicEvent, RotationOrder, SponsorConfig, SponsorId, SponsorItem, SponsorPosition,
    SponsorState, SponsorStatePort, TenantId, TournamentId,
};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};
use uuid::Uuid;

struct DqTimerState {
    record: Mutex<DqTimerRecord>,
    cancelled: AtomicBool,
}

/// Starting a DQ timer (C4, spec §4.4): one countdown per
/// `(tournament_id, match_id, station_label)`, with a warning deadline and
/// an expiry deadline that either notifies or auto-forfeits depending on
/// the tenant's configured [`AutoDqAction`].
pub struct TimerScheduler {
    push: Arc<dyn PushPort>,
    coordinator: Arc<dyn CoordinatorPort>,
    sponsor_store: Arc<dyn SponsorStatePort>,
    dq_timers: Arc<DashMap<DqTimerKey, Arc<DqTimerState>>>,
    tenant_autodq: Arc<DashMap<TenantId, AutoDqAction>>,
    warning_threshold: Duration,
    rotation_tasks: Arc<DashMap<TenantId, JoinHandle<()>>>,
    cycle_tasks: Arc<DashMap<TenantId, JoinHandle<()>>>,
}

impl TimerScheduler {
    pub fn new(
        push: Arc<dyn PushPort>,
        coordinator: Arc<dyn CoordinatorPort>,
        sponsor_store: Arc<dyn SponsorStatePort>,
        warning_threshold: Duration,
    ) -> Self {
        TimerScheduler {
            push,
            coordinator,
            sponsor_store,
            dq_timers: Arc::new(DashMap::new()),
            tenant_autodq: Arc::new(DashMap::new()),
            warning_threshold,
            rotation_tasks: Arc::new(DashMap::new()),
            cycle_tasks: Arc::new(DashMap::new()),
        }
    }

    pub fn set_autodq_action(&self, tenant_id: TenantId, action: AutoDqAction) {
        self.tenant_autodq.insert(tenant_id, action);
    }

    fn autodq_action_for(&self, tenant_id: TenantId) -> AutoDqAction {
        self.tenant_autodq
            .get(&tenant_id)
            .map(|a| a.clone())
            .unwrap_or(AutoDqAction::Notify)
    }

    // ---- DQ timers ---------------------------------------------------

    /// Starting a timer on a key that's already running cancels the
    /// previous registration first (spec §4.4 Cancellation semantics).
    #[instrument(skip(self), fields(tenant_id, match_id = %key.match_id))]
    pub fn start_dq_timer(
        &self,
        tenant_id: TenantId,
        key: DqTimerKey,
        target_participant_id: Uuid,
        target_participant_name: String,
        duration: Duration,
    ) {
        if let Some(prev) = self.dq_timers.get(&key) {
            prev.cancelled.store(true, Ordering::SeqCst);
        }

        let now = Utc::now();
        let record = DqTimerRecord {
            tenant_id,
            key: key.clone(),
            target_participant_id,
            target_participant_name,
            started_at: now,
            expires_at: now + chrono::Duration::from_std(duration).unwrap_or_default(),
            warning_fired: false,
        };
        let state = Arc::new(DqTimerState {
            record: Mutex::new(record),
            cancelled: AtomicBool::new(false),
        });
        self.dq_timers.insert(key.clone(), Arc::clone(&state));

        let _ = self.push.clone();
        let push = Arc::clone(&self.push);
        let ev_push = Arc::clone(&push);
        let ev_key = key.clone();
        tokio::spawn(async move {
            let _ = ev_push
                .publish_event(
                    tenant_id,
                    PushTopicEvent::TimerDqStarted {
                        match_id: ev_key.match_id,
                        duration_secs: duration.as_secs(),
                    },
                )
                .await;
        });

        if duration > self.warning_threshold {
            let warn_state = Arc::clone(&state);
            let warn_push = Arc::clone(&push);
            let warn_key = key.clone();
            let warn_delay = duration - self.warning_threshold;
            tokio::spawn(async move {
                tokio::time::sleep(warn_delay).await;
                if warn_state.cancelled.load(Ordering::SeqCst) {
                    return;
                }
                {
                    let mut rec = warn_state.record.lock().await;
                    rec.warning_fired = true;
                }
                let _ = warn_push
                    .publish_event(tenant_id, PushTopicEvent::TimerDqWarning { match_id: warn_key.match_id })
                    .await;
            });
        }

        let expiry_state = Arc::clone(&state);
        let expiry_push = Arc::clone(&push);
        let coordinator = Arc::clone(&self.coordinator);
        let expiry_key = key.clone();
        let dq_timers = Arc::clone(&self.dq_timers);
        let action = self.autodq_action_for(tenant_id);
        let target_id = target_participant_id;
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if expiry_state.cancelled.load(Ordering::SeqCst) {
                return;
            }
            // past this point the deadline has unconditionally fired; a
            // concurrent cancel() call is now a no-op regardless of how
            // long the side effect below takes to finish.
            dq_timers.remove_if(&expiry_key, |_, v| Arc::ptr_eq(v, &expiry_state));

            let _ = expiry_push
                .publish_event(tenant_id, PushTopicEvent::TimerDqExpired { match_id: expiry_key.match_id })
                .await;

            match action {
                AutoDqAction::Notify => {}
                AutoDqAction::AutoDq => {
                    match coordinator
                        .forfeit_player(tenant_id, expiry_key.match_id, target_id, "timer_scheduler")
                        .await
                    {
                        Ok(_) => {
                            let _ = expiry_push
                                .publish_event(
                                    tenant_id,
                                    PushTopicEvent::TimerDqExecuted { match_id: expiry_key.match_id },
                                )
                                .await;
                        }
                        Err(e) => {
                            warn!(error = %e, match_id = %expiry_key.match_id, "dq_auto_forfeit_failed");
                            let _ = expiry_push
                                .publish_event(
                                    tenant_id,
                                    PushTopicEvent::TimerDqError {
                                        match_id: expiry_key.match_id,
                                        message: e.to_string(),
                                    },
                                )
                                .await;
                        }
                    }
                }
            }
        });
    }

    /// Idempotent: cancelling a key with no running timer is a no-op.
    #[instrument(skip(self), fields(match_id = %key.match_id))]
    pub async fn cancel_dq_timer(&self, tenant_id: TenantId, key: &DqTimerKey) {
        if let Some((_, state)) = self.dq_timers.remove(key) {
            state.cancelled.store(true, Ordering::SeqCst);
            let _ = self
                .push
                .publish_event(tenant_id, PushTopicEvent::TimerDqCancelled { match_id: key.match_id })
                .await;
        }
    }

    pub async fn list_dq_timers(&self, tenant_id: TenantId) -> Vec<DqTimerRecord> {
        let mut out = Vec::new();
        for entry in self.dq_timers.iter() {
            if entry.cancelled.load(Ordering::SeqCst) {
                continue;
            }
            let rec = entry.record.lock().await;
            if rec.tenant_id == tenant_id {
                out.push(rec.clone());
            }
        }
        out
    }

    // ---- Sponsor rotation and visibility cycling ----------------------

    async fn load_or_default(&self, tenant_id: TenantId) -> SponsorState {
        match self.sponsor_store.load(tenant_id).await {
            Ok(Some(state)) => state,
            Ok(None) => SponsorState::new(tenant_id),
            Err(e) => {
                warn!(error = %e, tenant_id, "sponsor_state_load_failed_using_default");
                SponsorState::new(tenant_id)
            }
        }
    }

    /// Replaces the persisted sponsor config and re-arms both background
    /// loops to reflect it (spec §4.4: "Reconfiguration cancels and
    /// re-arms").
    #[instrument(skip(self, config), fields(tenant_id))]
    pub async fn update_sponsor_config(&self, tenant_id: TenantId, config: SponsorConfig) {
        let mut state = self.load_or_default(tenant_id).await;
        state.config = config;
        state.last_updated = Utc::now();
        if let Err(e) = self.sponsor_store.save(&state).await {
            warn!(error = %e, tenant_id, "sponsor_state_save_failed");
        }
        let _ = self
            .push
            .publish_event(tenant_id, PushTopicEvent::SponsorConfig { config: state.config.clone() })
            .await;
        self.rearm(tenant_id).await;
    }

    #[instrument(skip(self, item), fields(tenant_id))]
    pub async fn upsert_sponsor_item(&self, tenant_id: TenantId, item: SponsorItem) {
        let mut state = self.load_or_default(tenant_id).await;
        if let Some(existing) = state.sponsors.iter_mut().find(|s| s.id == item.id) {
            *existing = item;
        } else {
            state.sponsors.push(item);
        }
        state.last_updated = Utc::now();
        if let Err(e) = self.sponsor_store.save(&state).await {
            warn!(error = %e, tenant_id, "sponsor_state_save_failed");
        }
        self.rearm(tenant_id).await;
    }

    #[instrument(skip(self), fields(tenant_id))]
    pub async fn delete_sponsor_item(&self, tenant_id: TenantId, sponsor_id: SponsorId) {
        let mut state = self.load_or_default(tenant_id).await;
        state.sponsors.retain(|s| s.id != sponsor_id);
        state.last_updated = Utc::now();
        if let Err(e) = self.sponsor_store.save(&state).await {
            warn!(error = %e, tenant_id, "sponsor_state_save_failed");
        }
        self.rearm(tenant_id).await;
    }

    /// Cancels and reschedules rotation + cycling for a tenant from its
    /// currently persisted sponsor state. Called after any config/item
    /// mutation and once at startup per active tenant.
    pub async fn rearm(&self, tenant_id: TenantId) {
        if let Some((_, handle)) = self.rotation_tasks.remove(&tenant_id) {
            handle.abort();
        }
        if let Some((_, handle)) = self.cycle_tasks.remove(&tenant_id) {
            handle.abort();
        }

        let state = self.load_or_default(tenant_id).await;
        if !state.config.enabled {
            return;
        }

        if state.config.rotation_enabled && !state.positions_with_rotation_candidates().is_empty() {
            let initial: Vec<SponsorItem> = state
                .positions_with_rotation_candidates()
                .into_iter()
                .filter_map(|p| state.current_sponsor(p).cloned())
                .collect();
            if !initial.is_empty() {
                let _ = self
                    .push
                    .publish_event(
                        tenant_id,
                        PushTopicEvent::SponsorShow { sponsors: initial, duration_ms: state.config.rotation_transition_ms },
                    )
                    .await;
            }
            self.spawn_rotation(tenant_id, state.config.clone());
        }

        if state.config.timer_view_enabled {
            self.spawn_cycle(tenant_id, state.config.clone());
        }
    }

    fn spawn_rotation(&self, tenant_id: TenantId, config: SponsorConfig) {
        let push = Arc::clone(&self.push);
        let sponsor_store = Arc::clone(&self.sponsor_store);
        let interval = Duration::from_secs(config.rotation_interval_secs.max(1));
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let mut state = match sponsor_store.load(tenant_id).await {
                    Ok(Some(s)) => s,
                    Ok(None) => SponsorState::new(tenant_id),
                    Err(e) => {
                        warn!(error = %e, tenant_id, "sponsor_rotation_load_failed");
                        continue;
                    }
                };
                let positions = state.positions_with_rotation_candidates();
                for position in positions {
                    let count = state.active_in_position(position).len() as u32;
                    if count == 0 {
                        continue;
                    }
                    let current = *state.current_index.get(&position).unwrap_or(&0);
                    let next = match state.config.rotation_order {
                        RotationOrder::Sequential => (current + 1) % count,
                        RotationOrder::Random => {
                            use rand::Rng;
                            rand::rng().random_range(0..count)
                        }
                    };
                    state.current_index.insert(position, next);
                    if let Some(sponsor) = state.current_sponsor(position) {
                        let _ = push
                            .publish_event(
                                tenant_id,
                                PushTopicEvent::SponsorRotate {
                                    position,
                                    sponsor: sponsor.clone(),
                                    transition_delay_ms: state.config.rotation_transition_ms,
                                },
                            )
                            .await;
                    }
                }
                state.last_updated = Utc::now();
                if let Err(e) = sponsor_store.save(&state).await {
                    warn!(error = %e, tenant_id, "sponsor_rotation_save_failed");
                }
            }
        });
        self.rotation_tasks.insert(tenant_id, handle);
    }

    fn spawn_cycle(&self, tenant_id: TenantId, config: SponsorConfig) {
        let push = Arc::clone(&self.push);
        let sponsor_store = Arc::clone(&self.sponsor_store);
        let show_for = Duration::from_secs(config.timer_show_duration_secs.max(1));
        let hide_for = Duration::from_secs(config.timer_hide_duration_secs.max(1));
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(show_for).await;
                let _ = push.publish_event(tenant_id, PushTopicEvent::SponsorHide { position: None }).await;
                tokio::time::sleep(hide_for).await;
                let state = match sponsor_store.load(tenant_id).await {
                    Ok(Some(s)) => s,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(error = %e, tenant_id, "sponsor_cycle_load_failed");
                        continue;
                    }
                };
                let sponsors: Vec<SponsorItem> = state
                    .positions_with_rotation_candidates()
                    .into_iter()
                    .chain([
                        SponsorPosition::TopLeft,
                        SponsorPosition::TopRight,
                        SponsorPosition::BottomLeft,
                        SponsorPosition::BottomRight,
                        SponsorPosition::TopBanner,
                        SponsorPosition::BottomBanner,
                    ])
                    .collect::<std::collections::HashSet<_>>()
                    .into_iter()
                    .filter_map(|p| state.current_sponsor(p).cloned())
                    .collect();
                if !sponsors.is_empty() {
                    let _ = push
                        .publish_event(
                            tenant_id,
                            PushTopicEvent::SponsorShow { sponsors, duration_ms: 0 },
                        )
                        .await;
                }
            }
        });
        self.cycle_tasks.insert(tenant_id, handle);
    }

    /// Graceful shutdown (spec §5): cancels every scheduled timer, every
    /// rotation loop and every cycling loop.
    pub async fn shutdown(&self) {
        let keys: Vec<DqTimerKey> = self.dq_timers.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((_, state)) = self.dq_timers.remove(&key) {
                state.cancelled.store(true, Ordering::SeqCst);
            }
        }
        for entry in self.rotation_tasks.iter() {
            entry.value().abort();
        }
        self.rotation_tasks.clear();
        for entry in self.cycle_tasks.iter() {
            entry.value().abort();
        }
        self.cycle_tasks.clear();
        info!("timer_scheduler_shutdown_complete");
    }
}

/// Also used by `server`'s tenant-1 legacy-file migration path: the
/// unsuffixed `sponsor-state.json` belongs to tenant 1 until it's been
/// written to once under its tenant-scoped name (spec §6).
pub struct FileSponsorStatePort {
    dir: std::path::PathBuf,
}

impl FileSponsorStatePort {
    pub fn new(dir: impl Into<std::path::PathBuf>) -> Self {
        FileSponsorStatePort { dir: dir.into() }
    }

    fn path_for(&self, tenant_id: TenantId) -> std::path::PathBuf {
        self.dir.join(format!("sponsor-state-{tenant_id}.json"))
    }

    fn legacy_path(&self) -> std::path::PathBuf {
        self.dir.join("sponsor-state.json")
    }

    fn tmp_path_for(&self, tenant_id: TenantId) -> std::path::PathBuf {
        self.dir.join(format!("sponsor-state-{tenant_id}.json.tmp"))
    }
}

#[async_trait::async_trait]
impl SponsorStatePort for FileSponsorStatePort {
    #[instrument(name = "sponsor_state.load", skip(self), fields(tenant_id))]
    async fn load(&self, tenant_id: TenantId) -> app_core::SponsorStateResult<Option<SponsorState>> {
        let path = self.path_for(tenant_id);
        let body = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if tenant_id != 1 {
                    return Ok(None);
                }
                match tokio::fs::read(self.legacy_path()).await {
                    Ok(b) => b,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                    Err(e) => return Err(app_core::SponsorStateError::Io(e.to_string())),
                }
            }
            Err(e) => return Err(app_core::SponsorStateError::Io(e.to_string())),
        };
        serde_json::from_slice::<SponsorState>(&body)
            .map(Some)
            .map_err(|e| app_core::SponsorStateError::Corrupt(e.to_string()))
    }

    #[instrument(name = "sponsor_state.save", skip(self, state), fields(tenant_id = state.tenant_id))]
    async fn save(&self, state: &SponsorState) -> app_core::SponsorStateResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| app_core::SponsorStateError::Io(e.to_string()))?;
        let body = serde_json::to_vec_pretty(state).map_err(|e| app_core::SponsorStateError::Io(e.to_string()))?;
        let tmp = self.tmp_path_for(state.tenant_id);
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| app_core::SponsorStateError::Io(e.to_string()))?;
        tokio::fs::rename(&tmp, self.path_for(state.tenant_id))
            .await
            .map_err(|e| app_core::SponsorStateError::Io(e.to_string()))?;
        Ok(())
    }
}

// suppress unused-import warning from DisplayKind re-export used only by
// downstream crates that wire this port alongside the push fabric.
#[allow(dead_code)]
fn _assert_display_kind_reexport(_: DisplayKind) {}

#[cfg(test)]
mod tests {
    use super::*;
    use app_core::{CoreError, CoreResult, Format, FormatOptions, Match, MatchId, MatchScores, ParticipantId, StationId};
    use async_trait::async_trait;
    use push_fabric::PushFabric;
    use std::collections::VecDeque;
    use tokio::sync::Mutex as TokioMutex;

    struct FakeCoordinator {
        forfeit_calls: TokioMutex<VecDeque<(MatchId, ParticipantId)>>,
        fail_next: AtomicBool,
    }

    impl FakeCoordinator {
        fn new() -> Self {
            FakeCoordinator {
                forfeit_calls: TokioMutex::new(VecDeque::new()),
                fail_next: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl CoordinatorPort for FakeCoordinator {
        async fn report_result(
            &self,
            _tenant_id: TenantId,
            _match_id: MatchId,
            _winner_id: ParticipantId,
            _scores: MatchScores,
            _actor: &str,
        ) -> CoreResult<Match> {
            unimplemented!()
        }

        async fn forfeit_player(
            &self,
            _tenant_id: TenantId,
            match_id: MatchId,
            forfeited_id: ParticipantId,
            _actor: &str,
        ) -> CoreResult<Match> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(CoreError::Fatal("forced failure".into()));
            }
            self.forfeit_calls.lock().await.push_back((match_id, forfeited_id));
            Err(CoreError::NotFound("test double has no real match store".into()))
        }

        async fn undo_result(&self, _tenant_id: TenantId, _match_id: MatchId, _actor: &str) -> CoreResult<Match> {
            unimplemented!()
        }

        async fn complete_lobby(
            &self,
            _tenant_id: TenantId,
            _match_id: MatchId,
            _placements: Vec<(ParticipantId, u32)>,
            _actor: &str,
        ) -> CoreResult<Match> {
            unimplemented!()
        }

        async fn assign_station(
            &self,
            _tenant_id: TenantId,
            _match_id: MatchId,
            _station_id: StationId,
            _actor: &str,
        ) -> CoreResult<Match> {
            unimplemented!()
        }

        async fn release_station(&self, _tenant_id: TenantId, _match_id: MatchId, _actor: &str) -> CoreResult<Match> {
            unimplemented!()
        }

        async fn start_underway(&self, _tenant_id: TenantId, _match_id: MatchId, _actor: &str) -> CoreResult<Match> {
            unimplemented!()
        }

        async fn generate_bracket(
            &self,
            _tenant_id: TenantId,
            _tournament_id: TournamentId,
            _format: Format,
            _options: FormatOptions,
            _actor: &str,
        ) -> CoreResult<Vec<Match>> {
            unimplemented!()
        }
    }

    fn key(match_id: Uuid) -> DqTimerKey {
        DqTimerKey {
            tournament_id: Uuid::new_v4(),
            match_id,
            station_label: "court-1".into(),
        }
    }

    fn scheduler(dir: &std::path::Path) -> (Arc<TimerScheduler>, Arc<FakeCoordinator>) {
        let push: Arc<dyn PushPort> = Arc::new(PushFabric::new(None, 30_000, 5_000));
        let coordinator = Arc::new(FakeCoordinator::new());
        let sponsor_store: Arc<dyn SponsorStatePort> = Arc::new(FileSponsorStatePort::new(dir));
        let sched = Arc::new(TimerScheduler::new(
            push,
            coordinator.clone() as Arc<dyn CoordinatorPort>,
            sponsor_store,
            Duration::from_secs(30),
        ));
        (sched, coordinator)
    }

    #[tokio::test(flavor = "multi_thread", start_paused = true)]
    async fn given_running_timer_when_listed_then_remaining_seconds_counts_down() {
        let dir = tempfile::tempdir().unwrap();
        let (sched, _coord) = scheduler(dir.path());
        let k = key(Uuid::new_v4());
        sched.start_dq_timer(1, k.clone(), Uuid::new_v4(), "Alice".into(), Duration::from_secs(120));
        tokio::time::advance(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;
        let listed = sched.list_dq_timers(1).await;
        assert_eq!(listed.len(), 1);
        assert!(listed[0].remaining_seconds(Utc::now() + chrono::Duration::seconds(60)) <= 61);
    }

    #[tokio::test(flavor = "multi_thread", start_paused = true)]
    async fn given_cancelled_timer_when_listed_then_absent() {
        let dir = tempfile::tempdir().unwrap();
        let (sched, _coord) = scheduler(dir.path());
        let k = key(Uuid::new_v4());
        sched.start_dq_timer(1, k.clone(), Uuid::new_v4(), "Bob".into(), Duration::from_secs(120));
        sched.cancel_dq_timer(1, &k).await;
        let listed = sched.list_dq_timers(1).await;
        assert!(listed.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", start_paused = true)]
    async fn given_cancel_after_expiry_then_side_effect_still_runs() {
        let dir = tempfile::tempdir().unwrap();
        let (sched, coord) = scheduler(dir.path());
        sched.set_autodq_action(1, AutoDqAction::AutoDq);
        let m = Uuid::new_v4();
        let participant = Uuid::new_v4();
        let k = key(m);
        sched.start_dq_timer(1, k.clone(), participant, "Carol".into(), Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(11)).await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        // cancelling after the deadline already fired is a no-op; it must
        // not be possible to observe the effect as reverted.
        sched.cancel_dq_timer(1, &k).await;
        let calls = coord.forfeit_calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (m, participant));
    }

    #[tokio::test(flavor = "multi_thread", start_paused = true)]
    async fn given_restart_on_same_key_when_old_expires_then_no_double_fire() {
        let dir = tempfile::tempdir().unwrap();
        let (sched, coord) = scheduler(dir.path());
        sched.set_autodq_action(1, AutoDqAction::AutoDq);
        let m = Uuid::new_v4();
        let k = key(m);
        sched.start_dq_timer(1, k.clone(), Uuid::new_v4(), "Dave".into(), Duration::from_secs(10));
        let participant2 = Uuid::new_v4();
        sched.start_dq_timer(1, k.clone(), participant2, "Erin".into(), Duration::from_secs(20));
        tokio::time::advance(Duration::from_secs(21)).await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        let calls = coord.forfeit_calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (m, participant2));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_sponsor_config_update_when_saved_then_round_trips_from_port() {
        let dir = tempfile::tempdir().unwrap();
        let (sched, _coord) = scheduler(dir.path());
        let mut config = SponsorConfig::default();
        config.rotation_interval_secs = 45;
        sched.update_sponsor_config(7, config).await;
        let store = FileSponsorStatePort::new(dir.path());
        let loaded = store.load(7).await.unwrap().unwrap();
        assert_eq!(loaded.config.rotation_interval_secs, 45);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_shutdown_when_called_then_timers_and_loops_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let (sched, _coord) = scheduler(dir.path());
        sched.start_dq_timer(1, key(Uuid::new_v4()), Uuid::new_v4(), "Frank".into(), Duration::from_secs(60));
        sched.update_sponsor_config(1, SponsorConfig::default()).await;
        sched.shutdown().await;
        assert!(sched.list_dq_timers(1).await.is_empty());
    }
}

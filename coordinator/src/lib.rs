//! Progression Coordinator (C3, spec §4.3). Thin glue: serialises
//! user-initiated mutations per tenant through a single `tokio::sync::Mutex`
//! lane (spec §5 "per-tenant lock or actor-style mailbox"), calls the
//! Match Store (C2) which itself runs the bracket engine's advancement
//! rule, then journals the action and asks the Tenant Poller (C6) for an
//! immediate re-snapshot (spec §4.3 steps a-c).

use app_core::{
    CoordinatorPort, CoreError, CoreResult, DbError, Format, FormatOptions, JournalPort, Match,
    MatchId, MatchScores, ParticipantId, PollerPort, RoundAdvance, StationId, StorePort, TenantId,
    TournamentId, TournamentState,
};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{instrument, warn};

/// Per-tenant single-writer lane (spec §5). A command acquires its
/// tenant's lock for the whole store round-trip, so the auto-assign pass
/// a `set_winner` triggers can never race a concurrent `assign_station`.
struct Lane {
    lock: Mutex<()>,
}

pub struct Coordinator {
    store: Arc<dyn StorePort>,
    journal: Arc<dyn JournalPort>,
    poller: Arc<dyn PollerPort>,
    lanes: DashMap<TenantId, Arc<Lane>>,
    /// Fatal errors quarantine the tenant lane until operator intervention
    /// (spec §7): further writes are rejected, reads are untouched.
    quarantined: DashSet<TenantId>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn StorePort>, journal: Arc<dyn JournalPort>, poller: Arc<dyn PollerPort>) -> Self {
        Coordinator {
            store,
            journal,
            poller,
            lanes: DashMap::new(),
            quarantined: DashSet::new(),
        }
    }

    fn lane(&self, tenant_id: TenantId) -> Arc<Lane> {
        self.lanes
            .entry(tenant_id)
            .or_insert_with(|| Arc::new(Lane { lock: Mutex::new(()) }))
            .clone()
    }

    pub fn is_quarantined(&self, tenant_id: TenantId) -> bool {
        self.quarantined.contains(&tenant_id)
    }

    /// operator intervention (spec §7): clears a quarantine so the tenant
    /// lane accepts writes again.
    pub fn clear_quarantine(&self, tenant_id: TenantId) {
        self.quarantined.remove(&tenant_id);
    }

    fn quarantine(&self, tenant_id: TenantId, reason: &str) {
        warn!(tenant_id, reason, "tenant_lane_quarantined");
        self.quarantined.insert(tenant_id);
    }

    async fn guard(&self, tenant_id: TenantId) -> CoreResult<()> {
        if self.quarantined.contains(&tenant_id) {
            return Err(CoreError::Fatal(format!("tenant {tenant_id} lane is quarantined")));
        }
        Ok(())
    }

    async fn journal_and_poll(&self, tenant_id: TenantId, actor: &str, action: &str, details: HashMap<String, serde_json::Value>) {
        if let Err(e) = self.journal.append(tenant_id, actor.to_string(), action.to_string(), details).await {
            warn!(error = %e, tenant_id, action, "journal_append_failed");
        }
        self.poller.poll_now(tenant_id).await;
    }

    fn check_invariants(&self, tenant_id: TenantId, m: &Match) -> CoreResult<()> {
        if !m.check_open_invariant() || !m.check_complete_invariant() || !m.check_bye_invariant() {
            let reason = format!("match {} violates a state invariant after mutation", m.id);
            self.quarantine(tenant_id, &reason);
            return Err(CoreError::Fatal(reason));
        }
        Ok(())
    }

    /// Conflict handling (spec §7): a single retry under the same tenant
    /// lane, since the lane already serialises writes the second attempt
    /// observes the freshest state.
    async fn with_conflict_retry<T, F, Fut>(&self, mut f: F) -> Result<T, DbError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, DbError>>,
    {
        match f().await {
            Err(DbError::OptimisticLockConflict) => f().await,
            other => other,
        }
    }

    /// Swiss/free-for-all/two-stage build their match graph one round/stage
    /// at a time (spec §4.1); called after every result-affecting mutation,
    /// while still holding the tenant lane lock, so "round N opens only when
    /// round N-1 is complete" happens without a separate poller pass.
    async fn maybe_advance_round(&self, tenant_id: TenantId, tournament_id: TournamentId) {
        let tournament = match self.store.get_tournament(tournament_id).await {
            Ok(Some(t)) => t,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, tenant_id, "round_advance_tournament_lookup_failed");
                return;
            }
        };
        let matches = match self.store.get_matches_by_tournament(tournament_id, Default::default()).await {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, tenant_id, "round_advance_match_lookup_failed");
                return;
            }
        };
        let participants = match self.store.get_participants(tournament_id).await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, tenant_id, "round_advance_participant_lookup_failed");
                return;
            }
        };
        match app_core::advance_rounds(tournament.format, &matches, &participants, &tournament.format_options) {
            Ok(RoundAdvance::NextRound(new_matches)) => {
                if let Err(e) = self.store.bulk_create_matches(new_matches).await {
                    warn!(error = %e, tenant_id, "round_advance_create_failed");
                }
            }
            Ok(RoundAdvance::TournamentComplete) => {
                if let Err(e) = self.store.set_tournament_state(tournament_id, TournamentState::Complete).await {
                    warn!(error = %e, tenant_id, "round_advance_complete_failed");
                }
            }
            Ok(RoundAdvance::NotReady) => {}
            Err(e) => warn!(error = %e, tenant_id, "round_advance_bracket_error"),
        }
    }
}

#[async_trait]
impl CoordinatorPort for Coordinator {
    #[instrument(name = "coordinator.report_result", skip(self, scores, actor), fields(tenant_id, match_id = %match_id))]
    async fn report_result(
        &self,
        tenant_id: TenantId,
        match_id: MatchId,
        winner_id: ParticipantId,
        scores: MatchScores,
        actor: &str,
    ) -> CoreResult<Match> {
        self.guard(tenant_id).await?;
        let lane = self.lane(tenant_id);
        let _permit = lane.lock.lock().await;

        let outcome = self
            .with_conflict_retry(|| self.store.set_winner(match_id, winner_id, scores.clone()))
            .await?;
        self.check_invariants(tenant_id, &outcome.mutated)?;

        self.maybe_advance_round(tenant_id, outcome.mutated.tournament_id).await;

        let mut details = HashMap::new();
        details.insert("winner_id".into(), serde_json::json!(winner_id));
        details.insert("scores".into(), serde_json::to_value(&outcome.mutated.scores).unwrap_or_default());
        self.journal_and_poll(tenant_id, actor, "match.result.reported", details).await;

        Ok(outcome.mutated)
    }

    #[instrument(name = "coordinator.forfeit_player", skip(self, actor), fields(tenant_id, match_id = %match_id))]
    async fn forfeit_player(
        &self,
        tenant_id: TenantId,
        match_id: MatchId,
        forfeited_id: ParticipantId,
        actor: &str,
    ) -> CoreResult<Match> {
        self.guard(tenant_id).await?;
        let lane = self.lane(tenant_id);
        let _permit = lane.lock.lock().await;

        let outcome = self
            .with_conflict_retry(|| self.store.set_forfeit(match_id, forfeited_id))
            .await?;
        self.check_invariants(tenant_id, &outcome.mutated)?;
        self.maybe_advance_round(tenant_id, outcome.mutated.tournament_id).await;

        let mut details = HashMap::new();
        details.insert("forfeited_id".into(), serde_json::json!(forfeited_id));
        self.journal_and_poll(tenant_id, actor, "match.forfeit.reported", details).await;

        Ok(outcome.mutated)
    }

    #[instrument(name = "coordinator.complete_lobby", skip(self, placements, actor), fields(tenant_id, match_id = %match_id))]
    async fn complete_lobby(
        &self,
        tenant_id: TenantId,
        match_id: MatchId,
        placements: Vec<(ParticipantId, u32)>,
        actor: &str,
    ) -> CoreResult<Match> {
        self.guard(tenant_id).await?;
        let lane = self.lane(tenant_id);
        let _permit = lane.lock.lock().await;

        let outcome = self
            .with_conflict_retry(|| self.store.complete_lobby(match_id, placements.clone()))
            .await?;
        self.check_invariants(tenant_id, &outcome.mutated)?;
        self.maybe_advance_round(tenant_id, outcome.mutated.tournament_id).await;

        let mut details = HashMap::new();
        details.insert("placements".into(), serde_json::to_value(&outcome.mutated.placements).unwrap_or_default());
        self.journal_and_poll(tenant_id, actor, "lobby.completed", details).await;

        Ok(outcome.mutated)
    }

    #[instrument(name = "coordinator.undo_result", skip(self, actor), fields(tenant_id, match_id = %match_id))]
    async fn undo_result(&self, tenant_id: TenantId, match_id: MatchId, actor: &str) -> CoreResult<Match> {
        self.guard(tenant_id).await?;
        let lane = self.lane(tenant_id);
        let _permit = lane.lock.lock().await;

        let outcome = self.with_conflict_retry(|| self.store.reopen(match_id)).await?;
        self.check_invariants(tenant_id, &outcome.mutated)?;

        let mut details = HashMap::new();
        details.insert("match_id".into(), serde_json::json!(match_id));
        self.journal_and_poll(tenant_id, actor, "match.result.undone", details).await;

        Ok(outcome.mutated)
    }

    #[instrument(name = "coordinator.assign_station", skip(self, actor), fields(tenant_id, match_id = %match_id, station_id = %station_id))]
    async fn assign_station(
        &self,
        tenant_id: TenantId,
        match_id: MatchId,
        station_id: StationId,
        actor: &str,
    ) -> CoreResult<Match> {
        self.guard(tenant_id).await?;
        let lane = self.lane(tenant_id);
        let _permit = lane.lock.lock().await;

        let m = self.with_conflict_retry(|| self.store.set_station(match_id, station_id)).await?;

        let mut details = HashMap::new();
        details.insert("station_id".into(), serde_json::json!(station_id));
        self.journal_and_poll(tenant_id, actor, "station.assigned", details).await;

        Ok(m)
    }

    #[instrument(name = "coordinator.release_station", skip(self, actor), fields(tenant_id, match_id = %match_id))]
    async fn release_station(&self, tenant_id: TenantId, match_id: MatchId, actor: &str) -> CoreResult<Match> {
        self.guard(tenant_id).await?;
        let lane = self.lane(tenant_id);
        let _permit = lane.lock.lock().await;

        let m = self.with_conflict_retry(|| self.store.clear_station(match_id)).await?;

        self.journal_and_poll(tenant_id, actor, "station.released", HashMap::new()).await;

        Ok(m)
    }

    #[instrument(name = "coordinator.start_underway", skip(self, actor), fields(tenant_id, match_id = %match_id))]
    async fn start_underway(&self, tenant_id: TenantId, match_id: MatchId, actor: &str) -> CoreResult<Match> {
        self.guard(tenant_id).await?;
        let lane = self.lane(tenant_id);
        let _permit = lane.lock.lock().await;

        let m = self.with_conflict_retry(|| self.store.mark_underway(match_id)).await?;

        self.journal_and_poll(tenant_id, actor, "match.underway.started", HashMap::new()).await;

        Ok(m)
    }

    #[instrument(name = "coordinator.generate_bracket", skip(self, options, actor), fields(tenant_id, tournament_id = %tournament_id))]
    async fn generate_bracket(
        &self,
        tenant_id: TenantId,
        tournament_id: TournamentId,
        format: Format,
        options: FormatOptions,
        actor: &str,
    ) -> CoreResult<Vec<Match>> {
        self.guard(tenant_id).await?;
        let lane = self.lane(tenant_id);
        let _permit = lane.lock.lock().await;

        let tournament = self
            .store
            .get_tournament(tournament_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("tournament {tournament_id}")))?;
        if tournament.state != TournamentState::Pending {
            return Err(CoreError::RefusedPrecondition(format!(
                "tournament {tournament_id} is not pending (state={:?})",
                tournament.state
            )));
        }

        let participants = self.store.get_participants(tournament_id).await?;
        let generated = app_core::generate(format, &participants, &options)?;
        let created = self.store.bulk_create_matches(generated.matches).await?;

        let mut details = HashMap::new();
        details.insert("format".into(), serde_json::json!(format));
        details.insert("match_count".into(), serde_json::json!(created.len()));
        self.journal_and_poll(tenant_id, actor, "bracket.generated", details).await;

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_journal::ActivityJournal;
    use app_core::{Match, MatchState, Participant, Tournament};
    use push_fabric::PushFabric;
    use store_fake::FakeStore;
    use uuid::Uuid;

    struct NullPoller;
    #[async_trait::async_trait]
    impl PollerPort for NullPoller {
        async fn poll_now(&self, _tenant_id: TenantId) {}
    }

    fn coordinator() -> (Coordinator, Arc<FakeStore>) {
        let store = Arc::new(FakeStore::new());
        let push = Arc::new(PushFabric::default());
        let journal = Arc::new(ActivityJournal::new(push, std::env::temp_dir().join("coord-test-journal")));
        let poller = Arc::new(NullPoller);
        (Coordinator::new(store.clone(), journal, poller), store)
    }

    fn tournament(tenant_id: TenantId) -> Tournament {
        Tournament {
            id: Uuid::new_v4(),
            tenant_id,
            slug: "t".into(),
            name: "t".into(),
            format: Format::SingleElimination,
            state: TournamentState::Underway,
            format_options: FormatOptions::default(),
            created_at: chrono::Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    fn blank_match(tournament_id: TournamentId, p1: ParticipantId, p2: ParticipantId) -> Match {
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
            suggested_play_order: Some(0),
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

    #[tokio::test(flavor = "multi_thread")]
    async fn given_open_match_when_result_reported_then_journaled_and_complete() {
        let (coord, store) = coordinator();
        let t = tournament(1);
        store.create_tournament(t.clone()).await.unwrap();
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let m = blank_match(t.id, p1, p2);
        store.bulk_create_matches(vec![m.clone()]).await.unwrap();

        let updated = coord
            .report_result(1, m.id, p1, MatchScores { p1: 2, p2: 0, csv: None }, "ref")
            .await
            .unwrap();
        assert_eq!(updated.state, MatchState::Complete);
        assert_eq!(updated.winner_id, Some(p1));

        let entries = coord
            .journal
            .query(1, Default::default(), Default::default())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "match.result.reported");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_quarantined_tenant_when_command_issued_then_fatal_rejected() {
        let (coord, store) = coordinator();
        let t = tournament(1);
        store.create_tournament(t.clone()).await.unwrap();
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let m = blank_match(t.id, p1, p2);
        store.bulk_create_matches(vec![m.clone()]).await.unwrap();

        coord.quarantine(1, "test");
        let result = coord.report_result(1, m.id, p1, MatchScores::default(), "ref").await;
        assert!(matches!(result, Err(CoreError::Fatal(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_non_pending_tournament_when_generate_bracket_then_refused() {
        let (coord, store) = coordinator();
        let mut t = tournament(1);
        t.state = TournamentState::Underway;
        store.create_tournament(t.clone()).await.unwrap();

        let result = coord
            .generate_bracket(1, t.id, Format::SingleElimination, FormatOptions::default(), "ref")
            .await;
        assert!(matches!(result, Err(CoreError::RefusedPrecondition(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_pending_tournament_with_participants_when_generate_bracket_then_matches_created() {
        let (coord, store) = coordinator();
        let mut t = tournament(1);
        t.state = TournamentState::Pending;
        store.create_tournament(t.clone()).await.unwrap();
        for name in ["A", "B", "C", "D"] {
            store.create_participant(Participant::new(t.id, name)).await.unwrap();
        }

        let matches = coord
            .generate_bracket(1, t.id, Format::SingleElimination, FormatOptions::default(), "ref")
            .await
            .unwrap();
        assert_eq!(matches.len(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_ffa_lobby_completed_when_more_rounds_remain_then_next_round_created() {
        let (coord, store) = coordinator();
        let mut t = tournament(1);
        t.format = Format::FreeForAll;
        t.state = TournamentState::Pending;
        t.format_options = FormatOptions {
            lobby_max_size: Some(4),
            ffa_rounds: Some(2),
            ..Default::default()
        };
        store.create_tournament(t.clone()).await.unwrap();
        for name in ["A", "B", "C", "D"] {
            store.create_participant(Participant::new(t.id, name)).await.unwrap();
        }

        coord
            .generate_bracket(1, t.id, Format::FreeForAll, t.format_options.clone(), "ref")
            .await
            .unwrap();
        let round_one = store
            .get_matches_by_tournament(t.id, Default::default())
            .await
            .unwrap();
        assert_eq!(round_one.len(), 1);
        let roster = round_one[0].lobby_participants.clone();
        let placements = roster.iter().enumerate().map(|(i, &p)| (p, i as u32 + 1)).collect();

        coord.complete_lobby(1, round_one[0].id, placements, "ref").await.unwrap();

        let all_matches = store.get_matches_by_tournament(t.id, Default::default()).await.unwrap();
        assert_eq!(all_matches.len(), 2);
        assert!(all_matches.iter().any(|m| m.round == 2));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_ffa_single_round_when_lobby_completed_then_tournament_marked_complete() {
        let (coord, store) = coordinator();
        let mut t = tournament(1);
        t.format = Format::FreeForAll;
        t.state = TournamentState::Pending;
        t.format_options = FormatOptions {
            lobby_max_size: Some(4),
            ..Default::default()
        };
        store.create_tournament(t.clone()).await.unwrap();
        for name in ["A", "B", "C", "D"] {
            store.create_participant(Participant::new(t.id, name)).await.unwrap();
        }

        coord
            .generate_bracket(1, t.id, Format::FreeForAll, t.format_options.clone(), "ref")
            .await
            .unwrap();
        let round_one = store
            .get_matches_by_tournament(t.id, Default::default())
            .await
            .unwrap();
        let roster = round_one[0].lobby_participants.clone();
        let placements = roster.iter().enumerate().map(|(i, &p)| (p, i as u32 + 1)).collect();

        coord.complete_lobby(1, round_one[0].id, placements, "ref").await.unwrap();

        let updated_tournament = store.get_tournament(t.id).await.unwrap().unwrap();
        assert_eq!(updated_tournament.state, TournamentState::Complete);
    }
}

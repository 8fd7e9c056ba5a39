//! In-memory `StorePort` test double (spec §4.2), playing the role of the
//! teacher's `FakeDatabasePort`: same trait, same failure-injection shape,
//! no live Postgres required. Every crate's tests can depend on this one
//! instead of a database.

use app_core::{
    AdvancementOutcome, DbError, DbResult, Match, MatchFilter, MatchId, MatchScores, MatchState,
    Participant, ParticipantId, Slot, Station, StationId, StorePort, Tenant, TenantId, Tournament,
    TournamentId, TournamentState,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    tenants: HashMap<TenantId, Tenant>,
    tournaments: HashMap<TournamentId, Tournament>,
    active_tournament: HashMap<TenantId, TournamentId>,
    participants: HashMap<ParticipantId, Participant>,
    stations: HashMap<StationId, Station>,
    matches: HashMap<MatchId, Match>,
}

/// In-memory implementation used by tests across the workspace. All
/// mutations take the single lock for the whole operation, which is exactly
/// what "single write transaction" (spec §4.2) means for a store that has
/// no concurrent backend of its own.
#[derive(Default)]
pub struct FakeStore {
    inner: Mutex<Inner>,
    fail_next: Mutex<Option<DbError>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// next call to any `StorePort` method returns this error instead of
    /// running, then clears itself (teacher's `fail_next_*` pattern,
    /// generalized to one flag since every method here is equally capable
    /// of failing against a real database).
    pub fn fail_next_call(&self, err: DbError) {
        *self.fail_next.lock().unwrap() = Some(err);
    }

    fn take_injected_failure(&self) -> Option<DbError> {
        self.fail_next.lock().unwrap().take()
    }

    pub fn seed_tenant(&self, tenant: Tenant) {
        self.inner.lock().unwrap().tenants.insert(tenant.id, tenant);
    }

    /// test helper: open access to a tournament's current matches without
    /// going through the trait, for assertions.
    pub fn snapshot_matches(&self, tournament_id: TournamentId) -> Vec<Match> {
        let inner = self.inner.lock().unwrap();
        let mut v: Vec<Match> = inner
            .matches
            .values()
            .filter(|m| m.tournament_id == tournament_id)
            .cloned()
            .collect();
        v.sort_by_key(|m| m.id);
        v
    }
}

fn apply_advancement(inner: &mut Inner, completed: &Match) -> (Vec<Match>, Vec<Match>) {
    let mut siblings: Vec<Match> = inner
        .matches
        .values()
        .filter(|m| m.tournament_id == completed.tournament_id && m.id != completed.id)
        .cloned()
        .collect();
    let outcome = app_core::apply_result(completed, &mut siblings);
    for m in &siblings {
        inner.matches.insert(m.id, m.clone());
    }
    let newly_opened: Vec<Match> = outcome
        .newly_opened
        .iter()
        .filter_map(|id| inner.matches.get(id).cloned())
        .collect();
    let newly_filled: Vec<Match> = outcome
        .newly_filled
        .iter()
        .filter_map(|id| inner.matches.get(id).cloned())
        .collect();
    (newly_opened, newly_filled)
}

fn free_station(inner: &mut Inner, m: &Match) -> Option<StationId> {
    let station_id = m.station_id?;
    if let Some(station) = inner.stations.get_mut(&station_id) {
        station.current_match_id = None;
    }
    Some(station_id)
}

fn run_auto_assign(inner: &mut Inner, tournament_id: TournamentId) -> Vec<Match> {
    let Some(tournament) = inner.tournaments.get(&tournament_id) else {
        return Vec::new();
    };
    if !tournament.format_options.auto_assign_stations.unwrap_or(false) {
        return Vec::new();
    }
    let mut free_stations: Vec<StationId> = inner
        .stations
        .values()
        .filter(|s| s.tournament_id == tournament_id && s.is_available())
        .map(|s| s.id)
        .collect();
    free_stations.sort();

    let mut open_matches: Vec<MatchId> = inner
        .matches
        .values()
        .filter(|m| m.tournament_id == tournament_id && m.state == MatchState::Open && m.station_id.is_none())
        .map(|m| m.id)
        .collect();
    open_matches.sort_by_key(|id| {
        let m = &inner.matches[id];
        (m.suggested_play_order.unwrap_or(u32::MAX), m.round, m.id)
    });

    let mut touched = Vec::new();
    for (station_id, match_id) in free_stations.into_iter().zip(open_matches.into_iter()) {
        if let Some(station) = inner.stations.get_mut(&station_id) {
            station.current_match_id = Some(match_id);
        }
        if let Some(m) = inner.matches.get_mut(&match_id) {
            m.station_id = Some(station_id);
            touched.push(m.clone());
        }
    }
    touched
}

#[async_trait]
impl StorePort for FakeStore {
    async fn ping(&self) -> DbResult<()> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        Ok(())
    }

    async fn get_tenant(&self, tenant_id: TenantId) -> DbResult<Option<Tenant>> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        Ok(self.inner.lock().unwrap().tenants.get(&tenant_id).cloned())
    }

    async fn list_tenants(&self) -> DbResult<Vec<Tenant>> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let mut v: Vec<Tenant> = self.inner.lock().unwrap().tenants.values().cloned().collect();
        v.sort_by_key(|t| t.id);
        Ok(v)
    }

    async fn list_tenants_with_active_tournament(&self) -> DbResult<Vec<TenantId>> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let inner = self.inner.lock().unwrap();
        let mut out: Vec<TenantId> = inner
            .active_tournament
            .iter()
            .filter(|(_, tid)| {
                inner
                    .tournaments
                    .get(tid)
                    .is_some_and(|t| t.state == TournamentState::Underway)
            })
            .map(|(tenant_id, _)| *tenant_id)
            .collect();
        out.sort();
        Ok(out)
    }

    async fn create_tournament(&self, tournament: Tournament) -> DbResult<Tournament> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let mut inner = self.inner.lock().unwrap();
        inner.tournaments.insert(tournament.id, tournament.clone());
        Ok(tournament)
    }

    async fn get_tournament(&self, id: TournamentId) -> DbResult<Option<Tournament>> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        Ok(self.inner.lock().unwrap().tournaments.get(&id).cloned())
    }

    async fn get_active_tournament(&self, tenant_id: TenantId) -> DbResult<Option<Tournament>> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .active_tournament
            .get(&tenant_id)
            .and_then(|tid| inner.tournaments.get(tid))
            .cloned())
    }

    async fn list_tournaments_by_tenant(&self, tenant_id: TenantId) -> DbResult<Vec<Tournament>> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let inner = self.inner.lock().unwrap();
        let mut out: Vec<Tournament> = inner
            .tournaments
            .values()
            .filter(|t| t.tenant_id == tenant_id)
            .cloned()
            .collect();
        out.sort_by_key(|t| t.created_at);
        Ok(out)
    }

    async fn set_tournament_state(&self, id: TournamentId, state: TournamentState) -> DbResult<Tournament> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let mut inner = self.inner.lock().unwrap();
        let tenant_id = {
            let t = inner.tournaments.get_mut(&id).ok_or(DbError::NotFound)?;
            t.state = state;
            if state == TournamentState::Underway && t.started_at.is_none() {
                t.started_at = Some(Utc::now());
            }
            if state == TournamentState::Complete {
                t.ended_at = Some(Utc::now());
            }
            t.tenant_id
        };
        if state == TournamentState::Underway {
            inner.active_tournament.entry(tenant_id).or_insert(id);
        }
        Ok(inner.tournaments.get(&id).cloned().unwrap())
    }

    async fn create_participant(&self, participant: Participant) -> DbResult<Participant> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let mut inner = self.inner.lock().unwrap();
        if let Some(seed) = participant.seed {
            let clash = inner
                .participants
                .values()
                .any(|p| p.tournament_id == participant.tournament_id && p.seed == Some(seed));
            if clash {
                return Err(DbError::UniqueViolation(Some("seed".into())));
            }
        }
        inner.participants.insert(participant.id, participant.clone());
        Ok(participant)
    }

    async fn get_participants(&self, tournament_id: TournamentId) -> DbResult<Vec<Participant>> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let mut v: Vec<Participant> = self
            .inner
            .lock()
            .unwrap()
            .participants
            .values()
            .filter(|p| p.tournament_id == tournament_id)
            .cloned()
            .collect();
        v.sort_by_key(|p| p.id);
        Ok(v)
    }

    async fn delete_participant(&self, id: ParticipantId) -> DbResult<()> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let mut inner = self.inner.lock().unwrap();
        let referenced = inner.matches.values().any(|m| {
            m.state != MatchState::Pending && (m.player1_id == Some(id) || m.player2_id == Some(id))
        });
        if referenced {
            return Err(DbError::ForeignKeyViolation(Some("matches".into())));
        }
        inner.participants.remove(&id);
        Ok(())
    }

    async fn create_station(&self, station: Station) -> DbResult<Station> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let mut inner = self.inner.lock().unwrap();
        inner.stations.insert(station.id, station.clone());
        Ok(station)
    }

    async fn get_stations(&self, tournament_id: TournamentId) -> DbResult<Vec<Station>> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let mut v: Vec<Station> = self
            .inner
            .lock()
            .unwrap()
            .stations
            .values()
            .filter(|s| s.tournament_id == tournament_id)
            .cloned()
            .collect();
        v.sort_by_key(|s| s.id);
        Ok(v)
    }

    async fn set_station(&self, match_id: MatchId, station_id: StationId) -> DbResult<Match> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let mut inner = self.inner.lock().unwrap();
        {
            let station = inner.stations.get(&station_id).ok_or(DbError::NotFound)?;
            if station.current_match_id.is_some() && station.current_match_id != Some(match_id) {
                return Err(DbError::CheckViolation(Some("station already in use".into())));
            }
        }
        if let Some(station) = inner.stations.get_mut(&station_id) {
            station.current_match_id = Some(match_id);
        }
        let m = inner.matches.get_mut(&match_id).ok_or(DbError::NotFound)?;
        m.station_id = Some(station_id);
        Ok(m.clone())
    }

    async fn clear_station(&self, match_id: MatchId) -> DbResult<Match> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let mut inner = self.inner.lock().unwrap();
        let station_id = inner.matches.get(&match_id).ok_or(DbError::NotFound)?.station_id;
        if let Some(sid) = station_id {
            if let Some(station) = inner.stations.get_mut(&sid) {
                station.current_match_id = None;
            }
        }
        let m = inner.matches.get_mut(&match_id).unwrap();
        m.station_id = None;
        Ok(m.clone())
    }

    async fn auto_assign_stations(&self, tournament_id: TournamentId) -> DbResult<Vec<Match>> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let mut inner = self.inner.lock().unwrap();
        Ok(run_auto_assign(&mut inner, tournament_id))
    }

    async fn bulk_create_matches(&self, matches: Vec<Match>) -> DbResult<Vec<Match>> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let mut inner = self.inner.lock().unwrap();
        for m in &matches {
            inner.matches.insert(m.id, m.clone());
        }
        Ok(matches)
    }

    async fn update_prereqs(&self, updates: Vec<(MatchId, Option<MatchId>, Option<MatchId>)>) -> DbResult<()> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let mut inner = self.inner.lock().unwrap();
        for (match_id, p1, p2) in updates {
            if let Some(m) = inner.matches.get_mut(&match_id) {
                m.prereq_match_id_p1 = p1;
                m.prereq_match_id_p2 = p2;
            }
        }
        Ok(())
    }

    async fn get_matches_by_tournament(
        &self,
        tournament_id: TournamentId,
        filter: MatchFilter,
    ) -> DbResult<Vec<Match>> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let mut v: Vec<Match> = self
            .inner
            .lock()
            .unwrap()
            .matches
            .values()
            .filter(|m| m.tournament_id == tournament_id)
            .filter(|m| filter.state.is_none_or(|s| s == m.state))
            .filter(|m| filter.round.is_none_or(|r| r == m.round))
            .filter(|m| filter.station_id.is_none_or(|s| Some(s) == m.station_id))
            .cloned()
            .collect();
        v.sort_by_key(|m| (m.round, m.bracket_position));
        Ok(v)
    }

    async fn get_match(&self, id: MatchId) -> DbResult<Option<Match>> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        Ok(self.inner.lock().unwrap().matches.get(&id).cloned())
    }

    async fn set_player(&self, match_id: MatchId, slot: Slot, participant: ParticipantId) -> DbResult<Match> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let mut inner = self.inner.lock().unwrap();
        let m = inner.matches.get_mut(&match_id).ok_or(DbError::NotFound)?;
        m.set_slot(slot, participant);
        if m.state == MatchState::Pending && m.is_ready_to_open() {
            m.state = MatchState::Open;
        }
        Ok(m.clone())
    }

    async fn mark_underway(&self, match_id: MatchId) -> DbResult<Match> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let mut inner = self.inner.lock().unwrap();
        let m = inner.matches.get_mut(&match_id).ok_or(DbError::NotFound)?;
        if m.state != MatchState::Open {
            return Err(DbError::CheckViolation(Some("match not open".into())));
        }
        m.state = MatchState::Underway;
        m.underway_at = Some(Utc::now());
        Ok(m.clone())
    }

    async fn unmark_underway(&self, match_id: MatchId) -> DbResult<Match> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let mut inner = self.inner.lock().unwrap();
        let m = inner.matches.get_mut(&match_id).ok_or(DbError::NotFound)?;
        if m.state != MatchState::Underway {
            return Err(DbError::CheckViolation(Some("match not underway".into())));
        }
        m.state = MatchState::Open;
        m.underway_at = None;
        Ok(m.clone())
    }

    async fn set_winner(&self, match_id: MatchId, winner_id: ParticipantId, scores: MatchScores) -> DbResult<AdvancementOutcome> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let mut inner = self.inner.lock().unwrap();
        let (mutated, loser) = {
            let m = inner.matches.get_mut(&match_id).ok_or(DbError::NotFound)?;
            if Some(winner_id) != m.player1_id && Some(winner_id) != m.player2_id {
                return Err(DbError::CheckViolation(Some("winner must be a participant in the match".into())));
            }
            let loser = m.other_player(winner_id);
            m.winner_id = Some(winner_id);
            m.loser_id = loser;
            m.scores = scores;
            m.state = MatchState::Complete;
            m.completed_at = Some(Utc::now());
            (m.clone(), loser)
        };
        let _ = loser;
        let freed_station = free_station(&mut inner, &mutated);
        let mutated = if freed_station.is_some() {
            let m = inner.matches.get_mut(&match_id).unwrap();
            m.station_id = None;
            m.clone()
        } else {
            mutated
        };
        let (newly_opened, newly_filled) = apply_advancement(&mut inner, &mutated);
        let _touched = run_auto_assign(&mut inner, mutated.tournament_id);
        Ok(AdvancementOutcome {
            mutated,
            newly_opened,
            newly_filled,
            freed_station,
        })
    }

    async fn set_forfeit(&self, match_id: MatchId, forfeited_id: ParticipantId) -> DbResult<AdvancementOutcome> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let winner_id = {
            let inner = self.inner.lock().unwrap();
            let m = inner.matches.get(&match_id).ok_or(DbError::NotFound)?;
            m.other_player(forfeited_id).ok_or(DbError::CheckViolation(Some(
                "forfeited participant not in match".into(),
            )))?
        };
        let (p1_forfeits, scores) = {
            let inner = self.inner.lock().unwrap();
            let m = inner.matches.get(&match_id).unwrap();
            (m.player1_id == Some(forfeited_id), m.scores.clone())
        };
        let scores = if p1_forfeits {
            MatchScores { p1: 0, p2: scores.p2.max(1), csv: Some("forfeit".into()) }
        } else {
            MatchScores { p1: scores.p1.max(1), p2: 0, csv: Some("forfeit".into()) }
        };
        self.set_winner(match_id, winner_id, scores).await
    }

    async fn complete_lobby(&self, match_id: MatchId, placements: Vec<(ParticipantId, u32)>) -> DbResult<AdvancementOutcome> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let mut inner = self.inner.lock().unwrap();
        let mutated = {
            let m = inner.matches.get_mut(&match_id).ok_or(DbError::NotFound)?;
            app_core::complete_lobby(m, placements).map_err(|e| DbError::CheckViolation(Some(e.to_string())))?;
            m.clone()
        };
        let freed_station = free_station(&mut inner, &mutated);
        let mutated = if freed_station.is_some() {
            let m = inner.matches.get_mut(&match_id).unwrap();
            m.station_id = None;
            m.clone()
        } else {
            mutated
        };
        let (newly_opened, newly_filled) = apply_advancement(&mut inner, &mutated);
        let _touched = run_auto_assign(&mut inner, mutated.tournament_id);
        Ok(AdvancementOutcome {
            mutated,
            newly_opened,
            newly_filled,
            freed_station,
        })
    }

    async fn reopen(&self, match_id: MatchId) -> DbResult<AdvancementOutcome> {
        if let Some(e) = self.take_injected_failure() {
            return Err(e);
        }
        let mut inner = self.inner.lock().unwrap();
        {
            let m = inner.matches.get(&match_id).ok_or(DbError::NotFound)?;
            if m.state != MatchState::Complete {
                return Err(DbError::CheckViolation(Some("match is not complete".into())));
            }
        }
        let has_complete_descendant = inner.matches.values().any(|m| {
            (m.prereq_match_id_p1 == Some(match_id) || m.prereq_match_id_p2 == Some(match_id))
                && m.state == MatchState::Complete
        });
        if has_complete_descendant {
            return Err(DbError::CheckViolation(Some(
                "a direct dependent match is already complete".into(),
            )));
        }

        let reopened = {
            let m = inner.matches.get_mut(&match_id).unwrap();
            m.winner_id = None;
            m.loser_id = None;
            m.scores = MatchScores::default();
            m.completed_at = None;
            m.state = if m.is_ready_to_open() { MatchState::Open } else { MatchState::Pending };
            m.clone()
        };

        let mut siblings: Vec<Match> = inner
            .matches
            .values()
            .filter(|m| m.tournament_id == reopened.tournament_id && m.id != reopened.id)
            .cloned()
            .collect();
        let cleared_ids = app_core::undo_result(&reopened, &mut siblings);
        for m in &siblings {
            inner.matches.insert(m.id, m.clone());
        }
        let newly_filled: Vec<Match> = cleared_ids
            .iter()
            .filter_map(|id| inner.matches.get(id).cloned())
            .collect();

        Ok(AdvancementOutcome {
            mutated: reopened,
            newly_opened: Vec::new(),
            newly_filled,
            freed_station: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use app_core::Participant;
    use uuid::Uuid;

    fn tournament(tenant_id: TenantId) -> Tournament {
        Tournament {
            id: Uuid::new_v4(),
            tenant_id,
            slug: "t1".into(),
            name: "Test".into(),
            format: app_core::Format::SingleElimination,
            state: TournamentState::Pending,
            format_options: Default::default(),
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    #[tokio::test]
    async fn given_match_when_set_winner_then_completes_and_frees_station() {
        let store = FakeStore::new();
        let t = tournament(1);
        store.create_tournament(t.clone()).await.unwrap();
        let p1 = Participant::new(t.id, "a");
        let p2 = Participant::new(t.id, "b");
        store.create_participant(p1.clone()).await.unwrap();
        store.create_participant(p2.clone()).await.unwrap();

        let mut m = app_core::Match {
            id: Uuid::new_v4(),
            tournament_id: t.id,
            identifier: "F".into(),
            round: 1,
            bracket_position: 0,
            is_losers_bracket: false,
            player1_id: Some(p1.id),
            player2_id: Some(p2.id),
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
        };
        let station = Station::new(t.id, "S1");
        store.create_station(station.clone()).await.unwrap();
        m.station_id = Some(station.id);
        store.bulk_create_matches(vec![m.clone()]).await.unwrap();
        store.set_station(m.id, station.id).await.unwrap();

        let outcome = store
            .set_winner(m.id, p1.id, MatchScores { p1: 2, p2: 0, csv: None })
            .await
            .unwrap();
        assert_eq!(outcome.mutated.state, MatchState::Complete);
        assert_eq!(outcome.freed_station, Some(station.id));

        let reloaded_station = store.get_stations(t.id).await.unwrap();
        assert!(reloaded_station[0].current_match_id.is_none());
    }

    #[tokio::test]
    async fn given_completed_match_with_complete_descendant_when_reopen_then_refused() {
        let store = FakeStore::new();
        let t = tournament(1);
        store.create_tournament(t.clone()).await.unwrap();
        let p1 = Participant::new(t.id, "a");
        let p2 = Participant::new(t.id, "b");
        let p3 = Participant::new(t.id, "c");
        for p in [&p1, &p2, &p3] {
            store.create_participant(p.clone()).await.unwrap();
        }

        let feeder_id = Uuid::new_v4();
        let feeder = app_core::Match {
            id: feeder_id,
            tournament_id: t.id,
            identifier: "W1-1".into(),
            round: 1,
            bracket_position: 0,
            is_losers_bracket: false,
            player1_id: Some(p1.id),
            player2_id: Some(p2.id),
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
        };
        let mut dependent = feeder.clone();
        dependent.id = Uuid::new_v4();
        dependent.identifier = "F".into();
        dependent.round = 2;
        dependent.player1_id = None;
        dependent.player2_id = Some(p3.id);
        dependent.prereq_match_id_p1 = Some(feeder_id);
        dependent.state = MatchState::Pending;

        store
            .bulk_create_matches(vec![feeder.clone(), dependent.clone()])
            .await
            .unwrap();

        store
            .set_winner(feeder_id, p1.id, MatchScores { p1: 2, p2: 1, csv: None })
            .await
            .unwrap();
        store
            .set_winner(dependent.id, p1.id, MatchScores { p1: 2, p2: 0, csv: None })
            .await
            .unwrap();

        let err = store.reopen(feeder_id).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation(_)));
    }
}

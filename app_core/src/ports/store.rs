//! Match Store port (C2, spec §4.2).

use crate::model::{
    Match, MatchId, MatchScores, Participant, ParticipantId, Slot, Station, StationId, Tenant,
    TenantId, Tournament, TournamentId,
};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DbError {
    /// Update could not find matching id + version (optimistic lock)
    #[error("optimistic lock conflict")]
    OptimisticLockConflict,

    /// ID does not exist
    #[error("entity not found")]
    NotFound,

    #[error("unique violation{0:?}")]
    UniqueViolation(Option<String>),

    #[error("foreign key violation{0:?}")]
    ForeignKeyViolation(Option<String>),

    #[error("check violation{0:?}")]
    CheckViolation(Option<String>),

    /// transient DB problem; retry may work
    #[error("serialization failure")]
    SerializationFailure,

    /// connection, pool, or other DB errors
    #[error("db error: {0}")]
    Other(String),
}

pub type DbResult<T> = Result<T, DbError>;

impl From<anyhow::Error> for DbError {
    fn from(e: anyhow::Error) -> Self {
        DbError::Other(e.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatchFilter {
    pub state: Option<crate::model::MatchState>,
    pub round: Option<i32>,
    pub station_id: Option<StationId>,
}

/// Result of a store mutation that advances bracket state: the mutated
/// match plus every other match whose slots were just filled by the
/// advancement rule (spec §4.1), so callers (coordinator, journal, poller)
/// can react without re-querying.
#[derive(Debug, Clone)]
pub struct AdvancementOutcome {
    pub mutated: Match,
    pub newly_opened: Vec<Match>,
    pub newly_filled: Vec<Match>,
    pub freed_station: Option<StationId>,
}

/// Transactional persistence for tournaments/participants/stations/matches
/// (spec §4.2). Implementors run every mutation in a single write
/// transaction and are responsible for the station<->match cross-link
/// invariant (spec §3, §9 Design Notes — two records, one transaction).
#[async_trait]
pub trait StorePort: Send + Sync {
    async fn ping(&self) -> DbResult<()>;

    // --- tenants ---
    async fn get_tenant(&self, tenant_id: TenantId) -> DbResult<Option<Tenant>>;
    async fn list_tenants(&self) -> DbResult<Vec<Tenant>>;
    /// tenants with an `underway` tournament marked active, used by the
    /// multi-tenant poller (spec §4.6)
    async fn list_tenants_with_active_tournament(&self) -> DbResult<Vec<TenantId>>;

    // --- tournaments ---
    async fn create_tournament(&self, tournament: Tournament) -> DbResult<Tournament>;
    async fn get_tournament(&self, id: TournamentId) -> DbResult<Option<Tournament>>;
    async fn get_active_tournament(&self, tenant_id: TenantId) -> DbResult<Option<Tournament>>;
    /// every tournament owned by the tenant, regardless of state; used by
    /// the rate governor's mode projection (spec §4.7) to notice pending
    /// (upcoming) tournaments that haven't been marked active yet.
    async fn list_tournaments_by_tenant(&self, tenant_id: TenantId) -> DbResult<Vec<Tournament>>;
    async fn set_tournament_state(
        &self,
        id: TournamentId,
        state: crate::model::TournamentState,
    ) -> DbResult<Tournament>;

    // --- participants ---
    async fn create_participant(&self, participant: Participant) -> DbResult<Participant>;
    async fn get_participants(&self, tournament_id: TournamentId) -> DbResult<Vec<Participant>>;
    async fn delete_participant(&self, id: ParticipantId) -> DbResult<()>;

    // --- stations ---
    async fn create_station(&self, station: Station) -> DbResult<Station>;
    async fn get_stations(&self, tournament_id: TournamentId) -> DbResult<Vec<Station>>;
    async fn set_station(&self, match_id: MatchId, station_id: StationId) -> DbResult<Match>;
    async fn clear_station(&self, match_id: MatchId) -> DbResult<Match>;
    /// greedily pair available stations with open matches ordered by
    /// `(suggested_play_order, round, id)` (spec §4.2)
    async fn auto_assign_stations(&self, tournament_id: TournamentId) -> DbResult<Vec<Match>>;

    // --- matches ---
    /// single transaction; prereq ids are patched in a second pass since
    /// they reference just-generated ids (spec §4.2)
    async fn bulk_create_matches(&self, matches: Vec<Match>) -> DbResult<Vec<Match>>;
    async fn update_prereqs(
        &self,
        updates: Vec<(MatchId, Option<MatchId>, Option<MatchId>)>,
    ) -> DbResult<()>;
    async fn get_matches_by_tournament(
        &self,
        tournament_id: TournamentId,
        filter: MatchFilter,
    ) -> DbResult<Vec<Match>>;
    async fn get_match(&self, id: MatchId) -> DbResult<Option<Match>>;
    /// auto-opens the match if both slots are now present
    async fn set_player(&self, match_id: MatchId, slot: Slot, participant: ParticipantId) -> DbResult<Match>;
    async fn mark_underway(&self, match_id: MatchId) -> DbResult<Match>;
    async fn unmark_underway(&self, match_id: MatchId) -> DbResult<Match>;
    /// atomic: updates this match, runs the advancement rule, frees the
    /// station, then invokes auto-assignment (spec §4.2)
    async fn set_winner(
        &self,
        match_id: MatchId,
        winner_id: ParticipantId,
        scores: MatchScores,
    ) -> DbResult<AdvancementOutcome>;
    /// equivalent to `set_winner` but marks a forfeit and zeroes the
    /// forfeiting side's score
    async fn set_forfeit(
        &self,
        match_id: MatchId,
        forfeited_id: ParticipantId,
    ) -> DbResult<AdvancementOutcome>;
    /// free-for-all lobby completion (spec §4.1): records the full
    /// placement list rather than a single winner. `placements` must cover
    /// every participant in the lobby's roster.
    async fn complete_lobby(
        &self,
        match_id: MatchId,
        placements: Vec<(ParticipantId, u32)>,
    ) -> DbResult<AdvancementOutcome>;
    /// fails if any descendant match has reached `complete`; otherwise
    /// clears winner/scores, returns this match to `open`, and returns
    /// direct dependents to `pending`, clearing the slots this match's
    /// prior winner/loser had populated (spec §4.2, §9 Open Questions: only
    /// direct dependents, not a transitive cascade)
    async fn reopen(&self, match_id: MatchId) -> DbResult<AdvancementOutcome>;
}

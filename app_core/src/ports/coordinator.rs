//! Progression Coordinator port (C3, spec §4.3). Exposed as a port (rather
//! than a concrete type) so the Timer Scheduler (C4) can route a DQ
//! auto-forfeit through it "so that a timer firing looks identical to an
//! operator command" (spec §9 Design Notes) without timer_scheduler
//! depending on the coordinator crate's storage wiring.

use crate::errors::CoreResult;
use crate::model::{
    Format, FormatOptions, Match, MatchId, MatchScores, ParticipantId, StationId, TenantId,
    TournamentId,
};
use async_trait::async_trait;

#[async_trait]
pub trait CoordinatorPort: Send + Sync {
    async fn report_result(
        &self,
        tenant_id: TenantId,
        match_id: MatchId,
        winner_id: ParticipantId,
        scores: MatchScores,
        actor: &str,
    ) -> CoreResult<Match>;

    async fn forfeit_player(
        &self,
        tenant_id: TenantId,
        match_id: MatchId,
        forfeited_id: ParticipantId,
        actor: &str,
    ) -> CoreResult<Match>;

    async fn undo_result(&self, tenant_id: TenantId, match_id: MatchId, actor: &str) -> CoreResult<Match>;

    /// free-for-all lobby completion (spec §4.1); `placements` must cover
    /// every participant in the lobby's roster.
    async fn complete_lobby(
        &self,
        tenant_id: TenantId,
        match_id: MatchId,
        placements: Vec<(ParticipantId, u32)>,
        actor: &str,
    ) -> CoreResult<Match>;

    async fn assign_station(
        &self,
        tenant_id: TenantId,
        match_id: MatchId,
        station_id: StationId,
        actor: &str,
    ) -> CoreResult<Match>;

    async fn release_station(&self, tenant_id: TenantId, match_id: MatchId, actor: &str) -> CoreResult<Match>;

    async fn start_underway(&self, tenant_id: TenantId, match_id: MatchId, actor: &str) -> CoreResult<Match>;

    async fn generate_bracket(
        &self,
        tenant_id: TenantId,
        tournament_id: TournamentId,
        format: Format,
        options: FormatOptions,
        actor: &str,
    ) -> CoreResult<Vec<Match>>;
}

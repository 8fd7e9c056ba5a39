//! Tenant-scoped command routes (spec §6 "Commands consumed"). Thin JSON
//! translation layer over the Coordinator/Timer Scheduler/Rate Governor
//! ports — no session/auth middleware here, since that layer is an
//! external collaborator per spec §1 scope (DESIGN.md records this as the
//! Open Question resolution for "what fronts these commands").

use crate::state::AppState;
use app_core::{
    CoreError, DqTimerKey, Format, FormatOptions, GovernorMode, ManualOverride, Match, MatchId,
    MatchScores, ParticipantId, SponsorConfig, SponsorId, SponsorItem, StationId, TenantId,
    TournamentId,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::time::Duration;

pub struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::BadInput(_) | CoreError::Field(_) | CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::RefusedPrecondition(_) => StatusCode::CONFLICT,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ if self.0.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Deserialize)]
pub struct ReportResultBody {
    pub match_id: MatchId,
    pub winner_id: ParticipantId,
    pub scores: MatchScores,
    pub actor: String,
}

pub async fn report_result(
    Path(tenant_id): Path<TenantId>,
    State(state): State<AppState>,
    Json(body): Json<ReportResultBody>,
) -> ApiResult<Json<Match>> {
    let m = state
        .coordinator
        .report_result(tenant_id, body.match_id, body.winner_id, body.scores, &body.actor)
        .await?;
    Ok(Json(m))
}

#[derive(Deserialize)]
pub struct ForfeitBody {
    pub match_id: MatchId,
    pub forfeited_id: ParticipantId,
    pub actor: String,
}

pub async fn forfeit(
    Path(tenant_id): Path<TenantId>,
    State(state): State<AppState>,
    Json(body): Json<ForfeitBody>,
) -> ApiResult<Json<Match>> {
    let m = state
        .coordinator
        .forfeit_player(tenant_id, body.match_id, body.forfeited_id, &body.actor)
        .await?;
    Ok(Json(m))
}

#[derive(Deserialize)]
pub struct CompleteLobbyBody {
    pub match_id: MatchId,
    pub placements: Vec<(ParticipantId, u32)>,
    pub actor: String,
}

/// `POST /api/tenants/{tenant_id}/matches/complete-lobby` (spec §4.1
/// free-for-all: records the full placement list for a lobby).
pub async fn complete_lobby(
    Path(tenant_id): Path<TenantId>,
    State(state): State<AppState>,
    Json(body): Json<CompleteLobbyBody>,
) -> ApiResult<Json<Match>> {
    let m = state
        .coordinator
        .complete_lobby(tenant_id, body.match_id, body.placements, &body.actor)
        .await?;
    Ok(Json(m))
}

#[derive(Deserialize)]
pub struct ActorBody {
    pub match_id: MatchId,
    pub actor: String,
}

/// `POST /api/tenants/{tenant_id}/matches/reopen` (spec §6 "Reopen match";
/// fails `RefusedPrecondition` if any direct dependent is complete).
pub async fn reopen(
    Path(tenant_id): Path<TenantId>,
    State(state): State<AppState>,
    Json(body): Json<ActorBody>,
) -> ApiResult<Json<Match>> {
    let m = state.coordinator.undo_result(tenant_id, body.match_id, &body.actor).await?;
    Ok(Json(m))
}

pub async fn start_underway(
    Path(tenant_id): Path<TenantId>,
    State(state): State<AppState>,
    Json(body): Json<ActorBody>,
) -> ApiResult<Json<Match>> {
    let m = state.coordinator.start_underway(tenant_id, body.match_id, &body.actor).await?;
    Ok(Json(m))
}

#[derive(Deserialize)]
pub struct AssignStationBody {
    pub match_id: MatchId,
    pub station_id: StationId,
    pub actor: String,
}

pub async fn assign_station(
    Path(tenant_id): Path<TenantId>,
    State(state): State<AppState>,
    Json(body): Json<AssignStationBody>,
) -> ApiResult<Json<Match>> {
    let m = state
        .coordinator
        .assign_station(tenant_id, body.match_id, body.station_id, &body.actor)
        .await?;
    Ok(Json(m))
}

pub async fn release_station(
    Path(tenant_id): Path<TenantId>,
    State(state): State<AppState>,
    Json(body): Json<ActorBody>,
) -> ApiResult<Json<Match>> {
    let m = state.coordinator.release_station(tenant_id, body.match_id, &body.actor).await?;
    Ok(Json(m))
}

#[derive(Deserialize)]
pub struct GenerateBracketBody {
    pub tournament_id: TournamentId,
    pub format: Format,
    #[serde(default)]
    pub options: FormatOptions,
    pub actor: String,
}

pub async fn generate_bracket(
    Path(tenant_id): Path<TenantId>,
    State(state): State<AppState>,
    Json(body): Json<GenerateBracketBody>,
) -> ApiResult<Json<Vec<Match>>> {
    let matches = state
        .coordinator
        .generate_bracket(tenant_id, body.tournament_id, body.format, body.options, &body.actor)
        .await?;
    Ok(Json(matches))
}

#[derive(Deserialize)]
pub struct StartDqTimerBody {
    pub key: DqTimerKey,
    pub target_participant_id: ParticipantId,
    pub target_participant_name: String,
    pub duration_secs: u64,
}

pub async fn start_dq_timer(
    Path(tenant_id): Path<TenantId>,
    State(state): State<AppState>,
    Json(body): Json<StartDqTimerBody>,
) -> impl IntoResponse {
    state.timers.start_dq_timer(
        tenant_id,
        body.key,
        body.target_participant_id,
        body.target_participant_name,
        Duration::from_secs(body.duration_secs),
    );
    StatusCode::ACCEPTED
}

pub async fn cancel_dq_timer(
    Path(tenant_id): Path<TenantId>,
    State(state): State<AppState>,
    Json(key): Json<DqTimerKey>,
) -> impl IntoResponse {
    state.timers.cancel_dq_timer(tenant_id, &key).await;
    StatusCode::NO_CONTENT
}

pub async fn list_dq_timers(Path(tenant_id): Path<TenantId>, State(state): State<AppState>) -> impl IntoResponse {
    Json(state.timers.list_dq_timers(tenant_id).await)
}

pub async fn update_sponsor_config(
    Path(tenant_id): Path<TenantId>,
    State(state): State<AppState>,
    Json(config): Json<SponsorConfig>,
) -> impl IntoResponse {
    state.timers.update_sponsor_config(tenant_id, config).await;
    StatusCode::NO_CONTENT
}

pub async fn upsert_sponsor_item(
    Path(tenant_id): Path<TenantId>,
    State(state): State<AppState>,
    Json(item): Json<SponsorItem>,
) -> impl IntoResponse {
    state.timers.upsert_sponsor_item(tenant_id, item).await;
    StatusCode::NO_CONTENT
}

pub async fn delete_sponsor_item(
    Path((tenant_id, sponsor_id)): Path<(TenantId, SponsorId)>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    state.timers.delete_sponsor_item(tenant_id, sponsor_id).await;
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
pub struct OverrideBody {
    pub mode: Option<GovernorMode>,
}

pub async fn set_governor_override(
    Path(tenant_id): Path<TenantId>,
    State(state): State<AppState>,
    Json(body): Json<OverrideBody>,
) -> impl IntoResponse {
    state.governor.set_override(tenant_id, body.mode.map(|mode| ManualOverride { mode })).await;
    StatusCode::NO_CONTENT
}

pub async fn activate_dev_bypass(Path(tenant_id): Path<TenantId>, State(state): State<AppState>) -> impl IntoResponse {
    state.governor.activate_dev_bypass(tenant_id).await;
    StatusCode::NO_CONTENT
}

pub async fn deactivate_dev_bypass(Path(tenant_id): Path<TenantId>, State(state): State<AppState>) -> impl IntoResponse {
    state.governor.deactivate_dev_bypass(tenant_id).await;
    StatusCode::NO_CONTENT
}

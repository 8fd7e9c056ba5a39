//! Display-facing routes (spec §6): the primary push channel as
//! server-sent events, ack submission, and the pull surface for
//! late-arriving displays. The subscribe handler keeps the teacher's
//! typed-path SSE-over-boxed-stream shape for client registry
//! subscriptions, rekeyed from a single entity topic to a tenant +
//! display-kind `DisplayRoom`.

use crate::state::AppState;
use app_core::{DisplayKind, DisplayRoom, TenantId};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Sse, sse::Event},
    Json,
};
use axum_extra::routing::TypedPath;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use uuid::Uuid;

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/displays/{tenant_id}/{kind}/subscribe/{display_id}")]
pub struct DisplaySubscribePath {
    tenant_id: TenantId,
    kind: DisplayKind,
    display_id: Uuid,
}

/// `GET /api/displays/{tenant_id}/{kind}/subscribe/{display_id}` — the
/// primary push channel (spec §6 "Events emitted"). The stream ends when
/// the display disconnects; `PushFabric::connect`'s `Drop` guard clears
/// the display's ack-tracking state (spec §4.5 Cancellation).
pub async fn subscribe(
    DisplaySubscribePath { tenant_id, kind, display_id }: DisplaySubscribePath,
    State(state): State<AppState>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let room = DisplayRoom { tenant_id, kind };
    let stream = state.push.connect(room, display_id).await;
    let events = stream.map(|event| match serde_json::to_string(&event) {
        Ok(payload) => Ok(Event::default().event(topic_name(&event)).data(payload)),
        Err(e) => Ok(Event::default().event("error").data(format!("serde error: {e}"))),
    });
    Sse::new(events).keep_alive(axum::response::sse::KeepAlive::default())
}

fn topic_name(event: &app_core::PushTopicEvent) -> &'static str {
    use app_core::PushTopicEvent::*;
    match event {
        MatchSnapshot(_) => "match:snapshot",
        TimerDqStarted { .. } => "timer:dq:started",
        TimerDqWarning { .. } => "timer:dq:warning",
        TimerDqExpired { .. } => "timer:dq:expired",
        TimerDqExecuted { .. } => "timer:dq:executed",
        TimerDqCancelled { .. } => "timer:dq:cancelled",
        TimerDqError { .. } => "timer:dq:error",
        SponsorShow { .. } => "sponsor:show",
        SponsorHide { .. } => "sponsor:hide",
        SponsorRotate { .. } => "sponsor:rotate",
        SponsorConfig { .. } => "sponsor:config",
        ActivityNew(_) => "activity:new",
        AnnouncementBroadcast { .. } => "announcement:broadcast",
    }
}

#[derive(Deserialize)]
pub struct AckBody {
    pub payload_hash: String,
}

/// `POST /api/displays/{tenant_id}/{kind}/ack/{display_id}` (spec §4.5 step 3).
pub async fn ack(
    Path((tenant_id, kind, display_id)): Path<(TenantId, DisplayKind, Uuid)>,
    State(state): State<AppState>,
    Json(body): Json<AckBody>,
) -> impl IntoResponse {
    let room = DisplayRoom { tenant_id, kind };
    state.push.ack(room, display_id, &body.payload_hash).await;
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
pub struct CurrentQuery {
    pub tenant: TenantId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NoSnapshot {
    message: &'static str,
}

/// `GET /api/matches/current?tenant=…` (spec §6 Pull surface): last known
/// Push Envelope straight from the Media-State Cache, unconditionally —
/// this never triggers a fresh poll, it only serves what C6 already wrote.
pub async fn current(Query(query): Query<CurrentQuery>, State(state): State<AppState>) -> impl IntoResponse {
    match state.cache.load(query.tenant).await {
        Some(envelope) => Json(envelope).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(NoSnapshot { message: "no cached envelope for tenant" }),
        )
            .into_response(),
    }
}

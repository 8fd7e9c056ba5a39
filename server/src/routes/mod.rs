mod commands;
mod display;
mod health;

use crate::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use axum_extra::routing::RouterExt;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/db", get(health::health_db))
        .route("/api/matches/current", get(display::current))
        .route(
            "/api/displays/{tenant_id}/{kind}/ack/{display_id}",
            post(display::ack),
        )
        .typed_get(display::subscribe)
        .route(
            "/api/tenants/{tenant_id}/matches/report-result",
            post(commands::report_result),
        )
        .route("/api/tenants/{tenant_id}/matches/forfeit", post(commands::forfeit))
        .route(
            "/api/tenants/{tenant_id}/matches/complete-lobby",
            post(commands::complete_lobby),
        )
        .route("/api/tenants/{tenant_id}/matches/reopen", post(commands::reopen))
        .route(
            "/api/tenants/{tenant_id}/matches/start-underway",
            post(commands::start_underway),
        )
        .route(
            "/api/tenants/{tenant_id}/stations/assign",
            post(commands::assign_station),
        )
        .route(
            "/api/tenants/{tenant_id}/stations/release",
            post(commands::release_station),
        )
        .route(
            "/api/tenants/{tenant_id}/brackets/generate",
            post(commands::generate_bracket),
        )
        .route(
            "/api/tenants/{tenant_id}/dq-timers",
            post(commands::start_dq_timer).get(commands::list_dq_timers),
        )
        .route("/api/tenants/{tenant_id}/dq-timers/cancel", post(commands::cancel_dq_timer))
        .route(
            "/api/tenants/{tenant_id}/sponsors/config",
            post(commands::update_sponsor_config),
        )
        .route(
            "/api/tenants/{tenant_id}/sponsors/items",
            post(commands::upsert_sponsor_item),
        )
        .route(
            "/api/tenants/{tenant_id}/sponsors/items/{sponsor_id}",
            delete(commands::delete_sponsor_item),
        )
        .route(
            "/api/tenants/{tenant_id}/governor/override",
            post(commands::set_governor_override),
        )
        .route(
            "/api/tenants/{tenant_id}/governor/dev-bypass/activate",
            post(commands::activate_dev_bypass),
        )
        .route(
            "/api/tenants/{tenant_id}/governor/dev-bypass/deactivate",
            post(commands::deactivate_dev_bypass),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Router wiring smoke tests: build `AppState` from the in-memory test
//! doubles (`FakeStore`, `PushFabric`, `MediaCache`, `ActivityJournal`) and
//! drive the router directly with `tower::ServiceExt::oneshot`, following
//! the teacher's style of testing the whole trait-object-composed state
//! rather than mocking axum itself.

use crate::routes::router;
use crate::state::AppState;
use activity_journal::ActivityJournal;
use app_core::CoordinatorPort;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use coordinator::Coordinator;
use media_cache::MediaCache;
use push_fabric::PushFabric;
use rate_governor::{GovernorRates, RateGovernor};
use std::sync::Arc;
use std::time::Duration;
use store_fake::FakeStore;
use tenant_poller::{PollerMode, TenantPoller};
use tower::ServiceExt;

fn test_state(dir: &std::path::Path) -> AppState {
    let store: Arc<dyn app_core::StorePort> = Arc::new(FakeStore::new());
    let push = Arc::new(PushFabric::default());
    let cache = Arc::new(MediaCache::new(dir.join("cache")));
    let journal = Arc::new(ActivityJournal::new(push.clone(), dir.join("journal")));
    let poller = Arc::new(TenantPoller::new(
        store.clone(),
        push.clone(),
        cache.clone(),
        PollerMode::MultiTenant,
        Duration::from_secs(5),
        60_000,
    ));
    let poller_port: Arc<dyn app_core::PollerPort> = poller;
    let coordinator = Arc::new(Coordinator::new(store.clone(), journal.clone(), poller_port));
    let coordinator_port: Arc<dyn CoordinatorPort> = coordinator;
    let sponsor_store = Arc::new(timer_scheduler::FileSponsorStatePort::new(dir.join("sponsors")));
    let timers = Arc::new(timer_scheduler::TimerScheduler::new(
        push.clone(),
        coordinator_port.clone(),
        sponsor_store,
        Duration::from_secs(30),
    ));
    let governor = Arc::new(RateGovernor::new(
        store.clone(),
        GovernorRates { idle_rps: 1.0, upcoming_rps: 5.0, active_rps: 20.0 },
        Duration::from_secs(3 * 60 * 60),
    ));

    AppState {
        store,
        coordinator: coordinator_port,
        timers,
        governor,
        journal,
        push,
        cache,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn given_router_when_health_requested_then_ok() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(test_state(dir.path()));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread")]
async fn given_no_cached_envelope_when_current_requested_then_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(test_state(dir.path()));

    let response = app
        .oneshot(Request::builder().uri("/api/matches/current?tenant=1").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

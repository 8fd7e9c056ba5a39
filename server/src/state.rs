//! Composition-root application state, handed to every axum route as
//! `State<AppState>`. Every field is a port (or, where no port trait
//! exists, the concrete component), so handlers never reach past the
//! contracts the rest of the workspace already defines.

use app_core::{CoordinatorPort, JournalPort, MediaCachePort, PushPort, RateGovernorPort, StorePort};
use std::sync::Arc;
use timer_scheduler::TimerScheduler;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StorePort>,
    pub coordinator: Arc<dyn CoordinatorPort>,
    pub timers: Arc<TimerScheduler>,
    pub governor: Arc<dyn RateGovernorPort>,
    pub journal: Arc<dyn JournalPort>,
    pub push: Arc<dyn PushPort>,
    pub cache: Arc<dyn MediaCachePort>,
}

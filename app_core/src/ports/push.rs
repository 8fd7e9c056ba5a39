//! Push Fabric port (C5, spec §4.5). Mirrors the teacher's
//! `ClientRegistryPort` (topic-scoped subscribe/publish over a boxed
//! stream) but routes are tenant + display-kind scoped rather than
//! per-entity, and publishing returns a delivery outcome so callers can
//! observe whether the secondary channel fired.

use crate::model::{AckStatus, PushEnvelope, SponsorItem, SponsorPosition, TenantId};
use async_trait::async_trait;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayKind {
    Match,
    Bracket,
    Flyer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayRoom {
    pub tenant_id: TenantId,
    pub kind: DisplayKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PushTopicEvent {
    MatchSnapshot(PushEnvelope),
    TimerDqStarted { match_id: uuid::Uuid, duration_secs: u64 },
    TimerDqWarning { match_id: uuid::Uuid },
    TimerDqExpired { match_id: uuid::Uuid },
    TimerDqExecuted { match_id: uuid::Uuid },
    TimerDqCancelled { match_id: uuid::Uuid },
    TimerDqError { match_id: uuid::Uuid, message: String },
    SponsorShow { sponsors: Vec<SponsorItem>, duration_ms: u64 },
    SponsorHide { position: Option<SponsorPosition> },
    SponsorRotate {
        position: SponsorPosition,
        sponsor: SponsorItem,
        transition_delay_ms: u64,
    },
    SponsorConfig { config: crate::model::SponsorConfig },
    ActivityNew(crate::model::ActivityEntry),
    AnnouncementBroadcast {
        kind: String,
        message: String,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
    },
}

pub type PushEventStream = Pin<Box<dyn Stream<Item = PushTopicEvent> + Send + 'static>>;

#[derive(Debug, Clone, Error)]
pub enum PushError {
    #[error("no display connected for room {0:?}")]
    NoDisplay(DisplayRoom),

    /// fails soft on fallback paths, propagated on primary commands (spec §7)
    #[error("transient push error: {0}")]
    Transient(String),

    #[error("push fabric error: {0}")]
    Other(String),
}

pub type PushResult<T> = Result<T, PushError>;

/// Outcome of publishing one envelope/event, so the poller and timers can
/// observe whether the secondary channel actually had to fire (spec §8
/// testable property 5).
#[derive(Debug, Clone, Default)]
pub struct DeliveryOutcome {
    pub primary_sent: bool,
    pub secondary_sent: bool,
    pub deduped: bool,
}

#[async_trait]
pub trait PushPort: Send + Sync {
    /// Register a display for a tenant + kind; the returned stream ends
    /// when the display disconnects (RAII), which removes its ack-tracking
    /// state (spec §4.5 Cancellation).
    async fn connect(&self, room: DisplayRoom, display_id: uuid::Uuid) -> PushEventStream;

    async fn disconnect(&self, room: DisplayRoom, display_id: uuid::Uuid);

    /// Record an ack carrying the envelope hash the display is up to date
    /// with (spec §4.5 step 3).
    async fn ack(&self, room: DisplayRoom, display_id: uuid::Uuid, payload_hash: &str);

    /// Publish a match snapshot through the full delivery policy (spec
    /// §4.5 steps 1-4): hash dedup, primary send, fallback evaluation.
    async fn publish_envelope(&self, envelope: PushEnvelope) -> PushResult<DeliveryOutcome>;

    /// Publish a non-envelope event (timer/sponsor/activity/announcement)
    /// to a tenant room with no hash dedup.
    async fn publish_event(&self, tenant_id: TenantId, event: PushTopicEvent) -> PushResult<()>;

    async fn ack_status(&self, room: DisplayRoom, display_id: uuid::Uuid) -> Option<AckStatus>;

    async fn connected_display_count(&self, room: DisplayRoom) -> usize;
}

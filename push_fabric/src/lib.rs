//! In-process `PushPort` implementation (C5, spec §4.5). Grounded in the
//! teacher's `cr_single_instance::CrSingleInstance`: one `tokio::broadcast`
//! bus per topic (here, per [`DisplayRoom`]), created lazily on first
//! connect and torn down by an RAII subscription wrapper when the last
//! receiver drops. Generalised with ack-time tracking and an HTTP
//! secondary-channel fallback, which the teacher's registry has no
//! equivalent of.

use app_core::{
    AckStatus, DeliveryOutcome, DisplayKind, DisplayRoom, PushEventStream, PushPort, PushResult, PushTopicEvent,
    TenantId,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use futures_core::Stream;
use futures_util::StreamExt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{instrument, warn};
use url::Url;

const ALL_DISPLAY_KINDS: [DisplayKind; 3] = [DisplayKind::Match, DisplayKind::Bracket, DisplayKind::Flyer];

type Buses = Arc<DashMap<DisplayRoom, broadcast::Sender<PushTopicEvent>>>;
type ConnectedDisplays = Arc<DashMap<DisplayRoom, DashSet<uuid::Uuid>>>;
type AckStatuses = Arc<DashMap<(DisplayRoom, uuid::Uuid), AckStatus>>;
type LastHashes = Arc<DashMap<DisplayRoom, String>>;

struct RoomSubscription {
    inner: PushEventStream,
    buses: Buses,
    connected: ConnectedDisplays,
    acks: AckStatuses,
    room: DisplayRoom,
    display_id: uuid::Uuid,
}

impl Stream for RoomSubscription {
    type Item = PushTopicEvent;
    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for RoomSubscription {
    fn drop(&mut self) {
        if let Some(set) = self.connected.get(&self.room) {
            set.remove(&self.display_id);
        }
        self.acks.remove(&(self.room, self.display_id));
        if let Some(bus) = self.buses.get(&self.room) {
            if bus.receiver_count() == 0 {
                drop(bus);
                self.buses.remove(&self.room);
            }
        }
    }
}

/// Single-process push fabric. Displays of the same tenant+kind share one
/// broadcast bus; ack state and connection membership are tracked
/// per-display so the fallback-threshold check (spec §4.5 step 4) can be
/// evaluated per payload.
pub struct PushFabric {
    buses: Buses,
    connected: ConnectedDisplays,
    acks: AckStatuses,
    last_hash: LastHashes,
    http: reqwest::Client,
    side_channel_base_url: Option<Url>,
    fallback_delay_ms: i64,
}

impl PushFabric {
    pub fn new(side_channel_base_url: Option<Url>, fallback_delay_ms: i64, side_channel_timeout_ms: u64) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(side_channel_timeout_ms))
            .build()
            .expect("reqwest client builds with a timeout");
        PushFabric {
            buses: Arc::new(DashMap::new()),
            connected: Arc::new(DashMap::new()),
            acks: Arc::new(DashMap::new()),
            last_hash: Arc::new(DashMap::new()),
            http,
            side_channel_base_url,
            fallback_delay_ms,
        }
    }

    fn ensure_bus(&self, room: DisplayRoom) -> broadcast::Sender<PushTopicEvent> {
        self.buses
            .entry(room)
            .or_insert_with(|| {
                let (tx, _rx) = broadcast::channel(128);
                tx
            })
            .clone()
    }

    fn get_bus(&self, room: &DisplayRoom) -> Option<broadcast::Sender<PushTopicEvent>> {
        self.buses.get(room).map(|g| g.clone())
    }

    fn mark_pushed(&self, room: DisplayRoom, now: chrono::DateTime<Utc>) {
        if let Some(set) = self.connected.get(&room) {
            for display_id in set.iter() {
                let key = (room, *display_id);
                let mut entry = self.acks.entry(key).or_default();
                entry.last_push_time = Some(now);
                entry.push_count += 1;
            }
        }
    }

    fn needs_fallback(&self, room: &DisplayRoom, now: chrono::DateTime<Utc>) -> bool {
        let Some(set) = self.connected.get(room) else {
            return true;
        };
        if set.is_empty() {
            return true;
        }
        set.iter().any(|display_id| {
            self.acks
                .get(&(*room, *display_id))
                .is_none_or(|status| status.needs_http_fallback(now, self.fallback_delay_ms))
        })
    }

    #[instrument(name = "push.side_channel", skip(self, body), fields(path))]
    async fn post_side_channel<T: serde::Serialize + ?Sized>(&self, path: &str, body: &T) -> bool {
        let Some(base) = &self.side_channel_base_url else {
            return false;
        };
        let Ok(url) = base.join(path) else {
            warn!(path, "side_channel_url_join_failed");
            return false;
        };
        match self.http.post(url).json(body).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(status = %resp.status(), path, "side_channel_rejected");
                false
            }
            Err(e) => {
                warn!(error = %e, path, "side_channel_failed");
                false
            }
        }
    }
}

#[async_trait]
impl PushPort for PushFabric {
    #[instrument(name = "push.connect", skip(self), fields(tenant_id = room.tenant_id, kind = ?room.kind, display_id = %display_id))]
    async fn connect(&self, room: DisplayRoom, display_id: uuid::Uuid) -> PushEventStream {
        let tx = self.ensure_bus(room);
        let rx = tx.subscribe();
        self.connected.entry(room).or_default().insert(display_id);
        self.acks.insert((room, display_id), AckStatus::default());

        let base = BroadcastStream::new(rx).filter_map(|res| async move { res.ok() });
        let wrapped = RoomSubscription {
            inner: Box::pin(base),
            buses: Arc::clone(&self.buses),
            connected: Arc::clone(&self.connected),
            acks: Arc::clone(&self.acks),
            room,
            display_id,
        };
        Box::pin(wrapped)
    }

    #[instrument(name = "push.disconnect", skip(self), fields(tenant_id = room.tenant_id, kind = ?room.kind, display_id = %display_id))]
    async fn disconnect(&self, room: DisplayRoom, display_id: uuid::Uuid) {
        if let Some(set) = self.connected.get(&room) {
            set.remove(&display_id);
        }
        self.acks.remove(&(room, display_id));
    }

    #[instrument(name = "push.ack", skip(self, payload_hash), fields(tenant_id = room.tenant_id, kind = ?room.kind, display_id = %display_id))]
    async fn ack(&self, room: DisplayRoom, display_id: uuid::Uuid, payload_hash: &str) {
        let _ = payload_hash;
        if let Some(mut status) = self.acks.get_mut(&(room, display_id)) {
            status.last_ack_time = Some(Utc::now());
            status.ack_count += 1;
        }
    }

    #[instrument(name = "push.publish_envelope", skip(self, envelope), fields(tenant_id = envelope.tenant_id))]
    async fn publish_envelope(&self, envelope: app_core::PushEnvelope) -> PushResult<DeliveryOutcome> {
        let room = DisplayRoom { tenant_id: envelope.tenant_id, kind: DisplayKind::Match };
        if self.last_hash.get(&room).map(|h| *h == envelope.payload_hash).unwrap_or(false) {
            return Ok(DeliveryOutcome { primary_sent: false, secondary_sent: false, deduped: true });
        }

        let now = Utc::now();
        let bus_exists = self.get_bus(&room).is_some();
        if let Some(tx) = self.get_bus(&room) {
            let _ = tx.send(PushTopicEvent::MatchSnapshot(envelope.clone()));
        }
        let needs_fallback = self.needs_fallback(&room, now);
        self.mark_pushed(room, now);

        let secondary_sent = if needs_fallback {
            self.post_side_channel("/api/matches/push", &envelope).await
        } else {
            false
        };

        self.last_hash.insert(room, envelope.payload_hash.clone());
        Ok(DeliveryOutcome { primary_sent: bus_exists, secondary_sent, deduped: false })
    }

    #[instrument(name = "push.publish_event", skip(self, event))]
    async fn publish_event(&self, tenant_id: TenantId, event: PushTopicEvent) -> PushResult<()> {
        let mut any_sent = false;
        for kind in ALL_DISPLAY_KINDS {
            let room = DisplayRoom { tenant_id, kind };
            if let Some(tx) = self.get_bus(&room) {
                let _ = tx.send(event.clone());
                any_sent = true;
            }
        }

        let fallback_path = match &event {
            PushTopicEvent::SponsorShow { .. } => Some("/api/sponsor/show"),
            PushTopicEvent::SponsorHide { .. } => Some("/api/sponsor/hide"),
            PushTopicEvent::SponsorRotate { .. } => Some("/api/sponsor/rotate"),
            _ => None,
        };
        if !any_sent {
            if let Some(path) = fallback_path {
                self.post_side_channel(path, &event).await;
            }
        }
        Ok(())
    }

    #[instrument(name = "push.ack_status", skip(self), fields(tenant_id = room.tenant_id, kind = ?room.kind, display_id = %display_id))]
    async fn ack_status(&self, room: DisplayRoom, display_id: uuid::Uuid) -> Option<AckStatus> {
        self.acks.get(&(room, display_id)).map(|s| s.clone())
    }

    #[instrument(name = "push.connected_count", skip(self), fields(tenant_id = room.tenant_id, kind = ?room.kind))]
    async fn connected_display_count(&self, room: DisplayRoom) -> usize {
        self.connected.get(&room).map(|s| s.len()).unwrap_or(0)
    }
}

impl Default for PushFabric {
    fn default() -> Self {
        PushFabric::new(None, 30_000, 5_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use app_core::{EnvelopeCounters, EnvelopeSource, PushEnvelope};
    use uuid::Uuid;

    fn envelope(tenant_id: TenantId, hash: &str) -> PushEnvelope {
        PushEnvelope {
            tenant_id,
            tournament_id: Uuid::new_v4(),
            tournament_slug: "t".into(),
            matches: Vec::new(),
            podium: None,
            next_suggested_match: None,
            available_stations: Vec::new(),
            counters: EnvelopeCounters::default(),
            source: EnvelopeSource::Local,
            is_stale: false,
            cache_age_ms: None,
            timestamp: Utc::now(),
            payload_hash: hash.into(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_no_displays_connected_when_publish_then_fallback_attempted_but_not_sent() {
        let fabric = PushFabric::default();
        let outcome = fabric.publish_envelope(envelope(1, "abc")).await.unwrap();
        assert!(!outcome.primary_sent);
        assert!(!outcome.secondary_sent);
        assert!(!outcome.deduped);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_same_hash_twice_when_publish_then_second_is_deduped() {
        let fabric = PushFabric::default();
        let room = DisplayRoom { tenant_id: 1, kind: DisplayKind::Match };
        let display_id = Uuid::new_v4();
        let _stream = fabric.connect(room, display_id).await;

        let first = fabric.publish_envelope(envelope(1, "same")).await.unwrap();
        assert!(first.primary_sent);
        let second = fabric.publish_envelope(envelope(1, "same")).await.unwrap();
        assert!(second.deduped);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_display_disconnects_when_dropped_then_bus_is_removed() {
        let fabric = PushFabric::default();
        let room = DisplayRoom { tenant_id: 2, kind: DisplayKind::Bracket };
        let display_id = Uuid::new_v4();
        let stream = fabric.connect(room, display_id).await;
        assert_eq!(fabric.connected_display_count(room).await, 1);
        drop(stream);
        assert_eq!(fabric.connected_display_count(room).await, 0);
        assert!(fabric.buses.get(&room).is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_ack_recorded_when_checked_then_status_reflects_it() {
        let fabric = PushFabric::default();
        let room = DisplayRoom { tenant_id: 3, kind: DisplayKind::Match };
        let display_id = Uuid::new_v4();
        let _stream = fabric.connect(room, display_id).await;
        fabric.publish_envelope(envelope(3, "h1")).await.unwrap();
        fabric.ack(room, display_id, "h1").await;
        let status = fabric.ack_status(room, display_id).await.unwrap();
        assert_eq!(status.ack_count, 1);
        assert!(status.last_ack_time.is_some());
    }
}

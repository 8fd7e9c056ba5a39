//! On-disk `MediaCachePort` implementation (C8, spec §4.8): the last-known-
//! good Push Envelope per tenant, written write-temp-then-rename so a crash
//! mid-write never leaves a partially-written file for the next process to
//! trip over, following the teacher's atomic-write habits around its own
//! on-disk sponsor state.

use app_core::{CacheError, CacheResult, MediaCachePort, PushEnvelope, TenantId};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{instrument, warn};

pub struct MediaCache {
    dir: PathBuf,
}

impl MediaCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        MediaCache { dir: dir.into() }
    }

    fn path_for(&self, tenant_id: TenantId) -> PathBuf {
        self.dir.join(format!("envelope-{tenant_id}.json"))
    }

    fn tmp_path_for(&self, tenant_id: TenantId) -> PathBuf {
        self.dir.join(format!("envelope-{tenant_id}.json.tmp"))
    }
}

#[async_trait]
impl MediaCachePort for MediaCache {
    #[instrument(name = "media_cache.save", skip(self, envelope), fields(tenant_id))]
    async fn save(&self, tenant_id: TenantId, envelope: &PushEnvelope) -> CacheResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CacheError::Io(e.to_string()))?;
        let body = serde_json::to_vec(envelope).map_err(|e| CacheError::Io(e.to_string()))?;
        let tmp = self.tmp_path_for(tenant_id);
        tokio::fs::write(&tmp, &body).await.map_err(|e| CacheError::Io(e.to_string()))?;
        tokio::fs::rename(&tmp, self.path_for(tenant_id))
            .await
            .map_err(|e| CacheError::Io(e.to_string()))?;
        Ok(())
    }

    #[instrument(name = "media_cache.load", skip(self), fields(tenant_id))]
    async fn load(&self, tenant_id: TenantId) -> Option<PushEnvelope> {
        let path = self.path_for(tenant_id);
        let body = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(error = %e, tenant_id, "media_cache_read_failed");
                return None;
            }
        };
        match serde_json::from_slice::<PushEnvelope>(&body) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                warn!(error = %e, tenant_id, "media_cache_corrupt_entry_ignored");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use app_core::{EnvelopeCounters, EnvelopeSource};
    use chrono::Utc;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn envelope(tenant_id: TenantId) -> PushEnvelope {
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
            payload_hash: "h".into(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_saved_envelope_when_loaded_then_round_trips() {
        let dir = tempdir().unwrap();
        let cache = MediaCache::new(dir.path());
        let e = envelope(1);
        cache.save(1, &e).await.unwrap();
        let loaded = cache.load(1).await.unwrap();
        assert_eq!(loaded.payload_hash, e.payload_hash);
        assert_eq!(loaded.tenant_id, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_no_entry_when_loaded_then_none() {
        let dir = tempdir().unwrap();
        let cache = MediaCache::new(dir.path());
        assert!(cache.load(99).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_corrupt_file_when_loaded_then_ignored_not_panicked() {
        let dir = tempdir().unwrap();
        let cache = MediaCache::new(dir.path());
        tokio::fs::create_dir_all(dir.path()).await.unwrap();
        tokio::fs::write(dir.path().join("envelope-5.json"), b"not json").await.unwrap();
        assert!(cache.load(5).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_second_save_when_completed_then_no_stale_tmp_file_left() {
        let dir = tempdir().unwrap();
        let cache = MediaCache::new(dir.path());
        cache.save(1, &envelope(1)).await.unwrap();
        cache.save(1, &envelope(1)).await.unwrap();
        assert!(!dir.path().join("envelope-1.json.tmp").exists());
    }
}

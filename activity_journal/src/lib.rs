//! In-process `JournalPort` implementation (C9, spec §4.9): a bounded
//! per-tenant ring buffer backing `query`, plus a durable append-only JSON
//! Lines file per tenant so history survives a restart even though the ring
//! does not.

use app_core::{ActivityCategory, ActivityEntry, JournalError, JournalFilter, JournalPort, JournalResult, Pagination, PushPort, PushTopicEvent, TenantId};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{instrument, warn};

const DEFAULT_RING_CAPACITY: usize = 1000;

pub struct ActivityJournal {
    push: Arc<dyn PushPort>,
    ring: DashMap<TenantId, VecDeque<ActivityEntry>>,
    capacity: usize,
    next_id: AtomicU64,
    log_dir: PathBuf,
}

impl ActivityJournal {
    pub fn new(push: Arc<dyn PushPort>, log_dir: PathBuf) -> Self {
        Self::with_capacity(push, log_dir, DEFAULT_RING_CAPACITY)
    }

    pub fn with_capacity(push: Arc<dyn PushPort>, log_dir: PathBuf, capacity: usize) -> Self {
        ActivityJournal {
            push,
            ring: DashMap::new(),
            capacity,
            next_id: AtomicU64::new(1),
            log_dir,
        }
    }

    fn log_path(&self, tenant_id: TenantId) -> PathBuf {
        self.log_dir.join(format!("activity-{tenant_id}.jsonl"))
    }

    async fn append_to_file(&self, entry: &ActivityEntry) -> JournalResult<()> {
        if let Some(parent) = self.log_dir.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        tokio::fs::create_dir_all(&self.log_dir)
            .await
            .map_err(|e| JournalError::Io(e.to_string()))?;
        let mut line = serde_json::to_string(entry).map_err(|e| JournalError::Other(e.to_string()))?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(entry.tenant_id))
            .await
            .map_err(|e| JournalError::Io(e.to_string()))?;
        file.write_all(line.as_bytes()).await.map_err(|e| JournalError::Io(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl JournalPort for ActivityJournal {
    #[instrument(name = "journal.append", skip(self, details), fields(tenant_id, actor = %actor, action = %action))]
    async fn append(
        &self,
        tenant_id: TenantId,
        actor: String,
        action: String,
        details: HashMap<String, serde_json::Value>,
    ) -> JournalResult<ActivityEntry> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let category = ActivityCategory::infer(&action);
        let entry = ActivityEntry {
            id,
            tenant_id,
            actor,
            action,
            category,
            details,
            timestamp: Utc::now(),
        };

        {
            let mut ring = self.ring.entry(tenant_id).or_default();
            ring.push_back(entry.clone());
            while ring.len() > self.capacity {
                ring.pop_front();
            }
        }

        if let Err(e) = self.append_to_file(&entry).await {
            warn!(error = %e, "journal_file_append_failed");
        }

        if let Err(e) = self.push.publish_event(tenant_id, PushTopicEvent::ActivityNew(entry.clone())).await {
            warn!(error = %e, "journal_push_notify_failed");
        }

        Ok(entry)
    }

    #[instrument(name = "journal.query", skip(self, filter, pagination), fields(tenant_id))]
    async fn query(&self, tenant_id: TenantId, filter: JournalFilter, pagination: Pagination) -> JournalResult<Vec<ActivityEntry>> {
        let Some(ring) = self.ring.get(&tenant_id) else {
            return Ok(Vec::new());
        };
        let query_lower = filter.query.as_ref().map(|q| q.to_lowercase());
        let matches: Vec<ActivityEntry> = ring
            .iter()
            .rev()
            .filter(|e| e.category.matches_filter(&filter))
            .filter(|e| match &query_lower {
                None => true,
                Some(q) => {
                    e.actor.to_lowercase().contains(q.as_str())
                        || e.action.to_lowercase().contains(q.as_str())
                        || e.details.values().any(|v| v.to_string().to_lowercase().contains(q.as_str()))
                }
            })
            .cloned()
            .collect();

        let limit = if pagination.limit == 0 { matches.len() } else { pagination.limit };
        Ok(matches.into_iter().skip(pagination.offset).take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use push_fabric::PushFabric;
    use tempfile::tempdir;

    fn journal(dir: &std::path::Path) -> ActivityJournal {
        ActivityJournal::new(Arc::new(PushFabric::default()), dir.to_path_buf())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_entries_appended_when_queried_then_newest_first() {
        let dir = tempdir().unwrap();
        let journal = journal(dir.path());
        journal.append(1, "ref".into(), "match.result.reported".into(), HashMap::new()).await.unwrap();
        let second = journal.append(1, "ref".into(), "station.assigned".into(), HashMap::new()).await.unwrap();

        let results = journal.query(1, JournalFilter::default(), Pagination { offset: 0, limit: 10 }).await.unwrap();
        assert_eq!(results[0].id, second.id);
        assert_eq!(results[0].category, ActivityCategory::Station);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_category_filter_when_queried_then_only_matching_category_returned() {
        let dir = tempdir().unwrap();
        let journal = journal(dir.path());
        journal.append(1, "ref".into(), "match.result.reported".into(), HashMap::new()).await.unwrap();
        journal.append(1, "ref".into(), "sponsor.rotate".into(), HashMap::new()).await.unwrap();

        let filter = JournalFilter { category: Some(ActivityCategory::Sponsor), query: None };
        let results = journal.query(1, filter, Pagination::default()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].category, ActivityCategory::Sponsor);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_ring_over_capacity_when_appended_then_oldest_evicted() {
        let dir = tempdir().unwrap();
        let journal = ActivityJournal::with_capacity(Arc::new(PushFabric::default()), dir.path().to_path_buf(), 2);
        journal.append(1, "ref".into(), "match.a".into(), HashMap::new()).await.unwrap();
        journal.append(1, "ref".into(), "match.b".into(), HashMap::new()).await.unwrap();
        journal.append(1, "ref".into(), "match.c".into(), HashMap::new()).await.unwrap();

        let results = journal.query(1, JournalFilter::default(), Pagination { offset: 0, limit: 10 }).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results.last().unwrap().action, "match.b");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn given_durable_file_when_appended_then_line_is_written() {
        let dir = tempdir().unwrap();
        let journal = journal(dir.path());
        journal.append(7, "ref".into(), "admin.login".into(), HashMap::new()).await.unwrap();

        let contents = tokio::fs::read_to_string(dir.path().join("activity-7.jsonl")).await.unwrap();
        assert!(contents.contains("admin.login"));
    }
}

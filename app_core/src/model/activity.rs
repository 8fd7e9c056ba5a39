//! Activity journal entry (spec §3, §4.9).

use super::tenant::TenantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityCategory {
    Match,
    Timer,
    Sponsor,
    Station,
    Admin,
    System,
}

impl ActivityCategory {
    /// infer a category from a free-form action tag, e.g. "match.result.reported"
    pub fn infer(action: &str) -> Self {
        let head = action.split('.').next().unwrap_or(action);
        match head {
            "match" => ActivityCategory::Match,
            "timer" => ActivityCategory::Timer,
            "sponsor" => ActivityCategory::Sponsor,
            "station" => ActivityCategory::Station,
            "admin" | "impersonation" => ActivityCategory::Admin,
            _ => ActivityCategory::System,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: u64,
    pub tenant_id: TenantId,
    pub actor: String,
    pub action: String,
    pub category: ActivityCategory,
    pub details: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

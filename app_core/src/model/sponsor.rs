//! Sponsor item and per-tenant sponsor state (spec §3, §4.4).

use super::tenant::TenantId;
use super::tournament::RotationOrder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub type SponsorId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SponsorPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    TopBanner,
    BottomBanner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SponsorKind {
    Image,
    Video,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SponsorItem {
    pub tenant_id: TenantId,
    pub id: SponsorId,
    pub filename: String,
    pub display_name: String,
    pub position: SponsorPosition,
    /// dense sequence within `position`, used to determine "next"
    pub order: u32,
    pub size: f32,
    pub opacity: f32,
    pub radius: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub active: bool,
    pub kind: SponsorKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SponsorConfig {
    pub enabled: bool,
    pub rotation_enabled: bool,
    pub rotation_order: RotationOrder,
    pub rotation_interval_secs: u64,
    pub rotation_transition_ms: u64,
    pub timer_view_enabled: bool,
    pub timer_show_duration_secs: u64,
    pub timer_hide_duration_secs: u64,
    pub display_targets: Vec<String>,
}

impl Default for SponsorConfig {
    fn default() -> Self {
        SponsorConfig {
            enabled: true,
            rotation_enabled: true,
            rotation_order: RotationOrder::Sequential,
            rotation_interval_secs: 30,
            rotation_transition_ms: 500,
            timer_view_enabled: false,
            timer_show_duration_secs: 20,
            timer_hide_duration_secs: 5,
            display_targets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SponsorState {
    pub tenant_id: TenantId,
    pub sponsors: Vec<SponsorItem>,
    pub config: SponsorConfig,
    /// current rotation index per position
    pub current_index: HashMap<SponsorPosition, u32>,
    pub active_user_id: Option<Uuid>,
    pub last_updated: DateTime<Utc>,
}

impl SponsorState {
    pub fn new(tenant_id: TenantId) -> Self {
        SponsorState {
            tenant_id,
            sponsors: Vec::new(),
            config: SponsorConfig::default(),
            current_index: HashMap::new(),
            active_user_id: None,
            last_updated: Utc::now(),
        }
    }

    /// active sponsors sharing `position`, sorted by their dense `order`.
    pub fn active_in_position(&self, position: SponsorPosition) -> Vec<&SponsorItem> {
        let mut items: Vec<&SponsorItem> = self
            .sponsors
            .iter()
            .filter(|s| s.active && s.position == position)
            .collect();
        items.sort_by_key(|s| s.order);
        items
    }

    pub fn positions_with_rotation_candidates(&self) -> Vec<SponsorPosition> {
        use SponsorPosition::*;
        [
            TopLeft,
            TopRight,
            BottomLeft,
            BottomRight,
            TopBanner,
            BottomBanner,
        ]
        .into_iter()
        .filter(|p| self.active_in_position(*p).len() >= 2)
        .collect()
    }

    pub fn current_sponsor(&self, position: SponsorPosition) -> Option<&SponsorItem> {
        let items = self.active_in_position(position);
        if items.is_empty() {
            return None;
        }
        let idx = (*self.current_index.get(&position).unwrap_or(&0) as usize) % items.len();
        items.into_iter().nth(idx)
    }
}

//! Tournament entity and its format options (spec §3).

use super::tenant::TenantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TournamentId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TournamentState {
    Pending,
    Underway,
    Complete,
    AwaitingReview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    SingleElimination,
    DoubleElimination,
    RoundRobin,
    Swiss,
    TwoStage,
    FreeForAll,
    Leaderboard,
}

impl Format {
    /// minimum participant count accepted by `generate` (spec §4.1)
    pub fn min_participants(&self) -> usize {
        match self {
            Format::FreeForAll => 3,
            Format::Leaderboard => 0,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByePlacement {
    Traditional,
    Spread,
    BottomHalf,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedOrder {
    Standard,
    Sequential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrandFinalsModifier {
    Single,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationOrder {
    Sequential,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankingType {
    Points,
    Elo,
    Wins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointsSystem {
    F1Style,
    Linear,
    WinnerTakeAll,
}

/// Format-specific generation options (spec §4.1). Fields are optional and
/// default to the documented behaviour when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatOptions {
    // single/double elimination
    pub seed_order: Option<SeedOrder>,
    pub bye_placement: Option<ByePlacement>,
    pub third_place_match: Option<bool>,
    pub compact_bracket: Option<bool>,
    pub grand_finals_modifier: Option<GrandFinalsModifier>,

    // round robin
    pub rr_iterations: Option<u32>,

    // swiss
    pub swiss_rounds: Option<u32>,
    pub win_points: Option<f64>,
    pub draw_points: Option<f64>,

    // two stage
    pub num_groups: Option<u32>,
    pub advancers_per_group: Option<u32>,
    pub stage_two_format: Option<Format>,

    // free for all
    pub lobby_max_size: Option<u32>,
    pub points_system: Option<PointsSystem>,
    /// total number of lobby rounds to play before standings are final
    /// (spec §4.1 is silent on a fixed count; defaults to a single round).
    pub ffa_rounds: Option<u32>,

    // leaderboard
    pub ranking_type: Option<RankingType>,
    pub decay_period_events: Option<u32>,
    pub min_events_to_rank: Option<u32>,

    // station auto-assignment (spec §4.2)
    pub auto_assign_stations: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub tenant_id: TenantId,
    pub slug: String,
    pub name: String,
    pub format: Format,
    pub state: TournamentState,
    pub format_options: FormatOptions,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Tournament {
    /// A tournament is "complete for polling purposes" when either its
    /// stored state is complete, or externally every non-bye match is
    /// complete (that check lives in the store, since it needs the match
    /// list; this is the cheap half of the predicate, spec §4.6).
    pub fn is_explicitly_complete(&self) -> bool {
        self.state == TournamentState::Complete
    }
}

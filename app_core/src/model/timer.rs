//! DQ timer value type (spec §3). The live scheduling (deadlines, tasks) is
//! owned by `timer_scheduler`; this is the non-persistent record shape used
//! for `list()` results and events.

use super::match_::MatchId;
use super::participant::ParticipantId;
use super::tenant::TenantId;
use super::tournament::TournamentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DqTimerKey {
    pub tournament_id: TournamentId,
    pub match_id: MatchId,
    pub station_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutoDqAction {
    Notify,
    AutoDq,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DqTimerRecord {
    pub tenant_id: TenantId,
    pub key: DqTimerKey,
    pub target_participant_id: ParticipantId,
    pub target_participant_name: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub warning_fired: bool,
}

impl DqTimerRecord {
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

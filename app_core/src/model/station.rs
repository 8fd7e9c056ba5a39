//! Station entity (spec §3). The match<->station cross-link is written
//! atomically from a single side (the match row is primary, see
//! `ports::store::StorePort::set_station`) but both fields are kept in sync.

use super::match_::MatchId;
use super::tournament::TournamentId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type StationId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub tournament_id: TournamentId,
    pub name: String,
    pub active: bool,
    pub current_match_id: Option<MatchId>,
}

impl Station {
    pub fn new(tournament_id: TournamentId, name: impl Into<String>) -> Self {
        Station {
            id: Uuid::new_v4(),
            tournament_id,
            name: name.into(),
            active: true,
            current_match_id: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.active && self.current_match_id.is_none()
    }
}

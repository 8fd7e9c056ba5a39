//! Participant entity (spec §3).

use super::tournament::TournamentId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ParticipantId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub tournament_id: TournamentId,
    pub display_name: String,
    /// unique within a tournament when set
    pub seed: Option<u32>,
    pub checked_in: bool,
}

impl Participant {
    pub fn new(tournament_id: TournamentId, display_name: impl Into<String>) -> Self {
        Participant {
            id: Uuid::new_v4(),
            tournament_id,
            display_name: display_name.into(),
            seed: None,
            checked_in: false,
        }
    }
}

//! Match entity and its invariants (spec §3).

use super::participant::ParticipantId;
use super::station::StationId;
use super::tournament::TournamentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MatchId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchState {
    Pending,
    Open,
    Underway,
    Complete,
}

/// Which slot of a waiting match a prereq reference feeds (spec §3, §4.1
/// advancement semantics: `is_prereq_loser=false` places the winner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
    Player1,
    Player2,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchScores {
    pub p1: u32,
    pub p2: u32,
    /// free-form per-set or per-game detail, e.g. "11-4,9-11,11-7"
    pub csv: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    /// human label, e.g. "W1-3", "LF", "GF", "GF2", "3P"
    pub identifier: String,
    /// negative denotes losers bracket for double-elim
    pub round: i32,
    pub bracket_position: u32,
    pub is_losers_bracket: bool,

    pub player1_id: Option<ParticipantId>,
    pub player2_id: Option<ParticipantId>,

    pub prereq_match_id_p1: Option<MatchId>,
    pub prereq_match_id_p2: Option<MatchId>,
    pub is_prereq_loser_p1: bool,
    pub is_prereq_loser_p2: bool,

    /// None for bye matches; monotonic hint for auto station assignment
    pub suggested_play_order: Option<u32>,

    pub scores: MatchScores,
    pub winner_id: Option<ParticipantId>,
    pub loser_id: Option<ParticipantId>,
    pub state: MatchState,

    pub underway_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    pub is_bye: bool,
    pub is_grand_finals: bool,
    pub is_grand_finals_reset: bool,
    /// the reset (GF2) match exists as a row once GF1 is generated, but is
    /// only meaningful/playable if the losers-bracket player won GF1
    pub is_conditional: bool,

    pub station_id: Option<StationId>,

    /// full roster for a free-for-all lobby; empty for every 2-player match
    /// (single/double elim, round robin, swiss, leaderboard events don't use
    /// match rows at all). `player1_id`/`player2_id` mirror the first two
    /// entries so the §3 two-slot invariants still apply to the slots that
    /// exist.
    #[serde(default)]
    pub lobby_participants: Vec<ParticipantId>,
    /// final placement (1-based) per lobby participant, set once the lobby
    /// match completes.
    #[serde(default)]
    pub placements: Vec<(ParticipantId, u32)>,
}

impl Match {
    /// Both player slots are filled.
    pub fn is_ready_to_open(&self) -> bool {
        self.player1_id.is_some() && self.player2_id.is_some()
    }

    /// spec §3 invariant: `state=open ⇒ both player ids set`.
    pub fn check_open_invariant(&self) -> bool {
        self.state != MatchState::Open || self.is_ready_to_open()
    }

    /// spec §3 invariant: `state=complete ⇒ winner in {player1,player2}`.
    pub fn check_complete_invariant(&self) -> bool {
        if self.state != MatchState::Complete {
            return true;
        }
        let Some(winner) = self.winner_id else {
            return false;
        };
        if self.is_bye {
            return Some(winner) == self.player1_id || Some(winner) == self.player2_id;
        }
        let loser_ok = self.loser_id.is_some();
        loser_ok && (Some(winner) == self.player1_id || Some(winner) == self.player2_id)
    }

    /// spec §3 bye soundness invariant.
    pub fn check_bye_invariant(&self) -> bool {
        if !self.is_bye {
            return true;
        }
        let exactly_one = self.player1_id.is_some() ^ self.player2_id.is_some();
        exactly_one
            && self.state == MatchState::Complete
            && self.suggested_play_order.is_none()
            && self.winner_id == self.player1_id.or(self.player2_id)
    }

    pub fn sole_participant(&self) -> Option<ParticipantId> {
        match (self.player1_id, self.player2_id) {
            (Some(p), None) => Some(p),
            (None, Some(p)) => Some(p),
            _ => None,
        }
    }

    pub fn other_player(&self, participant: ParticipantId) -> Option<ParticipantId> {
        if self.player1_id == Some(participant) {
            self.player2_id
        } else if self.player2_id == Some(participant) {
            self.player1_id
        } else {
            None
        }
    }

    pub fn set_slot(&mut self, slot: Slot, participant: ParticipantId) {
        match slot {
            Slot::Player1 => self.player1_id = Some(participant),
            Slot::Player2 => self.player2_id = Some(participant),
        }
    }

    pub fn clear_slot(&mut self, slot: Slot) {
        match slot {
            Slot::Player1 => self.player1_id = None,
            Slot::Player2 => self.player2_id = None,
        }
    }
}

//! match row mapping (spec §3, §4.1). `lobby_participants`/`placements`
//! (spec §11, free-for-all) round-trip through `serde_json` as `JSONB`
//! rather than earning their own join tables — they're small, append-once,
//! and never queried by content.

use crate::schema::matches;
use app_core::{DbError, Match, MatchId, MatchScores, MatchState, ParticipantId, StationId, TournamentId};
use chrono::{DateTime, Utc};
use diesel::prelude::{AsChangeset, Insertable, Queryable};

pub fn match_state_to_str(s: MatchState) -> &'static str {
    match s {
        MatchState::Pending => "pending",
        MatchState::Open => "open",
        MatchState::Underway => "underway",
        MatchState::Complete => "complete",
    }
}

pub fn match_state_from_str(s: &str) -> Result<MatchState, DbError> {
    Ok(match s {
        "pending" => MatchState::Pending,
        "open" => MatchState::Open,
        "underway" => MatchState::Underway,
        "complete" => MatchState::Complete,
        other => return Err(DbError::Other(format!("unknown match state {other}"))),
    })
}

#[derive(Debug, Queryable)]
pub struct DbMatch {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    pub identifier: String,
    pub round: i32,
    pub bracket_position: i32,
    pub is_losers_bracket: bool,
    pub player1_id: Option<ParticipantId>,
    pub player2_id: Option<ParticipantId>,
    pub prereq_match_id_p1: Option<MatchId>,
    pub prereq_match_id_p2: Option<MatchId>,
    pub is_prereq_loser_p1: bool,
    pub is_prereq_loser_p2: bool,
    pub suggested_play_order: Option<i32>,
    pub score_p1: i32,
    pub score_p2: i32,
    pub score_csv: Option<String>,
    pub winner_id: Option<ParticipantId>,
    pub loser_id: Option<ParticipantId>,
    pub state: String,
    pub underway_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_bye: bool,
    pub is_grand_finals: bool,
    pub is_grand_finals_reset: bool,
    pub is_conditional: bool,
    pub station_id: Option<StationId>,
    pub lobby_participants: serde_json::Value,
    pub placements: serde_json::Value,
}

impl TryFrom<DbMatch> for Match {
    type Error = DbError;

    fn try_from(r: DbMatch) -> Result<Self, Self::Error> {
        let lobby_participants: Vec<ParticipantId> = serde_json::from_value(r.lobby_participants)
            .map_err(|e| DbError::Other(format!("lobby_participants deserialize: {e}")))?;
        let placements: Vec<(ParticipantId, u32)> = serde_json::from_value(r.placements)
            .map_err(|e| DbError::Other(format!("placements deserialize: {e}")))?;
        Ok(Match {
            id: r.id,
            tournament_id: r.tournament_id,
            identifier: r.identifier,
            round: r.round,
            bracket_position: r.bracket_position as u32,
            is_losers_bracket: r.is_losers_bracket,
            player1_id: r.player1_id,
            player2_id: r.player2_id,
            prereq_match_id_p1: r.prereq_match_id_p1,
            prereq_match_id_p2: r.prereq_match_id_p2,
            is_prereq_loser_p1: r.is_prereq_loser_p1,
            is_prereq_loser_p2: r.is_prereq_loser_p2,
            suggested_play_order: r.suggested_play_order.map(|v| v as u32),
            scores: MatchScores {
                p1: r.score_p1 as u32,
                p2: r.score_p2 as u32,
                csv: r.score_csv,
            },
            winner_id: r.winner_id,
            loser_id: r.loser_id,
            state: match_state_from_str(&r.state)?,
            underway_at: r.underway_at,
            completed_at: r.completed_at,
            is_bye: r.is_bye,
            is_grand_finals: r.is_grand_finals,
            is_grand_finals_reset: r.is_grand_finals_reset,
            is_conditional: r.is_conditional,
            station_id: r.station_id,
            lobby_participants,
            placements,
        })
    }
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = matches)]
pub struct WriteDbMatch {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    pub identifier: String,
    pub round: i32,
    pub bracket_position: i32,
    pub is_losers_bracket: bool,
    pub player1_id: Option<ParticipantId>,
    pub player2_id: Option<ParticipantId>,
    pub prereq_match_id_p1: Option<MatchId>,
    pub prereq_match_id_p2: Option<MatchId>,
    pub is_prereq_loser_p1: bool,
    pub is_prereq_loser_p2: bool,
    pub suggested_play_order: Option<i32>,
    pub score_p1: i32,
    pub score_p2: i32,
    pub score_csv: Option<String>,
    pub winner_id: Option<ParticipantId>,
    pub loser_id: Option<ParticipantId>,
    pub state: &'static str,
    pub underway_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_bye: bool,
    pub is_grand_finals: bool,
    pub is_grand_finals_reset: bool,
    pub is_conditional: bool,
    pub station_id: Option<StationId>,
    pub lobby_participants: serde_json::Value,
    pub placements: serde_json::Value,
}

impl TryFrom<&Match> for WriteDbMatch {
    type Error = DbError;

    fn try_from(m: &Match) -> Result<Self, Self::Error> {
        Ok(WriteDbMatch {
            id: m.id,
            tournament_id: m.tournament_id,
            identifier: m.identifier.clone(),
            round: m.round,
            bracket_position: m.bracket_position as i32,
            is_losers_bracket: m.is_losers_bracket,
            player1_id: m.player1_id,
            player2_id: m.player2_id,
            prereq_match_id_p1: m.prereq_match_id_p1,
            prereq_match_id_p2: m.prereq_match_id_p2,
            is_prereq_loser_p1: m.is_prereq_loser_p1,
            is_prereq_loser_p2: m.is_prereq_loser_p2,
            suggested_play_order: m.suggested_play_order.map(|v| v as i32),
            score_p1: m.scores.p1 as i32,
            score_p2: m.scores.p2 as i32,
            score_csv: m.scores.csv.clone(),
            winner_id: m.winner_id,
            loser_id: m.loser_id,
            state: match_state_to_str(m.state),
            underway_at: m.underway_at,
            completed_at: m.completed_at,
            is_bye: m.is_bye,
            is_grand_finals: m.is_grand_finals,
            is_grand_finals_reset: m.is_grand_finals_reset,
            is_conditional: m.is_conditional,
            station_id: m.station_id,
            lobby_participants: serde_json::to_value(&m.lobby_participants)
                .map_err(|e| DbError::Other(format!("lobby_participants serialize: {e}")))?,
            placements: serde_json::to_value(&m.placements)
                .map_err(|e| DbError::Other(format!("placements serialize: {e}")))?,
        })
    }
}

//! tournament row mapping (spec §3). `format`/`state` are stored as `TEXT`
//! rather than a Postgres enum type (see DESIGN.md: avoids adding
//! diesel-derive-enum to the dependency stack for two small closed sets);
//! `format_options` round-trips through `FormatOptions`'s existing serde
//! impl as `JSONB`.

use crate::schema::tournaments;
use app_core::{DbError, Format, FormatOptions, Tournament, TournamentId, TournamentState};
use chrono::{DateTime, Utc};
use diesel::prelude::{AsChangeset, Insertable, Queryable};
use uuid::Uuid;

pub fn format_to_str(f: Format) -> &'static str {
    match f {
        Format::SingleElimination => "single_elimination",
        Format::DoubleElimination => "double_elimination",
        Format::RoundRobin => "round_robin",
        Format::Swiss => "swiss",
        Format::TwoStage => "two_stage",
        Format::FreeForAll => "free_for_all",
        Format::Leaderboard => "leaderboard",
    }
}

pub fn format_from_str(s: &str) -> Result<Format, DbError> {
    Ok(match s {
        "single_elimination" => Format::SingleElimination,
        "double_elimination" => Format::DoubleElimination,
        "round_robin" => Format::RoundRobin,
        "swiss" => Format::Swiss,
        "two_stage" => Format::TwoStage,
        "free_for_all" => Format::FreeForAll,
        "leaderboard" => Format::Leaderboard,
        other => return Err(DbError::Other(format!("unknown format {other}"))),
    })
}

pub fn tournament_state_to_str(s: TournamentState) -> &'static str {
    match s {
        TournamentState::Pending => "pending",
        TournamentState::Underway => "underway",
        TournamentState::Complete => "complete",
        TournamentState::AwaitingReview => "awaiting_review",
    }
}

pub fn tournament_state_from_str(s: &str) -> Result<TournamentState, DbError> {
    Ok(match s {
        "pending" => TournamentState::Pending,
        "underway" => TournamentState::Underway,
        "complete" => TournamentState::Complete,
        "awaiting_review" => TournamentState::AwaitingReview,
        other => return Err(DbError::Other(format!("unknown tournament state {other}"))),
    })
}

#[derive(Debug, Queryable)]
pub struct DbTournament {
    pub id: Uuid,
    pub tenant_id: i64,
    pub slug: String,
    pub name: String,
    pub format: String,
    pub state: String,
    pub format_options: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbTournament> for Tournament {
    type Error = DbError;

    fn try_from(r: DbTournament) -> Result<Self, Self::Error> {
        let format_options: FormatOptions = serde_json::from_value(r.format_options)
            .map_err(|e| DbError::Other(format!("format_options deserialize: {e}")))?;
        Ok(Tournament {
            id: r.id,
            tenant_id: r.tenant_id,
            slug: r.slug,
            name: r.name,
            format: format_from_str(&r.format)?,
            state: tournament_state_from_str(&r.state)?,
            format_options,
            created_at: r.created_at,
            started_at: r.started_at,
            ended_at: r.ended_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tournaments)]
pub struct WriteDbTournament {
    pub id: TournamentId,
    pub tenant_id: i64,
    pub slug: String,
    pub name: String,
    pub format: &'static str,
    pub state: &'static str,
    pub format_options: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl TryFrom<&Tournament> for WriteDbTournament {
    type Error = DbError;

    fn try_from(t: &Tournament) -> Result<Self, Self::Error> {
        Ok(WriteDbTournament {
            id: t.id,
            tenant_id: t.tenant_id,
            slug: t.slug.clone(),
            name: t.name.clone(),
            format: format_to_str(t.format),
            state: tournament_state_to_str(t.state),
            format_options: serde_json::to_value(&t.format_options)
                .map_err(|e| DbError::Other(format!("format_options serialize: {e}")))?,
            created_at: t.created_at,
            started_at: t.started_at,
            ended_at: t.ended_at,
        })
    }
}

//! station row mapping (spec §3).

use crate::schema::stations;
use app_core::{MatchId, Station, StationId, TournamentId};
use diesel::prelude::{AsChangeset, Insertable, Queryable};

#[derive(Debug, Queryable)]
pub struct DbStation {
    pub id: StationId,
    pub tournament_id: TournamentId,
    pub name: String,
    pub active: bool,
    pub current_match_id: Option<MatchId>,
}

impl From<DbStation> for Station {
    fn from(r: DbStation) -> Self {
        Station {
            id: r.id,
            tournament_id: r.tournament_id,
            name: r.name,
            active: r.active,
            current_match_id: r.current_match_id,
        }
    }
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = stations)]
pub struct WriteDbStation {
    pub id: StationId,
    pub tournament_id: TournamentId,
    pub name: String,
    pub active: bool,
    pub current_match_id: Option<MatchId>,
}

impl From<&Station> for WriteDbStation {
    fn from(s: &Station) -> Self {
        WriteDbStation {
            id: s.id,
            tournament_id: s.tournament_id,
            name: s.name.clone(),
            active: s.active,
            current_match_id: s.current_match_id,
        }
    }
}

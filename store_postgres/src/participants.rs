//! participant row mapping (spec §3).

use crate::schema::participants;
use app_core::{Participant, ParticipantId, TournamentId};
use diesel::prelude::{AsChangeset, Insertable, Queryable};

#[derive(Debug, Queryable)]
pub struct DbParticipant {
    pub id: ParticipantId,
    pub tournament_id: TournamentId,
    pub display_name: String,
    pub seed: Option<i32>,
    pub checked_in: bool,
}

impl From<DbParticipant> for Participant {
    fn from(r: DbParticipant) -> Self {
        Participant {
            id: r.id,
            tournament_id: r.tournament_id,
            display_name: r.display_name,
            seed: r.seed.map(|s| s as u32),
            checked_in: r.checked_in,
        }
    }
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = participants)]
pub struct WriteDbParticipant {
    pub id: ParticipantId,
    pub tournament_id: TournamentId,
    pub display_name: String,
    pub seed: Option<i32>,
    pub checked_in: bool,
}

impl From<&Participant> for WriteDbParticipant {
    fn from(p: &Participant) -> Self {
        WriteDbParticipant {
            id: p.id,
            tournament_id: p.tournament_id,
            display_name: p.display_name.clone(),
            seed: p.seed.map(|s| s as i32),
            checked_in: p.checked_in,
        }
    }
}

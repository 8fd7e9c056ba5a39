//! `StorePort` implementation (spec §4.2). Every mutation that touches more
//! than one row (`bulk_create_matches`, `set_winner`, `set_forfeit`,
//! `reopen`, `auto_assign_stations`) runs inside a single diesel-async
//! transaction, mirroring the teacher's optimistic-update style in
//! `tournament_base.rs` but without per-row versioning: the advancement
//! rule itself is the conflict boundary here, not row versions.

use crate::{
    PgDb, map_db_err,
    matches::{DbMatch, WriteDbMatch, match_state_to_str},
    participants::{DbParticipant, WriteDbParticipant},
    schema::{matches, participants, stations, tenants, tournaments},
    stations::{DbStation, WriteDbStation},
    tenants::DbTenant,
    tournaments::{DbTournament, WriteDbTournament, tournament_state_to_str},
};
use app_core::{
    AdvancementOutcome, DbError, DbResult, Match, MatchFilter, MatchId, MatchScores, MatchState,
    Participant, ParticipantId, Slot, Station, StationId, StorePort, Tenant, TenantId, Tournament,
    TournamentId, TournamentState,
};
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::{BoolExpressionMethods, ExpressionMethods, OptionalExtension, QueryDsl};
use diesel_async::{AsyncPgConnection, RunQueryDsl, scoped_futures::ScopedFutureExt};
use tracing::{debug, instrument, warn};

/// Greedy station/open-match pairing, run inside an already-open transaction.
/// Shared by the standalone `auto_assign_stations` port method and every
/// mutation that frees a station and can leave open matches waiting for one
/// (spec §4.2: `setWinner` is "atomic: update this match, run advancement
/// rule, free station, then invoke auto-assignment").
async fn run_auto_assign_in_tx(conn: &mut AsyncPgConnection, tournament_id: TournamentId) -> Result<Vec<Match>, DbError> {
    use crate::schema::{matches::dsl as m, stations::dsl as s, tournaments::dsl as t};

    let tournament = t::tournaments
        .filter(t::id.eq(tournament_id))
        .first::<DbTournament>(conn)
        .await
        .map_err(map_db_err)?;
    let auto_assign: bool = serde_json::from_value::<app_core::FormatOptions>(tournament.format_options)
        .ok()
        .and_then(|o| o.auto_assign_stations)
        .unwrap_or(false);
    if !auto_assign {
        return Ok(Vec::new());
    }

    let mut free_stations: Vec<DbStation> = s::stations
        .filter(s::tournament_id.eq(tournament_id))
        .filter(s::active.eq(true))
        .filter(s::current_match_id.is_null())
        .order(s::id.asc())
        .load(conn)
        .await
        .map_err(map_db_err)?;

    let mut open_matches: Vec<DbMatch> = m::matches
        .filter(m::tournament_id.eq(tournament_id))
        .filter(m::state.eq(match_state_to_str(MatchState::Open)))
        .filter(m::station_id.is_null())
        .load(conn)
        .await
        .map_err(map_db_err)?;
    open_matches.sort_by_key(|row| (row.suggested_play_order.unwrap_or(i32::MAX), row.round, row.id));

    let mut touched = Vec::new();
    for (station, row) in free_stations.drain(..).zip(open_matches.drain(..)) {
        diesel::update(s::stations.filter(s::id.eq(station.id)))
            .set(s::current_match_id.eq(row.id))
            .execute(conn)
            .await
            .map_err(map_db_err)?;
        diesel::update(m::matches.filter(m::id.eq(row.id)))
            .set(m::station_id.eq(station.id))
            .execute(conn)
            .await
            .map_err(map_db_err)?;
        let mut updated = row;
        updated.station_id = Some(station.id);
        touched.push(Match::try_from(updated)?);
    }
    Ok(touched)
}

#[async_trait]
impl StorePort for PgDb {
    #[instrument(name = "db.ping", skip(self))]
    async fn ping(&self) -> DbResult<()> {
        let mut conn = self.new_connection().await?;
        diesel::select(diesel::dsl::sql::<diesel::sql_types::Bool>("1=1"))
            .execute(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    #[instrument(name = "db.tenant.get", skip(self))]
    async fn get_tenant(&self, tenant_id: TenantId) -> DbResult<Option<Tenant>> {
        use crate::schema::tenants::dsl;
        let mut conn = self.new_connection().await?;
        let row = dsl::tenants
            .filter(dsl::id.eq(tenant_id))
            .first::<DbTenant>(&mut conn)
            .await
            .optional()
            .map_err(map_db_err)?;
        Ok(row.map(Tenant::from))
    }

    #[instrument(name = "db.tenant.list", skip(self))]
    async fn list_tenants(&self) -> DbResult<Vec<Tenant>> {
        use crate::schema::tenants::dsl;
        let mut conn = self.new_connection().await?;
        let rows = dsl::tenants
            .order(dsl::id.asc())
            .load::<DbTenant>(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(rows.into_iter().map(Tenant::from).collect())
    }

    #[instrument(name = "db.tenant.list_active", skip(self))]
    async fn list_tenants_with_active_tournament(&self) -> DbResult<Vec<TenantId>> {
        use crate::schema::tournaments::dsl;
        let mut conn = self.new_connection().await?;
        let rows = dsl::tournaments
            .filter(dsl::state.eq(tournament_state_to_str(TournamentState::Underway)))
            .select(dsl::tenant_id)
            .distinct()
            .order(dsl::tenant_id.asc())
            .load::<i64>(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(rows)
    }

    #[instrument(name = "db.tournament.create", skip(self, tournament), fields(id = %tournament.id))]
    async fn create_tournament(&self, tournament: Tournament) -> DbResult<Tournament> {
        let mut conn = self.new_connection().await?;
        let w = WriteDbTournament::try_from(&tournament)?;
        diesel::insert_into(tournaments::table)
            .values(w)
            .execute(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(tournament)
    }

    #[instrument(name = "db.tournament.get", skip(self))]
    async fn get_tournament(&self, id: TournamentId) -> DbResult<Option<Tournament>> {
        use crate::schema::tournaments::dsl;
        let mut conn = self.new_connection().await?;
        let row = dsl::tournaments
            .filter(dsl::id.eq(id))
            .first::<DbTournament>(&mut conn)
            .await
            .optional()
            .map_err(map_db_err)?;
        row.map(Tournament::try_from).transpose()
    }

    #[instrument(name = "db.tournament.get_active", skip(self))]
    async fn get_active_tournament(&self, tenant_id: TenantId) -> DbResult<Option<Tournament>> {
        use crate::schema::tournaments::dsl;
        let mut conn = self.new_connection().await?;
        let row = dsl::tournaments
            .filter(dsl::tenant_id.eq(tenant_id))
            .filter(dsl::state.eq(tournament_state_to_str(TournamentState::Underway)))
            .order(dsl::started_at.desc())
            .first::<DbTournament>(&mut conn)
            .await
            .optional()
            .map_err(map_db_err)?;
        row.map(Tournament::try_from).transpose()
    }

    #[instrument(name = "db.tournament.list_by_tenant", skip(self))]
    async fn list_tournaments_by_tenant(&self, tenant_id: TenantId) -> DbResult<Vec<Tournament>> {
        use crate::schema::tournaments::dsl;
        let mut conn = self.new_connection().await?;
        let rows = dsl::tournaments
            .filter(dsl::tenant_id.eq(tenant_id))
            .order(dsl::created_at.asc())
            .load::<DbTournament>(&mut conn)
            .await
            .map_err(map_db_err)?;
        rows.into_iter().map(Tournament::try_from).collect()
    }

    #[instrument(name = "db.tournament.set_state", skip(self))]
    async fn set_tournament_state(&self, id: TournamentId, state: TournamentState) -> DbResult<Tournament> {
        use crate::schema::tournaments::dsl;
        let mut conn = self.new_connection().await?;
        let now = Utc::now();
        let row = conn
            .transaction::<_, DbError, _>(|conn| {
                async move {
                    let current = dsl::tournaments
                        .filter(dsl::id.eq(id))
                        .first::<DbTournament>(conn)
                        .await
                        .map_err(map_db_err)?;

                    let started_at = if state == TournamentState::Underway && current.started_at.is_none() {
                        Some(now)
                    } else {
                        current.started_at
                    };
                    let ended_at = if state == TournamentState::Complete {
                        Some(now)
                    } else {
                        current.ended_at
                    };

                    diesel::update(dsl::tournaments.filter(dsl::id.eq(id)))
                        .set((
                            dsl::state.eq(tournament_state_to_str(state)),
                            dsl::started_at.eq(started_at),
                            dsl::ended_at.eq(ended_at),
                        ))
                        .execute(conn)
                        .await
                        .map_err(map_db_err)?;

                    dsl::tournaments
                        .filter(dsl::id.eq(id))
                        .first::<DbTournament>(conn)
                        .await
                        .map_err(map_db_err)
                }
                .scope_boxed()
            })
            .await?;
        Tournament::try_from(row)
    }

    #[instrument(name = "db.participant.create", skip(self, participant), fields(id = %participant.id))]
    async fn create_participant(&self, participant: Participant) -> DbResult<Participant> {
        let mut conn = self.new_connection().await?;
        let w = WriteDbParticipant::from(&participant);
        diesel::insert_into(participants::table)
            .values(w)
            .execute(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(participant)
    }

    #[instrument(name = "db.participant.list", skip(self))]
    async fn get_participants(&self, tournament_id: TournamentId) -> DbResult<Vec<Participant>> {
        use crate::schema::participants::dsl;
        let mut conn = self.new_connection().await?;
        let rows = dsl::participants
            .filter(dsl::tournament_id.eq(tournament_id))
            .order(dsl::id.asc())
            .load::<DbParticipant>(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(rows.into_iter().map(Participant::from).collect())
    }

    #[instrument(name = "db.participant.delete", skip(self))]
    async fn delete_participant(&self, id: ParticipantId) -> DbResult<()> {
        use crate::schema::participants::dsl;
        let mut conn = self.new_connection().await?;
        diesel::delete(dsl::participants.filter(dsl::id.eq(id)))
            .execute(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    #[instrument(name = "db.station.create", skip(self, station), fields(id = %station.id))]
    async fn create_station(&self, station: Station) -> DbResult<Station> {
        let mut conn = self.new_connection().await?;
        let w = WriteDbStation::from(&station);
        diesel::insert_into(stations::table)
            .values(w)
            .execute(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(station)
    }

    #[instrument(name = "db.station.list", skip(self))]
    async fn get_stations(&self, tournament_id: TournamentId) -> DbResult<Vec<Station>> {
        use crate::schema::stations::dsl;
        let mut conn = self.new_connection().await?;
        let rows = dsl::stations
            .filter(dsl::tournament_id.eq(tournament_id))
            .order(dsl::id.asc())
            .load::<DbStation>(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(rows.into_iter().map(Station::from).collect())
    }

    #[instrument(name = "db.station.set", skip(self))]
    async fn set_station(&self, match_id: MatchId, station_id: StationId) -> DbResult<Match> {
        use crate::schema::{matches::dsl as m, stations::dsl as s};
        let mut conn = self.new_connection().await?;
        conn.transaction::<_, DbError, _>(|conn| {
            async move {
                let station = s::stations
                    .filter(s::id.eq(station_id))
                    .first::<DbStation>(conn)
                    .await
                    .map_err(map_db_err)?;
                if let Some(occupied) = station.current_match_id {
                    if occupied != match_id {
                        return Err(DbError::CheckViolation(Some("station already in use".into())));
                    }
                }
                diesel::update(s::stations.filter(s::id.eq(station_id)))
                    .set(s::current_match_id.eq(match_id))
                    .execute(conn)
                    .await
                    .map_err(map_db_err)?;
                diesel::update(m::matches.filter(m::id.eq(match_id)))
                    .set(m::station_id.eq(station_id))
                    .execute(conn)
                    .await
                    .map_err(map_db_err)?;
                Ok(())
            }
            .scope_boxed()
        })
        .await?;
        self.get_match(match_id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(name = "db.station.clear", skip(self))]
    async fn clear_station(&self, match_id: MatchId) -> DbResult<Match> {
        use crate::schema::{matches::dsl as m, stations::dsl as s};
        let mut conn = self.new_connection().await?;
        conn.transaction::<_, DbError, _>(|conn| {
            async move {
                let row = m::matches
                    .filter(m::id.eq(match_id))
                    .select(m::station_id)
                    .first::<Option<StationId>>(conn)
                    .await
                    .map_err(map_db_err)?;
                if let Some(station_id) = row {
                    diesel::update(s::stations.filter(s::id.eq(station_id)))
                        .set(s::current_match_id.eq(None::<MatchId>))
                        .execute(conn)
                        .await
                        .map_err(map_db_err)?;
                }
                diesel::update(m::matches.filter(m::id.eq(match_id)))
                    .set(m::station_id.eq(None::<StationId>))
                    .execute(conn)
                    .await
                    .map_err(map_db_err)?;
                Ok(())
            }
            .scope_boxed()
        })
        .await?;
        self.get_match(match_id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(name = "db.station.auto_assign", skip(self))]
    async fn auto_assign_stations(&self, tournament_id: TournamentId) -> DbResult<Vec<Match>> {
        let mut conn = self.new_connection().await?;
        conn.transaction::<_, DbError, _>(|conn| async move { run_auto_assign_in_tx(conn, tournament_id).await }.scope_boxed())
            .await
    }

    #[instrument(name = "db.match.bulk_create", skip(self, matches), fields(count = matches.len()))]
    async fn bulk_create_matches(&self, matches_in: Vec<Match>) -> DbResult<Vec<Match>> {
        let mut conn = self.new_connection().await?;
        let writes: Vec<WriteDbMatch> = matches_in.iter().map(WriteDbMatch::try_from).collect::<Result<_, _>>()?;
        diesel::insert_into(matches::table)
            .values(writes)
            .execute(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(matches_in)
    }

    #[instrument(name = "db.match.update_prereqs", skip(self, updates), fields(count = updates.len()))]
    async fn update_prereqs(&self, updates: Vec<(MatchId, Option<MatchId>, Option<MatchId>)>) -> DbResult<()> {
        use crate::schema::matches::dsl;
        let mut conn = self.new_connection().await?;
        conn.transaction::<_, DbError, _>(|conn| {
            async move {
                for (match_id, p1, p2) in updates {
                    diesel::update(dsl::matches.filter(dsl::id.eq(match_id)))
                        .set((dsl::prereq_match_id_p1.eq(p1), dsl::prereq_match_id_p2.eq(p2)))
                        .execute(conn)
                        .await
                        .map_err(map_db_err)?;
                }
                Ok(())
            }
            .scope_boxed()
        })
        .await
    }

    #[instrument(name = "db.match.list", skip(self, filter))]
    async fn get_matches_by_tournament(&self, tournament_id: TournamentId, filter: MatchFilter) -> DbResult<Vec<Match>> {
        use crate::schema::matches::dsl;
        let mut conn = self.new_connection().await?;
        let mut query = dsl::matches.filter(dsl::tournament_id.eq(tournament_id)).into_boxed::<diesel::pg::Pg>();
        if let Some(state) = filter.state {
            query = query.filter(dsl::state.eq(match_state_to_str(state)));
        }
        if let Some(round) = filter.round {
            query = query.filter(dsl::round.eq(round));
        }
        if let Some(station_id) = filter.station_id {
            query = query.filter(dsl::station_id.eq(station_id));
        }
        let rows = query
            .order((dsl::round.asc(), dsl::bracket_position.asc()))
            .load::<DbMatch>(&mut conn)
            .await
            .map_err(map_db_err)?;
        rows.into_iter().map(Match::try_from).collect()
    }

    #[instrument(name = "db.match.get", skip(self))]
    async fn get_match(&self, id: MatchId) -> DbResult<Option<Match>> {
        use crate::schema::matches::dsl;
        let mut conn = self.new_connection().await?;
        let row = dsl::matches
            .filter(dsl::id.eq(id))
            .first::<DbMatch>(&mut conn)
            .await
            .optional()
            .map_err(map_db_err)?;
        row.map(Match::try_from).transpose()
    }

    #[instrument(name = "db.match.set_player", skip(self))]
    async fn set_player(&self, match_id: MatchId, slot: Slot, participant: ParticipantId) -> DbResult<Match> {
        use crate::schema::matches::dsl;
        let mut conn = self.new_connection().await?;
        conn.transaction::<_, DbError, _>(|conn| {
            async move {
                match slot {
                    Slot::Player1 => {
                        diesel::update(dsl::matches.filter(dsl::id.eq(match_id)))
                            .set(dsl::player1_id.eq(participant))
                            .execute(conn)
                            .await
                            .map_err(map_db_err)?;
                    }
                    Slot::Player2 => {
                        diesel::update(dsl::matches.filter(dsl::id.eq(match_id)))
                            .set(dsl::player2_id.eq(participant))
                            .execute(conn)
                            .await
                            .map_err(map_db_err)?;
                    }
                }
                let row = dsl::matches
                    .filter(dsl::id.eq(match_id))
                    .first::<DbMatch>(conn)
                    .await
                    .map_err(map_db_err)?;
                if row.state == match_state_to_str(MatchState::Pending)
                    && row.player1_id.is_some()
                    && row.player2_id.is_some()
                {
                    diesel::update(dsl::matches.filter(dsl::id.eq(match_id)))
                        .set(dsl::state.eq(match_state_to_str(MatchState::Open)))
                        .execute(conn)
                        .await
                        .map_err(map_db_err)?;
                }
                let row = dsl::matches
                    .filter(dsl::id.eq(match_id))
                    .first::<DbMatch>(conn)
                    .await
                    .map_err(map_db_err)?;
                Match::try_from(row)
            }
            .scope_boxed()
        })
        .await
    }

    #[instrument(name = "db.match.mark_underway", skip(self))]
    async fn mark_underway(&self, match_id: MatchId) -> DbResult<Match> {
        use crate::schema::matches::dsl;
        let mut conn = self.new_connection().await?;
        let updated = diesel::update(
            dsl::matches
                .filter(dsl::id.eq(match_id))
                .filter(dsl::state.eq(match_state_to_str(MatchState::Open))),
        )
        .set((dsl::state.eq(match_state_to_str(MatchState::Underway)), dsl::underway_at.eq(Utc::now())))
        .execute(&mut conn)
        .await
        .map_err(map_db_err)?;
        if updated == 0 {
            warn!("mark_underway_no_rows");
            return Err(DbError::CheckViolation(Some("match not open".into())));
        }
        self.get_match(match_id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(name = "db.match.unmark_underway", skip(self))]
    async fn unmark_underway(&self, match_id: MatchId) -> DbResult<Match> {
        use crate::schema::matches::dsl;
        let mut conn = self.new_connection().await?;
        let updated = diesel::update(
            dsl::matches
                .filter(dsl::id.eq(match_id))
                .filter(dsl::state.eq(match_state_to_str(MatchState::Underway))),
        )
        .set((dsl::state.eq(match_state_to_str(MatchState::Open)), dsl::underway_at.eq(None::<chrono::DateTime<Utc>>)))
        .execute(&mut conn)
        .await
        .map_err(map_db_err)?;
        if updated == 0 {
            return Err(DbError::CheckViolation(Some("match not underway".into())));
        }
        self.get_match(match_id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(name = "db.match.set_winner", skip(self, scores))]
    async fn set_winner(&self, match_id: MatchId, winner_id: ParticipantId, scores: MatchScores) -> DbResult<AdvancementOutcome> {
        let mut conn = self.new_connection().await?;
        conn.transaction::<_, DbError, _>(|conn| {
            async move {
                let row = matches::table
                    .filter(matches::id.eq(match_id))
                    .first::<DbMatch>(conn)
                    .await
                    .map_err(map_db_err)?;
                let current = Match::try_from(row)?;
                if Some(winner_id) != current.player1_id && Some(winner_id) != current.player2_id {
                    return Err(DbError::CheckViolation(Some("winner must be a participant in the match".into())));
                }
                let loser_id = current.other_player(winner_id);

                diesel::update(matches::table.filter(matches::id.eq(match_id)))
                    .set((
                        matches::winner_id.eq(winner_id),
                        matches::loser_id.eq(loser_id),
                        matches::score_p1.eq(scores.p1 as i32),
                        matches::score_p2.eq(scores.p2 as i32),
                        matches::score_csv.eq(scores.csv.clone()),
                        matches::state.eq(match_state_to_str(MatchState::Complete)),
                        matches::completed_at.eq(Utc::now()),
                        matches::station_id.eq(None::<StationId>),
                    ))
                    .execute(conn)
                    .await
                    .map_err(map_db_err)?;

                if let Some(station_id) = current.station_id {
                    diesel::update(stations::table.filter(stations::id.eq(station_id)))
                        .set(stations::current_match_id.eq(None::<MatchId>))
                        .execute(conn)
                        .await
                        .map_err(map_db_err)?;
                }

                let mutated_row = matches::table
                    .filter(matches::id.eq(match_id))
                    .first::<DbMatch>(conn)
                    .await
                    .map_err(map_db_err)?;
                let mutated = Match::try_from(mutated_row)?;

                let sibling_rows: Vec<DbMatch> = matches::table
                    .filter(matches::tournament_id.eq(mutated.tournament_id))
                    .filter(matches::id.ne(match_id))
                    .load(conn)
                    .await
                    .map_err(map_db_err)?;
                let mut siblings: Vec<Match> = sibling_rows
                    .into_iter()
                    .map(Match::try_from)
                    .collect::<Result<_, _>>()?;

                let advance_outcome = app_core::apply_result(&mutated, &mut siblings);
                for m in &siblings {
                    let w = WriteDbMatch::try_from(m)?;
                    diesel::update(matches::table.filter(matches::id.eq(m.id)))
                        .set(w)
                        .execute(conn)
                        .await
                        .map_err(map_db_err)?;
                }

                debug!(newly_opened = advance_outcome.newly_opened.len(), "advancement_applied");

                let _ = run_auto_assign_in_tx(conn, mutated.tournament_id).await?;

                let newly_opened = siblings
                    .iter()
                    .filter(|m| advance_outcome.newly_opened.contains(&m.id))
                    .cloned()
                    .collect();
                let newly_filled = siblings
                    .iter()
                    .filter(|m| advance_outcome.newly_filled.contains(&m.id))
                    .cloned()
                    .collect();

                Ok(AdvancementOutcome {
                    mutated,
                    newly_opened,
                    newly_filled,
                    freed_station: current.station_id,
                })
            }
            .scope_boxed()
        })
        .await
    }

    #[instrument(name = "db.match.complete_lobby", skip(self, placements))]
    async fn complete_lobby(&self, match_id: MatchId, placements: Vec<(ParticipantId, u32)>) -> DbResult<AdvancementOutcome> {
        let mut conn = self.new_connection().await?;
        conn.transaction::<_, DbError, _>(|conn| {
            async move {
                let row = matches::table
                    .filter(matches::id.eq(match_id))
                    .first::<DbMatch>(conn)
                    .await
                    .map_err(map_db_err)?;
                let mut current = Match::try_from(row)?;
                let station_id = current.station_id;

                app_core::complete_lobby(&mut current, placements)
                    .map_err(|e| DbError::CheckViolation(Some(e.to_string())))?;

                let w = WriteDbMatch::try_from(&current)?;
                diesel::update(matches::table.filter(matches::id.eq(match_id)))
                    .set(w)
                    .execute(conn)
                    .await
                    .map_err(map_db_err)?;

                if let Some(station_id) = station_id {
                    diesel::update(stations::table.filter(stations::id.eq(station_id)))
                        .set(stations::current_match_id.eq(None::<MatchId>))
                        .execute(conn)
                        .await
                        .map_err(map_db_err)?;
                }

                let mutated_row = matches::table
                    .filter(matches::id.eq(match_id))
                    .first::<DbMatch>(conn)
                    .await
                    .map_err(map_db_err)?;
                let mutated = Match::try_from(mutated_row)?;

                let sibling_rows: Vec<DbMatch> = matches::table
                    .filter(matches::tournament_id.eq(mutated.tournament_id))
                    .filter(matches::id.ne(match_id))
                    .load(conn)
                    .await
                    .map_err(map_db_err)?;
                let mut siblings: Vec<Match> = sibling_rows
                    .into_iter()
                    .map(Match::try_from)
                    .collect::<Result<_, _>>()?;

                let advance_outcome = app_core::apply_result(&mutated, &mut siblings);
                for m in &siblings {
                    let w = WriteDbMatch::try_from(m)?;
                    diesel::update(matches::table.filter(matches::id.eq(m.id)))
                        .set(w)
                        .execute(conn)
                        .await
                        .map_err(map_db_err)?;
                }

                debug!(newly_opened = advance_outcome.newly_opened.len(), "advancement_applied");

                let _ = run_auto_assign_in_tx(conn, mutated.tournament_id).await?;

                let newly_opened = siblings
                    .iter()
                    .filter(|m| advance_outcome.newly_opened.contains(&m.id))
                    .cloned()
                    .collect();
                let newly_filled = siblings
                    .iter()
                    .filter(|m| advance_outcome.newly_filled.contains(&m.id))
                    .cloned()
                    .collect();

                Ok(AdvancementOutcome {
                    mutated,
                    newly_opened,
                    newly_filled,
                    freed_station: station_id,
                })
            }
            .scope_boxed()
        })
        .await
    }

    #[instrument(name = "db.match.set_forfeit", skip(self))]
    async fn set_forfeit(&self, match_id: MatchId, forfeited_id: ParticipantId) -> DbResult<AdvancementOutcome> {
        let current = self.get_match(match_id).await?.ok_or(DbError::NotFound)?;
        let winner_id = current
            .other_player(forfeited_id)
            .ok_or_else(|| DbError::CheckViolation(Some("forfeited participant not in match".into())))?;
        let scores = if current.player1_id == Some(forfeited_id) {
            MatchScores { p1: 0, p2: current.scores.p2.max(1), csv: Some("forfeit".into()) }
        } else {
            MatchScores { p1: current.scores.p1.max(1), p2: 0, csv: Some("forfeit".into()) }
        };
        self.set_winner(match_id, winner_id, scores).await
    }

    #[instrument(name = "db.match.reopen", skip(self))]
    async fn reopen(&self, match_id: MatchId) -> DbResult<AdvancementOutcome> {
        let mut conn = self.new_connection().await?;
        conn.transaction::<_, DbError, _>(|conn| {
            async move {
                let row = matches::table
                    .filter(matches::id.eq(match_id))
                    .first::<DbMatch>(conn)
                    .await
                    .map_err(map_db_err)?;
                let current = Match::try_from(row)?;
                if current.state != MatchState::Complete {
                    return Err(DbError::CheckViolation(Some("match is not complete".into())));
                }

                let dependent_rows: Vec<DbMatch> = matches::table
                    .filter(matches::tournament_id.eq(current.tournament_id))
                    .filter(
                        matches::prereq_match_id_p1
                            .eq(match_id)
                            .or(matches::prereq_match_id_p2.eq(match_id)),
                    )
                    .load(conn)
                    .await
                    .map_err(map_db_err)?;
                let dependents: Vec<Match> = dependent_rows.into_iter().map(Match::try_from).collect::<Result<_, _>>()?;
                if dependents.iter().any(|m| m.state == MatchState::Complete) {
                    return Err(DbError::CheckViolation(Some(
                        "a direct dependent match is already complete".into(),
                    )));
                }

                let new_state = if current.player1_id.is_some() && current.player2_id.is_some() {
                    MatchState::Open
                } else {
                    MatchState::Pending
                };
                diesel::update(matches::table.filter(matches::id.eq(match_id)))
                    .set((
                        matches::winner_id.eq(None::<ParticipantId>),
                        matches::loser_id.eq(None::<ParticipantId>),
                        matches::score_p1.eq(0),
                        matches::score_p2.eq(0),
                        matches::score_csv.eq(None::<String>),
                        matches::completed_at.eq(None::<chrono::DateTime<Utc>>),
                        matches::state.eq(match_state_to_str(new_state)),
                    ))
                    .execute(conn)
                    .await
                    .map_err(map_db_err)?;
                let reopened_row = matches::table
                    .filter(matches::id.eq(match_id))
                    .first::<DbMatch>(conn)
                    .await
                    .map_err(map_db_err)?;
                let reopened = Match::try_from(reopened_row)?;

                let sibling_rows: Vec<DbMatch> = matches::table
                    .filter(matches::tournament_id.eq(reopened.tournament_id))
                    .filter(matches::id.ne(match_id))
                    .load(conn)
                    .await
                    .map_err(map_db_err)?;
                let mut siblings: Vec<Match> = sibling_rows.into_iter().map(Match::try_from).collect::<Result<_, _>>()?;
                let cleared_ids = app_core::undo_result(&reopened, &mut siblings);
                for m in &siblings {
                    let w = WriteDbMatch::try_from(m)?;
                    diesel::update(matches::table.filter(matches::id.eq(m.id)))
                        .set(w)
                        .execute(conn)
                        .await
                        .map_err(map_db_err)?;
                }
                let newly_filled = siblings.iter().filter(|m| cleared_ids.contains(&m.id)).cloned().collect();

                Ok(AdvancementOutcome {
                    mutated: reopened,
                    newly_opened: Vec::new(),
                    newly_filled,
                    freed_station: None,
                })
            }
            .scope_boxed()
        })
        .await
    }
}

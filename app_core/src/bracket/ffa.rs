//! Free-for-all (spec §4.1): each round splits participants into lobbies of
//! configurable `maxSize`; a completed lobby's placement list maps to points
//! through a configurable points system. Round N opens only when every
//! round N-1 lobby is complete.
//!
//! A lobby is represented as a [`Match`] with `lobby_participants` holding
//! the full roster (`player1_id`/`player2_id` mirror the first two entries
//! so the two-slot invariants still mean something for tooling that only
//! knows about pairwise matches) and `placements` set once it completes.

use super::error::{BracketError, BracketResult};
use super::types::{GenerateResult, GenerationStats, RoundAdvance, SeedAssignment};
use crate::model::{FormatOptions, Match, MatchScores, MatchState, Participant, ParticipantId, PointsSystem};
use uuid::Uuid;

pub fn generate_round_one(participants: &[Participant], options: &FormatOptions) -> BracketResult<GenerateResult> {
    let lobby_size = options.lobby_max_size.unwrap_or(8).max(2) as usize;
    let ids: Vec<ParticipantId> = participants.iter().map(|p| p.id).collect();
    let matches = build_round(&ids, 1, lobby_size);

    let seeding = participants
        .iter()
        .enumerate()
        .map(|(i, p)| SeedAssignment {
            participant_id: p.id,
            seed: p.seed.unwrap_or(i as u32 + 1),
        })
        .collect();

    Ok(GenerateResult {
        matches,
        seeding,
        stats: GenerationStats {
            rounds: 1,
            bye_count: 0,
            bracket_size: participants.len() as u32,
        },
    })
}

/// Builds the next round's lobbies once every lobby in the prior round is
/// complete; the caller (coordinator) decides the participant list for the
/// new round (everyone, by default — free-for-all has no elimination).
pub fn generate_next_round(participants: &[ParticipantId], round: i32, lobby_size: usize) -> Vec<Match> {
    build_round(participants, round, lobby_size)
}

fn build_round(participants: &[ParticipantId], round: i32, lobby_size: usize) -> Vec<Match> {
    participants
        .chunks(lobby_size)
        .enumerate()
        .map(|(i, chunk)| {
            let roster = chunk.to_vec();
            Match {
                id: Uuid::new_v4(),
                tournament_id: Uuid::nil(),
                identifier: format!("FFA{round}-{}", i + 1),
                round,
                bracket_position: i as u32,
                is_losers_bracket: false,
                player1_id: roster.first().copied(),
                player2_id: roster.get(1).copied(),
                prereq_match_id_p1: None,
                prereq_match_id_p2: None,
                is_prereq_loser_p1: false,
                is_prereq_loser_p2: false,
                suggested_play_order: Some(i as u32),
                scores: MatchScores::default(),
                winner_id: None,
                loser_id: None,
                state: MatchState::Open,
                underway_at: None,
                completed_at: None,
                is_bye: false,
                is_grand_finals: false,
                is_grand_finals_reset: false,
                is_conditional: false,
                station_id: None,
                lobby_participants: roster,
                placements: Vec::new(),
            }
        })
        .collect()
}

/// Completes a lobby: records `placements` (1-based, one entry per roster
/// member, no gaps) and derives `winner_id`/`loser_id` from placement 1 and
/// last so the generic §3 invariants stay meaningful.
pub fn complete_lobby(lobby: &mut Match, placements: Vec<(ParticipantId, u32)>) -> BracketResult<()> {
    if placements.len() != lobby.lobby_participants.len() {
        return Err(BracketError::BadInput(
            "placement list must cover every lobby participant".into(),
        ));
    }
    let winner = placements.iter().min_by_key(|(_, rank)| *rank).map(|(p, _)| *p);
    let loser = placements.iter().max_by_key(|(_, rank)| *rank).map(|(p, _)| *p);
    lobby.placements = placements;
    lobby.winner_id = winner;
    lobby.loser_id = loser;
    lobby.state = MatchState::Complete;
    lobby.completed_at = Some(chrono::Utc::now());
    Ok(())
}

/// Generates the next round's lobbies once every lobby in the current round
/// is complete, or reports the tournament is done once `ffa_rounds`
/// (default 1, spec §4.1 names no fixed count) has been played. Every
/// participant carries forward into the next round regardless of placement
/// — free-for-all has no elimination (spec §4.1).
pub fn advance(matches: &[Match], participants: &[Participant], options: &FormatOptions) -> RoundAdvance {
    let Some(current_round) = matches.iter().map(|m| m.round).max() else {
        return RoundAdvance::NotReady;
    };
    let round_complete = matches
        .iter()
        .filter(|m| m.round == current_round)
        .all(|m| m.state == MatchState::Complete);
    if !round_complete {
        return RoundAdvance::NotReady;
    }

    let total_rounds = options.ffa_rounds.unwrap_or(1).max(1);
    if current_round as u32 >= total_rounds {
        return RoundAdvance::TournamentComplete;
    }

    let lobby_size = options.lobby_max_size.unwrap_or(8).max(2) as usize;
    let ids: Vec<ParticipantId> = participants.iter().map(|p| p.id).collect();
    RoundAdvance::NextRound(generate_next_round(&ids, current_round + 1, lobby_size))
}

/// Points awarded for `rank` (1-based) out of `lobby_size`, per
/// [`PointsSystem`] (spec §4.1 free-for-all).
pub fn points_for_rank(system: PointsSystem, rank: u32, lobby_size: u32) -> f64 {
    match system {
        PointsSystem::F1Style => {
            const F1_TABLE: [f64; 10] = [25.0, 18.0, 15.0, 12.0, 10.0, 8.0, 6.0, 4.0, 2.0, 1.0];
            F1_TABLE.get(rank.saturating_sub(1) as usize).copied().unwrap_or(0.0)
        }
        PointsSystem::Linear => (lobby_size as f64 - rank as f64 + 1.0).max(0.0),
        PointsSystem::WinnerTakeAll => {
            if rank == 1 {
                1.0
            } else {
                0.0
            }
        }
    }
}

/// One participant's aggregated free-for-all standing across every
/// completed lobby they played in (spec §4.1: "standings sort by total
/// points, wins, podiums, average placement, best placement").
#[derive(Debug, Clone, Copy, Default)]
pub struct FfaStanding {
    pub participant_id: ParticipantId,
    pub total_points: f64,
    pub wins: u32,
    pub podiums: u32,
    pub placement_sum: u32,
    pub lobbies_played: u32,
    pub best_placement: u32,
}

impl FfaStanding {
    pub fn average_placement(&self) -> f64 {
        if self.lobbies_played == 0 {
            return f64::MAX;
        }
        self.placement_sum as f64 / self.lobbies_played as f64
    }
}

/// Folds every completed lobby's placements into per-participant standings.
pub fn compute_standings(matches: &[Match], system: PointsSystem) -> Vec<FfaStanding> {
    use std::collections::HashMap;
    let mut by_participant: HashMap<ParticipantId, FfaStanding> = HashMap::new();
    for m in matches.iter().filter(|m| m.state == MatchState::Complete) {
        let lobby_size = m.lobby_participants.len() as u32;
        for &(participant_id, rank) in &m.placements {
            let entry = by_participant.entry(participant_id).or_insert(FfaStanding {
                participant_id,
                best_placement: u32::MAX,
                ..Default::default()
            });
            entry.total_points += points_for_rank(system, rank, lobby_size);
            entry.lobbies_played += 1;
            entry.placement_sum += rank;
            entry.best_placement = entry.best_placement.min(rank);
            if rank == 1 {
                entry.wins += 1;
            }
            if rank <= 3 {
                entry.podiums += 1;
            }
        }
    }
    let mut out: Vec<FfaStanding> = by_participant.into_values().collect();
    out.sort_by(|a, b| {
        b.total_points
            .partial_cmp(&a.total_points)
            .unwrap()
            .then(b.wins.cmp(&a.wins))
            .then(b.podiums.cmp(&a.podiums))
            .then(a.average_placement().partial_cmp(&b.average_placement()).unwrap())
            .then(a.best_placement.cmp(&b.best_placement))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TournamentId;

    fn participants(n: usize) -> Vec<Participant> {
        let tid: TournamentId = Uuid::new_v4();
        (0..n).map(|i| Participant::new(tid, format!("p{i}"))).collect()
    }

    #[test]
    fn given_ten_players_lobby_four_when_round_one_then_three_lobbies() {
        let opts = FormatOptions {
            lobby_max_size: Some(4),
            ..Default::default()
        };
        let result = generate_round_one(&participants(10), &opts).unwrap();
        assert_eq!(result.matches.len(), 3);
        assert_eq!(result.matches[0].lobby_participants.len(), 4);
        assert_eq!(result.matches[2].lobby_participants.len(), 2);
    }

    #[test]
    fn complete_lobby_sets_winner_to_rank_one() {
        let opts = FormatOptions {
            lobby_max_size: Some(4),
            ..Default::default()
        };
        let mut result = generate_round_one(&participants(4), &opts).unwrap();
        let lobby = &mut result.matches[0];
        let roster = lobby.lobby_participants.clone();
        let placements = roster.iter().enumerate().map(|(i, &p)| (p, i as u32 + 1)).collect();
        complete_lobby(lobby, placements).unwrap();
        assert_eq!(lobby.winner_id, Some(roster[0]));
        assert_eq!(lobby.state, MatchState::Complete);
    }

    #[test]
    fn f1_points_reward_first_place_most() {
        assert_eq!(points_for_rank(PointsSystem::F1Style, 1, 10), 25.0);
        assert_eq!(points_for_rank(PointsSystem::WinnerTakeAll, 2, 10), 0.0);
        assert_eq!(points_for_rank(PointsSystem::Linear, 1, 4), 4.0);
    }

    #[test]
    fn standings_rank_by_total_points_then_wins() {
        let opts = FormatOptions {
            lobby_max_size: Some(4),
            ..Default::default()
        };
        let mut result = generate_round_one(&participants(4), &opts).unwrap();
        let lobby = &mut result.matches[0];
        let roster = lobby.lobby_participants.clone();
        let placements = roster.iter().enumerate().map(|(i, &p)| (p, i as u32 + 1)).collect();
        complete_lobby(lobby, placements).unwrap();
        let standings = compute_standings(&result.matches, PointsSystem::F1Style);
        assert_eq!(standings[0].participant_id, roster[0]);
        assert!(standings[0].total_points > standings[1].total_points);
    }

    #[test]
    fn given_single_round_config_when_lobby_completes_then_tournament_complete() {
        let ps = participants(4);
        let opts = FormatOptions {
            lobby_max_size: Some(4),
            ..Default::default()
        };
        let mut result = generate_round_one(&ps, &opts).unwrap();
        let roster = result.matches[0].lobby_participants.clone();
        let placements = roster.iter().enumerate().map(|(i, &p)| (p, i as u32 + 1)).collect();
        complete_lobby(&mut result.matches[0], placements).unwrap();
        assert!(matches!(advance(&result.matches, &ps, &opts), RoundAdvance::TournamentComplete));
    }

    #[test]
    fn given_two_round_config_when_round_one_completes_then_next_round_built() {
        let ps = participants(4);
        let opts = FormatOptions {
            lobby_max_size: Some(4),
            ffa_rounds: Some(2),
            ..Default::default()
        };
        let mut result = generate_round_one(&ps, &opts).unwrap();
        let roster = result.matches[0].lobby_participants.clone();
        let placements = roster.iter().enumerate().map(|(i, &p)| (p, i as u32 + 1)).collect();
        complete_lobby(&mut result.matches[0], placements).unwrap();
        match advance(&result.matches, &ps, &opts) {
            RoundAdvance::NextRound(next) => {
                assert_eq!(next.len(), 1);
                assert_eq!(next[0].round, 2);
            }
            other => panic!("expected NextRound, got {other:?}"),
        }
    }
}

//! `calculateFinalRanks` (spec §4.1): deterministic tie-breaking per format.
//! Elimination formats derive ranks from bracket structure (how far a
//! participant got); round-robin/Swiss apply the documented tiebreaker
//! chain; free-for-all and leaderboard defer to their own standings.

use super::error::BracketResult;
use super::ffa;
use super::leaderboard::{self, LeaderboardEvent};
use super::swiss;
use super::types::RankedParticipant;
use crate::model::{Format, FormatOptions, Match, MatchState, Participant, ParticipantId, RankingType};
use std::collections::{HashMap, HashSet};

/// Computes final ranks for every participant. For the elimination formats
/// and round robin/Swiss this reads `matches`; free-for-all reads
/// `matches`' lobby placements; leaderboard reads `events` (there is no
/// match graph for it at all, spec §4.1).
pub fn calculate_final_ranks(
    format: Format,
    matches: &[Match],
    participants: &[Participant],
    options: &FormatOptions,
    events: &[LeaderboardEvent],
) -> BracketResult<Vec<RankedParticipant>> {
    let ranks = match format {
        Format::SingleElimination | Format::DoubleElimination | Format::TwoStage => {
            elimination_ranks(matches, participants)
        }
        Format::RoundRobin => round_robin_ranks(matches, participants),
        Format::Swiss => swiss_ranks(matches, participants, options),
        Format::FreeForAll => {
            let system = options.points_system.unwrap_or(crate::model::PointsSystem::F1Style);
            let standings = ffa::compute_standings(matches, system);
            standings
                .into_iter()
                .enumerate()
                .map(|(i, s)| RankedParticipant {
                    participant_id: s.participant_id,
                    rank: i as u32 + 1,
                    score: s.total_points,
                })
                .collect()
        }
        Format::Leaderboard => {
            let ranking_type = options.ranking_type.unwrap_or(RankingType::Points);
            let standings = leaderboard::compute_standings(
                events,
                ranking_type,
                options.decay_period_events,
                options.min_events_to_rank,
            );
            standings
                .into_iter()
                .enumerate()
                .map(|(i, s)| RankedParticipant {
                    participant_id: s.participant_id,
                    rank: i as u32 + 1,
                    score: s.score,
                })
                .collect()
        }
    };
    Ok(ranks)
}

/// Rank by the round a participant was eliminated in (later round = better
/// rank); participants who share an elimination round share a rank (spec S1:
/// "C=3, D=3" after a 4-player single-elim). The eventual champion (the
/// last match's winner) always ranks 1st.
fn elimination_ranks(matches: &[Match], participants: &[Participant]) -> Vec<RankedParticipant> {
    let mut last_round_survived: HashMap<ParticipantId, i32> = HashMap::new();
    let mut champion: Option<ParticipantId> = None;

    let final_like = matches
        .iter()
        .filter(|m| m.state == MatchState::Complete && (m.is_grand_finals || !m.is_conditional))
        .max_by_key(|m| m.round);
    if let Some(last) = final_like {
        champion = last.winner_id;
    }

    for m in matches.iter().filter(|m| m.state == MatchState::Complete) {
        if let Some(loser) = m.loser_id {
            let entry = last_round_survived.entry(loser).or_insert(i32::MIN);
            if m.round > *entry {
                *entry = m.round;
            }
        }
        if let Some(winner) = m.winner_id {
            let entry = last_round_survived.entry(winner).or_insert(i32::MIN);
            if m.round > *entry {
                *entry = m.round;
            }
        }
    }

    // participants who never played (shouldn't happen post-generation, but
    // keep the rank map total) sort last.
    for p in participants {
        last_round_survived.entry(p.id).or_insert(i32::MIN - 1);
    }

    let mut ordered: Vec<(ParticipantId, i32)> = last_round_survived.into_iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1));

    let mut out = Vec::with_capacity(ordered.len());
    let mut rank = 0u32;
    let mut prev_round: Option<i32> = None;
    for (i, (participant_id, round)) in ordered.into_iter().enumerate() {
        if prev_round != Some(round) {
            rank = i as u32 + 1;
            prev_round = Some(round);
        }
        let rank = if Some(participant_id) == champion { 1 } else { rank };
        out.push(RankedParticipant {
            participant_id,
            rank,
            score: -round as f64,
        });
    }
    out
}

#[derive(Debug, Clone, Copy, Default)]
struct RrRecord {
    match_wins: u32,
    game_wins: u32,
    points_scored: u32,
    points_against: u32,
}

/// Round-robin standings (spec §4.1 tiebreaker chain): match wins, then
/// game wins, then points scored, then point difference, then head-to-head
/// (only meaningful between exactly two tied participants), then Buchholz
/// (sum of opponents' match wins), then total wins (identical to match wins
/// here since round robin has no draws modelled beyond win/loss).
fn round_robin_ranks(matches: &[Match], participants: &[Participant]) -> Vec<RankedParticipant> {
    let completed: Vec<&Match> = matches.iter().filter(|m| m.state == MatchState::Complete).collect();
    let mut records: HashMap<ParticipantId, RrRecord> = HashMap::new();
    let mut head_to_head: HashMap<(ParticipantId, ParticipantId), i32> = HashMap::new();

    for p in participants {
        records.entry(p.id).or_default();
    }

    for m in &completed {
        let (Some(p1), Some(p2)) = (m.player1_id, m.player2_id) else {
            continue;
        };
        let r1 = records.entry(p1).or_default();
        r1.points_scored += m.scores.p1;
        r1.points_against += m.scores.p2;
        if m.scores.p1 > m.scores.p2 {
            r1.game_wins += 1;
        }
        let r2 = records.entry(p2).or_default();
        r2.points_scored += m.scores.p2;
        r2.points_against += m.scores.p1;
        if m.scores.p2 > m.scores.p1 {
            r2.game_wins += 1;
        }
        if let Some(winner) = m.winner_id {
            let loser = if winner == p1 { p2 } else { p1 };
            records.entry(winner).or_default().match_wins += 1;
            *head_to_head.entry((winner, loser)).or_insert(0) += 1;
            *head_to_head.entry((loser, winner)).or_insert(0) -= 1;
        }
    }

    let buchholz = |p: ParticipantId| -> u32 {
        completed
            .iter()
            .filter_map(|m| match (m.player1_id, m.player2_id) {
                (Some(a), Some(b)) if a == p => Some(b),
                (Some(a), Some(b)) if b == p => Some(a),
                _ => None,
            })
            .filter_map(|opp| records.get(&opp).map(|r| r.match_wins))
            .sum()
    };

    let mut ordered: Vec<ParticipantId> = records.keys().copied().collect();
    ordered.sort_by(|&a, &b| {
        let ra = records[&a];
        let rb = records[&b];
        rb.match_wins
            .cmp(&ra.match_wins)
            .then(rb.game_wins.cmp(&ra.game_wins))
            .then(rb.points_scored.cmp(&ra.points_scored))
            .then(
                (rb.points_scored as i64 - rb.points_against as i64)
                    .cmp(&(ra.points_scored as i64 - ra.points_against as i64)),
            )
            .then(
                head_to_head
                    .get(&(b, a))
                    .copied()
                    .unwrap_or(0)
                    .cmp(&head_to_head.get(&(a, b)).copied().unwrap_or(0)),
            )
            .then(buchholz(b).cmp(&buchholz(a)))
            .then(rb.match_wins.cmp(&ra.match_wins))
    });

    assign_dense_ranks(&ordered, |p| {
        let r = records[p];
        (r.match_wins, r.game_wins, r.points_scored, r.points_against)
    })
}

/// Swiss standings: score (win=1/draw=0.5/loss=0 by default, or the
/// tenant's configured `win_points`/`draw_points`), then Buchholz (sum of
/// opponents' scores). Dense ranks are assigned on score alone (ties with
/// different Buchholz still share a rank), matching round robin's handling
/// of the tiebreaker chain's final entries.
fn swiss_ranks(matches: &[Match], participants: &[Participant], options: &FormatOptions) -> Vec<RankedParticipant> {
    let standings = swiss::compute_standings(matches, participants, options);
    let ordered: Vec<ParticipantId> = standings.iter().map(|s| s.participant_id).collect();
    let scores: HashMap<ParticipantId, f64> = standings.iter().map(|s| (s.participant_id, s.score)).collect();
    assign_dense_ranks(&ordered, |p| ordered_float_key(scores[p]))
}

fn ordered_float_key(v: f64) -> (i64, i64, u32, u32) {
    ((v * 1000.0) as i64, 0, 0, 0)
}

/// Assigns 1-based ranks to an already fully-ordered list, giving identical
/// ranks to adjacent entries whose `key` compares equal (dense tie groups,
/// spec S1: "C=3, D=3").
fn assign_dense_ranks<K: PartialEq>(
    ordered: &[ParticipantId],
    key: impl Fn(&ParticipantId) -> K,
) -> Vec<RankedParticipant> {
    let mut out = Vec::with_capacity(ordered.len());
    let mut rank = 0u32;
    let mut prev_key: Option<K> = None;
    for (i, participant_id) in ordered.iter().enumerate() {
        let k = key(participant_id);
        if prev_key.as_ref() != Some(&k) {
            rank = i as u32 + 1;
        }
        out.push(RankedParticipant {
            participant_id: *participant_id,
            rank,
            score: 0.0,
        });
        prev_key = Some(k);
    }
    out
}

/// Participants with no recorded outcome fall back to last place, used by
/// callers that need a rank for a withdrawn/no-show entrant.
pub fn unplaced_rank(ranks: &[RankedParticipant]) -> u32 {
    ranks.iter().map(|r| r.rank).max().unwrap_or(0) + 1
}

#[allow(unused)]
fn distinct_participants(matches: &[Match]) -> HashSet<ParticipantId> {
    let mut set = HashSet::new();
    for m in matches {
        if let Some(p) = m.player1_id {
            set.insert(p);
        }
        if let Some(p) = m.player2_id {
            set.insert(p);
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket;
    use uuid::Uuid;

    fn participants(n: usize) -> Vec<Participant> {
        let tid = Uuid::new_v4();
        (0..n).map(|i| Participant::new(tid, format!("p{i}"))).collect()
    }

    #[test]
    fn single_elim_four_players_ranks_semifinal_losers_equal() {
        let ps = participants(4);
        let mut result = bracket::generate(Format::SingleElimination, &ps, &FormatOptions::default()).unwrap();

        // play round 1
        let round1: Vec<_> = result
            .matches
            .iter()
            .filter(|m| m.round == 1)
            .map(|m| m.id)
            .collect();
        for id in &round1 {
            let m = result.matches.iter_mut().find(|m| m.id == *id).unwrap();
            let winner = m.player1_id.unwrap();
            let loser = m.player2_id.unwrap();
            m.state = MatchState::Complete;
            m.winner_id = Some(winner);
            m.loser_id = Some(loser);
            let outcome = bracket::apply_result(&m.clone(), &mut result.matches);
            let _ = outcome;
        }
        let final_match = result.matches.iter_mut().find(|m| m.identifier == "F").unwrap();
        let winner = final_match.player1_id.unwrap();
        let loser = final_match.player2_id.unwrap();
        final_match.state = MatchState::Complete;
        final_match.winner_id = Some(winner);
        final_match.loser_id = Some(loser);

        let ranks =
            calculate_final_ranks(Format::SingleElimination, &result.matches, &ps, &FormatOptions::default(), &[])
                .unwrap();
        let champion_rank = ranks.iter().find(|r| r.participant_id == winner).unwrap().rank;
        assert_eq!(champion_rank, 1);
        let semis_losers: Vec<u32> = ranks
            .iter()
            .filter(|r| r.participant_id != winner && r.participant_id != loser)
            .map(|r| r.rank)
            .collect();
        assert_eq!(semis_losers[0], semis_losers[1]);
    }
}

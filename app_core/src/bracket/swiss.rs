//! Swiss system (spec §4.1): round 1 pairs the top half against the bottom
//! half by seed; later rounds group participants by running score and pair
//! within score groups, avoiding rematches where a same-group pairing would
//! force one.

use super::error::BracketResult;
use super::types::{GenerateResult, GenerationStats, RoundAdvance, SeedAssignment};
use crate::model::{FormatOptions, Match, MatchScores, MatchState, Participant, ParticipantId};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

pub fn generate_round_one(participants: &[Participant], options: &FormatOptions) -> BracketResult<GenerateResult> {
    let mut ranked: Vec<(u32, ParticipantId)> = participants
        .iter()
        .enumerate()
        .map(|(i, p)| (p.seed.unwrap_or(i as u32 + 1), p.id))
        .collect();
    ranked.sort_by_key(|(seed, _)| *seed);
    let ids: Vec<ParticipantId> = ranked.iter().map(|(_, id)| *id).collect();

    let half = ids.len() / 2;
    let (top, bottom) = ids.split_at(half);
    let mut matches = Vec::new();
    for (i, (a, b)) in top.iter().zip(bottom.iter()).enumerate() {
        matches.push(open_match(*a, *b, 1, i as u32));
    }
    if ids.len() % 2 == 1 {
        // odd field: the median seed gets a round-1 bye (free win, no game)
        let odd_one = ids[half];
        let mut bye = open_match(odd_one, odd_one, 1, top.len() as u32);
        bye.player2_id = None;
        bye.is_bye = true;
        bye.state = MatchState::Complete;
        bye.winner_id = Some(odd_one);
        bye.completed_at = Some(chrono::Utc::now());
        bye.suggested_play_order = None;
        matches.push(bye);
    }

    let seeding = ranked
        .into_iter()
        .map(|(seed, participant_id)| SeedAssignment { participant_id, seed })
        .collect();

    let total_rounds = options
        .swiss_rounds
        .unwrap_or_else(|| (ids.len() as f64).log2().ceil() as u32)
        .max(1);

    Ok(GenerateResult {
        matches,
        seeding,
        stats: GenerationStats {
            rounds: total_rounds,
            bye_count: (ids.len() % 2) as u32,
            bracket_size: ids.len() as u32,
        },
    })
}

fn open_match(p1: ParticipantId, p2: ParticipantId, round: i32, position: u32) -> Match {
    Match {
        id: Uuid::new_v4(),
        tournament_id: Uuid::nil(),
        identifier: format!("SW{round}-{}", position + 1),
        round,
        bracket_position: position,
        is_losers_bracket: false,
        player1_id: Some(p1),
        player2_id: Some(p2),
        prereq_match_id_p1: None,
        prereq_match_id_p2: None,
        is_prereq_loser_p1: false,
        is_prereq_loser_p2: false,
        suggested_play_order: Some(position),
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
        lobby_participants: Vec::new(),
        placements: Vec::new(),
    }
}

/// A participant's running Swiss standing, computed by the caller from
/// completed matches (this module has no store access of its own).
#[derive(Debug, Clone, Copy)]
pub struct SwissStanding {
    pub participant_id: ParticipantId,
    pub score: f64,
}

/// Pairs `standings` (already sorted best-first by the caller) for the next
/// round: players are grouped by identical score, paired within the group
/// top-vs-bottom, and bumped down to the next group on a rematch collision
/// against `history` (pairs that already played).
pub fn pair_next_round(
    standings: &[SwissStanding],
    history: &HashSet<(ParticipantId, ParticipantId)>,
    round: i32,
) -> Vec<Match> {
    let mut remaining: Vec<ParticipantId> = standings.iter().map(|s| s.participant_id).collect();
    let mut matches = Vec::new();
    let mut position = 0u32;

    while remaining.len() > 1 {
        let a = remaining.remove(0);
        let mut opponent_idx = 0;
        while opponent_idx < remaining.len() && played(a, remaining[opponent_idx], history) {
            opponent_idx += 1;
        }
        if opponent_idx == remaining.len() {
            opponent_idx = 0; // every remaining option is a rematch; accept one
        }
        let b = remaining.remove(opponent_idx);
        matches.push(open_match(a, b, round, position));
        position += 1;
    }
    if let Some(&last) = remaining.first() {
        let mut bye = open_match(last, last, round, position);
        bye.player2_id = None;
        bye.is_bye = true;
        bye.state = MatchState::Complete;
        bye.winner_id = Some(last);
        bye.completed_at = Some(chrono::Utc::now());
        bye.suggested_play_order = None;
        matches.push(bye);
    }
    matches
}

fn played(a: ParticipantId, b: ParticipantId, history: &HashSet<(ParticipantId, ParticipantId)>) -> bool {
    history.contains(&(a, b)) || history.contains(&(b, a))
}

/// Running score (win=`win_points`/draw=`draw_points`/loss=0) plus Buchholz
/// tiebreak (sum of opponents' scores), best-first. Shared by
/// `ranks::calculate_final_ranks` and `advance`'s next-round pairing so both
/// see the same ordering.
pub fn compute_standings(matches: &[Match], participants: &[Participant], options: &FormatOptions) -> Vec<SwissStanding> {
    let win_points = options.win_points.unwrap_or(1.0);
    let draw_points = options.draw_points.unwrap_or(0.5);
    let completed: Vec<&Match> = matches.iter().filter(|m| m.state == MatchState::Complete).collect();

    let mut scores: HashMap<ParticipantId, f64> = HashMap::new();
    let mut opponents: HashMap<ParticipantId, Vec<ParticipantId>> = HashMap::new();
    for p in participants {
        scores.entry(p.id).or_insert(0.0);
    }

    for m in &completed {
        if m.is_bye {
            if let Some(winner) = m.winner_id {
                *scores.entry(winner).or_insert(0.0) += win_points;
            }
            continue;
        }
        let (Some(p1), Some(p2)) = (m.player1_id, m.player2_id) else {
            continue;
        };
        opponents.entry(p1).or_default().push(p2);
        opponents.entry(p2).or_default().push(p1);
        match m.winner_id {
            Some(w) if w == p1 => *scores.entry(p1).or_insert(0.0) += win_points,
            Some(w) if w == p2 => *scores.entry(p2).or_insert(0.0) += win_points,
            _ => {
                *scores.entry(p1).or_insert(0.0) += draw_points;
                *scores.entry(p2).or_insert(0.0) += draw_points;
            }
        }
    }

    let buchholz = |p: &ParticipantId| -> f64 {
        opponents
            .get(p)
            .map(|opps| opps.iter().filter_map(|o| scores.get(o)).sum())
            .unwrap_or(0.0)
    };

    let mut out: Vec<SwissStanding> = scores
        .iter()
        .map(|(&participant_id, &score)| SwissStanding { participant_id, score })
        .collect();
    out.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap()
            .then(buchholz(&b.participant_id).partial_cmp(&buchholz(&a.participant_id)).unwrap())
    });
    out
}

/// Generates the next round once every match in the current round is
/// complete, or reports the tournament is done once `total_rounds` (explicit
/// `swiss_rounds`, or `ceil(log2(n))` by default) has been played.
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

    let total_rounds = options
        .swiss_rounds
        .unwrap_or_else(|| (participants.len() as f64).log2().ceil() as u32)
        .max(1);
    if current_round as u32 >= total_rounds {
        return RoundAdvance::TournamentComplete;
    }

    let standings = compute_standings(matches, participants, options);
    let mut history: HashSet<(ParticipantId, ParticipantId)> = HashSet::new();
    for m in matches {
        if let (Some(p1), Some(p2)) = (m.player1_id, m.player2_id) {
            if p1 != p2 {
                history.insert((p1, p2));
            }
        }
    }
    RoundAdvance::NextRound(pair_next_round(&standings, &history, current_round + 1))
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
    fn given_eight_participants_when_round_one_then_top_half_meets_bottom_half() {
        let result = generate_round_one(&participants(8), &FormatOptions::default()).unwrap();
        assert_eq!(result.matches.len(), 4);
        assert!(result.matches.iter().all(|m| m.state == MatchState::Open));
    }

    #[test]
    fn given_odd_participants_when_round_one_then_median_seed_gets_bye() {
        let result = generate_round_one(&participants(7), &FormatOptions::default()).unwrap();
        assert_eq!(result.matches.iter().filter(|m| m.is_bye).count(), 1);
    }

    #[test]
    fn pair_next_round_avoids_rematch_when_possible() {
        let tid = uuid::Uuid::new_v4();
        let p: Vec<ParticipantId> = (0..4).map(|_| Uuid::new_v4()).collect();
        let _ = tid;
        let standings: Vec<SwissStanding> = p
            .iter()
            .map(|&id| SwissStanding { participant_id: id, score: 1.0 })
            .collect();
        let mut history = HashSet::new();
        history.insert((p[0], p[1]));
        let matches = pair_next_round(&standings, &history, 2);
        assert!(matches
            .iter()
            .all(|m| !(m.player1_id == Some(p[0]) && m.player2_id == Some(p[1]))));
    }

    #[test]
    fn given_round_incomplete_when_advance_then_not_ready() {
        let ps = participants(4);
        let opts = FormatOptions {
            swiss_rounds: Some(2),
            ..Default::default()
        };
        let result = generate_round_one(&ps, &opts).unwrap();
        assert!(matches!(advance(&result.matches, &ps, &opts), RoundAdvance::NotReady));
    }

    #[test]
    fn given_round_complete_and_more_rounds_left_when_advance_then_next_round() {
        let ps = participants(4);
        let opts = FormatOptions {
            swiss_rounds: Some(2),
            ..Default::default()
        };
        let mut result = generate_round_one(&ps, &opts).unwrap();
        for m in result.matches.iter_mut() {
            let winner = m.player1_id.unwrap();
            m.state = MatchState::Complete;
            m.winner_id = Some(winner);
            m.loser_id = m.player2_id;
        }
        match advance(&result.matches, &ps, &opts) {
            RoundAdvance::NextRound(next) => {
                assert_eq!(next.len(), 2);
                assert!(next.iter().all(|m| m.round == 2));
            }
            other => panic!("expected NextRound, got {other:?}"),
        }
    }

    #[test]
    fn given_final_round_complete_when_advance_then_tournament_complete() {
        let ps = participants(4);
        let opts = FormatOptions {
            swiss_rounds: Some(1),
            ..Default::default()
        };
        let mut result = generate_round_one(&ps, &opts).unwrap();
        for m in result.matches.iter_mut() {
            let winner = m.player1_id.unwrap();
            m.state = MatchState::Complete;
            m.winner_id = Some(winner);
            m.loser_id = m.player2_id;
        }
        assert!(matches!(advance(&result.matches, &ps, &opts), RoundAdvance::TournamentComplete));
    }
}

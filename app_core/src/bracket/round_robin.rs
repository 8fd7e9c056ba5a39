//! Round robin (spec §4.1): circle method, virtual bye for an odd field,
//! `rr_iterations` repeats of the full cycle.

use super::error::BracketResult;
use super::types::{GenerateResult, GenerationStats, SeedAssignment};
use crate::model::{FormatOptions, Match, MatchScores, MatchState, Participant, ParticipantId};
use uuid::Uuid;

pub fn generate(participants: &[Participant], options: &FormatOptions) -> BracketResult<GenerateResult> {
    let iterations = options.rr_iterations.unwrap_or(1).max(1);
    let mut ids: Vec<Option<ParticipantId>> = participants.iter().map(|p| Some(p.id)).collect();
    if ids.len() % 2 == 1 {
        ids.push(None); // virtual bye: whoever is paired with it sits out the round
    }
    let n = ids.len();
    let rounds_per_cycle = n - 1;

    let mut matches = Vec::new();
    let mut play_order = 0u32;
    let mut round_counter = 1i32;

    for _cycle in 0..iterations {
        let mut arr: Vec<Option<ParticipantId>> = ids.clone();
        for _ in 0..rounds_per_cycle {
            let pairings: Vec<(Option<ParticipantId>, Option<ParticipantId>)> =
                (0..n / 2).map(|i| (arr[i], arr[n - 1 - i])).collect();
            for (a, b) in pairings {
                let (Some(p1), Some(p2)) = (a, b) else {
                    continue; // one side is the virtual bye: nobody sits idle with a match row
                };
                matches.push(Match {
                    id: Uuid::new_v4(),
                    tournament_id: Uuid::nil(),
                    identifier: format!("R{round_counter}-{}", play_order + 1),
                    round: round_counter,
                    bracket_position: play_order,
                    is_losers_bracket: false,
                    player1_id: Some(p1),
                    player2_id: Some(p2),
                    prereq_match_id_p1: None,
                    prereq_match_id_p2: None,
                    is_prereq_loser_p1: false,
                    is_prereq_loser_p2: false,
                    suggested_play_order: Some(play_order),
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
                });
                play_order += 1;
            }
            round_counter += 1;
            // rotate: position 0 stays fixed, the rest shift by one
            let last = arr.pop().unwrap();
            arr.insert(1, last);
        }
    }

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
            rounds: (rounds_per_cycle as u32) * iterations,
            bye_count: 0,
            bracket_size: participants.len() as u32,
        },
    })
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
    fn given_four_participants_when_generated_then_every_pair_meets_once() {
        let result = generate(&participants(4), &FormatOptions::default()).unwrap();
        assert_eq!(result.matches.len(), 6); // C(4,2)
    }

    #[test]
    fn given_odd_participants_when_generated_then_one_sits_out_each_round() {
        let result = generate(&participants(5), &FormatOptions::default()).unwrap();
        // each round has floor(5/2) = 2 matches, across 5 rounds = 10
        assert_eq!(result.matches.len(), 10);
    }

    #[test]
    fn rr_iterations_multiplies_total_matches() {
        let opts = FormatOptions {
            rr_iterations: Some(2),
            ..Default::default()
        };
        let result = generate(&participants(4), &opts).unwrap();
        assert_eq!(result.matches.len(), 12);
    }
}

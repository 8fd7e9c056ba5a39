//! Single elimination (spec §4.1): recursive-interleave seeding, four bye
//! placement strategies, optional compact (play-in) bracket, optional
//! third-place match.

use super::error::{BracketError, BracketResult};
use super::seeding::{self, SeedPair};
use super::types::{GenerateResult, GenerationStats, SeedAssignment};
use crate::model::{
    ByePlacement, FormatOptions, Match, MatchScores, MatchState, Participant, ParticipantId, SeedOrder,
};
use uuid::Uuid;

pub fn generate(participants: &[Participant], options: &FormatOptions) -> BracketResult<GenerateResult> {
    let ranked = seeded_participants(participants);
    build(&ranked, options, false)
}

/// Shared by single and double elimination: assigns seed numbers, then
/// builds the winners-bracket round structure. `is_losers_origin` tags every
/// produced match's `is_losers_bracket` flag (always false from here; double
/// elimination flips it for its own losers-side matches after calling in).
pub(super) fn build(
    ranked: &[(u32, ParticipantId)],
    options: &FormatOptions,
    compact_requested_by_caller: bool,
) -> BracketResult<GenerateResult> {
    let n = ranked.len();
    let order_fn: fn(usize) -> Vec<u32> = match options.seed_order.unwrap_or(SeedOrder::Standard) {
        SeedOrder::Standard => seeding::standard_seed_order,
        SeedOrder::Sequential => seeding::sequential_seed_order,
    };
    let placement = options.bye_placement.unwrap_or(ByePlacement::Traditional);
    let compact = options.compact_bracket.unwrap_or(false) || compact_requested_by_caller;
    let third_place = options.third_place_match.unwrap_or(false);

    let size = seeding::next_power_of_two(n);
    let pairs = seeding::seed_pairs(n, order_fn, placement);
    let bye_count = size - n;
    let rounds = size.trailing_zeros();

    let seed_of: std::collections::HashMap<u32, ParticipantId> = ranked.iter().map(|(s, p)| (*s, *p)).collect();

    let mut matches: Vec<Match> = Vec::new();
    let mut play_order: u32 = 0;

    // round 1, possibly preceded by play-in (round 0) matches when compact.
    let mut round1_slots: Vec<RoundSlot> = Vec::with_capacity(pairs.len());
    if compact && bye_count > 0 {
        // pair the `bye_count` weakest real seeds against each other in
        // round-0 play-ins; their winners fill the slots that would
        // otherwise have held a walkover bye.
        let weakest: Vec<u32> = {
            let mut reals: Vec<u32> = (1..=n as u32).collect();
            reals.sort_by(|a, b| b.cmp(a));
            reals.into_iter().take(bye_count * 2).collect()
        };
        let mut play_in_for_seed: std::collections::HashMap<u32, Uuid> = std::collections::HashMap::new();
        for chunk in weakest.chunks(2) {
            if chunk.len() < 2 {
                continue;
            }
            let (a, b) = (chunk[0], chunk[1]);
            let m = Match {
                id: Uuid::new_v4(),
                tournament_id: Uuid::nil(),
                identifier: format!("PI{}", play_order + 1),
                round: 0,
                bracket_position: play_order,
                is_losers_bracket: false,
                player1_id: seed_of.get(&a).copied(),
                player2_id: seed_of.get(&b).copied(),
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
            };
            play_in_for_seed.insert(a, m.id);
            play_in_for_seed.insert(b, m.id);
            play_order += 1;
            matches.push(m);
        }

        for SeedPair { hi, lo } in &pairs {
            let is_bye = *lo as usize > n;
            if is_bye {
                let id = play_in_for_seed.get(lo).copied();
                round1_slots.push(RoundSlot::new(seed_of.get(hi).copied(), None, false, id));
            } else {
                round1_slots.push(RoundSlot::new(
                    seed_of.get(hi).copied(),
                    seed_of.get(lo).copied(),
                    false,
                    None,
                ));
            }
        }
    } else {
        for SeedPair { hi, lo } in &pairs {
            let is_bye = *lo as usize > n;
            let second = if is_bye { None } else { seed_of.get(lo).copied() };
            round1_slots.push(RoundSlot::new(seed_of.get(hi).copied(), second, is_bye, None));
        }
    }

    // materialize round 1
    let mut prev_round_ids: Vec<Uuid> = Vec::with_capacity(round1_slots.len());
    for (i, slot) in round1_slots.iter().enumerate() {
        let is_bye = slot.is_bye_via_direct;
        let (state, winner, completed_at, suggested) = if is_bye {
            (MatchState::Complete, slot.direct, Some(chrono::Utc::now()), None)
        } else if slot.prereq.is_some() {
            (MatchState::Pending, None, None, Some(play_order))
        } else {
            (MatchState::Open, None, None, Some(play_order))
        };
        if !is_bye {
            play_order += 1;
        }
        let m = Match {
            id: Uuid::new_v4(),
            tournament_id: Uuid::nil(),
            identifier: format!("W1-{}", i + 1),
            round: 1,
            bracket_position: i as u32,
            is_losers_bracket: false,
            player1_id: slot.direct,
            player2_id: if is_bye { None } else { slot.second },
            prereq_match_id_p1: None,
            prereq_match_id_p2: slot.prereq,
            is_prereq_loser_p1: false,
            is_prereq_loser_p2: false,
            suggested_play_order: suggested,
            scores: MatchScores::default(),
            winner_id: winner,
            loser_id: None,
            state,
            underway_at: None,
            completed_at,
            is_bye,
            is_grand_finals: false,
            is_grand_finals_reset: false,
            is_conditional: false,
            station_id: None,
            lobby_participants: Vec::new(),
            placements: Vec::new(),
        };
        prev_round_ids.push(m.id);
        matches.push(m);
    }

    // rounds 2..rounds, linking winners of the previous round
    for r in 2..=rounds {
        let mut this_round_ids = Vec::with_capacity(prev_round_ids.len() / 2);
        for (i, pair) in prev_round_ids.chunks(2).enumerate() {
            let is_final = r == rounds;
            let id = Uuid::new_v4();
            let identifier = if is_final && !third_place {
                "F".to_string()
            } else {
                format!("W{r}-{}", i + 1)
            };
            let m = Match {
                id,
                tournament_id: Uuid::nil(),
                identifier,
                round: r as i32,
                bracket_position: i as u32,
                is_losers_bracket: false,
                player1_id: None,
                player2_id: None,
                prereq_match_id_p1: Some(pair[0]),
                prereq_match_id_p2: pair.get(1).copied(),
                is_prereq_loser_p1: false,
                is_prereq_loser_p2: false,
                suggested_play_order: Some(play_order),
                scores: MatchScores::default(),
                winner_id: None,
                loser_id: None,
                state: MatchState::Pending,
                underway_at: None,
                completed_at: None,
                is_bye: false,
                is_grand_finals: false,
                is_grand_finals_reset: false,
                is_conditional: false,
                station_id: None,
                lobby_participants: Vec::new(),
                placements: Vec::new(),
            };
            play_order += 1;
            this_round_ids.push(m.id);
            matches.push(m);
        }
        prev_round_ids = this_round_ids;
    }

    if third_place && rounds >= 2 {
        // semifinal losers play for third; find the two penultimate-round
        // matches that feed into the final.
        let final_id = *prev_round_ids.first().ok_or_else(|| {
            BracketError::BadInput("cannot build third-place match without a final".into())
        })?;
        let semis: Vec<Uuid> = matches
            .iter()
            .filter(|m| m.prereq_match_id_p1 == Some(final_id) || m.prereq_match_id_p2 == Some(final_id))
            .map(|m| m.id)
            .collect();
        if semis.len() == 2 {
            let m = Match {
                id: Uuid::new_v4(),
                tournament_id: Uuid::nil(),
                identifier: "3P".to_string(),
                round: rounds as i32,
                bracket_position: 1,
                is_losers_bracket: false,
                player1_id: None,
                player2_id: None,
                prereq_match_id_p1: Some(semis[0]),
                prereq_match_id_p2: Some(semis[1]),
                is_prereq_loser_p1: true,
                is_prereq_loser_p2: true,
                suggested_play_order: Some(play_order),
                scores: MatchScores::default(),
                winner_id: None,
                loser_id: None,
                state: MatchState::Pending,
                underway_at: None,
                completed_at: None,
                is_bye: false,
                is_grand_finals: false,
                is_grand_finals_reset: false,
                is_conditional: false,
                station_id: None,
                lobby_participants: Vec::new(),
                placements: Vec::new(),
            };
            play_order += 1;
            matches.push(m);
        }
    }
    let _ = play_order;

    // propagate byes forward: a bye's "winner" is known at generation time,
    // so any round-2+ match that only ever receives bye winners can itself
    // be completed ahead of time (chain of byes collapsing).
    propagate_byes(&mut matches);

    let seeding_out: Vec<SeedAssignment> = ranked
        .iter()
        .map(|(seed, id)| SeedAssignment {
            participant_id: *id,
            seed: *seed,
        })
        .collect();

    Ok(GenerateResult {
        matches,
        seeding: seeding_out,
        stats: GenerationStats {
            rounds,
            bye_count: bye_count as u32,
            bracket_size: size as u32,
        },
    })
}

struct RoundSlot {
    direct: Option<ParticipantId>,
    second: Option<ParticipantId>,
    is_bye_via_direct: bool,
    prereq: Option<Uuid>,
}

impl RoundSlot {
    fn new(
        direct: Option<ParticipantId>,
        second: Option<ParticipantId>,
        is_bye_via_direct: bool,
        prereq: Option<Uuid>,
    ) -> Self {
        RoundSlot {
            direct,
            second,
            is_bye_via_direct,
            prereq,
        }
    }
}

/// Walks the bracket forward resolving any match whose both prereqs are
/// already-decided byes, so a deep bye chain doesn't sit `pending` forever
/// waiting on a human to click anything (spec §4.1: byes auto-advance).
fn propagate_byes(matches: &mut Vec<Match>) {
    loop {
        let mut changed = false;
        let ready: Vec<(Uuid, Option<ParticipantId>, Option<ParticipantId>)> = matches
            .iter()
            .filter(|m| m.state == MatchState::Complete && m.winner_id.is_some())
            .map(|m| (m.id, m.winner_id, m.loser_id))
            .collect();
        for (feeder_id, winner, loser) in &ready {
            for m in matches.iter_mut() {
                if m.state != MatchState::Pending {
                    continue;
                }
                if m.prereq_match_id_p1 == Some(*feeder_id) && m.player1_id.is_none() {
                    m.player1_id = if m.is_prereq_loser_p1 { *loser } else { *winner };
                    changed = true;
                }
                if m.prereq_match_id_p2 == Some(*feeder_id) && m.player2_id.is_none() {
                    m.player2_id = if m.is_prereq_loser_p2 { *loser } else { *winner };
                    changed = true;
                }
            }
        }
        for m in matches.iter_mut() {
            if m.state == MatchState::Pending && m.is_ready_to_open() {
                // a "bye-fed" match only auto-completes itself if its other
                // slot is also absent entirely (i.e. it degenerates into a
                // bye); otherwise it correctly opens for real play.
                m.state = MatchState::Open;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

/// Assigns seed ranks `1..=n`: explicit `Participant::seed` wins; otherwise
/// participants keep their input order.
fn seeded_participants(participants: &[Participant]) -> Vec<(u32, ParticipantId)> {
    let mut with_index: Vec<(u32, ParticipantId)> = participants
        .iter()
        .enumerate()
        .map(|(i, p)| (p.seed.unwrap_or(i as u32 + 1), p.id))
        .collect();
    with_index.sort_by_key(|(seed, _)| *seed);
    with_index
        .into_iter()
        .enumerate()
        .map(|(i, (_, id))| (i as u32 + 1, id))
        .collect()
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
    fn given_eight_participants_when_generated_then_three_rounds_no_byes() {
        let result = generate(&participants(8), &FormatOptions::default()).unwrap();
        assert_eq!(result.stats.rounds, 3);
        assert_eq!(result.stats.bye_count, 0);
        assert_eq!(result.matches.iter().filter(|m| m.round == 1).count(), 4);
    }

    #[test]
    fn given_five_participants_when_generated_then_three_byes_auto_complete() {
        let result = generate(&participants(5), &FormatOptions::default()).unwrap();
        assert_eq!(result.stats.bye_count, 3);
        let byes: Vec<_> = result.matches.iter().filter(|m| m.is_bye).collect();
        assert_eq!(byes.len(), 3);
        for b in byes {
            assert!(b.check_bye_invariant());
        }
    }

    #[test]
    fn given_two_participants_when_generated_then_single_open_final() {
        let result = generate(&participants(2), &FormatOptions::default()).unwrap();
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].state, MatchState::Open);
        assert_eq!(result.matches[0].identifier, "F");
    }

    #[test]
    fn given_one_participant_when_generated_then_bad_input() {
        let err = generate(&participants(1), &FormatOptions::default());
        assert!(err.is_err());
    }

    #[test]
    fn third_place_match_links_both_semifinal_losers() {
        let opts = FormatOptions {
            third_place_match: Some(true),
            ..Default::default()
        };
        let result = generate(&participants(4), &opts).unwrap();
        let third = result.matches.iter().find(|m| m.identifier == "3P").unwrap();
        assert!(third.is_prereq_loser_p1);
        assert!(third.is_prereq_loser_p2);
    }

    #[test]
    fn compact_bracket_replaces_byes_with_play_ins() {
        let opts = FormatOptions {
            compact_bracket: Some(true),
            ..Default::default()
        };
        let result = generate(&participants(5), &opts).unwrap();
        assert!(result.matches.iter().any(|m| m.round == 0));
        assert_eq!(result.matches.iter().filter(|m| m.is_bye).count(), 0);
    }
}

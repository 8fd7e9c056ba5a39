//! Two-stage (spec §4.1): stage one splits the field into `num_groups`
//! groups via snake draft (so group strength stays balanced) and runs each
//! group as a round robin; stage two re-seeds the top `advancers_per_group`
//! from each group into a single `stage_two_format` bracket.

use super::error::{BracketError, BracketResult};
use super::ranks::calculate_final_ranks;
use super::round_robin;
use super::types::{GenerateResult, GenerationStats, RoundAdvance, SeedAssignment};
use crate::model::{Format, FormatOptions, Match, MatchState, Participant, ParticipantId};
use std::collections::HashMap;

const GROUP_STRIDE: u32 = 1_000_000;

/// One stage-one group: a virtual sub-tournament whose matches are tagged
/// via `bracket_position` high bits so the caller can tell groups apart
/// without a dedicated `group_id` column (round robin matches otherwise
/// carry no grouping field of their own).
pub fn generate_stage_one(participants: &[Participant], options: &FormatOptions) -> BracketResult<GenerateResult> {
    let num_groups = options.num_groups.unwrap_or(2).max(1) as usize;
    if participants.len() < num_groups {
        return Err(BracketError::BadInput(format!(
            "two-stage needs at least as many participants as groups ({num_groups})"
        )));
    }

    let mut ranked: Vec<&Participant> = participants.iter().collect();
    ranked.sort_by_key(|p| p.seed.unwrap_or(u32::MAX));

    let groups = snake_draft(&ranked, num_groups);

    let mut matches = Vec::new();
    let mut seeding = Vec::new();
    for (group_idx, group) in groups.iter().enumerate() {
        let group_participants: Vec<Participant> = group.iter().map(|p| (*p).clone()).collect();
        let mut sub = round_robin::generate(&group_participants, options)?;
        for m in sub.matches.iter_mut() {
            m.bracket_position += group_idx as u32 * GROUP_STRIDE;
            m.identifier = format!("G{}-{}", group_idx + 1, m.identifier);
        }
        matches.append(&mut sub.matches);
        seeding.append(&mut sub.seeding);
    }

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

/// Builds stage two from each group's top `advancers_per_group` finishers
/// (already ranked by the caller via round-robin standings), re-seeded by
/// their original seed before feeding the chosen bracket format.
pub fn generate_stage_two(
    advancers: &[ParticipantId],
    original_seed: impl Fn(ParticipantId) -> u32,
    options: &FormatOptions,
) -> BracketResult<GenerateResult> {
    let format = options.stage_two_format.unwrap_or(Format::SingleElimination);
    let tournament_id = uuid::Uuid::nil();
    let participants: Vec<Participant> = advancers
        .iter()
        .map(|&id| Participant {
            id,
            tournament_id,
            display_name: String::new(),
            seed: Some(original_seed(id)),
            checked_in: true,
        })
        .collect();
    super::generate(format, &participants, options)
}

/// Stage-one matches carry the `G{n}-...` identifier prefix assigned in
/// [`generate_stage_one`]; stage-two matches (produced by `generate` for
/// whatever `stage_two_format` names) never start with a capital G followed
/// by a digit, since no elimination/round-robin/swiss identifier scheme
/// uses that shape ("GF"/"GF2" are the only other "G..." identifiers and
/// neither is followed by a digit).
fn is_stage_one_match(m: &Match) -> bool {
    let mut chars = m.identifier.chars();
    matches!(chars.next(), Some('G')) && chars.next().is_some_and(|c| c.is_ascii_digit())
}

/// Once every stage-one match is complete, ranks each group by round-robin
/// standings, re-seeds the top `advancers_per_group` finishers per group
/// (1st places take seeds `1..=num_groups`, 2nd places take
/// `num_groups+1..=2*num_groups`, and so on) and builds stage two. A no-op
/// once stage two has already been generated (detected by the presence of
/// any non-stage-one match).
pub fn advance(matches: &[Match], participants: &[Participant], options: &FormatOptions) -> BracketResult<RoundAdvance> {
    if matches.is_empty() || matches.iter().any(|m| !is_stage_one_match(m)) {
        return Ok(RoundAdvance::NotReady);
    }
    if !matches.iter().all(|m| m.state == MatchState::Complete) {
        return Ok(RoundAdvance::NotReady);
    }

    let num_groups = options.num_groups.unwrap_or(2).max(1) as usize;
    let advancers_per_group = options.advancers_per_group.unwrap_or(2).max(1) as usize;

    let mut seed_map: HashMap<ParticipantId, u32> = HashMap::new();
    for group_idx in 0..num_groups {
        let lo = group_idx as u32 * GROUP_STRIDE;
        let hi = lo + GROUP_STRIDE;
        let group_matches: Vec<Match> = matches
            .iter()
            .filter(|m| m.bracket_position >= lo && m.bracket_position < hi)
            .cloned()
            .collect();
        if group_matches.is_empty() {
            continue;
        }
        let group_participant_ids: std::collections::HashSet<ParticipantId> = group_matches
            .iter()
            .flat_map(|m| [m.player1_id, m.player2_id])
            .flatten()
            .collect();
        let group_participants: Vec<Participant> = participants
            .iter()
            .filter(|p| group_participant_ids.contains(&p.id))
            .cloned()
            .collect();
        let ranked = calculate_final_ranks(Format::RoundRobin, &group_matches, &group_participants, options, &[])?;
        for (placement_idx, ranked_participant) in ranked.iter().take(advancers_per_group).enumerate() {
            let seed = placement_idx as u32 * num_groups as u32 + group_idx as u32 + 1;
            seed_map.insert(ranked_participant.participant_id, seed);
        }
    }

    if seed_map.is_empty() {
        return Ok(RoundAdvance::TournamentComplete);
    }

    let mut advancers: Vec<ParticipantId> = seed_map.keys().copied().collect();
    advancers.sort_by_key(|id| seed_map[id]);
    let stage_two = generate_stage_two(&advancers, |id| seed_map[&id], options)?;
    Ok(RoundAdvance::NextRound(stage_two.matches))
}

/// Splits `ranked` (strongest first) into `num_groups` groups using a snake
/// draft: group assignment order is 0,1,..,k-1,k-1,..,1,0,0,1,..., so total
/// seed strength stays balanced across groups instead of front-loading the
/// first group with all of the top seeds.
fn snake_draft<'a>(ranked: &[&'a Participant], num_groups: usize) -> Vec<Vec<&'a Participant>> {
    let mut groups: Vec<Vec<&Participant>> = vec![Vec::new(); num_groups];
    let mut group_idx = 0usize;
    let mut direction: i64 = 1;
    for p in ranked {
        groups[group_idx].push(p);
        if num_groups > 1 {
            let next = group_idx as i64 + direction;
            if next < 0 || next >= num_groups as i64 {
                direction = -direction;
            } else {
                group_idx = next as usize;
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TournamentId;
    use uuid::Uuid;

    fn participants(n: usize) -> Vec<Participant> {
        let tid: TournamentId = Uuid::new_v4();
        (0..n)
            .map(|i| {
                let mut p = Participant::new(tid, format!("p{i}"));
                p.seed = Some(i as u32 + 1);
                p
            })
            .collect()
    }

    #[test]
    fn given_eight_participants_two_groups_when_stage_one_then_each_group_balanced() {
        let opts = FormatOptions {
            num_groups: Some(2),
            ..Default::default()
        };
        let result = generate_stage_one(&participants(8), &opts).unwrap();
        // 4 participants per group round robin = C(4,2) = 6 matches per group
        assert_eq!(result.matches.len(), 12);
    }

    #[test]
    fn fewer_participants_than_groups_is_bad_input() {
        let opts = FormatOptions {
            num_groups: Some(4),
            ..Default::default()
        };
        assert!(generate_stage_one(&participants(2), &opts).is_err());
    }

    #[test]
    fn stage_two_builds_requested_format() {
        let opts = FormatOptions {
            stage_two_format: Some(Format::SingleElimination),
            ..Default::default()
        };
        let advancers: Vec<ParticipantId> = (0..4).map(|_| Uuid::new_v4()).collect();
        let result = generate_stage_two(&advancers, |_| 1, &opts).unwrap();
        assert_eq!(result.matches.len(), 3);
    }

    fn play_out_round_robin(matches: &mut [Match]) {
        for m in matches.iter_mut() {
            let (Some(p1), Some(p2)) = (m.player1_id, m.player2_id) else { continue };
            m.state = MatchState::Complete;
            m.winner_id = Some(p1);
            m.loser_id = Some(p2);
            m.scores = MatchScores { p1: 1, p2: 0, csv: None };
        }
    }

    #[test]
    fn given_incomplete_stage_one_when_advance_then_not_ready() {
        let opts = FormatOptions {
            num_groups: Some(2),
            ..Default::default()
        };
        let result = generate_stage_one(&participants(8), &opts).unwrap();
        assert!(matches!(advance(&result.matches, &participants(8), &opts).unwrap(), RoundAdvance::NotReady));
    }

    #[test]
    fn given_complete_stage_one_when_advance_then_stage_two_built() {
        let ps = participants(8);
        let opts = FormatOptions {
            num_groups: Some(2),
            advancers_per_group: Some(2),
            stage_two_format: Some(Format::SingleElimination),
            ..Default::default()
        };
        let mut result = generate_stage_one(&ps, &opts).unwrap();
        play_out_round_robin(&mut result.matches);

        match advance(&result.matches, &ps, &opts).unwrap() {
            RoundAdvance::NextRound(next) => {
                // 4 advancers (2 per group) -> single elim bracket of 3 matches
                assert_eq!(next.len(), 3);
                assert!(next.iter().all(|m| !is_stage_one_match(m)));
            }
            other => panic!("expected NextRound, got {other:?}"),
        }
    }

    #[test]
    fn given_stage_two_already_started_when_advance_then_not_ready_again() {
        let ps = participants(8);
        let opts = FormatOptions {
            num_groups: Some(2),
            advancers_per_group: Some(2),
            stage_two_format: Some(Format::SingleElimination),
            ..Default::default()
        };
        let mut result = generate_stage_one(&ps, &opts).unwrap();
        play_out_round_robin(&mut result.matches);
        let RoundAdvance::NextRound(stage_two) = advance(&result.matches, &ps, &opts).unwrap() else {
            panic!("expected stage two to be built");
        };
        result.matches.extend(stage_two);

        assert!(matches!(advance(&result.matches, &ps, &opts).unwrap(), RoundAdvance::NotReady));
    }
}

//! Double elimination (spec §4.1): winners bracket (reusing single
//! elimination's generator), a losers bracket built from the standard
//! alternating drop-in/consolidation pattern, and a grand finals pair with
//! an optional bracket-reset match.

use super::error::BracketResult;
use super::single_elim;
use super::types::{GenerateResult, GenerationStats};
use crate::model::{
    FormatOptions, GrandFinalsModifier, Match, MatchScores, MatchState, Participant, ParticipantId,
};
use uuid::Uuid;

pub fn generate(participants: &[Participant], options: &FormatOptions) -> BracketResult<GenerateResult> {
    let ranked = rank(participants);
    // the winners bracket never wants a third-place match or compact mode of
    // its own compact flag semantics reused verbatim; third place doesn't
    // apply once there's a losers bracket.
    let wb_options = FormatOptions {
        third_place_match: Some(false),
        ..options.clone()
    };
    let mut wb = single_elim::build(&ranked, &wb_options, false)?;
    let k = wb.stats.rounds;
    let mut matches = std::mem::take(&mut wb.matches);

    if k >= 2 {
        build_losers_bracket(&mut matches, k);
    }
    build_grand_finals(&mut matches, options.grand_finals_modifier);

    Ok(GenerateResult {
        matches,
        seeding: wb.seeding,
        stats: GenerationStats {
            rounds: k,
            bye_count: wb.stats.bye_count,
            bracket_size: wb.stats.bracket_size,
        },
    })
}

fn rank(participants: &[Participant]) -> Vec<(u32, ParticipantId)> {
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

fn new_blank_match(round: i32, bracket_position: u32, identifier: String) -> Match {
    Match {
        id: Uuid::new_v4(),
        tournament_id: Uuid::nil(),
        identifier,
        round,
        bracket_position,
        is_losers_bracket: true,
        player1_id: None,
        player2_id: None,
        prereq_match_id_p1: None,
        prereq_match_id_p2: None,
        is_prereq_loser_p1: false,
        is_prereq_loser_p2: false,
        suggested_play_order: Some(0),
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
    }
}

/// Builds the losers bracket for a `k`-round winners bracket already present
/// in `matches`, appending new matches in place. Alternates "drop-in" rounds
/// (losers bracket survivors meet a fresh batch of winners-bracket losers)
/// with pure consolidation rounds (survivors pair off among themselves)
/// until a single losers-bracket champion remains.
fn build_losers_bracket(matches: &mut Vec<Match>, k: u32) {
    let wb_losers_by_round: Vec<Vec<Uuid>> = (1..=k)
        .map(|r| {
            let mut ids: Vec<Uuid> = matches
                .iter()
                .filter(|m| m.round == r as i32 && !m.is_losers_bracket)
                .map(|m| m.id)
                .collect();
            ids.sort();
            ids
        })
        .collect();

    let mut lb_round: i32 = -1;

    // LB round 1: pair off winners-bracket round-1 losers among themselves.
    let mut current: Vec<Uuid> = Vec::new();
    for pair in wb_losers_by_round[0].chunks(2) {
        let mut m = new_blank_match(lb_round, current.len() as u32, format!("L{}", -lb_round));
        m.prereq_match_id_p1 = Some(pair[0]);
        m.is_prereq_loser_p1 = true;
        if let Some(&second) = pair.get(1) {
            m.prereq_match_id_p2 = Some(second);
            m.is_prereq_loser_p2 = true;
        }
        current.push(m.id);
        matches.push(m);
    }
    lb_round -= 1;

    for r in 2..=k {
        let drop = &wb_losers_by_round[(r - 1) as usize];

        while current.len() > drop.len() {
            let mut next = Vec::with_capacity(current.len() / 2);
            for pair in current.chunks(2) {
                let mut m = new_blank_match(lb_round, next.len() as u32, format!("L{}", -lb_round));
                m.prereq_match_id_p1 = Some(pair[0]);
                if let Some(&second) = pair.get(1) {
                    m.prereq_match_id_p2 = Some(second);
                }
                next.push(m.id);
                matches.push(m);
            }
            current = next;
            lb_round -= 1;
        }

        let mut next = Vec::with_capacity(current.len());
        for (i, (&survivor, &loser)) in current.iter().zip(drop.iter()).enumerate() {
            let mut m = new_blank_match(lb_round, i as u32, format!("L{}", -lb_round));
            m.prereq_match_id_p1 = Some(survivor);
            m.prereq_match_id_p2 = Some(loser);
            m.is_prereq_loser_p2 = true;
            next.push(m.id);
            matches.push(m);
        }
        current = next;
        lb_round -= 1;
    }
}

/// Grand finals: the winners-bracket champion against the losers-bracket
/// champion, plus a conditional reset match that only gets played if the
/// losers-bracket entrant wins game one (spec §4.1, `grand_finals_modifier`).
///
/// `modifier` follows the spec's three-way contract: `None` (null) is the
/// default — GF1 plus a conditional reset GF2; `Some(Single)` forces a
/// single grand finals match with no reset ever possible; `Some(Skip)` omits
/// the winners/losers finalist match entirely.
fn build_grand_finals(matches: &mut Vec<Match>, modifier: Option<GrandFinalsModifier>) {
    if modifier == Some(GrandFinalsModifier::Skip) {
        return;
    }

    let wb_champion = matches
        .iter()
        .filter(|m| !m.is_losers_bracket)
        .max_by_key(|m| m.round)
        .map(|m| m.id);
    let lb_champion = matches
        .iter()
        .filter(|m| m.is_losers_bracket)
        .min_by_key(|m| m.round)
        .map(|m| m.id);

    let (Some(wb_final), Some(lb_final)) = (wb_champion, lb_champion) else {
        return;
    };

    let mut gf = new_blank_match(i32::MAX - 1, 0, "GF".to_string());
    gf.is_losers_bracket = false;
    gf.is_grand_finals = true;
    gf.prereq_match_id_p1 = Some(wb_final);
    gf.prereq_match_id_p2 = Some(lb_final);
    let gf_id = gf.id;
    matches.push(gf);

    if modifier != Some(GrandFinalsModifier::Single) {
        let mut gf2 = new_blank_match(i32::MAX, 0, "GF2".to_string());
        gf2.is_losers_bracket = false;
        gf2.is_grand_finals = true;
        gf2.is_grand_finals_reset = true;
        gf2.is_conditional = true;
        gf2.prereq_match_id_p1 = Some(gf_id);
        gf2.prereq_match_id_p2 = Some(gf_id);
        matches.push(gf2);
    }
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
    fn given_eight_participants_when_generated_then_losers_bracket_has_six_matches() {
        let result = generate(&participants(8), &FormatOptions::default()).unwrap();
        let lb_count = result
            .matches
            .iter()
            .filter(|m| m.is_losers_bracket)
            .count();
        assert_eq!(lb_count, 6);
    }

    #[test]
    fn given_four_participants_when_generated_then_grand_finals_and_reset_present() {
        let result = generate(&participants(4), &FormatOptions::default()).unwrap();
        assert!(result.matches.iter().any(|m| m.identifier == "GF"));
        assert!(result.matches.iter().any(|m| m.identifier == "GF2" && m.is_conditional));
    }

    #[test]
    fn single_modifier_omits_reset_match_but_keeps_gf1() {
        let opts = FormatOptions {
            grand_finals_modifier: Some(GrandFinalsModifier::Single),
            ..Default::default()
        };
        let result = generate(&participants(4), &opts).unwrap();
        assert!(result.matches.iter().any(|m| m.identifier == "GF"));
        assert!(!result.matches.iter().any(|m| m.identifier == "GF2"));
    }

    #[test]
    fn skip_modifier_omits_grand_finals_entirely() {
        let opts = FormatOptions {
            grand_finals_modifier: Some(GrandFinalsModifier::Skip),
            ..Default::default()
        };
        let result = generate(&participants(4), &opts).unwrap();
        assert!(!result.matches.iter().any(|m| m.identifier == "GF"));
        assert!(!result.matches.iter().any(|m| m.identifier == "GF2"));
    }
}

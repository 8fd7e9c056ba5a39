//! Format-agnostic advancement rule (spec §4.1): once a match completes,
//! its winner and loser feed into whichever other matches reference it as
//! a prereq, and any match that becomes fully filled transitions to open.

use super::types::AdvanceOutcome;
use crate::model::{Match, MatchState, Slot};

/// Applies the effect of `completed` (already `state=complete`, winner/loser
/// set) onto the rest of `matches`. `matches` should be the full set for the
/// tournament; `completed`'s own entry inside it is left untouched — the
/// caller is expected to have already written the completed match's own
/// state before calling this.
pub fn apply_result(completed: &Match, matches: &mut [Match]) -> AdvanceOutcome {
    let mut outcome = AdvanceOutcome::default();
    let Some(winner) = completed.winner_id else {
        return outcome;
    };
    let loser = completed.loser_id;

    for m in matches.iter_mut() {
        if m.id == completed.id {
            continue;
        }

        // Grand-finals bracket reset (double elimination, spec §4.1): both of
        // GF2's prereq slots point back at GF1 with `is_prereq_loser=false`,
        // so the generic winner-into-slot rule below can't express "only
        // activate if the losers-bracket entrant won game one" — that needs
        // completed's own player2/winner comparison, not per-slot flags.
        if m.is_grand_finals_reset
            && m.prereq_match_id_p1 == Some(completed.id)
            && m.prereq_match_id_p2 == Some(completed.id)
        {
            if completed.winner_id.is_some() && completed.winner_id == completed.player2_id {
                m.set_slot(Slot::Player1, loser.unwrap_or(winner));
                m.set_slot(Slot::Player2, winner);
                outcome.newly_filled.push(m.id);
                if m.state == MatchState::Pending {
                    m.state = MatchState::Open;
                    outcome.newly_opened.push(m.id);
                }
            }
            continue;
        }

        let mut filled = false;
        if m.prereq_match_id_p1 == Some(completed.id) {
            let participant = if m.is_prereq_loser_p1 { loser } else { Some(winner) };
            if let Some(p) = participant {
                m.set_slot(Slot::Player1, p);
                filled = true;
            }
        }
        if m.prereq_match_id_p2 == Some(completed.id) {
            let participant = if m.is_prereq_loser_p2 { loser } else { Some(winner) };
            if let Some(p) = participant {
                m.set_slot(Slot::Player2, p);
                filled = true;
            }
        }
        if filled {
            outcome.newly_filled.push(m.id);
            if m.state == MatchState::Pending && m.is_ready_to_open() {
                m.state = MatchState::Open;
                outcome.newly_opened.push(m.id);
            }
        }
    }
    outcome
}

/// Reverses [`apply_result`] for the direct dependents of `reopened` (spec
/// §4.3 reopen semantics, resolved to direct-dependents-only — see
/// SPEC_FULL.md §11). Dependents that are themselves `complete` are left
/// alone; the caller decides whether a cascading reopen is desired and
/// calls this again for those matches.
pub fn undo_result(reopened: &Match, matches: &mut [Match]) -> Vec<crate::model::MatchId> {
    let mut cleared = Vec::new();
    for m in matches.iter_mut() {
        if m.id == reopened.id {
            continue;
        }
        let mut touched = false;
        if m.prereq_match_id_p1 == Some(reopened.id) && m.state != MatchState::Complete {
            m.clear_slot(Slot::Player1);
            touched = true;
        }
        if m.prereq_match_id_p2 == Some(reopened.id) && m.state != MatchState::Complete {
            m.clear_slot(Slot::Player2);
            touched = true;
        }
        if touched {
            if m.state == MatchState::Open {
                m.state = MatchState::Pending;
            }
            cleared.push(m.id);
        }
    }
    cleared
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MatchScores, TournamentId};
    use uuid::Uuid;

    fn blank_match(tournament_id: TournamentId) -> Match {
        Match {
            id: Uuid::new_v4(),
            tournament_id,
            identifier: String::new(),
            round: 1,
            bracket_position: 0,
            is_losers_bracket: false,
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

    #[test]
    fn given_feeder_complete_when_applied_then_dependent_opens() {
        let tid = Uuid::new_v4();
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut feeder = blank_match(tid);
        feeder.player1_id = Some(p1);
        feeder.player2_id = Some(p2);
        feeder.state = MatchState::Complete;
        feeder.winner_id = Some(p1);
        feeder.loser_id = Some(p2);

        let mut dependent = blank_match(tid);
        dependent.prereq_match_id_p1 = Some(feeder.id);
        dependent.player2_id = Some(other);

        let mut rest = vec![dependent.clone()];
        let outcome = apply_result(&feeder, &mut rest);

        assert_eq!(outcome.newly_opened, vec![dependent.id]);
        assert_eq!(rest[0].player1_id, Some(p1));
        assert_eq!(rest[0].state, MatchState::Open);
    }

    #[test]
    fn given_loser_feed_when_applied_then_loser_placed_not_winner() {
        let tid = Uuid::new_v4();
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();

        let mut feeder = blank_match(tid);
        feeder.state = MatchState::Complete;
        feeder.winner_id = Some(p1);
        feeder.loser_id = Some(p2);

        let mut dependent = blank_match(tid);
        dependent.prereq_match_id_p1 = Some(feeder.id);
        dependent.is_prereq_loser_p1 = true;

        let mut rest = vec![dependent.clone()];
        apply_result(&feeder, &mut rest);
        assert_eq!(rest[0].player1_id, Some(p2));
    }

    #[test]
    fn given_wb_finalist_wins_gf1_then_reset_stays_unfilled_and_pending() {
        let tid = Uuid::new_v4();
        let wb_finalist = Uuid::new_v4();
        let lb_finalist = Uuid::new_v4();

        let mut gf1 = blank_match(tid);
        gf1.is_grand_finals = true;
        gf1.player1_id = Some(wb_finalist);
        gf1.player2_id = Some(lb_finalist);
        gf1.state = MatchState::Complete;
        gf1.winner_id = Some(wb_finalist);
        gf1.loser_id = Some(lb_finalist);

        let mut gf2 = blank_match(tid);
        gf2.is_grand_finals = true;
        gf2.is_grand_finals_reset = true;
        gf2.is_conditional = true;
        gf2.prereq_match_id_p1 = Some(gf1.id);
        gf2.prereq_match_id_p2 = Some(gf1.id);

        let mut rest = vec![gf2.clone()];
        let outcome = apply_result(&gf1, &mut rest);

        assert!(outcome.newly_filled.is_empty());
        assert!(outcome.newly_opened.is_empty());
        assert_eq!(rest[0].state, MatchState::Pending);
        assert!(rest[0].player1_id.is_none());
        assert!(rest[0].player2_id.is_none());
    }

    #[test]
    fn given_lb_finalist_wins_gf1_then_reset_opens_with_sides_swapped() {
        let tid = Uuid::new_v4();
        let wb_finalist = Uuid::new_v4();
        let lb_finalist = Uuid::new_v4();

        let mut gf1 = blank_match(tid);
        gf1.is_grand_finals = true;
        gf1.player1_id = Some(wb_finalist);
        gf1.player2_id = Some(lb_finalist);
        gf1.state = MatchState::Complete;
        gf1.winner_id = Some(lb_finalist);
        gf1.loser_id = Some(wb_finalist);

        let mut gf2 = blank_match(tid);
        gf2.is_grand_finals = true;
        gf2.is_grand_finals_reset = true;
        gf2.is_conditional = true;
        gf2.prereq_match_id_p1 = Some(gf1.id);
        gf2.prereq_match_id_p2 = Some(gf1.id);

        let mut rest = vec![gf2.clone()];
        let outcome = apply_result(&gf1, &mut rest);

        assert_eq!(outcome.newly_opened, vec![gf2.id]);
        assert_eq!(rest[0].state, MatchState::Open);
        assert_eq!(rest[0].player1_id, Some(wb_finalist));
        assert_eq!(rest[0].player2_id, Some(lb_finalist));
    }
}

//! Bracket Engine (C1, spec §4.1). Pure, side-effect-free: given
//! participants + format + options, produce a match graph; given a match
//! graph + a result, advance winners/losers and open newly-ready matches.
//! Format-specific logic lives only in `generate`, rank calculation, and
//! round advancement; the advancement rule itself is format-agnostic (spec
//! §4.1).

mod advancement;
mod double_elim;
mod error;
mod ffa;
mod leaderboard;
mod ranks;
mod round_robin;
mod seeding;
mod single_elim;
mod swiss;
mod two_stage;
mod types;
mod visualization;

pub use advancement::*;
pub use error::*;
pub use ffa::complete_lobby;
pub use ranks::*;
pub use types::*;
pub use visualization::*;

use crate::model::{Format, FormatOptions, Match, Participant};

/// Generates the complete match graph with prereq links for `participants`
/// under `format` (spec §4.1). Fails with `BadInput` when the participant
/// count is below the format minimum.
pub fn generate(
    format: Format,
    participants: &[Participant],
    options: &FormatOptions,
) -> BracketResult<GenerateResult> {
    let min = format.min_participants();
    if participants.len() < min {
        return Err(BracketError::BadInput(format!(
            "{format:?} requires at least {min} participants, got {}",
            participants.len()
        )));
    }
    match format {
        Format::SingleElimination => single_elim::generate(participants, options),
        Format::DoubleElimination => double_elim::generate(participants, options),
        Format::RoundRobin => round_robin::generate(participants, options),
        Format::Swiss => swiss::generate_round_one(participants, options),
        Format::TwoStage => two_stage::generate_stage_one(participants, options),
        Format::FreeForAll => ffa::generate_round_one(participants, options),
        Format::Leaderboard => leaderboard::generate(participants, options),
    }
}

/// Checks whether the current round/stage of an incrementally-generated
/// format (Swiss, free-for-all, two-stage) is complete and, if so, either
/// builds the next round/stage or reports the tournament is done. The other
/// four formats generate their whole match graph up front and never need
/// this (spec §4.1).
pub fn advance_rounds(
    format: Format,
    matches: &[Match],
    participants: &[Participant],
    options: &FormatOptions,
) -> BracketResult<RoundAdvance> {
    match format {
        Format::Swiss => Ok(swiss::advance(matches, participants, options)),
        Format::FreeForAll => Ok(ffa::advance(matches, participants, options)),
        Format::TwoStage => two_stage::advance(matches, participants, options),
        _ => Ok(RoundAdvance::NotReady),
    }
}

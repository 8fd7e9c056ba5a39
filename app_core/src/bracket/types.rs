use crate::model::{Match, ParticipantId};

/// Result of [`super::generate`]: a complete match graph plus bookkeeping
/// the caller (the store, when persisting) finds useful but that the engine
/// itself never needs again.
#[derive(Debug, Clone)]
pub struct GenerateResult {
    pub matches: Vec<Match>,
    pub seeding: Vec<SeedAssignment>,
    pub stats: GenerationStats,
}

#[derive(Debug, Clone, Copy)]
pub struct SeedAssignment {
    pub participant_id: ParticipantId,
    pub seed: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationStats {
    pub rounds: u32,
    pub bye_count: u32,
    pub bracket_size: u32,
}

/// Outcome of feeding a completed match's winner/loser into the rest of the
/// graph (spec §4.1 advancement rule). Matches transition `pending -> open`
/// only when both of their slots end up filled.
#[derive(Debug, Clone, Default)]
pub struct AdvanceOutcome {
    pub newly_opened: Vec<crate::model::MatchId>,
    pub newly_filled: Vec<crate::model::MatchId>,
}

/// One entry of [`super::calculate_final_ranks`].
#[derive(Debug, Clone, Copy)]
pub struct RankedParticipant {
    pub participant_id: ParticipantId,
    pub rank: u32,
    pub score: f64,
}

/// Result of [`super::advance_rounds`] (spec §4.1: Swiss, free-for-all and
/// two-stage build their match graph incrementally, one round/stage at a
/// time, instead of up front like the other formats).
#[derive(Debug, Clone)]
pub enum RoundAdvance {
    /// The current round/stage isn't fully complete yet; nothing to do.
    NotReady,
    /// The current round/stage just finished and these new matches should
    /// be persisted as the next one.
    NextRound(Vec<Match>),
    /// The current round/stage just finished and no further round is
    /// needed; the tournament is done.
    TournamentComplete,
}

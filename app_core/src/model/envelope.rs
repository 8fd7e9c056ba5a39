//! Push envelope and ack status (spec §3).

use super::match_::Match;
use super::participant::ParticipantId;
use super::station::StationId;
use super::tenant::TenantId;
use super::tournament::TournamentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EnvelopeCounters {
    pub open: u32,
    pub underway: u32,
    pub complete: u32,
    pub pending: u32,
    pub total: u32,
    pub progress_percent: u8,
}

impl EnvelopeCounters {
    pub fn from_matches(matches: &[Match]) -> Self {
        use super::match_::MatchState::*;
        let mut c = EnvelopeCounters::default();
        c.total = matches.len() as u32;
        for m in matches {
            match m.state {
                Pending => c.pending += 1,
                Open => c.open += 1,
                Underway => c.underway += 1,
                Complete => c.complete += 1,
            }
        }
        c.progress_percent = if c.total == 0 {
            0
        } else {
            ((c.complete as u64 * 100) / c.total as u64) as u8
        };
        c
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvelopeSource {
    Local,
    Cache,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEnvelope {
    pub tenant_id: TenantId,
    pub tournament_id: TournamentId,
    pub tournament_slug: String,
    pub matches: Vec<Match>,
    /// rank per participant once the tournament is complete
    pub podium: Option<Vec<(ParticipantId, u32)>>,
    pub next_suggested_match: Option<super::match_::MatchId>,
    pub available_stations: Vec<StationId>,
    pub counters: EnvelopeCounters,
    pub source: EnvelopeSource,
    pub is_stale: bool,
    pub cache_age_ms: Option<u64>,
    pub timestamp: DateTime<Utc>,
    pub payload_hash: String,
}

impl PushEnvelope {
    /// Deterministic digest over `(matches, podium)` only (spec §3 invariant):
    /// unrelated fields (timestamp, staleness, counters) never affect the hash
    /// so re-publishing unchanged state dedups correctly.
    pub fn compute_hash(matches: &[Match], podium: &Option<Vec<(ParticipantId, u32)>>) -> String {
        let mut hasher = Sha256::new();
        for m in matches {
            hasher.update(m.id.as_bytes());
            hasher.update([u8_from_match_state(m.state)]);
            hasher.update(m.winner_id.map(|p| *p.as_bytes()).unwrap_or_default());
            hasher.update(m.loser_id.map(|p| *p.as_bytes()).unwrap_or_default());
            hasher.update(m.player1_id.map(|p| *p.as_bytes()).unwrap_or_default());
            hasher.update(m.player2_id.map(|p| *p.as_bytes()).unwrap_or_default());
            hasher.update(m.scores.p1.to_le_bytes());
            hasher.update(m.scores.p2.to_le_bytes());
            hasher.update(m.station_id.map(|s| *s.as_bytes()).unwrap_or_default());
        }
        if let Some(podium) = podium {
            for (p, rank) in podium {
                hasher.update(p.as_bytes());
                hasher.update(rank.to_le_bytes());
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

fn u8_from_match_state(s: super::match_::MatchState) -> u8 {
    use super::match_::MatchState::*;
    match s {
        Pending => 0,
        Open => 1,
        Underway => 2,
        Complete => 3,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AckStatus {
    pub last_push_time: Option<DateTime<Utc>>,
    pub last_ack_time: Option<DateTime<Utc>>,
    pub push_count: u64,
    pub ack_count: u64,
}

impl AckStatus {
    /// spec §3 invariant: `needs-http-fallback` iff `lastPushTime − lastAckTime
    /// > httpFallbackDelay`. `now` is the moment a new payload is about to be
    /// sent; a display that has never acked is measured from its last push
    /// to `now` (no ack time exists to subtract yet).
    pub fn needs_http_fallback(&self, now: DateTime<Utc>, fallback_delay_ms: i64) -> bool {
        let Some(last_push) = self.last_push_time else {
            return false;
        };
        let lag = match self.last_ack_time {
            Some(ack) if ack >= last_push => return false,
            Some(ack) => last_push - ack,
            None => now - last_push,
        };
        lag.num_milliseconds() > fallback_delay_ms
    }
}

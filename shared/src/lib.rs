//! Engine-wide configuration (spec §6 "Configuration recognised", SPEC_FULL
//! §10). Loaded once by `server`'s composition root and handed out by
//! reference to every crate that needs a tunable, following the teacher's
//! `dotenvy::dotenv()` + `std::env::var` lookup style in its old
//! `server/src/main.rs`.

use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {source}")]
    InvalidValue {
        var: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// All tunables from spec.md §6, with the documented defaults. Durations
/// are kept as raw millis/secs fields (matching the spec's naming) plus a
/// handful of `Duration`-returning helpers for call sites that want one.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,

    pub poll_interval_ms: u64,
    pub fallback_delay_ms: i64,
    pub side_channel_timeout_ms: u64,

    pub dq_default_duration_secs: u64,
    pub dq_warning_threshold_secs: u64,

    pub sponsor_rotation_interval_secs: u64,
    pub sponsor_transition_ms: u64,
    pub timer_show_duration_secs: u64,
    pub timer_hide_duration_secs: u64,

    pub dev_bypass_duration_secs: u64,
    pub governor_rate_idle: f64,
    pub governor_rate_upcoming: f64,
    pub governor_rate_active: f64,

    pub stale_threshold_ms: u64,
    pub media_cache_dir: String,
    pub sponsor_state_dir: String,
    pub sponsor_image_dir: String,
    pub journal_log_dir: String,
    pub journal_retention: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            database_url: "postgres://localhost/live_bracket_engine".into(),
            poll_interval_ms: 5_000,
            fallback_delay_ms: 30_000,
            side_channel_timeout_ms: 5_000,
            dq_default_duration_secs: 120,
            dq_warning_threshold_secs: 30,
            sponsor_rotation_interval_secs: 30,
            sponsor_transition_ms: 500,
            timer_show_duration_secs: 20,
            timer_hide_duration_secs: 5,
            dev_bypass_duration_secs: 3 * 60 * 60,
            governor_rate_idle: 1.0,
            governor_rate_upcoming: 5.0,
            governor_rate_active: 20.0,
            stale_threshold_ms: 60_000,
            media_cache_dir: "data/media-cache".into(),
            sponsor_state_dir: "data/sponsor-state".into(),
            sponsor_image_dir: "data/sponsors".into(),
            journal_log_dir: "data/activity-log".into(),
            journal_retention: 1_000,
        }
    }
}

macro_rules! env_or_default {
    ($name:expr, $default:expr) => {
        env::var($name).unwrap_or_else(|_| $default.to_string())
    };
}

fn parse_env<T: std::str::FromStr<Err = std::num::ParseIntError>>(
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw.parse().map_err(|source| ConfigError::InvalidValue { var, source }),
        Err(_) => Ok(default),
    }
}

impl EngineConfig {
    /// Loads `.env` (ignored if missing, Docker sets envs directly) then
    /// overlays recognised variables on top of the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let defaults = EngineConfig::default();
        Ok(EngineConfig {
            database_url: env_or_default!("DATABASE_URL", defaults.database_url),
            poll_interval_ms: parse_env("POLL_INTERVAL_MS", defaults.poll_interval_ms)?,
            fallback_delay_ms: parse_env("FALLBACK_DELAY_MS", defaults.fallback_delay_ms)?,
            side_channel_timeout_ms: parse_env("SIDE_CHANNEL_TIMEOUT_MS", defaults.side_channel_timeout_ms)?,
            dq_default_duration_secs: parse_env("DQ_DEFAULT_DURATION_SECS", defaults.dq_default_duration_secs)?,
            dq_warning_threshold_secs: parse_env("DQ_WARNING_THRESHOLD_SECS", defaults.dq_warning_threshold_secs)?,
            sponsor_rotation_interval_secs: parse_env(
                "SPONSOR_ROTATION_INTERVAL_SECS",
                defaults.sponsor_rotation_interval_secs,
            )?,
            sponsor_transition_ms: parse_env("SPONSOR_TRANSITION_MS", defaults.sponsor_transition_ms)?,
            timer_show_duration_secs: parse_env("TIMER_SHOW_DURATION_SECS", defaults.timer_show_duration_secs)?,
            timer_hide_duration_secs: parse_env("TIMER_HIDE_DURATION_SECS", defaults.timer_hide_duration_secs)?,
            dev_bypass_duration_secs: defaults.dev_bypass_duration_secs,
            governor_rate_idle: defaults.governor_rate_idle,
            governor_rate_upcoming: defaults.governor_rate_upcoming,
            governor_rate_active: defaults.governor_rate_active,
            stale_threshold_ms: parse_env("STALE_THRESHOLD_MS", defaults.stale_threshold_ms)?,
            media_cache_dir: env_or_default!("MEDIA_CACHE_DIR", defaults.media_cache_dir),
            sponsor_state_dir: env_or_default!("SPONSOR_STATE_DIR", defaults.sponsor_state_dir),
            sponsor_image_dir: env_or_default!("SPONSOR_IMAGE_DIR", defaults.sponsor_image_dir),
            journal_log_dir: env_or_default!("JOURNAL_LOG_DIR", defaults.journal_log_dir),
            journal_retention: parse_env("JOURNAL_RETENTION", defaults.journal_retention)?,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn dq_warning_threshold(&self) -> Duration {
        Duration::from_secs(self.dq_warning_threshold_secs)
    }

    pub fn sponsor_rotation_interval(&self) -> Duration {
        Duration::from_secs(self.sponsor_rotation_interval_secs)
    }

    pub fn dev_bypass_duration(&self) -> Duration {
        Duration::from_secs(self.dev_bypass_duration_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_no_env_overrides_when_default_then_matches_spec_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.poll_interval_ms, 5_000);
        assert_eq!(cfg.fallback_delay_ms, 30_000);
        assert_eq!(cfg.dq_warning_threshold_secs, 30);
        assert_eq!(cfg.sponsor_rotation_interval_secs, 30);
        assert_eq!(cfg.dev_bypass_duration_secs, 3 * 60 * 60);
    }
}

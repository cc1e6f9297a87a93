//! VP configuration: the four `audio.*` options the engine reads at startup.
//!
//! The host that owns the on-disk settings format is out of scope; this
//! only models the four options the VP itself reads, with defaults
//! matching the hardware's power-on state. `from_pairs` takes already-split
//! key/value pairs so a caller embedding these in a larger TOML document
//! doesn't need this crate to pull in a TOML parser of its own.

use std::thread;

use crate::constants::MAX_WORKERS;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VpConfig {
    /// Selects the monitor point (VP output vs GP/EP DSP output) and
    /// whether the downstream DSP cores run at all.
    pub use_dsp: bool,
    /// Global HRTF gate; when false, C5 never runs regardless of per-voice
    /// HRTF targets.
    pub hrtf: bool,
    /// Monitor gain applied downstream, in `[0, 1]`.
    pub volume_limit: f32,
    /// Worker pool size; 0 means "auto" (host logical core count).
    pub num_workers: usize,
}

impl Default for VpConfig {
    fn default() -> Self {
        Self { use_dsp: false, hrtf: true, volume_limit: 1.0, num_workers: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownKey(String),
    InvalidValue { key: String, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::UnknownKey(key) => write!(f, "unrecognized configuration key '{key}'"),
            ConfigError::InvalidValue { key, value } => {
                write!(f, "invalid value '{value}' for '{key}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl VpConfig {
    /// Build from `audio.*` key/value pairs. Unrecognized keys are
    /// rejected, matching the method dispatcher's unknown-method trap
    /// discipline rather than silently ignoring an operator typo.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        for (key, value) in pairs {
            match key {
                "audio.use_dsp" => cfg.use_dsp = parse_bool(key, value)?,
                "audio.hrtf" => cfg.hrtf = parse_bool(key, value)?,
                "audio.volume_limit" => {
                    let v: f32 = value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() })?;
                    if !(0.0..=1.0).contains(&v) {
                        return Err(ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() });
                    }
                    cfg.volume_limit = v;
                }
                "audio.vp.num_workers" => {
                    cfg.num_workers = value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() })?;
                }
                other => return Err(ConfigError::UnknownKey(other.to_string())),
            }
        }
        Ok(cfg)
    }

    /// Resolve `num_workers == 0` ("auto") to the host's logical core
    /// count, clamped to `MAX_WORKERS`.
    pub fn resolved_num_workers(&self) -> usize {
        if self.num_workers == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1).min(MAX_WORKERS)
        } else {
            self.num_workers.min(MAX_WORKERS)
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_power_on_state() {
        let cfg = VpConfig::default();
        assert!(!cfg.use_dsp);
        assert!(cfg.hrtf);
        assert_eq!(cfg.volume_limit, 1.0);
        assert_eq!(cfg.num_workers, 0);
    }

    #[test]
    fn from_pairs_overrides_recognized_keys() {
        let cfg = VpConfig::from_pairs([
            ("audio.use_dsp", "true"),
            ("audio.hrtf", "false"),
            ("audio.volume_limit", "0.5"),
            ("audio.vp.num_workers", "4"),
        ])
        .unwrap();
        assert!(cfg.use_dsp);
        assert!(!cfg.hrtf);
        assert_eq!(cfg.volume_limit, 0.5);
        assert_eq!(cfg.num_workers, 4);
    }

    #[test]
    fn rejects_unknown_key() {
        assert!(VpConfig::from_pairs([("audio.bogus", "1")]).is_err());
    }

    #[test]
    fn rejects_out_of_range_volume_limit() {
        assert!(VpConfig::from_pairs([("audio.volume_limit", "1.5")]).is_err());
    }

    #[test]
    fn auto_worker_count_is_clamped_to_max() {
        let cfg = VpConfig { num_workers: MAX_WORKERS + 10, ..VpConfig::default() };
        assert_eq!(cfg.resolved_num_workers(), MAX_WORKERS);
    }
}

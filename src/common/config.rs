use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::common::error::{VoteError, Result};

/// Environment variable that overrides `matching.threshold`.
pub const MATCH_THRESHOLD_ENV: &str = "FACE_MATCH_THRESHOLD";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub liveness: LivenessConfig,
    #[serde(default)]
    pub tokens: TokenConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MatchingConfig {
    #[serde(default = "default_match_threshold")]
    pub threshold: f32,
    #[serde(default = "default_descriptor_length")]
    pub descriptor_length: usize,
}

fn default_match_threshold() -> f32 { 0.40 }
fn default_descriptor_length() -> usize { 128 }

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: default_match_threshold(),
            descriptor_length: default_descriptor_length(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LivenessConfig {
    #[serde(default = "default_blink_target")]
    pub blink_target: u32,
    #[serde(default = "default_closed_threshold")]
    pub closed_threshold: f32,
    #[serde(default = "default_debounce_frames")]
    pub closed_frames: u32,
    #[serde(default = "default_debounce_frames")]
    pub open_frames: u32,
    #[serde(default = "default_min_blink_interval")]
    pub min_blink_interval_ms: u64,
    #[serde(default = "default_same_face_threshold")]
    pub same_face_threshold: f32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    #[serde(default = "default_session_timeout")]
    pub timeout_seconds: u64,
}

fn default_blink_target() -> u32 { 3 }
fn default_closed_threshold() -> f32 { 0.6 }
fn default_debounce_frames() -> u32 { 2 }
fn default_min_blink_interval() -> u64 { 300 }
fn default_same_face_threshold() -> f32 { 0.6 }
fn default_idle_timeout() -> u64 { 30 }
fn default_session_timeout() -> u64 { 120 }

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            blink_target: default_blink_target(),
            closed_threshold: default_closed_threshold(),
            closed_frames: default_debounce_frames(),
            open_frames: default_debounce_frames(),
            min_blink_interval_ms: default_min_blink_interval(),
            same_face_threshold: default_same_face_threshold(),
            idle_timeout_seconds: default_idle_timeout(),
            timeout_seconds: default_session_timeout(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenConfig {
    #[serde(default = "default_token_ttl")]
    pub ttl_seconds: u64,
    /// Fixed MAC secret. A random one is generated per process when unset,
    /// which invalidates outstanding tokens on restart.
    #[serde(default)]
    pub secret: Option<String>,
}

fn default_token_ttl() -> u64 { 300 }

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_token_ttl(),
            secret: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Config {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VoteError::Config(format!(
                "Config file not found: {}. Please create it from the example.", path.display()
            )));
        }

        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| VoteError::Config(format!("Config parse error: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when it exists, otherwise the built-in defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load_from_path(path);
        }

        tracing::warn!("No config at {}, using defaults", path.display());
        let mut config = Config::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(raw) = std::env::var(MATCH_THRESHOLD_ENV) {
            self.matching.threshold = raw.trim().parse().map_err(|_| {
                VoteError::Config(format!("{} is not a number: {:?}", MATCH_THRESHOLD_ENV, raw))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        // Matching is `distance < threshold`, so 0 would reject every face
        if !self.matching.threshold.is_finite() || self.matching.threshold <= 0.0 {
            return Err(VoteError::Config(format!(
                "Match threshold must be a positive number, got {}",
                self.matching.threshold
            )));
        }
        if self.matching.descriptor_length == 0 || self.matching.descriptor_length > 4096 {
            return Err(VoteError::Config(format!(
                "Descriptor length must be between 1 and 4096, got {}",
                self.matching.descriptor_length
            )));
        }

        let liveness = &self.liveness;
        if liveness.blink_target == 0 || liveness.blink_target > 20 {
            return Err(VoteError::Config(format!(
                "Blink target must be between 1 and 20, got {}", liveness.blink_target
            )));
        }
        if !(0.0..=1.0).contains(&liveness.closed_threshold) {
            return Err(VoteError::Config(format!(
                "Closed threshold must be between 0.0 and 1.0, got {}",
                liveness.closed_threshold
            )));
        }
        if liveness.closed_frames == 0 || liveness.open_frames == 0 {
            return Err(VoteError::Config(format!(
                "Debounce frame counts must be at least 1, got closed={} open={}",
                liveness.closed_frames, liveness.open_frames
            )));
        }
        if !liveness.same_face_threshold.is_finite() || liveness.same_face_threshold < 0.0 {
            return Err(VoteError::Config(format!(
                "Same-face threshold must be a non-negative number, got {}",
                liveness.same_face_threshold
            )));
        }
        if liveness.idle_timeout_seconds == 0 || liveness.timeout_seconds == 0 {
            return Err(VoteError::Config(
                "Liveness timeouts must be at least 1 second".to_string()
            ));
        }

        if self.tokens.ttl_seconds == 0 || self.tokens.ttl_seconds > 3600 {
            return Err(VoteError::Config(format!(
                "Token TTL must be between 1 and 3600 seconds, got {}", self.tokens.ttl_seconds
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.matching.threshold, 0.40);
        assert_eq!(config.matching.descriptor_length, 128);
        assert_eq!(config.liveness.blink_target, 3);
        assert_eq!(config.liveness.closed_frames, 2);
        assert_eq!(config.liveness.open_frames, 2);
        assert_eq!(config.liveness.min_blink_interval_ms, 300);
        assert_eq!(config.liveness.same_face_threshold, 0.6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str("[matching]\nthreshold = 0.5\n").unwrap();
        assert_eq!(config.matching.threshold, 0.5);
        assert_eq!(config.matching.descriptor_length, 128);
        assert_eq!(config.liveness.blink_target, 3);
        assert_eq!(config.tokens.ttl_seconds, 300);
    }

    #[test]
    fn rejects_negative_threshold() {
        let mut config = Config::default();
        config.matching.threshold = -0.1;
        assert!(matches!(config.validate(), Err(VoteError::Config(_))));
    }

    #[test]
    fn rejects_zero_threshold() {
        let mut config = Config::default();
        config.matching.threshold = 0.0;
        assert!(matches!(config.validate(), Err(VoteError::Config(_))));

        config.matching.threshold = f32::MIN_POSITIVE;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_debounce() {
        let mut config = Config::default();
        config.liveness.open_frames = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn shipped_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("configs/face-vote.toml");
        let config: Config = toml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.liveness.blink_target, 3);
        assert!(config.tokens.secret.is_none());
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = Config::load_from_path(Path::new("/nonexistent/face-vote.toml")).unwrap_err();
        assert!(matches!(err, VoteError::Config(_)));
    }
}

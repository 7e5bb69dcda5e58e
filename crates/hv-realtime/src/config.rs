//! Harmonizer configuration
//!
//! Loaded once per session; every struct falls back to its defaults for
//! missing fields so partial JSON documents are accepted.

use hv_core::{HvError, HvResult, TempoInfo};
use serde::{Deserialize, Serialize};

/// Position resolution strategy, fixed for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// HMM score follower
    #[default]
    Stochastic,
    /// Snap to the nearest scored onset of the host position
    NearestOnset,
}

/// Position tracker parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Weight of the detector likelihood against a flat floor (0-1, exclusive)
    pub blend_weight: f64,
    /// Share of the leave probability that goes to the next note
    pub advance_share: f64,
    /// Initial probability of starting on the first note
    pub start_bias: f64,
    /// Minimum posterior share of the best state to report a position
    pub confidence_threshold: f64,
    /// Maximum forward steps applied when reading the position off the path
    pub forward_correction: usize,
    /// Backpointer rows retained for path tracing
    pub history_ticks: usize,
    /// Assumed length of the final scored note (crotchets)
    pub tail_duration: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            blend_weight: 0.5,
            advance_share: 0.95,
            start_bias: 0.5,
            confidence_threshold: 0.25,
            forward_correction: 2,
            history_ticks: 256,
            tail_duration: 1.0,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> HvResult<()> {
        if !(self.blend_weight > 0.0 && self.blend_weight < 1.0) {
            return Err(HvError::Config(format!(
                "blend_weight must be in (0, 1), got {}",
                self.blend_weight
            )));
        }
        if !(self.advance_share > 0.0 && self.advance_share <= 1.0) {
            return Err(HvError::Config(format!(
                "advance_share must be in (0, 1], got {}",
                self.advance_share
            )));
        }
        if !(self.start_bias > 0.0 && self.start_bias < 1.0) {
            return Err(HvError::Config(format!(
                "start_bias must be in (0, 1), got {}",
                self.start_bias
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(HvError::Config(format!(
                "confidence_threshold must be in [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.history_ticks == 0 {
            return Err(HvError::Config("history_ticks must be positive".to_string()));
        }
        if !(self.tail_duration.is_finite() && self.tail_duration > 0.0) {
            return Err(HvError::Config(format!(
                "tail_duration must be positive, got {}",
                self.tail_duration
            )));
        }
        Ok(())
    }
}

/// Key estimator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Bars per key group
    pub bars_per_group: u32,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self { bars_per_group: 1 }
    }
}

/// Complete session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonizerConfig {
    pub mode: TrackingMode,
    pub tempo: TempoInfo,
    /// Block size assumed until the host reports one
    pub block_size: usize,
    pub tracker: TrackerConfig,
    pub key: KeyConfig,
}

impl Default for HarmonizerConfig {
    fn default() -> Self {
        Self {
            mode: TrackingMode::Stochastic,
            tempo: TempoInfo::default(),
            block_size: 512,
            tracker: TrackerConfig::default(),
            key: KeyConfig::default(),
        }
    }
}

impl HarmonizerConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> HvResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| HvError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> HvResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| HvError::Config(e.to_string()))
    }

    pub fn validate(&self) -> HvResult<()> {
        self.tempo.validate()?;
        if self.block_size == 0 {
            return Err(HvError::InvalidBlockSize(self.block_size));
        }
        if self.key.bars_per_group == 0 {
            return Err(HvError::Config("bars_per_group must be positive".to_string()));
        }
        self.tracker.validate()
    }
}

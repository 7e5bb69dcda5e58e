//! Harmony Voice real-time engine
//!
//! Per-block harmony intervals for a live melody line:
//! - **Position Tracker**: HMM/Viterbi score following over the reference melody
//! - **Interval Getters**: stochastic and nearest-onset lookups with continuity hold
//! - **Session**: owns the score analysis and the configured getter
//! - **Tracing**: optional per-block trace sinks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hv_realtime::{HarmonizerConfig, HarmonySession};
//! use hv_pitch::DetectedPitch;
//!
//! let mut session = HarmonySession::new(span_table, HarmonizerConfig::default())?;
//!
//! // Audio thread, once per block
//! let pitch = detector.detect(&block).map(|(p, c)| DetectedPitch::new(p, c));
//! let interval = session.get_harmony_interval(position, pitch.as_ref(), block.len());
//! ```

pub mod config;
pub mod getter;
pub mod history;
pub mod session;
pub mod trace;
pub mod tracker;
pub mod transitions;

pub use config::{HarmonizerConfig, KeyConfig, TrackerConfig, TrackingMode};
pub use getter::{HoldState, IntervalGetter, NearestOnsetIntervalGetter, StochasticIntervalGetter};
pub use history::PathHistory;
pub use session::{Harmonizer, HarmonySession};
pub use trace::{LogSink, RingSink, TraceEvent, TraceSink, TracingSink};
pub use tracker::{Confidence, PositionTracker, TrackerEstimate, TrackerStats};
pub use transitions::TransitionModel;

//! Error types for Harmony Voice

use thiserror::Error;

/// Core error type
///
/// Only construction-time preconditions produce errors. The per-block path
/// absorbs failures into "no estimate" / "no harmony" results instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HvError {
    #[error("Invalid span table: {0}")]
    InvalidSpans(String),

    #[error("Invalid time signature {numerator}/{denominator}")]
    InvalidTimeSignature { numerator: u8, denominator: u8 },

    #[error("Invalid signature map: {0}")]
    InvalidSignatureMap(String),

    #[error("Invalid tempo: {bpm} BPM at {sample_rate} Hz")]
    InvalidTempo { bpm: f64, sample_rate: u32 },

    #[error("Invalid block size: {0}")]
    InvalidBlockSize(usize),

    #[error("Invalid key root: {0} (expected 0-11)")]
    InvalidKeyRoot(u8),

    #[error("Degenerate scale template: {0}")]
    DegenerateScale(String),

    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias
pub type HvResult<T> = Result<T, HvError>;

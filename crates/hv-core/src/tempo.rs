//! Tempo and Time Signature System
//!
//! Score positions are measured in crotchets (quarter notes):
//! - Time signatures anchor bar lines to crotchet positions
//! - The signature map turns a span range into bar boundaries
//! - Tempo converts crotchets into audio blocks for the tracker

use crate::error::{HvError, HvResult};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Minimum tempo
pub const MIN_TEMPO: f64 = 20.0;

/// Maximum tempo
pub const MAX_TEMPO: f64 = 400.0;

/// Tolerance when comparing crotchet positions
pub const POSITION_EPSILON: f64 = 1e-9;

// ═══════════════════════════════════════════════════════════════════════════════
// TIME SIGNATURE
// ═══════════════════════════════════════════════════════════════════════════════

/// Time signature (e.g., 4/4, 3/4, 6/8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    /// Numerator (beats per bar)
    pub numerator: u8,
    /// Denominator (note value that gets one beat)
    pub denominator: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::COMMON
    }
}

impl TimeSignature {
    pub fn new(numerator: u8, denominator: u8) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Common time (4/4)
    pub const COMMON: Self = Self {
        numerator: 4,
        denominator: 4,
    };

    /// Waltz time (3/4)
    pub const WALTZ: Self = Self {
        numerator: 3,
        denominator: 4,
    };

    /// Reject zero numerators and denominators that are not powers of two
    pub fn validate(&self) -> HvResult<()> {
        if self.numerator == 0 || self.denominator == 0 || !self.denominator.is_power_of_two() {
            return Err(HvError::InvalidTimeSignature {
                numerator: self.numerator,
                denominator: self.denominator,
            });
        }
        Ok(())
    }

    /// Crotchets per bar: `4 * numerator / denominator`
    pub fn crotchets_per_bar(&self) -> f64 {
        4.0 * self.numerator as f64 / self.denominator as f64
    }

}

impl std::fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIGNATURE MAP
// ═══════════════════════════════════════════════════════════════════════════════

/// Time signature change anchored to a bar index and a crotchet position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignatureEntry {
    /// Crotchet position of the first bar line under this signature
    pub position: f64,
    /// Bar index (0-based) that starts at `position`
    pub bar: u32,
    pub time_signature: TimeSignature,
}

const COMMON_FROM_ZERO: SignatureEntry = SignatureEntry {
    position: 0.0,
    bar: 0,
    time_signature: TimeSignature::COMMON,
};

/// Ordered time signature changes
///
/// A change that falls inside a bar starts a new (possibly short) bar at
/// the change position. Deserialized maps go through [`SignatureMap::new`];
/// stored bar indices are recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSignatureMap")]
pub struct SignatureMap {
    entries: Vec<SignatureEntry>,
}

#[derive(Deserialize)]
struct RawSignatureMap {
    #[serde(default)]
    entries: Vec<SignatureEntry>,
}

impl TryFrom<RawSignatureMap> for SignatureMap {
    type Error = HvError;

    fn try_from(raw: RawSignatureMap) -> HvResult<Self> {
        Self::new(
            raw.entries
                .into_iter()
                .map(|e| (e.position, e.time_signature)),
        )
    }
}

impl Default for SignatureMap {
    fn default() -> Self {
        Self {
            entries: vec![COMMON_FROM_ZERO],
        }
    }
}

impl SignatureMap {
    /// Build from `(position, signature)` changes.
    ///
    /// Changes are sorted by position; an empty list gives 4/4 from zero.
    /// Duplicate positions and non-finite positions are rejected.
    pub fn new(changes: impl IntoIterator<Item = (f64, TimeSignature)>) -> HvResult<Self> {
        let mut changes: Vec<(f64, TimeSignature)> = changes.into_iter().collect();
        if changes.is_empty() {
            return Ok(Self::default());
        }

        for (position, ts) in &changes {
            if !position.is_finite() {
                return Err(HvError::InvalidSignatureMap(format!(
                    "non-finite position {}",
                    position
                )));
            }
            ts.validate()?;
        }

        changes.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut entries: Vec<SignatureEntry> = Vec::with_capacity(changes.len());
        for (position, time_signature) in changes {
            let bar = match entries.last() {
                None => 0,
                Some(prev) => {
                    let span = position - prev.position;
                    if span <= POSITION_EPSILON {
                        return Err(HvError::InvalidSignatureMap(format!(
                            "duplicate signature position {}",
                            position
                        )));
                    }
                    let bars = (span / prev.time_signature.crotchets_per_bar() - POSITION_EPSILON).ceil();
                    prev.bar + bars as u32
                }
            };
            entries.push(SignatureEntry {
                position,
                bar,
                time_signature,
            });
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[SignatureEntry] {
        &self.entries
    }

    /// Signature in force at `position`
    pub fn signature_at(&self, position: f64) -> TimeSignature {
        self.entry_at(position).time_signature
    }

    fn entry_at(&self, position: f64) -> &SignatureEntry {
        let idx = self
            .entries
            .partition_point(|e| e.position <= position + POSITION_EPSILON);
        self.entries
            .get(idx.saturating_sub(1))
            .unwrap_or(&COMMON_FROM_ZERO)
    }

    /// Bar boundaries covering `[start, end)`.
    ///
    /// Returns ascending bar-line positions; the first is at or before
    /// `start` and the last is at or after `end`, so consecutive pairs
    /// delimit every bar touching the range.
    pub fn bar_lines(&self, start: f64, end: f64) -> Vec<f64> {
        let mut lines = Vec::new();
        if !(start.is_finite() && end.is_finite()) {
            return lines;
        }

        // Before the first anchor, extend its signature backwards
        let first = self.entries.first().unwrap_or(&COMMON_FROM_ZERO);
        let mut position = if start < first.position {
            let cpb = first.time_signature.crotchets_per_bar();
            first.position - ((first.position - start) / cpb).ceil() * cpb
        } else {
            let entry = self.entry_at(start);
            let cpb = entry.time_signature.crotchets_per_bar();
            entry.position + ((start - entry.position) / cpb + POSITION_EPSILON).floor() * cpb
        };

        lines.push(position);
        while position < end - POSITION_EPSILON || lines.len() < 2 {
            let entry = self.entry_at(position);
            let mut next = position + entry.time_signature.crotchets_per_bar();
            // A change inside this bar cuts it short
            if let Some(change) = self
                .entries
                .iter()
                .find(|e| e.position > position + POSITION_EPSILON)
            {
                if change.position < next - POSITION_EPSILON {
                    next = change.position;
                }
            }
            lines.push(next);
            position = next;
        }
        lines
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPO
// ═══════════════════════════════════════════════════════════════════════════════

/// Performance tempo and audio rate, used to convert crotchets into blocks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoInfo {
    /// Tempo in BPM (crotchets per minute)
    pub bpm: f64,
    /// Audio sample rate in Hz
    pub sample_rate: u32,
}

impl Default for TempoInfo {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            sample_rate: 48000,
        }
    }
}

impl TempoInfo {
    pub fn new(bpm: f64, sample_rate: u32) -> HvResult<Self> {
        let tempo = Self { bpm, sample_rate };
        tempo.validate()?;
        Ok(tempo)
    }

    pub fn validate(&self) -> HvResult<()> {
        if !(MIN_TEMPO..=MAX_TEMPO).contains(&self.bpm) || self.sample_rate == 0 {
            return Err(HvError::InvalidTempo {
                bpm: self.bpm,
                sample_rate: self.sample_rate,
            });
        }
        Ok(())
    }

    /// Seconds per crotchet
    #[inline]
    pub fn seconds_per_crotchet(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Audio blocks elapsing during one crotchet
    pub fn blocks_per_crotchet(&self, block_size: usize) -> HvResult<f64> {
        self.validate()?;
        if block_size == 0 {
            return Err(HvError::InvalidBlockSize(block_size));
        }
        Ok(self.seconds_per_crotchet() * self.sample_rate as f64 / block_size as f64)
    }
}

//! Krumhansl-Schmuckler key finding
//!
//! Correlates a pitch-class histogram with the Krumhansl-Kessler major and
//! minor probe-tone profiles rotated over all 12 roots.

use crate::key::{Key, Mode};
use hv_core::{math::pearson_correlation, pitch_class, NoteName, NoteNumber};
use serde::{Deserialize, Serialize};

/// Krumhansl-Kessler major profile (tonic first)
pub const MAJOR_PROFILE: [f32; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl-Kessler minor profile (tonic first)
pub const MINOR_PROFILE: [f32; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Winning key and its correlation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyMatch {
    pub key: Key,
    /// Pearson correlation with the winning profile (-1..1)
    pub correlation: f32,
}

/// Pitch-class histogram with Krumhansl-Schmuckler detection
#[derive(Debug, Clone)]
pub struct KeyFinder {
    histogram: [f32; 12],
    total_notes: usize,
}

impl Default for KeyFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyFinder {
    pub fn new() -> Self {
        Self {
            histogram: [0.0; 12],
            total_notes: 0,
        }
    }

    /// Reset histogram
    pub fn reset(&mut self) {
        self.histogram = [0.0; 12];
        self.total_notes = 0;
    }

    /// Add note to histogram
    pub fn add_note(&mut self, note: NoteNumber, weight: f32) {
        self.histogram[pitch_class(note) as usize] += weight;
        self.total_notes += 1;
    }

    pub fn add_notes(&mut self, notes: impl IntoIterator<Item = NoteNumber>) {
        for note in notes {
            self.add_note(note, 1.0);
        }
    }

    pub fn total_notes(&self) -> usize {
        self.total_notes
    }

    /// Best (root, mode) pair, or `None` with an empty histogram.
    ///
    /// Candidates are visited major profile first, roots ascending; only a
    /// strictly higher correlation replaces the current best, so ties keep
    /// the earlier candidate.
    pub fn detect(&self) -> Option<KeyMatch> {
        let sum: f32 = self.histogram.iter().sum();
        if self.total_notes == 0 || sum <= 0.0 {
            return None;
        }

        let normalized: Vec<f32> = self.histogram.iter().map(|&x| x / sum).collect();
        let mut rotated = [0.0f32; 12];
        let mut best: Option<KeyMatch> = None;

        for (mode, profile) in [(Mode::Major, &MAJOR_PROFILE), (Mode::Minor, &MINOR_PROFILE)] {
            for root in 0..12 {
                for (i, slot) in rotated.iter_mut().enumerate() {
                    *slot = normalized[(i + root) % 12];
                }
                let correlation = pearson_correlation(&rotated, profile);
                if best.is_none_or(|b| correlation > b.correlation) {
                    best = Some(KeyMatch {
                        key: Key::new(NoteName::from_pitch_class(root as u8), mode),
                        correlation,
                    });
                }
            }
        }

        best
    }
}

/// Key of a note collection, `None` when it is empty
pub fn find_key(notes: impl IntoIterator<Item = NoteNumber>) -> Option<KeyMatch> {
    let mut finder = KeyFinder::new();
    finder.add_notes(notes);
    finder.detect()
}

//! Per-block pitch observations
//!
//! The detector front end hands the core, once per block, either nothing or
//! an observation that scores candidate score notes. The tracker only needs
//! the scores; the harmony resolver also needs the pitch actually sounded.

use hv_core::{freq_to_midi, NoteNumber};
use serde::{Deserialize, Serialize};

/// Per-candidate-note observation confidence in `[0, 1]`
pub trait Likelihood {
    fn likelihood(&self, note: NoteNumber) -> f32;
}

impl<F> Likelihood for F
where
    F: Fn(NoteNumber) -> f32,
{
    #[inline]
    fn likelihood(&self, note: NoteNumber) -> f32 {
        self(note)
    }
}

/// Observation carrying the sounded pitch alongside the note scores
pub trait PitchObservation: Likelihood {
    /// Sounded pitch in fractional semitones (MIDI numbering)
    fn sounded_pitch(&self) -> f32;
}

/// Observation built from a single detected pitch.
///
/// Candidates are scored with a Gaussian in cents around the detected
/// pitch. Candidates an octave away keep `octave_weight` of that score to
/// absorb the detector's octave errors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedPitch {
    /// Detected pitch (fractional MIDI note)
    pub pitch: f32,
    /// Detector confidence (0-1)
    pub confidence: f32,
    /// Gaussian width in cents
    pub tolerance_cents: f32,
    /// Share of the score granted to octave neighbours
    pub octave_weight: f32,
}

impl DetectedPitch {
    pub fn new(pitch: f32, confidence: f32) -> Self {
        Self {
            pitch,
            confidence,
            tolerance_cents: 50.0,
            octave_weight: 0.5,
        }
    }

    /// From a detected frequency in Hz
    pub fn from_frequency(freq: f32, confidence: f32) -> Self {
        Self::new(freq_to_midi(freq), confidence)
    }

    pub fn with_tolerance(mut self, cents: f32) -> Self {
        self.tolerance_cents = cents;
        self
    }

    pub fn with_octave_weight(mut self, weight: f32) -> Self {
        self.octave_weight = weight;
        self
    }

    #[inline]
    fn gaussian(&self, semitones: f32) -> f32 {
        let x = semitones * 100.0 / self.tolerance_cents.max(1.0);
        (-0.5 * x * x).exp()
    }
}

impl Likelihood for DetectedPitch {
    fn likelihood(&self, note: NoteNumber) -> f32 {
        let diff = self.pitch - note as f32;
        let direct = self.gaussian(diff);
        let octave = self
            .gaussian(diff - 12.0)
            .max(self.gaussian(diff + 12.0))
            * self.octave_weight;
        (self.confidence * direct.max(octave)).clamp(0.0, 1.0)
    }
}

impl PitchObservation for DetectedPitch {
    #[inline]
    fn sounded_pitch(&self) -> f32 {
        self.pitch
    }
}

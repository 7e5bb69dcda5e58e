//! Diatonic scale-degree mapping
//!
//! Every major and minor key is expressed as a rotation of one natural-minor
//! template: the template is anchored at the key's aeolian tonic, found via
//! its circle-of-fifths position. Semitone positions map to fractional
//! degrees by linear interpolation between adjacent scale steps, so
//! chromatic passing tones land between degrees.

use crate::key::Key;
use hv_core::{math::floor_wrap, pitch_class, HvError, HvResult, NoteNumber};
use serde::{Deserialize, Serialize};

/// Degrees per octave
pub const DEGREES_PER_OCTAVE: f32 = 7.0;

/// Semitones per octave
pub const OCTAVE: f32 = 12.0;

/// Validated 7-step scale template, semitone offsets from the tonic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleTemplate([u8; 7]);

impl ScaleTemplate {
    /// Natural minor: A B C D E F G
    pub const AEOLIAN: Self = Self([0, 2, 3, 5, 7, 8, 10]);

    /// Steps must start at 0, rise strictly and stay inside one octave
    pub fn new(steps: [u8; 7]) -> HvResult<Self> {
        if steps[0] != 0 {
            return Err(HvError::DegenerateScale(format!(
                "template must start at 0, got {}",
                steps[0]
            )));
        }
        if steps.windows(2).any(|w| w[1] <= w[0]) {
            return Err(HvError::DegenerateScale(format!(
                "template steps must rise strictly: {:?}",
                steps
            )));
        }
        if steps[6] >= 12 {
            return Err(HvError::DegenerateScale(format!(
                "template exceeds one octave: {:?}",
                steps
            )));
        }
        Ok(Self(steps))
    }

    pub fn steps(&self) -> &[u8; 7] {
        &self.0
    }
}

impl Default for ScaleTemplate {
    fn default() -> Self {
        Self::AEOLIAN
    }
}

/// A key's scale, ready for degree <-> semitone conversion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiatonicScale {
    key: Key,
    /// Pitch class the template is anchored at
    tonic: u8,
    /// Template steps plus the closing octave
    steps: [f32; 8],
}

impl DiatonicScale {
    /// Natural-minor-relative scale of `key`
    pub fn new(key: Key) -> Self {
        Self::with_template(key, ScaleTemplate::AEOLIAN)
    }

    pub fn with_template(key: Key, template: ScaleTemplate) -> Self {
        let mut steps = [OCTAVE; 8];
        for (slot, &step) in steps.iter_mut().zip(template.steps()) {
            *slot = step as f32;
        }
        Self {
            key,
            tonic: key.aeolian_tonic(),
            steps,
        }
    }

    pub fn key(&self) -> Key {
        self.key
    }

    /// Check if a note is a scale tone
    pub fn contains(&self, note: NoteNumber) -> bool {
        let offset = (pitch_class(note) as i32 - self.tonic as i32).rem_euclid(12) as f32;
        self.steps[..7].contains(&offset)
    }

    /// Fractional degree of a semitone position (degree 0 = template tonic
    /// in the octave starting at note 0)
    pub fn semitone_to_degree(&self, semitone: f32) -> f32 {
        let (octaves, within) = floor_wrap(semitone - self.tonic as f32, OCTAVE);
        let step = self.steps[..7]
            .iter()
            .rposition(|&s| s <= within)
            .unwrap_or(0);
        let low = self.steps[step];
        let high = self.steps[step + 1];
        octaves * DEGREES_PER_OCTAVE + step as f32 + (within - low) / (high - low)
    }

    /// Semitone position of a fractional degree
    pub fn degree_to_semitone(&self, degree: f32) -> f32 {
        let (octaves, within) = floor_wrap(degree, DEGREES_PER_OCTAVE);
        let step = (within.floor() as usize).min(6);
        let frac = within - step as f32;
        let low = self.steps[step];
        let high = self.steps[step + 1];
        self.tonic as f32 + octaves * OCTAVE + low + frac * (high - low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hv_core::NoteName;

    #[test]
    fn test_template_validation() {
        assert!(ScaleTemplate::new([0, 2, 4, 5, 7, 9, 11]).is_ok());
        assert!(ScaleTemplate::new([1, 2, 4, 5, 7, 9, 11]).is_err());
        assert!(ScaleTemplate::new([0, 2, 2, 5, 7, 9, 11]).is_err());
        assert!(ScaleTemplate::new([0, 2, 4, 5, 7, 9, 12]).is_err());
    }

    #[test]
    fn test_c_major_membership() {
        let scale = DiatonicScale::new(Key::C_MAJOR);
        assert!(scale.contains(60));
        assert!(scale.contains(62));
        assert!(scale.contains(71));
        assert!(!scale.contains(61));
        assert!(!scale.contains(66));
    }

    #[test]
    fn test_a_major_membership() {
        let scale = DiatonicScale::new(Key::major(NoteName::A));
        for note in [69, 71, 73, 74, 76, 78, 80] {
            assert!(scale.contains(note), "{} should be in A major", note);
        }
        assert!(!scale.contains(72));
    }

    #[test]
    fn test_degrees_of_scale_tones() {
        let scale = DiatonicScale::new(Key::minor(NoteName::A));
        // A0 = 21 sits one octave above the template anchor at 9
        assert_relative_eq!(scale.semitone_to_degree(9.0), 0.0);
        assert_relative_eq!(scale.semitone_to_degree(21.0), 7.0);
        assert_relative_eq!(scale.semitone_to_degree(24.0), 9.0);
        assert_relative_eq!(scale.semitone_to_degree(8.0), -0.5);
    }

    #[test]
    fn test_chromatic_tone_interpolates() {
        let scale = DiatonicScale::new(Key::C_MAJOR);
        // C# lies halfway between C and D
        let c = scale.semitone_to_degree(60.0);
        let cs = scale.semitone_to_degree(61.0);
        let d = scale.semitone_to_degree(62.0);
        assert_relative_eq!(d - c, 1.0, epsilon = 1e-5);
        assert_relative_eq!(cs - c, 0.5, epsilon = 1e-5);
        // E -> F is a single semitone step
        assert_relative_eq!(scale.semitone_to_degree(65.0) - scale.semitone_to_degree(64.0), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_round_trip() {
        for key in [Key::C_MAJOR, Key::minor(NoteName::Fs), Key::major(NoteName::As)] {
            let scale = DiatonicScale::new(key);
            for tenth in -240..1280 {
                let semitone = tenth as f32 / 10.0;
                let back = scale.degree_to_semitone(scale.semitone_to_degree(semitone));
                assert_relative_eq!(back, semitone, epsilon = 1e-3);
            }
        }
    }
}

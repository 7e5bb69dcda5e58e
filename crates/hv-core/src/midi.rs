//! Note numbers and naming
//!
//! Score notes use MIDI numbering (60 = middle C) but are carried as `i32`
//! so that transposed harmony notes may leave the 0-127 range without
//! wrapping.

use serde::{Deserialize, Serialize};

/// MIDI-style note number
pub type NoteNumber = i32;

/// Semitones per octave
pub const SEMITONES_PER_OCTAVE: i32 = 12;

/// Note name helper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteName {
    C, Cs, D, Ds, E, F, Fs, G, Gs, A, As, B,
}

impl NoteName {
    /// All note names in chromatic order starting at C
    pub const ALL: [NoteName; 12] = [
        NoteName::C,
        NoteName::Cs,
        NoteName::D,
        NoteName::Ds,
        NoteName::E,
        NoteName::F,
        NoteName::Fs,
        NoteName::G,
        NoteName::Gs,
        NoteName::A,
        NoteName::As,
        NoteName::B,
    ];

    /// Split a note number into name and octave (60 = C4)
    pub fn from_note(note: NoteNumber) -> (Self, i32) {
        let octave = note.div_euclid(SEMITONES_PER_OCTAVE) - 1;
        (Self::from_pitch_class(pitch_class(note)), octave)
    }

    /// Name for a pitch class; values are reduced mod 12
    pub fn from_pitch_class(pc: u8) -> Self {
        Self::ALL[(pc % 12) as usize]
    }

    pub fn pitch_class(self) -> u8 {
        self as u8
    }

    pub fn to_note(self, octave: i32) -> NoteNumber {
        (octave + 1) * SEMITONES_PER_OCTAVE + self.pitch_class() as i32
    }

    pub fn name(&self) -> &'static str {
        match self {
            NoteName::C => "C",
            NoteName::Cs => "C#",
            NoteName::D => "D",
            NoteName::Ds => "D#",
            NoteName::E => "E",
            NoteName::F => "F",
            NoteName::Fs => "F#",
            NoteName::G => "G",
            NoteName::Gs => "G#",
            NoteName::A => "A",
            NoteName::As => "A#",
            NoteName::B => "B",
        }
    }
}

/// Pitch class (0-11) of a note number, correct for negative notes
#[inline]
pub fn pitch_class(note: NoteNumber) -> u8 {
    note.rem_euclid(SEMITONES_PER_OCTAVE) as u8
}

/// Display name such as "C#4"
pub fn note_display_name(note: NoteNumber) -> String {
    let (name, octave) = NoteName::from_note(note);
    format!("{}{}", name.name(), octave)
}

/// Convert frequency to fractional MIDI note number
#[inline]
pub fn freq_to_midi(freq: f32) -> f32 {
    69.0 + 12.0 * (freq / 440.0).log2()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_name_round_trip() {
        let (name, octave) = NoteName::from_note(61);
        assert_eq!(name, NoteName::Cs);
        assert_eq!(octave, 4);
        assert_eq!(name.to_note(octave), 61);
    }

    #[test]
    fn test_negative_notes() {
        assert_eq!(pitch_class(-1), 11);
        let (name, octave) = NoteName::from_note(-1);
        assert_eq!(name, NoteName::B);
        assert_eq!(octave, -2);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(note_display_name(60), "C4");
        assert_eq!(note_display_name(69), "A4");
        assert_eq!(note_display_name(70), "A#4");
    }

    #[test]
    fn test_freq_conversion() {
        assert!((freq_to_midi(440.0) - 69.0).abs() < 0.01);
        assert!((freq_to_midi(261.63) - 60.0).abs() < 0.01);
    }
}

//! Diatonic keys
//!
//! A key is a tonic pitch class plus a mode. Its position on the circle of
//! fifths (sharps positive, flats negative) is what the scale mapper uses to
//! rotate the natural-minor template.

use hv_core::{HvError, HvResult, NoteName};
use serde::{Deserialize, Serialize};

/// Key mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        }
    }
}

/// Musical key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub tonic: NoteName,
    pub mode: Mode,
}

impl Default for Key {
    fn default() -> Self {
        Self::C_MAJOR
    }
}

impl Key {
    pub const C_MAJOR: Self = Self {
        tonic: NoteName::C,
        mode: Mode::Major,
    };

    pub fn new(tonic: NoteName, mode: Mode) -> Self {
        Self { tonic, mode }
    }

    /// Key from a tonic pitch class (0 = C ... 11 = B)
    pub fn from_root(root: u8, mode: Mode) -> HvResult<Self> {
        if root >= 12 {
            return Err(HvError::InvalidKeyRoot(root));
        }
        Ok(Self::new(NoteName::from_pitch_class(root), mode))
    }

    pub fn major(tonic: NoteName) -> Self {
        Self::new(tonic, Mode::Major)
    }

    pub fn minor(tonic: NoteName) -> Self {
        Self::new(tonic, Mode::Minor)
    }

    /// Tonic pitch class (0-11)
    #[inline]
    pub fn root(&self) -> u8 {
        self.tonic.pitch_class()
    }

    /// Circle-of-fifths position of the key signature, in `-5..=6`
    /// (C major / A minor = 0, G major = 1, F major = -1, F# major = 6)
    pub fn fifths(&self) -> i32 {
        let major_root = match self.mode {
            Mode::Major => self.root() as i32,
            Mode::Minor => (self.root() as i32 + 3) % 12,
        };
        // 7 is its own inverse mod 12
        let steps = (major_root * 7).rem_euclid(12);
        if steps > 6 { steps - 12 } else { steps }
    }

    /// Tonic of the natural-minor scale sharing this key signature
    pub fn aeolian_tonic(&self) -> u8 {
        (9 + 7 * self.fifths()).rem_euclid(12) as u8
    }

    /// Relative key (C major <-> A minor)
    pub fn relative(&self) -> Self {
        match self.mode {
            Mode::Major => Self::new(NoteName::from_pitch_class(self.aeolian_tonic()), Mode::Minor),
            Mode::Minor => Self::new(NoteName::from_pitch_class((self.root() + 3) % 12), Mode::Major),
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.tonic.name(), self.mode.name())
    }
}

//! Scale-degree harmony resolution
//!
//! A stored harmony is a fixed chromatic interval above the scored melody
//! note. Applied blindly it goes wrong as soon as the performer deviates from
//! the scored pitch or the local key implies a different interval size. The
//! resolver instead measures the stored interval in scale degrees and
//! re-applies that many degrees to the pitch the performer actually sounds.

use crate::key::Key;
use crate::scale::{DiatonicScale, ScaleTemplate};
use hv_core::{HvResult, NoteNumber};

/// Maps scored intervals onto the performer's actual pitch
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HarmonyResolver {
    template: ScaleTemplate,
}

impl HarmonyResolver {
    /// Resolver over the natural-minor-relative template
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver over a custom 7-step template; degenerate templates are
    /// rejected here so that queries cannot fail
    pub fn with_template(steps: [u8; 7]) -> HvResult<Self> {
        Ok(Self {
            template: ScaleTemplate::new(steps)?,
        })
    }

    pub fn scale(&self, key: Key) -> DiatonicScale {
        DiatonicScale::with_template(key, self.template)
    }

    /// Degrees between the scored melody note and its scored harmony note
    /// (2.0 = a third, fractional for chromatic harmony notes)
    pub fn harmonization_degree(&self, score_note: NoteNumber, score_interval: i32, key: Key) -> f32 {
        let scale = self.scale(key);
        let melody = scale.semitone_to_degree(score_note as f32);
        let harmony = scale.semitone_to_degree((score_note + score_interval) as f32);
        harmony - melody
    }

    /// Semitone shift to add to `actual_semitone` so the result sits the
    /// scored number of degrees away inside `key`
    pub fn resolve_interval(
        &self,
        actual_semitone: f32,
        score_note: NoteNumber,
        score_interval: i32,
        key: Key,
    ) -> f32 {
        let degree = self.harmonization_degree(score_note, score_interval, key);
        let scale = self.scale(key);
        let actual_degree = scale.semitone_to_degree(actual_semitone);
        let harmonized = scale.degree_to_semitone(actual_degree + degree);
        harmonized - actual_semitone
    }
}

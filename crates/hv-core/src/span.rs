//! Reference span table
//!
//! One span per score onset. A span either starts a melody note (optionally
//! paired with a time-aligned harmony interval) or starts a silence. The
//! table is built once by the score loader and stays read-only for the
//! whole performance.

use crate::error::{HvError, HvResult};
use crate::midi::NoteNumber;
use crate::tempo::{SignatureMap, POSITION_EPSILON};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Melody note sounding from a span onset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayedNote {
    pub note_number: NoteNumber,
    /// Signed semitones from the melody note to the aligned harmony note
    #[serde(default)]
    pub harmonic_interval: Option<i32>,
}

/// One scored event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Onset in crotchets
    pub onset: f64,
    /// `None` means silence begins at this onset
    #[serde(default)]
    pub played_note: Option<PlayedNote>,
    /// Every melody or harmony note sounding during this span
    #[serde(default)]
    pub overlapping_notes: BTreeSet<NoteNumber>,
}

impl Span {
    /// Melody note without harmony
    pub fn note(onset: f64, note_number: NoteNumber) -> Self {
        Self {
            onset,
            played_note: Some(PlayedNote {
                note_number,
                harmonic_interval: None,
            }),
            overlapping_notes: BTreeSet::from([note_number]),
        }
    }

    /// Melody note with a harmony `interval` semitones away
    pub fn harmonized(onset: f64, note_number: NoteNumber, interval: i32) -> Self {
        Self {
            onset,
            played_note: Some(PlayedNote {
                note_number,
                harmonic_interval: Some(interval),
            }),
            overlapping_notes: BTreeSet::from([note_number, note_number + interval]),
        }
    }

    /// Silence
    pub fn rest(onset: f64) -> Self {
        Self {
            onset,
            played_note: None,
            overlapping_notes: BTreeSet::new(),
        }
    }

    /// Replace the overlapping note set
    pub fn with_overlapping(mut self, notes: impl IntoIterator<Item = NoteNumber>) -> Self {
        self.overlapping_notes = notes.into_iter().collect();
        self
    }

    #[inline]
    pub fn is_rest(&self) -> bool {
        self.played_note.is_none()
    }

    #[inline]
    pub fn harmonic_interval(&self) -> Option<i32> {
        self.played_note.and_then(|n| n.harmonic_interval)
    }
}

/// Entry of the derived melody: the sequence the tracker aligns against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MelodyNote {
    /// Index of the originating span
    pub span_index: usize,
    pub note_number: NoteNumber,
    pub onset: f64,
    /// Crotchets until the next span; `None` for the final span
    pub duration: Option<f64>,
}

/// Immutable, validated reference score
#[derive(Debug, Clone, PartialEq)]
pub struct SpanTable {
    spans: Vec<Span>,
    signatures: SignatureMap,
    melody: Vec<MelodyNote>,
}

impl Default for SpanTable {
    fn default() -> Self {
        Self::empty()
    }
}

impl SpanTable {
    /// Validate spans and derive the melody.
    ///
    /// Onsets must be finite and strictly increasing.
    pub fn new(spans: Vec<Span>, signatures: SignatureMap) -> HvResult<Self> {
        for (i, span) in spans.iter().enumerate() {
            if !span.onset.is_finite() {
                return Err(HvError::InvalidSpans(format!(
                    "span {} has non-finite onset {}",
                    i, span.onset
                )));
            }
            if i > 0 && span.onset <= spans[i - 1].onset + POSITION_EPSILON {
                return Err(HvError::InvalidSpans(format!(
                    "span {} onset {} does not follow {}",
                    i,
                    span.onset,
                    spans[i - 1].onset
                )));
            }
        }

        let melody = spans
            .iter()
            .enumerate()
            .filter_map(|(i, span)| {
                span.played_note.map(|note| MelodyNote {
                    span_index: i,
                    note_number: note.note_number,
                    onset: span.onset,
                    duration: spans.get(i + 1).map(|next| next.onset - span.onset),
                })
            })
            .collect::<Vec<_>>();

        log::debug!(
            "Span table: {} spans, {} melody notes",
            spans.len(),
            melody.len()
        );

        Ok(Self {
            spans,
            signatures,
            melody,
        })
    }

    /// Table with no spans; every query answers "nothing here"
    pub fn empty() -> Self {
        Self {
            spans: Vec::new(),
            signatures: SignatureMap::default(),
            melody: Vec::new(),
        }
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn span(&self, index: usize) -> Option<&Span> {
        self.spans.get(index)
    }

    pub fn signatures(&self) -> &SignatureMap {
        &self.signatures
    }

    pub fn melody(&self) -> &[MelodyNote] {
        &self.melody
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Span of the `melody_index`-th melody note
    pub fn melody_span(&self, melody_index: usize) -> Option<&Span> {
        self.melody
            .get(melody_index)
            .and_then(|m| self.spans.get(m.span_index))
    }

    /// Last span whose onset is at or before `position`
    pub fn span_index_at(&self, position: f64) -> Option<usize> {
        let idx = self
            .spans
            .partition_point(|s| s.onset <= position + POSITION_EPSILON);
        idx.checked_sub(1)
    }

    /// Melody note sounding (or last sounded) at `position`
    pub fn melody_index_at(&self, position: f64) -> Option<usize> {
        let idx = self
            .melody
            .partition_point(|m| m.onset <= position + POSITION_EPSILON);
        idx.checked_sub(1)
    }

    /// Span with the onset closest to `position`.
    ///
    /// Ties go to the earlier onset. Positions at or after the final onset
    /// are out of range.
    pub fn nearest_onset(&self, position: f64) -> Option<usize> {
        let last = self.spans.last()?;
        if !position.is_finite() || position >= last.onset - POSITION_EPSILON {
            return None;
        }

        let after = self.spans.partition_point(|s| s.onset <= position);
        if after == 0 {
            return Some(0);
        }
        let before = after - 1;
        let d_before = position - self.spans[before].onset;
        let d_after = self.spans[after].onset - position;
        if d_after < d_before {
            Some(after)
        } else {
            Some(before)
        }
    }
}

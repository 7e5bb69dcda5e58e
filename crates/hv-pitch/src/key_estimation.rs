//! Local key estimation over bar groups
//!
//! The score is cut into groups of bars with the signature map. Each group's
//! sounding notes go through the Krumhansl-Schmuckler finder; groups with no
//! notes inherit the previous group's key.

use crate::key::Key;
use crate::key_finder::KeyFinder;
use hv_core::{HvError, HvResult, NoteNumber, SpanTable, POSITION_EPSILON};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Key settled for one bar group
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyGroup {
    /// First span index after this group (exclusive end)
    pub end_span_index: usize,
    /// Crotchet position where the group ends (exclusive)
    pub end_position: f64,
    pub key: Key,
}

/// Monotone list of per-group keys with position lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyTable {
    groups: Vec<KeyGroup>,
}

impl KeyTable {
    pub fn new(groups: Vec<KeyGroup>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[KeyGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Key in force at `position`.
    ///
    /// Past the final group the last key carries on; an empty table answers
    /// C major.
    pub fn key_at(&self, position: f64) -> Key {
        let idx = self
            .groups
            .partition_point(|g| g.end_position <= position + POSITION_EPSILON);
        self.groups
            .get(idx)
            .or_else(|| self.groups.last())
            .map(|g| g.key)
            .unwrap_or_default()
    }
}

/// Bar-group key estimator
#[derive(Debug, Clone)]
pub struct KeyEstimator {
    bars_per_group: u32,
}

impl Default for KeyEstimator {
    fn default() -> Self {
        Self { bars_per_group: 1 }
    }
}

impl KeyEstimator {
    pub fn new(bars_per_group: u32) -> HvResult<Self> {
        if bars_per_group == 0 {
            return Err(HvError::InvalidParam(
                "bars_per_group must be at least 1".to_string(),
            ));
        }
        Ok(Self { bars_per_group })
    }

    pub fn bars_per_group(&self) -> u32 {
        self.bars_per_group
    }

    /// Estimate one key per bar group of `table`
    pub fn estimate(&self, table: &SpanTable) -> KeyTable {
        let spans = table.spans();
        let (Some(first), Some(last)) = (spans.first(), spans.last()) else {
            return KeyTable::default();
        };

        // Nudge the end so a final onset sitting on a bar line gets its own bar
        let bar_lines = table
            .signatures()
            .bar_lines(first.onset, last.onset + 1e-6);

        let mut finder = KeyFinder::new();
        let mut groups = Vec::new();
        let mut current = Key::C_MAJOR;
        let mut notes: BTreeSet<NoteNumber> = BTreeSet::new();
        let step = self.bars_per_group as usize;

        let mut start_line = 0;
        while start_line + 1 < bar_lines.len() {
            let end_line = (start_line + step).min(bar_lines.len() - 1);
            let group_start = bar_lines[start_line];
            let group_end = bar_lines[end_line];

            let begin = spans.partition_point(|s| s.onset < group_start - POSITION_EPSILON);
            let end = spans.partition_point(|s| s.onset < group_end - POSITION_EPSILON);

            notes.clear();
            // The span already sounding when the group opens
            if let Some(held) = table.span_index_at(group_start) {
                if held < begin {
                    notes.extend(spans[held].overlapping_notes.iter().copied());
                }
            }
            for span in &spans[begin..end] {
                notes.extend(span.overlapping_notes.iter().copied());
            }

            if !notes.is_empty() {
                finder.reset();
                finder.add_notes(notes.iter().copied());
                if let Some(found) = finder.detect() {
                    current = found.key;
                }
            }

            log::debug!(
                "Key group [{:.2}, {:.2}): {} notes -> {}",
                group_start,
                group_end,
                notes.len(),
                current
            );

            groups.push(KeyGroup {
                end_span_index: end,
                end_position: group_end,
                key: current,
            });
            start_line = end_line;
        }

        KeyTable::new(groups)
    }
}

//! HMM score follower
//!
//! Tracks the performer's position in the reference melody with a Viterbi
//! update per audio block. All probabilities live in log space; the table is
//! re-normalised after every update so its best entry is `0.0`.
//!
//! Every buffer is sized when the tracker is built, so `tick` never
//! allocates.

use crate::config::TrackerConfig;
use crate::history::PathHistory;
use crate::transitions::TransitionModel;
use hv_core::math::{argmax, best_share, LOG_ZERO};
use hv_core::{HvError, HvResult, MelodyNote, NoteNumber, SpanTable, TempoInfo};
use hv_pitch::Likelihood;

/// How much the tracker trusts the index it reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// Best state holds at least the configured posterior share
    Confident,
    /// Posterior too spread; the index is the last confident one
    Uncertain,
    /// No estimate this block
    Absent,
}

/// Result of one tracker update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerEstimate {
    /// Melody index (not span index)
    pub index: Option<usize>,
    pub confidence: Confidence,
    /// Posterior share of the best state
    pub share: f64,
}

impl TrackerEstimate {
    pub const NONE: Self = Self {
        index: None,
        confidence: Confidence::Absent,
        share: 0.0,
    };

    pub fn is_confident(&self) -> bool {
        self.confidence == Confidence::Confident
    }
}

/// Counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    /// Blocks seen, with or without an observation
    pub ticks: u64,
    /// Blocks whose likelihoods were rejected
    pub rejected: u64,
    /// Consecutive blocks without an observation
    pub absent_run: u64,
    /// Consecutive blocks with an accepted observation
    pub present_run: u64,
}

/// Viterbi position tracker over a melody
#[derive(Debug, Clone)]
pub struct PositionTracker {
    melody: Vec<MelodyNote>,
    notes: Vec<NoteNumber>,
    config: TrackerConfig,
    tempo: TempoInfo,
    block_size: usize,
    transitions: TransitionModel,
    /// Normalised log posterior, one entry per melody note
    log_probs: Vec<f64>,
    scratch: Vec<f64>,
    observation: Vec<f64>,
    backpointers: Vec<u32>,
    history: PathHistory,
    last_confident: Option<usize>,
    stats: TrackerStats,
}

impl PositionTracker {
    pub fn new(
        table: &SpanTable,
        tempo: TempoInfo,
        block_size: usize,
        config: TrackerConfig,
    ) -> HvResult<Self> {
        config.validate()?;
        let blocks_per_crotchet = tempo.blocks_per_crotchet(block_size)?;

        let melody = table.melody().to_vec();
        let n = melody.len();
        if n > u32::MAX as usize {
            return Err(HvError::InvalidSpans(format!("{n} melody notes exceed tracker range")));
        }
        let notes = melody.iter().map(|m| m.note_number).collect();
        let transitions = TransitionModel::new(&melody, blocks_per_crotchet, &config);
        let log_probs = transitions.log_initial().to_vec();
        let history = PathHistory::new(n, config.history_ticks);

        log::debug!(
            "Position tracker: {} states, {:.2} blocks per crotchet",
            n,
            blocks_per_crotchet
        );

        Ok(Self {
            melody,
            notes,
            config,
            tempo,
            block_size,
            transitions,
            log_probs,
            scratch: vec![0.0; n],
            observation: vec![0.0; n],
            backpointers: vec![0; n],
            history,
            last_confident: None,
            stats: TrackerStats::default(),
        })
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn tempo(&self) -> TempoInfo {
        self.tempo
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    pub fn transitions(&self) -> &TransitionModel {
        &self.transitions
    }

    /// Normalised log posterior over melody indices
    pub fn log_probabilities(&self) -> &[f64] {
        &self.log_probs
    }

    pub fn last_confident(&self) -> Option<usize> {
        self.last_confident
    }

    /// Arg-max of the posterior, before forward correction
    pub fn best_state(&self) -> Option<usize> {
        argmax(&self.log_probs)
    }

    /// Viterbi path over the retained history, oldest first
    pub fn best_path(&self) -> Vec<usize> {
        match self.best_state() {
            Some(best) => self.history.trace(best),
            None => Vec::new(),
        }
    }

    /// Process one block.
    ///
    /// `None` means the detector heard nothing: the posterior is left alone
    /// and no estimate is returned.
    pub fn tick<L: Likelihood + ?Sized>(&mut self, observation: Option<&L>) -> TrackerEstimate {
        self.stats.ticks += 1;

        let Some(observation) = observation else {
            self.stats.absent_run += 1;
            self.stats.present_run = 0;
            return TrackerEstimate::NONE;
        };

        let n = self.len();
        if n == 0 {
            return TrackerEstimate::NONE;
        }

        if !self.fill_observation(observation) {
            self.stats.rejected += 1;
            log::warn!("Rejected observation with invalid likelihood values");
            return TrackerEstimate::NONE;
        }

        self.viterbi_step();

        let max = self.scratch.iter().copied().fold(LOG_ZERO, f64::max);
        if !max.is_finite() {
            self.stats.rejected += 1;
            log::warn!("Rejected observation: posterior collapsed");
            return TrackerEstimate::NONE;
        }
        for v in &mut self.scratch {
            *v -= max;
        }
        std::mem::swap(&mut self.log_probs, &mut self.scratch);
        self.history.push(&self.backpointers);

        self.stats.present_run += 1;
        self.stats.absent_run = 0;

        let share = best_share(&self.log_probs);
        let Some(best) = argmax(&self.log_probs) else {
            return TrackerEstimate::NONE;
        };
        let index = self.forward_correct(best);

        if share >= self.config.confidence_threshold {
            self.last_confident = Some(index);
            TrackerEstimate {
                index: Some(index),
                confidence: Confidence::Confident,
                share,
            }
        } else {
            TrackerEstimate {
                index: self.last_confident,
                confidence: Confidence::Uncertain,
                share,
            }
        }
    }

    /// Block without an observation
    pub fn tick_silent(&mut self) -> TrackerEstimate {
        self.tick::<dyn Likelihood>(None)
    }

    /// Scale the detector scores into log observation terms.
    ///
    /// Returns false, leaving the posterior untouched, when any score is
    /// negative or not finite.
    fn fill_observation<L: Likelihood + ?Sized>(&mut self, observation: &L) -> bool {
        let w = self.config.blend_weight;
        for (slot, &note) in self.observation.iter_mut().zip(&self.notes) {
            let l = observation.likelihood(note);
            if !l.is_finite() || l < 0.0 {
                return false;
            }
            *slot = (w * l as f64 + (1.0 - w)).ln();
        }
        true
    }

    /// One max-product step into `scratch` and `backpointers`.
    ///
    /// Transitions only move forward, so the best skip source for state `j`
    /// is a running maximum over states `0..j-1`.
    fn viterbi_step(&mut self) {
        let prior = &self.log_probs;
        let t = &self.transitions;
        let mut skip_best = LOG_ZERO;
        let mut skip_from = 0u32;

        for j in 0..prior.len() {
            if j >= 2 {
                let candidate = prior[j - 2] + t.log_skip(j - 2);
                if candidate > skip_best {
                    skip_best = candidate;
                    skip_from = (j - 2) as u32;
                }
            }

            let mut best = prior[j] + t.log_stay(j);
            let mut from = j as u32;
            if j >= 1 {
                let advance = prior[j - 1] + t.log_advance(j - 1);
                if advance > best {
                    best = advance;
                    from = (j - 1) as u32;
                }
            }
            if skip_best > best {
                best = skip_best;
                from = skip_from;
            }

            self.scratch[j] = best + self.observation[j];
            self.backpointers[j] = from;
        }
    }

    /// Step past states the current observation explains strictly worse
    /// than their successor
    fn forward_correct(&self, best: usize) -> usize {
        let mut index = best;
        for _ in 0..self.config.forward_correction {
            match self.observation.get(index + 1) {
                Some(&next) if next > self.observation[index] => index += 1,
                _ => break,
            }
        }
        index
    }

    /// Back to the initial prior, clearing history and counters
    pub fn reset(&mut self) {
        self.log_probs.clear();
        self.log_probs.extend_from_slice(self.transitions.log_initial());
        self.history.clear();
        self.last_confident = None;
        self.stats = TrackerStats::default();
    }

    /// Concentrate the prior on a melody index, clearing history
    pub fn seek(&mut self, index: usize) {
        if self.is_empty() {
            return;
        }
        let index = index.min(self.len() - 1);
        self.transitions
            .fill_prior_at(index, self.config.start_bias, &mut self.log_probs);
        self.history.clear();
        self.last_confident = Some(index);
        log::debug!("Position tracker seek to melody index {}", index);
    }

    /// Rebuild transitions for a new host block size. The posterior is kept.
    pub fn set_block_size(&mut self, block_size: usize) -> HvResult<()> {
        if block_size == self.block_size {
            return Ok(());
        }
        let blocks_per_crotchet = self.tempo.blocks_per_crotchet(block_size)?;
        self.block_size = block_size;
        self.rebuild(blocks_per_crotchet);
        Ok(())
    }

    /// Rebuild transitions for a new tempo. The posterior is kept.
    pub fn set_tempo(&mut self, tempo: TempoInfo) -> HvResult<()> {
        let blocks_per_crotchet = tempo.blocks_per_crotchet(self.block_size)?;
        self.tempo = tempo;
        self.rebuild(blocks_per_crotchet);
        Ok(())
    }

    fn rebuild(&mut self, blocks_per_crotchet: f64) {
        self.transitions = TransitionModel::new(&self.melody, blocks_per_crotchet, &self.config);
        log::debug!(
            "Rebuilt transitions: block size {}, {:.2} blocks per crotchet",
            self.block_size,
            blocks_per_crotchet
        );
    }
}

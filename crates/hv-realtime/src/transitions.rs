//! HMM transition model over the reference melody
//!
//! Per state the model keeps three log probabilities: stay, advance to the
//! next note, and skip to any single later note (uniform). The full matrix is
//! never materialised, which keeps the Viterbi step linear in the melody
//! length.

use crate::config::TrackerConfig;
use hv_core::math::{ln_prob, LOG_ZERO};
use hv_core::MelodyNote;

/// Precomputed log transition probabilities
#[derive(Debug, Clone)]
pub struct TransitionModel {
    log_stay: Vec<f64>,
    log_advance: Vec<f64>,
    /// Log probability of each individual skip target beyond `i + 1`
    log_skip: Vec<f64>,
    log_initial: Vec<f64>,
    blocks_per_crotchet: f64,
}

impl TransitionModel {
    pub fn new(melody: &[MelodyNote], blocks_per_crotchet: f64, config: &TrackerConfig) -> Self {
        let n = melody.len();
        let mut log_stay = Vec::with_capacity(n);
        let mut log_advance = Vec::with_capacity(n);
        let mut log_skip = Vec::with_capacity(n);

        for (i, note) in melody.iter().enumerate() {
            let duration = note.duration.unwrap_or(config.tail_duration);
            let dwell_blocks = (duration * blocks_per_crotchet).max(0.0);
            let p_stay = 1.0 - 1.0 / (dwell_blocks + 1.0);
            let p_leave = 1.0 - p_stay;

            if i + 1 == n {
                // Nowhere further to go
                log_stay.push(0.0);
                log_advance.push(LOG_ZERO);
                log_skip.push(LOG_ZERO);
                continue;
            }

            let skip_targets = n - i - 2;
            let (p_advance, p_skip_each) = if skip_targets > 0 {
                (
                    p_leave * config.advance_share,
                    p_leave * (1.0 - config.advance_share) / skip_targets as f64,
                )
            } else {
                (p_leave, 0.0)
            };

            log_stay.push(ln_prob(p_stay));
            log_advance.push(ln_prob(p_advance));
            log_skip.push(ln_prob(p_skip_each));
        }

        let log_initial = match n {
            0 => Vec::new(),
            1 => vec![0.0],
            _ => {
                let rest = ln_prob((1.0 - config.start_bias) / (n - 1) as f64);
                let mut v = vec![rest; n];
                v[0] = ln_prob(config.start_bias);
                v
            }
        };

        Self {
            log_stay,
            log_advance,
            log_skip,
            log_initial,
            blocks_per_crotchet,
        }
    }

    pub fn len(&self) -> usize {
        self.log_stay.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log_stay.is_empty()
    }

    pub fn blocks_per_crotchet(&self) -> f64 {
        self.blocks_per_crotchet
    }

    #[inline]
    pub fn log_stay(&self, state: usize) -> f64 {
        self.log_stay[state]
    }

    #[inline]
    pub fn log_advance(&self, state: usize) -> f64 {
        self.log_advance[state]
    }

    #[inline]
    pub fn log_skip(&self, state: usize) -> f64 {
        self.log_skip[state]
    }

    /// Initial log prior of every state
    pub fn log_initial(&self) -> &[f64] {
        &self.log_initial
    }

    /// Log prior concentrated on `state` with the same shape as the initial
    /// prior
    pub fn fill_prior_at(&self, state: usize, bias: f64, out: &mut [f64]) {
        let n = out.len();
        if n == 0 {
            return;
        }
        if n == 1 {
            out[0] = 0.0;
            return;
        }
        out.fill(ln_prob((1.0 - bias) / (n - 1) as f64));
        out[state.min(n - 1)] = ln_prob(bias);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn melody(durations: &[Option<f64>]) -> Vec<MelodyNote> {
        durations
            .iter()
            .enumerate()
            .map(|(i, &duration)| MelodyNote {
                span_index: i,
                note_number: 60 + i as i32,
                onset: i as f64,
                duration,
            })
            .collect()
    }

    #[test]
    fn test_rows_sum_to_one() {
        let m = melody(&[Some(1.0), Some(0.5), Some(2.0), Some(1.0), None]);
        let model = TransitionModel::new(&m, 40.0, &TrackerConfig::default());
        let n = m.len();
        for from in 0..n {
            let skip_targets = n.saturating_sub(from + 2);
            let total = model.log_stay(from).exp()
                + model.log_advance(from).exp()
                + skip_targets as f64 * model.log_skip(from).exp();
            assert_relative_eq!(total, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_stay_follows_dwell() {
        let m = melody(&[Some(1.0), Some(2.0), None]);
        let model = TransitionModel::new(&m, 9.0, &TrackerConfig::default());
        // 9 blocks of dwell: p_stay = 1 - 1/10
        assert_relative_eq!(model.log_stay(0).exp(), 0.9, epsilon = 1e-12);
        // Longer note stays longer
        assert!(model.log_stay(1) > model.log_stay(0));
        // Second to last: whole leave mass advances
        assert_relative_eq!(model.log_advance(1).exp(), 1.0 / 19.0, epsilon = 1e-12);
    }

    #[test]
    fn test_final_state_absorbs() {
        let m = melody(&[Some(1.0), Some(1.0), Some(1.0), None]);
        let model = TransitionModel::new(&m, 10.0, &TrackerConfig::default());
        // Final state absorbs
        assert_eq!(model.log_stay(3), 0.0);
        assert_eq!(model.log_advance(3), LOG_ZERO);
        assert_eq!(model.log_skip(3), LOG_ZERO);
        assert!(model.log_skip(0) < model.log_advance(0));
    }

    #[test]
    fn test_initial_prior() {
        let m = melody(&[Some(1.0), Some(1.0), Some(1.0), None]);
        let model = TransitionModel::new(&m, 10.0, &TrackerConfig::default());
        let init = model.log_initial();
        assert_relative_eq!(init[0].exp(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(init[3].exp(), 0.5 / 3.0, epsilon = 1e-12);
        assert!(init.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_empty_melody() {
        let model = TransitionModel::new(&[], 10.0, &TrackerConfig::default());
        assert!(model.is_empty());
        assert!(model.log_initial().is_empty());
    }
}

//! Harmony session
//!
//! Owns the score analysis for one performance and the interval getter
//! selected by the configuration. Built off the audio thread; afterwards
//! `get_harmony_interval` is called once per block.

use crate::config::{HarmonizerConfig, TrackingMode};
use crate::getter::{
    HoldState, IntervalGetter, NearestOnsetIntervalGetter, StochasticIntervalGetter,
};
use crate::trace::TraceSink;
use crate::tracker::PositionTracker;
use hv_core::{HvResult, Span, SpanTable, TempoInfo};
use hv_pitch::{Key, KeyEstimator, KeyTable, PitchObservation};
use std::sync::Arc;

/// Interval getter chosen for the session
pub enum Harmonizer {
    Stochastic(StochasticIntervalGetter),
    NearestOnset(NearestOnsetIntervalGetter),
}

impl Harmonizer {
    pub fn mode(&self) -> TrackingMode {
        match self {
            Harmonizer::Stochastic(_) => TrackingMode::Stochastic,
            Harmonizer::NearestOnset(_) => TrackingMode::NearestOnset,
        }
    }

    pub fn hold_state(&self) -> HoldState {
        match self {
            Harmonizer::Stochastic(g) => g.hold_state(),
            Harmonizer::NearestOnset(g) => g.hold_state(),
        }
    }

    pub fn last_span(&self) -> Option<usize> {
        match self {
            Harmonizer::Stochastic(g) => g.last_span(),
            Harmonizer::NearestOnset(g) => g.last_span(),
        }
    }

    pub fn set_sink(&mut self, sink: Option<Box<dyn TraceSink>>) {
        match self {
            Harmonizer::Stochastic(g) => g.set_sink(sink),
            Harmonizer::NearestOnset(g) => g.set_sink(sink),
        }
    }
}

impl IntervalGetter for Harmonizer {
    #[inline]
    fn get_harmony_interval<O: PitchObservation + ?Sized>(
        &mut self,
        position: f64,
        observation: Option<&O>,
        block_size: usize,
    ) -> Option<f32> {
        match self {
            Harmonizer::Stochastic(g) => g.get_harmony_interval(position, observation, block_size),
            Harmonizer::NearestOnset(g) => {
                g.get_harmony_interval(position, observation, block_size)
            }
        }
    }

    fn reset(&mut self) {
        match self {
            Harmonizer::Stochastic(g) => g.reset(),
            Harmonizer::NearestOnset(g) => g.reset(),
        }
    }
}

/// One performance of one score
pub struct HarmonySession {
    config: HarmonizerConfig,
    spans: Arc<SpanTable>,
    keys: Arc<KeyTable>,
    harmonizer: Harmonizer,
}

impl HarmonySession {
    /// Estimate keys and build the configured getter
    pub fn new(spans: SpanTable, config: HarmonizerConfig) -> HvResult<Self> {
        config.validate()?;

        let spans = Arc::new(spans);
        let keys = Arc::new(KeyEstimator::new(config.key.bars_per_group)?.estimate(&spans));

        let harmonizer = match config.mode {
            TrackingMode::Stochastic => Harmonizer::Stochastic(StochasticIntervalGetter::new(
                Arc::clone(&spans),
                Arc::clone(&keys),
                config.tempo,
                config.block_size,
                config.tracker.clone(),
            )?),
            TrackingMode::NearestOnset => {
                Harmonizer::NearestOnset(NearestOnsetIntervalGetter::new(Arc::clone(&spans)))
            }
        };

        log::info!(
            "Harmony session: {:?} mode, {} spans, {} melody notes, {} key groups, {:.1} BPM",
            config.mode,
            spans.len(),
            spans.melody().len(),
            keys.groups().len(),
            config.tempo.bpm
        );

        Ok(Self {
            config,
            spans,
            keys,
            harmonizer,
        })
    }

    /// Attach a trace sink
    pub fn with_sink(mut self, sink: Box<dyn TraceSink>) -> Self {
        self.harmonizer.set_sink(Some(sink));
        self
    }

    pub fn set_sink(&mut self, sink: Option<Box<dyn TraceSink>>) {
        self.harmonizer.set_sink(sink);
    }

    /// Per-block entry point
    #[inline]
    pub fn get_harmony_interval<O: PitchObservation + ?Sized>(
        &mut self,
        position: f64,
        observation: Option<&O>,
        block_size: usize,
    ) -> Option<f32> {
        self.harmonizer
            .get_harmony_interval(position, observation, block_size)
    }

    pub fn reset(&mut self) {
        self.harmonizer.reset();
    }

    /// Restart following at a score position (stochastic mode). Continuity
    /// is cleared in both modes.
    pub fn seek(&mut self, position: f64) {
        match &mut self.harmonizer {
            Harmonizer::Stochastic(g) => g.seek(position),
            Harmonizer::NearestOnset(g) => g.reset(),
        }
    }

    pub fn set_tempo(&mut self, tempo: TempoInfo) -> HvResult<()> {
        tempo.validate()?;
        if let Harmonizer::Stochastic(g) = &mut self.harmonizer {
            g.set_tempo(tempo)?;
        }
        self.config.tempo = tempo;
        Ok(())
    }

    pub fn config(&self) -> &HarmonizerConfig {
        &self.config
    }

    pub fn mode(&self) -> TrackingMode {
        self.harmonizer.mode()
    }

    pub fn span_table(&self) -> &Arc<SpanTable> {
        &self.spans
    }

    pub fn key_table(&self) -> &Arc<KeyTable> {
        &self.keys
    }

    pub fn key_at(&self, position: f64) -> Key {
        self.keys.key_at(position)
    }

    /// Span resolved by the latest lookup
    pub fn last_span(&self) -> Option<&Span> {
        self.harmonizer
            .last_span()
            .and_then(|index| self.spans.span(index))
    }

    pub fn last_span_index(&self) -> Option<usize> {
        self.harmonizer.last_span()
    }

    pub fn hold_state(&self) -> HoldState {
        self.harmonizer.hold_state()
    }

    /// Position tracker, in stochastic mode
    pub fn tracker(&self) -> Option<&PositionTracker> {
        match &self.harmonizer {
            Harmonizer::Stochastic(g) => Some(g.tracker()),
            Harmonizer::NearestOnset(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hv_core::SignatureMap;
    use hv_pitch::DetectedPitch;

    fn spans() -> SpanTable {
        SpanTable::new(
            vec![
                Span::harmonized(0.0, 69, 3),
                Span::harmonized(1.0, 72, 3),
                Span::harmonized(2.0, 76, -4),
                Span::note(3.0, 69),
            ],
            SignatureMap::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_mode_selection() {
        let session = HarmonySession::new(spans(), HarmonizerConfig::default()).unwrap();
        assert_eq!(session.mode(), TrackingMode::Stochastic);
        assert!(session.tracker().is_some());

        let config = HarmonizerConfig {
            mode: TrackingMode::NearestOnset,
            ..HarmonizerConfig::default()
        };
        let session = HarmonySession::new(spans(), config).unwrap();
        assert_eq!(session.mode(), TrackingMode::NearestOnset);
        assert!(session.tracker().is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = HarmonizerConfig::default();
        config.key.bars_per_group = 0;
        assert!(HarmonySession::new(spans(), config).is_err());
    }

    #[test]
    fn test_key_and_last_span() {
        let mut session = HarmonySession::new(spans(), HarmonizerConfig::default()).unwrap();
        assert_eq!(session.key_at(0.5), session.key_table().key_at(0.5));
        assert!(session.last_span().is_none());

        let pitch = DetectedPitch::new(69.0, 1.0);
        assert!(session.get_harmony_interval(0.0, Some(&pitch), 512).is_some());
        assert_eq!(session.last_span_index(), Some(0));
        assert_eq!(session.last_span().map(|s| s.onset), Some(0.0));
    }

    #[test]
    fn test_seek_clears_hold() {
        let mut session = HarmonySession::new(spans(), HarmonizerConfig::default()).unwrap();
        let pitch = DetectedPitch::new(69.0, 1.0);
        session.get_harmony_interval(0.0, Some(&pitch), 512);
        assert!(session.hold_state().is_locked());

        session.seek(2.0);
        assert_eq!(session.hold_state(), HoldState::Idle);
        assert_eq!(session.tracker().and_then(|t| t.best_state()), Some(2));
    }

    #[test]
    fn test_set_tempo() {
        let mut session = HarmonySession::new(spans(), HarmonizerConfig::default()).unwrap();
        session.set_tempo(TempoInfo::new(90.0, 44100).unwrap()).unwrap();
        assert_eq!(session.config().tempo.bpm, 90.0);
        assert_eq!(session.tracker().map(|t| t.tempo().sample_rate), Some(44100));
        assert!(session.set_tempo(TempoInfo { bpm: 0.0, sample_rate: 44100 }).is_err());
        assert_eq!(session.config().tempo.bpm, 90.0);
    }
}

//! Per-block harmony interval getters
//!
//! Both getters share the same continuity rule: once a block with a pitch
//! has settled an interval, following blocks with a pitch keep returning it
//! without consulting the score again. A block without a pitch always mutes
//! the harmony and forces a fresh lookup on the next pitched block.

use crate::config::TrackerConfig;
use crate::trace::{TraceEvent, TraceSink};
use crate::tracker::{Confidence, PositionTracker, TrackerEstimate};
use hv_core::{HvResult, SpanTable, TempoInfo};
use hv_pitch::{HarmonyResolver, KeyTable, PitchObservation};
use std::sync::Arc;

/// Source of the harmony interval for each audio block
pub trait IntervalGetter {
    /// Interval in semitones to shift the sounded pitch by, or `None` to mute
    /// the harmony voice for this block.
    fn get_harmony_interval<O: PitchObservation + ?Sized>(
        &mut self,
        position: f64,
        observation: Option<&O>,
        block_size: usize,
    ) -> Option<f32>;

    /// Forget all continuity state
    fn reset(&mut self);
}

/// Continuity state carried between blocks
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum HoldState {
    /// Previous block had no pitch
    #[default]
    Idle,
    /// Previous block had a pitch but nothing was settled
    Seeking,
    /// Previous block settled this result; held while the pitch continues
    Locked(Option<f32>),
}

impl HoldState {
    pub fn is_locked(&self) -> bool {
        matches!(self, HoldState::Locked(_))
    }
}

fn record(sink: &mut Option<Box<dyn TraceSink>>, event: TraceEvent) {
    if let Some(sink) = sink.as_mut() {
        sink.record(&event);
    }
}

/// Score-following getter driven by the HMM position tracker
pub struct StochasticIntervalGetter {
    spans: Arc<SpanTable>,
    keys: Arc<KeyTable>,
    tracker: PositionTracker,
    resolver: HarmonyResolver,
    hold: HoldState,
    last_span: Option<usize>,
    sink: Option<Box<dyn TraceSink>>,
}

impl StochasticIntervalGetter {
    pub fn new(
        spans: Arc<SpanTable>,
        keys: Arc<KeyTable>,
        tempo: TempoInfo,
        block_size: usize,
        config: TrackerConfig,
    ) -> HvResult<Self> {
        let tracker = PositionTracker::new(&spans, tempo, block_size, config)?;
        Ok(Self {
            spans,
            keys,
            tracker,
            resolver: HarmonyResolver::new(),
            hold: HoldState::Idle,
            last_span: None,
            sink: None,
        })
    }

    pub fn set_sink(&mut self, sink: Option<Box<dyn TraceSink>>) {
        self.sink = sink;
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    pub fn hold_state(&self) -> HoldState {
        self.hold
    }

    /// Span resolved by the latest successful lookup
    pub fn last_span(&self) -> Option<usize> {
        self.last_span
    }

    /// Restart tracking at the melody note sounding at `position`
    pub fn seek(&mut self, position: f64) {
        let index = self.spans.melody_index_at(position).unwrap_or(0);
        self.tracker.seek(index);
        self.hold = HoldState::Idle;
    }

    pub fn set_tempo(&mut self, tempo: TempoInfo) -> HvResult<()> {
        self.tracker.set_tempo(tempo)
    }

    fn reseek<O: PitchObservation + ?Sized>(
        &mut self,
        position: f64,
        observation: &O,
        estimate: &TrackerEstimate,
    ) -> Option<f32> {
        let located = match (estimate.confidence, estimate.index) {
            (Confidence::Confident, Some(index)) => self
                .spans
                .melody()
                .get(index)
                .map(|note| note.span_index)
                .and_then(|span_index| {
                    self.spans.span(span_index).map(|span| (span_index, span))
                }),
            _ => None,
        };

        let Some((span_index, span)) = located else {
            self.hold = HoldState::Seeking;
            record(
                &mut self.sink,
                TraceEvent::Reseek {
                    position,
                    span_index: None,
                    confidence: estimate.confidence,
                    share: estimate.share,
                    key: None,
                    interval: None,
                },
            );
            return None;
        };

        self.last_span = Some(span_index);
        let key = self.keys.key_at(span.onset);
        let interval = match span.played_note {
            Some(played) => played.harmonic_interval.map(|iv| {
                self.resolver.resolve_interval(
                    observation.sounded_pitch(),
                    played.note_number,
                    iv,
                    key,
                )
            }),
            None => None,
        };

        match interval {
            Some(shift) if !shift.is_finite() => {
                log::warn!("Discarded non-finite interval at span {}", span_index);
                self.hold = HoldState::Seeking;
            }
            _ => self.hold = HoldState::Locked(interval),
        }

        log::debug!(
            "Re-seek at {:.3}: span {} ({}), interval {:?}",
            position,
            span_index,
            key,
            interval
        );
        record(
            &mut self.sink,
            TraceEvent::Reseek {
                position,
                span_index: Some(span_index),
                confidence: estimate.confidence,
                share: estimate.share,
                key: Some(key),
                interval,
            },
        );

        match self.hold {
            HoldState::Locked(value) => value,
            _ => None,
        }
    }
}

impl IntervalGetter for StochasticIntervalGetter {
    fn get_harmony_interval<O: PitchObservation + ?Sized>(
        &mut self,
        position: f64,
        observation: Option<&O>,
        block_size: usize,
    ) -> Option<f32> {
        if block_size != self.tracker.block_size() {
            if let Err(e) = self.tracker.set_block_size(block_size) {
                log::warn!("Ignoring block size change: {}", e);
            }
        }

        // The tracker follows the performance on every block, held or not
        let estimate = self.tracker.tick(observation);

        let result = match observation {
            None => {
                self.hold = HoldState::Idle;
                None
            }
            Some(observation) => match self.hold {
                HoldState::Locked(value) => value,
                HoldState::Idle | HoldState::Seeking => {
                    self.reseek(position, observation, &estimate)
                }
            },
        };

        record(
            &mut self.sink,
            TraceEvent::Block {
                position,
                observed: observation.is_some(),
                locked: self.hold.is_locked(),
                span_index: self.last_span,
                interval: result,
            },
        );
        result
    }

    fn reset(&mut self) {
        self.tracker.reset();
        self.hold = HoldState::Idle;
        self.last_span = None;
        record(&mut self.sink, TraceEvent::Reset);
    }
}

/// Deterministic getter snapping the host position to the nearest onset
pub struct NearestOnsetIntervalGetter {
    spans: Arc<SpanTable>,
    hold: HoldState,
    last_span: Option<usize>,
    sink: Option<Box<dyn TraceSink>>,
}

impl NearestOnsetIntervalGetter {
    pub fn new(spans: Arc<SpanTable>) -> Self {
        Self {
            spans,
            hold: HoldState::Idle,
            last_span: None,
            sink: None,
        }
    }

    pub fn set_sink(&mut self, sink: Option<Box<dyn TraceSink>>) {
        self.sink = sink;
    }

    pub fn hold_state(&self) -> HoldState {
        self.hold
    }

    pub fn last_span(&self) -> Option<usize> {
        self.last_span
    }

    fn reseek(&mut self, position: f64) -> Option<f32> {
        let Some(span_index) = self.spans.nearest_onset(position) else {
            self.hold = HoldState::Seeking;
            record(
                &mut self.sink,
                TraceEvent::Reseek {
                    position,
                    span_index: None,
                    confidence: Confidence::Absent,
                    share: 0.0,
                    key: None,
                    interval: None,
                },
            );
            return None;
        };

        let interval = self
            .spans
            .span(span_index)
            .and_then(|span| span.harmonic_interval())
            .map(|iv| iv as f32);
        self.last_span = Some(span_index);
        self.hold = HoldState::Locked(interval);

        record(
            &mut self.sink,
            TraceEvent::Reseek {
                position,
                span_index: Some(span_index),
                confidence: Confidence::Confident,
                share: 1.0,
                key: None,
                interval,
            },
        );
        interval
    }
}

impl IntervalGetter for NearestOnsetIntervalGetter {
    fn get_harmony_interval<O: PitchObservation + ?Sized>(
        &mut self,
        position: f64,
        observation: Option<&O>,
        _block_size: usize,
    ) -> Option<f32> {
        let result = match (observation, self.hold) {
            (None, _) => {
                self.hold = HoldState::Idle;
                None
            }
            (Some(_), HoldState::Locked(value)) => value,
            (Some(_), _) => self.reseek(position),
        };

        record(
            &mut self.sink,
            TraceEvent::Block {
                position,
                observed: observation.is_some(),
                locked: self.hold.is_locked(),
                span_index: self.last_span,
                interval: result,
            },
        );
        result
    }

    fn reset(&mut self) {
        self.hold = HoldState::Idle;
        self.last_span = None;
        record(&mut self.sink, TraceEvent::Reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{drain, RingSink};
    use approx::assert_relative_eq;
    use hv_core::{SignatureMap, Span};
    use hv_core::NoteNumber;
    use hv_pitch::{DetectedPitch, KeyEstimator, Likelihood};

    /// Pitched block that favours no melody note
    struct Flat;

    impl Likelihood for Flat {
        fn likelihood(&self, _note: NoteNumber) -> f32 {
            0.5
        }
    }

    impl PitchObservation for Flat {
        fn sounded_pitch(&self) -> f32 {
            62.0
        }
    }

    fn harmonized_table() -> Arc<SpanTable> {
        let spans = vec![
            Span::harmonized(0.0, 60, 4),
            Span::harmonized(1.0, 62, 3),
            Span::rest(2.0),
            Span::harmonized(3.0, 64, 3),
            Span::note(4.0, 65),
        ];
        Arc::new(SpanTable::new(spans, SignatureMap::default()).unwrap())
    }

    fn stochastic(spans: Arc<SpanTable>) -> StochasticIntervalGetter {
        let keys = Arc::new(KeyEstimator::default().estimate(&spans));
        StochasticIntervalGetter::new(spans, keys, TempoInfo::default(), 512, TrackerConfig::default())
            .unwrap()
    }

    #[test]
    fn test_nearest_onset_holds_while_pitched() {
        let mut getter = NearestOnsetIntervalGetter::new(harmonized_table());
        let pitch = DetectedPitch::new(60.0, 1.0);

        assert_eq!(getter.get_harmony_interval(0.1, Some(&pitch), 512), Some(4.0));
        // Position moved to the next onset but the pitch continued
        assert_eq!(getter.get_harmony_interval(1.0, Some(&pitch), 512), Some(4.0));
        assert_eq!(getter.hold_state(), HoldState::Locked(Some(4.0)));

        assert_eq!(getter.get_harmony_interval(1.0, None::<&DetectedPitch>, 512), None);
        assert_eq!(getter.hold_state(), HoldState::Idle);
        assert_eq!(getter.get_harmony_interval(1.0, Some(&pitch), 512), Some(3.0));
        assert_eq!(getter.last_span(), Some(1));
    }

    #[test]
    fn test_nearest_onset_rest_and_plain_spans_settle_none() {
        let mut getter = NearestOnsetIntervalGetter::new(harmonized_table());
        let pitch = DetectedPitch::new(64.0, 1.0);
        assert_eq!(getter.get_harmony_interval(2.1, Some(&pitch), 512), None);
        assert_eq!(getter.hold_state(), HoldState::Locked(None));
        assert_eq!(getter.last_span(), Some(2));
    }

    #[test]
    fn test_nearest_onset_out_of_range_retries() {
        let mut getter = NearestOnsetIntervalGetter::new(harmonized_table());
        let pitch = DetectedPitch::new(65.0, 1.0);
        assert_eq!(getter.get_harmony_interval(4.5, Some(&pitch), 512), None);
        assert_eq!(getter.hold_state(), HoldState::Seeking);
        // Still seeking: a later in-range block resolves
        assert_eq!(getter.get_harmony_interval(3.2, Some(&pitch), 512), Some(3.0));
    }

    #[test]
    fn test_stochastic_first_block_resolves() {
        let mut getter = stochastic(harmonized_table());
        let pitch = DetectedPitch::new(60.0, 1.0);
        let interval = getter.get_harmony_interval(0.0, Some(&pitch), 512);
        assert_relative_eq!(interval.unwrap(), 4.0, epsilon = 1e-4);
        assert_eq!(getter.last_span(), Some(0));
        assert!(getter.hold_state().is_locked());
    }

    #[test]
    fn test_stochastic_absent_mutes_and_reseeks() {
        let mut getter = stochastic(harmonized_table());
        let pitch = DetectedPitch::new(60.0, 1.0);
        getter.get_harmony_interval(0.0, Some(&pitch), 512);
        for _ in 0..5 {
            assert_eq!(getter.get_harmony_interval(0.5, None::<&DetectedPitch>, 512), None);
        }
        assert_eq!(getter.hold_state(), HoldState::Idle);
        assert_eq!(getter.tracker().stats().absent_run, 5);
        assert!(getter.get_harmony_interval(0.6, Some(&pitch), 512).is_some());
        assert!(getter.hold_state().is_locked());
    }

    #[test]
    fn test_stochastic_uncertain_estimate_keeps_seeking() {
        let spans = harmonized_table();
        let keys = Arc::new(KeyEstimator::default().estimate(&spans));
        let config = TrackerConfig {
            confidence_threshold: 0.99,
            ..TrackerConfig::default()
        };
        let mut getter =
            StochasticIntervalGetter::new(spans, keys, TempoInfo::default(), 512, config).unwrap();
        let (sink, mut consumer) = RingSink::new(16);
        getter.set_sink(Some(Box::new(sink)));

        // Seeking leaves a last confident index for the tracker to report
        getter.seek(1.0);
        for _ in 0..3 {
            assert_eq!(getter.get_harmony_interval(1.0, Some(&Flat), 512), None);
            assert_eq!(getter.hold_state(), HoldState::Seeking);
        }
        assert_eq!(getter.tracker().last_confident(), Some(1));
        assert_eq!(getter.last_span(), None);

        // Every pitched block retries the lookup
        let mut events = Vec::new();
        drain(&mut consumer, &mut events);
        assert_eq!(events.len(), 6);
        for pair in events.chunks(2) {
            assert!(matches!(
                pair[0],
                TraceEvent::Reseek {
                    span_index: None,
                    confidence: Confidence::Uncertain,
                    interval: None,
                    ..
                }
            ));
            assert!(matches!(pair[1], TraceEvent::Block { locked: false, interval: None, .. }));
        }
    }

    #[test]
    fn test_stochastic_tracks_block_size() {
        let mut getter = stochastic(harmonized_table());
        let pitch = DetectedPitch::new(60.0, 1.0);
        getter.get_harmony_interval(0.0, Some(&pitch), 256);
        assert_eq!(getter.tracker().block_size(), 256);
        // Invalid size is ignored
        getter.get_harmony_interval(0.0, Some(&pitch), 0);
        assert_eq!(getter.tracker().block_size(), 256);
    }

    #[test]
    fn test_empty_table_never_harmonizes() {
        let spans = Arc::new(SpanTable::empty());
        let mut getter = stochastic(spans.clone());
        let mut fallback = NearestOnsetIntervalGetter::new(spans);
        let pitch = DetectedPitch::new(60.0, 1.0);
        for _ in 0..3 {
            assert_eq!(getter.get_harmony_interval(0.0, Some(&pitch), 512), None);
            assert_eq!(fallback.get_harmony_interval(0.0, Some(&pitch), 512), None);
        }
        assert_eq!(getter.hold_state(), HoldState::Seeking);
    }

    #[test]
    fn test_trace_events() {
        let (sink, mut consumer) = RingSink::new(16);
        let mut getter = stochastic(harmonized_table());
        getter.set_sink(Some(Box::new(sink)));
        let pitch = DetectedPitch::new(60.0, 1.0);
        getter.get_harmony_interval(0.0, Some(&pitch), 512);
        getter.get_harmony_interval(0.0, Some(&pitch), 512);
        getter.reset();

        let mut events = Vec::new();
        drain(&mut consumer, &mut events);
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], TraceEvent::Reseek { span_index: Some(0), .. }));
        assert!(matches!(events[1], TraceEvent::Block { locked: true, .. }));
        assert!(matches!(events[2], TraceEvent::Block { locked: true, .. }));
        assert_eq!(events[3], TraceEvent::Reset);
    }
}

//! Per-block debug traces
//!
//! Interval getters report what they decided through an optional
//! [`TraceSink`]. Without one, nothing is recorded.

use crate::tracker::Confidence;
use hv_pitch::Key;
use rtrb::{Consumer, Producer, RingBuffer};

/// One trace record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraceEvent {
    /// Outcome of a block
    Block {
        position: f64,
        observed: bool,
        locked: bool,
        span_index: Option<usize>,
        interval: Option<f32>,
    },
    /// A fresh position query
    Reseek {
        position: f64,
        span_index: Option<usize>,
        confidence: Confidence,
        share: f64,
        key: Option<Key>,
        interval: Option<f32>,
    },
    /// Getter state cleared
    Reset,
}

/// Receiver of trace events. Called from the audio thread.
pub trait TraceSink: Send {
    fn record(&mut self, event: &TraceEvent) {
        let _ = event;
    }
}

/// Writes events to the `log` facade at trace level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TraceSink for LogSink {
    fn record(&mut self, event: &TraceEvent) {
        log::trace!("{:?}", event);
    }
}

/// Emits structured `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn record(&mut self, event: &TraceEvent) {
        match *event {
            TraceEvent::Block {
                position,
                observed,
                locked,
                span_index,
                interval,
            } => {
                tracing::trace!(position, observed, locked, span=?span_index, interval=?interval, "block");
            }
            TraceEvent::Reseek {
                position,
                span_index,
                confidence,
                share,
                key,
                interval,
            } => {
                tracing::debug!(
                    position,
                    span=?span_index,
                    confidence=?confidence,
                    share,
                    key = key.map(tracing::field::display),
                    interval=?interval,
                    "reseek"
                );
            }
            TraceEvent::Reset => tracing::debug!("reset"),
        }
    }
}

/// Lock-free hand-off of events to another thread.
///
/// Events that do not fit are dropped and counted.
pub struct RingSink {
    producer: Producer<TraceEvent>,
    dropped: u64,
}

impl RingSink {
    /// Sink plus the consumer end for the reading thread
    pub fn new(capacity: usize) -> (Self, Consumer<TraceEvent>) {
        let (producer, consumer) = RingBuffer::new(capacity);
        (
            Self {
                producer,
                dropped: 0,
            },
            consumer,
        )
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl TraceSink for RingSink {
    fn record(&mut self, event: &TraceEvent) {
        if self.producer.push(*event).is_err() {
            self.dropped += 1;
        }
    }
}

/// Pop every queued event into `buffer`
pub fn drain(consumer: &mut Consumer<TraceEvent>, buffer: &mut Vec<TraceEvent>) {
    while let Ok(event) = consumer.pop() {
        buffer.push(event);
    }
}

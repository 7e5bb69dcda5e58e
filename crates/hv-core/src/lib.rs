//! hv-core: Shared types, traits, and utilities for Harmony Voice
//!
//! This crate provides the foundational types used across all Harmony Voice
//! crates: the immutable reference span table, time signatures and tempo
//! conversion, note helpers and the numeric utilities used in log space.

mod error;
pub mod math;
mod midi;
mod span;
mod tempo;

pub use error::*;
pub use midi::*;
pub use span::*;
pub use tempo::*;

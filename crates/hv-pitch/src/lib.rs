//! Harmony Voice tonal analysis
//!
//! ## Features
//! - **Key Finding**: Krumhansl-Schmuckler correlation over pitch-class histograms
//! - **Key Estimation**: one key per bar group of the reference score
//! - **Scale Degrees**: natural-minor-relative degree mapping with chromatic interpolation
//! - **Harmony Resolution**: scored intervals re-applied in scale-degree space
//! - **Observations**: per-block pitch likelihoods from the detector front end
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hv_pitch::{HarmonyResolver, KeyEstimator};
//!
//! let keys = KeyEstimator::default().estimate(&span_table);
//! let key = keys.key_at(span.onset);
//! let shift = HarmonyResolver::new().resolve_interval(sounded, note, interval, key);
//! ```

pub mod harmony;
pub mod key;
pub mod key_estimation;
pub mod key_finder;
pub mod observation;
pub mod scale;

pub use harmony::HarmonyResolver;
pub use key::{Key, Mode};
pub use key_estimation::{KeyEstimator, KeyGroup, KeyTable};
pub use key_finder::{find_key, KeyFinder, KeyMatch};
pub use observation::{DetectedPitch, Likelihood, PitchObservation};
pub use scale::{DiatonicScale, ScaleTemplate};

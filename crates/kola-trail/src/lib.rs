//! Adaptive trailing stop pricing for kola.
//!
//! `TrailPricer` keeps a bounded history of reference prices, measures the
//! variation between two recent time windows, and shrinks the stop offset
//! when the market gets agitated. The live stop only ratchets forward.

pub mod config;
pub mod error;
pub mod histogram;
pub mod pricer;

pub use config::TrailConfig;
pub use error::{TrailError, TrailResult};
pub use histogram::VariationHistogram;
pub use pricer::{TrailPricer, TrailSample};

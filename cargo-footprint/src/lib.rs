//! Resource footprint estimator for fully quantized TFLite models: MACs per
//! inference, ROM for constants, and best/worst case activation RAM.

pub mod error;
pub mod estimate;
pub mod ir;
pub mod parse;

#[cfg(test)]
mod fixtures;

pub use error::{Error, Result};
pub use estimate::{estimate_graph, estimate_model, EstimateOptions, Report};

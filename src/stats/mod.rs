//! Runtime statistics

pub mod metrics;

pub use metrics::{Counters, ServerStats};

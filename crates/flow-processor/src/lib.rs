//! Signal processor stage.
//!
//! Consumes raw signals, applies the filter chain (symbol whitelist,
//! confidence floor, duplicate suppression) and turns survivors into
//! order requests. Filtered-out signals are acked and dropped; only
//! survivors are republished.

pub mod config;
pub mod processor;

pub use config::ProcessorConfig;
pub use processor::SignalProcessor;

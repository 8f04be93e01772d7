//! Pipeline node: the broker plus any subset of stages in one process.
//!
//! Every stage is enabled by default; flipping stage flags in the
//! config splits the pipeline across processes, with the broker
//! embedded in exactly one of them.

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::{NodeConfig, StagesConfig};
pub use error::{AppError, AppResult};

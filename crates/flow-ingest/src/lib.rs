//! Signal ingestion stage.
//!
//! Accepts provider webhooks over HTTP, validates the minimal shape,
//! stamps an id and receive time, and publishes the signal onto the
//! pipeline. Anything past the publish is someone else's concern; a
//! provider retrying a 5xx simply produces a duplicate the downstream
//! dedup absorbs.

pub mod config;
pub mod server;

pub use config::IngestConfig;
pub use server::{ingest_router, IngestState};

//! Tunegrab - fetch music from Spotify queries into a tagged library
//!
//! A query is resolved to a canonical Spotify URL, downloaded with spotdl and
//! the resulting files are moved into `root/<album artist>/<album>/`.

/// Client modules for the Spotify catalog and the spotdl download tool
pub mod clients;
/// Tag-based file organization
pub mod organizer;
/// The resolve → download → organize pipeline
pub mod pipeline;
/// Query resolution
pub mod resolver;

pub use clients::entities::{CanonicalUrl, EntityKind, Outcome, TrackMetadata};
pub use clients::errors::{Error, Result};
pub use pipeline::{Pipeline, PipelineBuilder, RetryPolicy};

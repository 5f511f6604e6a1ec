/// Data entities for entity kinds, URLs and track metadata
pub mod entities;
/// Error types and result aliases
pub mod errors;
/// spotdl download tool wrapper
pub mod spotdl;
/// Spotify search client
pub mod spotify;

pub use spotdl::{Downloader, DownloaderConfig};
pub use spotify::{CatalogSearch, SpotifyClient};

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use clap::ValueEnum;
use serde::Serialize;

use crate::clients::errors::{Error, Result};

/// Host every canonical URL points at.
pub const CATALOG_HOST: &str = "open.spotify.com";

/// Category of a catalog object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
pub enum EntityKind {
    /// An artist page
    Artist,
    /// An album
    Album,
    /// A single track
    Track,
    /// A user or editorial playlist
    Playlist,
}

impl EntityKind {
    /// Every kind, in the order an unscoped search prefers them.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Artist,
        EntityKind::Album,
        EntityKind::Track,
        EntityKind::Playlist,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Artist => "artist",
            EntityKind::Album => "album",
            EntityKind::Track => "track",
            EntityKind::Playlist => "playlist",
        }
    }

    /// Name of the search-response bucket holding results of this kind.
    pub fn bucket(self) -> &'static str {
        match self {
            EntityKind::Artist => "artists",
            EntityKind::Album => "albums",
            EntityKind::Track => "tracks",
            EntityKind::Playlist => "playlists",
        }
    }

    fn url_prefix(self) -> String {
        format!("https://{CATALOG_HOST}/{}/", self.as_str())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnexpectedResponse(format!("unknown entity kind {s:?}")))
    }
}

/// Fully-qualified `https://open.spotify.com/<kind>/<id>` identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalUrl {
    pub kind: EntityKind,
    pub id: String,
}

impl CanonicalUrl {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        CanonicalUrl {
            kind,
            id: id.into(),
        }
    }

    /// Build from a search item URI such as `spotify:track:4uLU6hMCjMI75M1A2tKUQC`.
    ///
    /// `expected` is the bucket the item was found in; a URI naming another
    /// kind means the response is inconsistent.
    pub fn from_uri(uri: &str, expected: EntityKind) -> Result<Self> {
        let segments: Vec<&str> = uri.split(':').collect();
        let [_scheme, kind, id] = segments.as_slice() else {
            return Err(Error::UnexpectedResponse(format!("malformed URI {uri:?}")));
        };
        if *kind != expected.as_str() || id.is_empty() {
            return Err(Error::UnexpectedResponse(format!(
                "URI {uri:?} found in the {} bucket",
                expected.bucket()
            )));
        }
        Ok(CanonicalUrl::new(expected, *id))
    }

    /// Classify a URL string against the four known canonical prefixes.
    ///
    /// A query string or fragment (`?si=...` from share links) is dropped.
    pub fn parse(url: &str) -> Result<Self> {
        let path = url.split_once(['?', '#']).map_or(url, |(path, _)| path);
        EntityKind::ALL
            .into_iter()
            .find_map(|kind| {
                path.strip_prefix(&kind.url_prefix())
                    .filter(|id| !id.is_empty() && !id.contains('/'))
                    .map(|id| CanonicalUrl::new(kind, id))
            })
            .ok_or_else(|| Error::UnrecognizedUrl(url.to_string()))
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "https://{CATALOG_HOST}/{}/{}", self.kind, self.id)
    }
}

/// Tags that decide where a downloaded file ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    pub album_artist: String,
    pub album_name: String,
    pub title: String,
}

impl TrackMetadata {
    pub const UNKNOWN_ARTIST: &'static str = "Unknown Artist";
    pub const UNKNOWN_ALBUM: &'static str = "Unknown Album";

    /// Placeholder metadata for a file without readable tags.
    pub fn fallback(file: &Path) -> Self {
        TrackMetadata {
            album_artist: Self::UNKNOWN_ARTIST.to_string(),
            album_name: Self::UNKNOWN_ALBUM.to_string(),
            title: file_stem(file),
        }
    }
}

pub(crate) fn file_stem(file: &Path) -> String {
    file.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// What a full resolve → download → organize run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "paths", rename_all = "lowercase")]
pub enum Outcome {
    /// The query matched nothing in the catalog
    NotFound,
    /// Exactly one file was organized
    Single(PathBuf),
    /// Zero or several files were organized
    Many(Vec<PathBuf>),
}

impl Outcome {
    pub fn from_paths(mut paths: Vec<PathBuf>) -> Self {
        if paths.len() == 1 {
            Outcome::Single(paths.remove(0))
        } else {
            Outcome::Many(paths)
        }
    }

    /// Organized paths, empty when nothing was resolved.
    pub fn paths(&self) -> &[PathBuf] {
        match self {
            Outcome::NotFound => &[],
            Outcome::Single(path) => std::slice::from_ref(path),
            Outcome::Many(paths) => paths,
        }
    }
}

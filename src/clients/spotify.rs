use std::{collections::HashMap, future::Future};

use log::debug;
use rspotify::{ClientCredsSpotify, Credentials, model::SearchType, prelude::*};
use tokio::sync::OnceCell;

use crate::clients::{
    entities::EntityKind,
    errors::{Error, Result},
};

pub const CLIENT_ID_VAR: &str = "SPOTIFY_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "SPOTIFY_CLIENT_SECRET";

/// Ranked item URIs per result bucket, as returned by one search call.
#[derive(Debug, Default, Clone)]
pub struct SearchResults {
    buckets: HashMap<EntityKind, Vec<String>>,
}

impl SearchResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: EntityKind, uris: Vec<String>) {
        self.buckets.insert(kind, uris);
    }

    /// Builder-style [`SearchResults::insert`].
    #[must_use]
    pub fn with(mut self, kind: EntityKind, uris: &[&str]) -> Self {
        self.insert(kind, uris.iter().map(ToString::to_string).collect());
        self
    }

    /// Highest ranked item URI of a bucket.
    pub fn first(&self, kind: EntityKind) -> Option<&str> {
        self.buckets
            .get(&kind)
            .and_then(|uris| uris.first())
            .map(String::as_str)
    }
}

/// A catalog that can be searched across several entity kinds at once.
pub trait CatalogSearch {
    fn search(
        &self,
        query: &str,
        kinds: &[EntityKind],
    ) -> impl Future<Output = Result<SearchResults>> + Send;
}

/// Read the client-credentials pair through `lookup`.
pub fn load_credentials(lookup: impl Fn(&str) -> Option<String>) -> Result<Credentials> {
    match (lookup(CLIENT_ID_VAR), lookup(CLIENT_SECRET_VAR)) {
        (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
            Ok(Credentials::new(&id, &secret))
        }
        _ => Err(Error::ConfigurationError(format!(
            "Missing Spotify credentials. Define {CLIENT_ID_VAR} and {CLIENT_SECRET_VAR} in the environment or a .env file."
        ))),
    }
}

fn search_type(kind: EntityKind) -> SearchType {
    match kind {
        EntityKind::Artist => SearchType::Artist,
        EntityKind::Album => SearchType::Album,
        EntityKind::Track => SearchType::Track,
        EntityKind::Playlist => SearchType::Playlist,
    }
}

/// Spotify Web API search over the client-credentials flow.
///
/// Credentials are read and a token requested on the first search, not on
/// construction.
#[derive(Default)]
pub struct SpotifyClient {
    spotify: OnceCell<ClientCredsSpotify>,
}

impl SpotifyClient {
    pub fn new(spotify: ClientCredsSpotify) -> Self {
        SpotifyClient {
            spotify: OnceCell::new_with(Some(spotify)),
        }
    }

    async fn client(&self) -> Result<&ClientCredsSpotify> {
        self.spotify
            .get_or_try_init(|| async {
                let creds = load_credentials(|name| std::env::var(name).ok())?;
                debug!("Requesting Spotify client-credentials token ...");
                let spotify = ClientCredsSpotify::new(creds);
                spotify.request_token().await?;
                Ok::<_, Error>(spotify)
            })
            .await
    }
}

impl CatalogSearch for SpotifyClient {
    async fn search(&self, query: &str, kinds: &[EntityKind]) -> Result<SearchResults> {
        let spotify = self.client().await?;
        let types: Vec<SearchType> = kinds.iter().copied().map(search_type).collect();
        let result = spotify
            .search_multiple(query, types, None, None, Some(1), None)
            .await?;

        let mut results = SearchResults::new();
        if let Some(page) = result.artists {
            results.insert(EntityKind::Artist, page.items.iter().map(|a| a.id.uri()).collect());
        }
        if let Some(page) = result.albums {
            let uris = page.items.iter().filter_map(|a| a.id.as_ref()).map(Id::uri);
            results.insert(EntityKind::Album, uris.collect());
        }
        if let Some(page) = result.tracks {
            let uris = page.items.iter().filter_map(|t| t.id.as_ref()).map(Id::uri);
            results.insert(EntityKind::Track, uris.collect());
        }
        if let Some(page) = result.playlists {
            results.insert(EntityKind::Playlist, page.items.iter().map(|p| p.id.uri()).collect());
        }
        debug!("Spotify search for {query:?} returned {results:?}");
        Ok(results)
    }
}

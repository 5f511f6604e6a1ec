//! Free-text query to canonical catalog URL.

use log::{debug, info, warn};

use crate::clients::{
    entities::{CanonicalUrl, EntityKind},
    errors::Result,
    spotify::CatalogSearch,
};

pub struct Resolver<S> {
    search: S,
}

impl<S: CatalogSearch> Resolver<S> {
    pub fn new(search: S) -> Self {
        Resolver { search }
    }

    /// Resolve `query` to a canonical URL.
    ///
    /// With `kind` set only that bucket is searched; otherwise the first
    /// non-empty bucket in artist, album, track, playlist order wins.
    /// `Ok(None)` means nothing matched.
    pub async fn resolve(&self, query: &str, kind: Option<EntityKind>) -> Result<Option<CanonicalUrl>> {
        let preferred: &[EntityKind] = match &kind {
            Some(kind) => std::slice::from_ref(kind),
            None => &EntityKind::ALL,
        };
        info!("Resolving Spotify URL for query={query:?}, kinds={preferred:?}");

        let results = self.search.search(query, preferred).await?;

        for &kind in preferred {
            if let Some(uri) = results.first(kind) {
                debug!("Top {kind} result for {query:?}: {uri}");
                let url = CanonicalUrl::from_uri(uri, kind)?;
                info!("Resolved {query:?} to {url}");
                return Ok(Some(url));
            }
        }

        warn!("No Spotify match found for query={query:?}, kinds={preferred:?}");
        Ok(None)
    }
}

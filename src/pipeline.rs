use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use log::{debug, error, info, warn};

use crate::{
    clients::{
        Downloader, SpotifyClient,
        entities::{EntityKind, Outcome},
        errors::{Error, Result},
        spotify::CatalogSearch,
    },
    organizer,
    resolver::Resolver,
};

/// Fixed-delay retry of failed downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts per failed URL
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            retries: 1,
            delay: Duration::from_secs(30),
        }
    }
}

/// Default library root: the platform audio directory, or `./music`.
pub fn default_root() -> PathBuf {
    dirs::audio_dir()
        .map(|dir| dir.join("tunegrab"))
        .unwrap_or_else(|| PathBuf::from("music"))
}

pub struct PipelineBuilder<S> {
    search: S,
    downloader: Option<Downloader>,
    root: Option<PathBuf>,
    retry: Option<RetryPolicy>,
}

impl PipelineBuilder<SpotifyClient> {
    pub fn new() -> Self {
        PipelineBuilder {
            search: SpotifyClient::default(),
            downloader: None,
            root: None,
            retry: None,
        }
    }
}

impl Default for PipelineBuilder<SpotifyClient> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CatalogSearch> PipelineBuilder<S> {
    /// Replace the catalog backend.
    pub fn search<T: CatalogSearch>(self, search: T) -> PipelineBuilder<T> {
        PipelineBuilder {
            search,
            downloader: self.downloader,
            root: self.root,
            retry: self.retry,
        }
    }

    #[must_use]
    pub fn downloader(mut self, downloader: Downloader) -> Self {
        self.downloader = Some(downloader);
        self
    }

    #[must_use]
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn build(self) -> Pipeline<S> {
        Pipeline {
            resolver: Resolver::new(self.search),
            downloader: self.downloader.unwrap_or_default(),
            root: self.root.unwrap_or_else(default_root),
            retry: self.retry.unwrap_or_default(),
        }
    }
}

/// resolve → download → organize, with one round of delayed retries.
pub struct Pipeline<S> {
    resolver: Resolver<S>,
    downloader: Downloader,
    root: PathBuf,
    retry: RetryPolicy,
}

impl<S: CatalogSearch> Pipeline<S> {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn run(&self, query: &str, kind: Option<EntityKind>) -> Result<Outcome> {
        info!("Starting pipeline for {query:?} ...");
        let Some(url) = self.resolver.resolve(query, kind).await? else {
            info!("Nothing resolved for {query:?}");
            return Ok(Outcome::NotFound);
        };

        tokio::fs::create_dir_all(&self.root).await?;
        // Private scratch directory so the before/after diff only sees this run
        let staging = tempfile::Builder::new()
            .prefix(".tunegrab-")
            .tempdir_in(&self.root)?;
        debug!("Downloading into {}", staging.path().display());

        let (mut downloaded, mut failed) = self.download_all(vec![url.to_string()], staging.path()).await?;

        for attempt in 1..=self.retry.retries {
            if failed.is_empty() {
                break;
            }
            warn!(
                "{} download(s) failed, retrying in {:?} (attempt {attempt}/{})",
                failed.len(),
                self.retry.delay,
                self.retry.retries
            );
            tokio::time::sleep(self.retry.delay).await;
            let (paths, still_failed) = self.download_all(failed, staging.path()).await?;
            downloaded.extend(paths);
            failed = still_failed;
        }
        for url in &failed {
            error!("Giving up on {url}");
        }

        let organized = organizer::organize(&downloaded, &self.root).await?;
        if !rescue_leftovers(&downloaded, &self.root).await {
            let kept = staging.keep();
            warn!("Some downloads could not be filed; they are kept in {}", kept.display());
        }
        Ok(Outcome::from_paths(organized))
    }

    /// Download each URL, splitting the outcome into produced files and
    /// URLs whose download failed. Any other error aborts the run.
    async fn download_all(&self, urls: Vec<String>, out_dir: &Path) -> Result<(Vec<PathBuf>, Vec<String>)> {
        let mut paths = Vec::new();
        let mut failed = Vec::new();
        for url in urls {
            match self.downloader.download(&url, out_dir).await {
                Ok(files) => paths.extend(files),
                Err(Error::DownloadFailed { url, reason }) => {
                    warn!("Download of {url} failed: {reason}");
                    failed.push(url);
                }
                Err(e) => return Err(e),
            }
        }
        Ok((paths, failed))
    }
}

/// Move downloads the organizer skipped out of the scratch directory and
/// into `root`, so they outlive it. Returns false if any stayed behind.
async fn rescue_leftovers(downloaded: &[PathBuf], root: &Path) -> bool {
    let mut all_rescued = true;
    for path in downloaded {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            all_rescued = false;
            continue;
        };
        let dest = root.join(file_name);
        if tokio::fs::try_exists(&dest).await.unwrap_or(true) {
            warn!("{} already exists, leaving {} in place", dest.display(), path.display());
            all_rescued = false;
            continue;
        }
        match tokio::fs::rename(path, &dest).await {
            Ok(()) => warn!("Could not organize {}, left it at {}", path.display(), dest.display()),
            Err(e) => {
                warn!("Could not move {} to {}: {e}", path.display(), dest.display());
                all_rescued = false;
            }
        }
    }
    all_rescued
}

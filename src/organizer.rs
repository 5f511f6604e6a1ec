//! Files downloaded audio into `root/<album artist>/<album>/<filename>`.

use std::path::{Path, PathBuf};

use lofty::{
    file::TaggedFileExt,
    tag::{ItemKey, Tag},
};
use log::{debug, info, warn};

use crate::clients::{
    entities::{TrackMetadata, file_stem},
    errors::Result,
};

/// Make a tag value usable as a single directory name.
pub fn clean_component(text: &str) -> String {
    let cleaned = text.replace(['/', '\\'], "_");
    match cleaned.trim() {
        "" | "." | ".." => "Unknown".to_string(),
        trimmed => trimmed.to_string(),
    }
}

impl TrackMetadata {
    /// Extract metadata from a tag, falling back field by field.
    pub fn from_tag(tag: &Tag, file: &Path) -> Self {
        let album_artist = tag
            .get_string(ItemKey::AlbumArtist)
            .or_else(|| tag.get_string(ItemKey::TrackArtist))
            .unwrap_or(Self::UNKNOWN_ARTIST);
        let album_name = tag
            .get_string(ItemKey::AlbumTitle)
            .unwrap_or(Self::UNKNOWN_ALBUM);
        let title = tag
            .get_string(ItemKey::TrackTitle)
            .map_or_else(|| file_stem(file), str::to_string);

        TrackMetadata {
            album_artist: album_artist.to_string(),
            album_name: album_name.to_string(),
            title,
        }
    }

    /// Read the tags embedded in `file`.
    ///
    /// Untagged or unreadable files get the placeholder metadata.
    pub fn read(file: &Path) -> Self {
        match lofty::read_from_path(file) {
            Ok(tagged_file) => match tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
                Some(tag) => Self::from_tag(tag, file),
                None => {
                    warn!("No tags found in {}; using default metadata", file.display());
                    Self::fallback(file)
                }
            },
            Err(e) => {
                warn!("Cannot read tags of {}: {e}; using default metadata", file.display());
                Self::fallback(file)
            }
        }
    }

    /// Directory this track belongs in below `root`.
    pub fn directory(&self, root: &Path) -> PathBuf {
        root.join(clean_component(&self.album_artist))
            .join(clean_component(&self.album_name))
    }
}

/// Move every file in `paths` into `root/<album artist>/<album>/`.
///
/// Paths that are missing, not regular files, or cannot be moved are logged
/// and skipped. Returns the new locations in input order.
pub async fn organize(paths: &[PathBuf], root: &Path) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(root).await?;
    let root = tokio::fs::canonicalize(root).await?;
    info!("Organizing {} path(s) into {}", paths.len(), root.display());

    let mut organized = Vec::with_capacity(paths.len());
    for path in paths {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                warn!("Path is not a file, skipping: {}", path.display());
                continue;
            }
            Err(_) => {
                warn!("Path does not exist, skipping: {}", path.display());
                continue;
            }
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };

        let metadata = TrackMetadata::read(path);
        debug!("Metadata for {}: {metadata:?}", path.display());

        let dest_dir = metadata.directory(&root);
        let dest = dest_dir.join(file_name);
        match move_file(path, &dest_dir, &dest).await {
            Ok(()) => {
                info!("Moved {} to {}", path.display(), dest.display());
                organized.push(dest);
            }
            Err(e) => warn!("Could not move {}: {e}", path.display()),
        }
    }

    info!("Organization complete. {} file(s) moved.", organized.len());
    Ok(organized)
}

async fn move_file(src: &Path, dest_dir: &Path, dest: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dest_dir).await?;
    let src_real = tokio::fs::canonicalize(src).await?;
    if tokio::fs::canonicalize(dest).await.ok().as_ref() == Some(&src_real) {
        debug!("{} is already in place", src.display());
        return Ok(());
    }
    if tokio::fs::rename(src, dest).await.is_ok() {
        return Ok(());
    }
    // Rename fails across filesystems
    tokio::fs::copy(src, dest).await?;
    tokio::fs::remove_file(src).await
}

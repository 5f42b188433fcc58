//! Image cache keyed by canonical path.
//!
//! Decoded wallpapers are kept until an explicit [`ImageCache::flush`]. A
//! lookup revalidates the entry against the file's modification and change
//! timestamps, and keeps serving the decoded image if the file has been
//! deleted since it was cached.
//!
//! The number of distinct wallpapers is small and chosen by the operator, so
//! there is no eviction and lookup is a linear scan.

mod decode;

pub use decode::{Artifact, Decode, ImageDecoder};

use std::fs::Metadata;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{BackdropError, Result};

/// Modification and change timestamps, `(seconds, nanoseconds)` each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub mtime: (i64, i64),
    pub ctime: (i64, i64),
}

impl FileStamp {
    pub fn of(metadata: &Metadata) -> Self {
        Self {
            mtime: (metadata.mtime(), metadata.mtime_nsec()),
            ctime: (metadata.ctime(), metadata.ctime_nsec()),
        }
    }
}

struct CacheEntry<A> {
    /// Path as first requested.
    path: PathBuf,
    /// Canonical form recorded when the entry was (re)decoded.
    canonical: PathBuf,
    artifact: Rc<A>,
    stamp: FileStamp,
}

impl<A> CacheEntry<A> {
    /// Canonical path right now; the stored path may have been re-pointed
    /// through a symlink since it was cached.
    fn current_canonical(&self) -> PathBuf {
        canonicalize(&self.path).unwrap_or_else(|_| self.canonical.clone())
    }
}

/// Decoded-image cache.
pub struct ImageCache<D: Decode = ImageDecoder> {
    decoder: D,
    entries: Vec<CacheEntry<D::Artifact>>,
}

impl<D: Decode> ImageCache<D> {
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            entries: Vec::new(),
        }
    }

    /// Return the decoded image for `path`, decoding only when needed.
    ///
    /// # Errors
    ///
    /// - [`BackdropError::Resolve`] if the path cannot be canonicalised or
    ///   the file cannot be inspected.
    /// - Whatever the decoder returns; the cache is left unchanged.
    pub fn resolve_and_load(&mut self, path: &Path) -> Result<Rc<D::Artifact>> {
        let resolve_error = |source| BackdropError::Resolve {
            path: path.to_path_buf(),
            source,
        };

        let canonical = resolve(path)?;
        let found = self
            .entries
            .iter()
            .position(|entry| entry.current_canonical() == canonical);

        if let Some(index) = found {
            let entry = &self.entries[index];
            match std::fs::metadata(&canonical) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::info!(
                        "Image {} is gone, serving cached copy",
                        path.display()
                    );
                    return Ok(Rc::clone(&entry.artifact));
                }
                Ok(metadata) if FileStamp::of(&metadata) == entry.stamp => {
                    tracing::debug!("Loading image {} from cache", path.display());
                    return Ok(Rc::clone(&entry.artifact));
                }
                _ => tracing::debug!("Cached image {} is stale", path.display()),
            }
        }

        let metadata = std::fs::metadata(&canonical).map_err(resolve_error)?;
        let stamp = FileStamp::of(&metadata);
        let artifact = Rc::new(self.decoder.decode(&canonical)?);

        match found {
            Some(index) => {
                let entry = &mut self.entries[index];
                entry.artifact = Rc::clone(&artifact);
                entry.canonical = canonical;
                entry.stamp = stamp;
            }
            None => {
                tracing::debug!(
                    "Caching image {} ({})",
                    path.display(),
                    canonical.display()
                );
                self.entries.push(CacheEntry {
                    path: path.to_path_buf(),
                    canonical,
                    artifact: Rc::clone(&artifact),
                    stamp,
                });
            }
        }

        Ok(artifact)
    }

    /// Drop every cached image.
    pub fn flush(&mut self) {
        let released = self.entries.len();
        self.entries.clear();
        tracing::info!("Flushed {} cached image(s)", released);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }
}

impl Default for ImageCache<ImageDecoder> {
    fn default() -> Self {
        Self::new(ImageDecoder)
    }
}

/// Canonical form of `path`, the identity the cache keys entries by.
///
/// # Errors
///
/// Returns [`BackdropError::Resolve`] when neither the path nor its parent
/// directory can be resolved.
pub fn resolve(path: &Path) -> Result<PathBuf> {
    canonicalize(path).map_err(|source| BackdropError::Resolve {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve symlinks and normalise `path`.
///
/// A missing final component is tolerated as long as its parent resolves, so
/// a deleted file still maps onto the entry it was cached under.
fn canonicalize(path: &Path) -> io::Result<PathBuf> {
    let err = match std::fs::canonicalize(path) {
        Ok(canonical) => return Ok(canonical),
        Err(e) if e.kind() == io::ErrorKind::NotFound => e,
        Err(e) => return Err(e),
    };

    let (parent, name) = match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => (parent, name),
        _ => return Err(err),
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };

    match std::fs::canonicalize(parent) {
        Ok(dir) => Ok(dir.join(name)),
        Err(_) => Err(err),
    }
}

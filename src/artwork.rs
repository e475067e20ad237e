//! Per-album artwork cache (spec.md §4.3: "downloads artwork into a temp
//! dir, shared"). Exactly one network fetch per album regardless of how
//! many sibling tracks embed it — the artwork-downloaded-exactly-once
//! invariant spec.md §8 calls out.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::TempDir;

use crate::error::{AppError, Result, TransportError};

/// Owns the temp directory the embed-quality cover is cached in for one
/// album's lifetime; dropped (and the directory reaped) once the album's
/// `rip()` completes.
pub struct ArtworkCache {
    _dir: TempDir,
    embed_path: Option<PathBuf>,
    hi_res_path: Option<PathBuf>,
}

impl ArtworkCache {
    /// Fetches `cover_url` once into a fresh temp directory. `hi_res_dest`,
    /// when set, additionally saves a copy next to the album on disk
    /// (`artwork.save_hi_res`).
    pub async fn fetch(
        http: &reqwest::Client,
        cover_url: Option<&str>,
        hi_res_dest: Option<&Path>,
    ) -> Result<Self> {
        let dir = tempfile::tempdir().map_err(|e| io_err(Path::new("."), e))?;
        let Some(url) = cover_url else {
            return Ok(Self {
                _dir: dir,
                embed_path: None,
                hi_res_path: None,
            });
        };

        let resp = http.get(url).send().await?;
        if !resp.status().is_success() {
            return Ok(Self {
                _dir: dir,
                embed_path: None,
                hi_res_path: None,
            });
        }
        let bytes = resp.bytes().await.map_err(TransportError::from)?;

        let embed_path = dir.path().join("cover.jpg");
        tokio::fs::write(&embed_path, &bytes)
            .await
            .map_err(|e| io_err(&embed_path, e))?;

        let hi_res_path = if let Some(dest) = hi_res_dest {
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| io_err(dest, e))?;
            }
            tokio::fs::write(dest, &bytes).await.map_err(|e| io_err(dest, e))?;
            Some(dest.to_path_buf())
        } else {
            None
        };

        Ok(Self {
            _dir: dir,
            embed_path: Some(embed_path),
            hi_res_path,
        })
    }

    /// An artwork-less cache, used when the fetch itself fails (network
    /// error) so a missing cover never drops the whole album.
    pub fn empty() -> Result<Self> {
        let dir = tempfile::tempdir().map_err(|e| io_err(Path::new("."), e))?;
        Ok(Self {
            _dir: dir,
            embed_path: None,
            hi_res_path: None,
        })
    }

    /// Path the tagger should embed into each track's cover frame, or
    /// `None` when no artwork was available.
    pub fn embed_path(&self) -> Option<&Path> {
        self.embed_path.as_deref()
    }

    pub fn hi_res_path(&self) -> Option<&Path> {
        self.hi_res_path.as_deref()
    }
}

/// Owns every album's `ArtworkCache` for the lifetime of a run (spec.md
/// §3: "reaped only after the entire run completes"). `PendingAlbum::resolve`
/// registers its cache here instead of holding it itself, so sibling
/// tracks can keep reading the embed file for as long as the run lasts,
/// not just until their owning `Album` value is dropped.
#[derive(Default)]
pub struct ArtworkRegistry {
    caches: Mutex<Vec<ArtworkCache>>,
}

impl ArtworkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, cache: ArtworkCache) {
        self.caches.lock().unwrap().push(cache);
    }

    /// Reap every registered temp dir. Called once from orchestrator
    /// teardown.
    pub fn clear(&self) {
        self.caches.lock().unwrap().clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.caches.lock().unwrap().len()
    }
}

fn io_err(path: &Path, source: std::io::Error) -> AppError {
    AppError::Transport(TransportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_cover_url_yields_no_paths() {
        let http = reqwest::Client::new();
        let cache = ArtworkCache::fetch(&http, None, None).await.unwrap();
        assert!(cache.embed_path().is_none());
        assert!(cache.hi_res_path().is_none());
    }

    #[test]
    fn registry_holds_caches_until_cleared() {
        let registry = ArtworkRegistry::new();
        registry.register(ArtworkCache::empty().unwrap());
        registry.register(ArtworkCache::empty().unwrap());
        assert_eq!(registry.len(), 2);
        registry.clear();
        assert_eq!(registry.len(), 0);
    }
}

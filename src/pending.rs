//! `Pending` — an unresolved reference, one `resolve()` away from a
//! `Media` (spec.md §4.3). Modeled as a tagged enum of concrete variant
//! structs rather than `Box<dyn Trait>` (spec.md §9: "the full variant
//! set is closed and known"), breaking the `Pending <-> Media` cycle the
//! original defers via `TYPE_CHECKING`.
//!
//! Every `resolve()` absorbs `NonStreamable` and metadata-build errors
//! itself and returns `None` rather than propagating (spec.md §4.3: "one
//! bad id must not fail a batch").

use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use crate::artwork::{ArtworkCache, ArtworkRegistry};
use crate::client::{Client, Quality};
use crate::client::lastfm::LastfmScraper;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::ledger::Ledger;
use crate::media::{Album, Artist, Label, Media, Playlist};
use crate::metadata::{AlbumMetadata, ArtistMetadata, LabelMetadata, PlaylistMetadata, TrackMetadata};
use crate::path;
use crate::source::{MediaType, Source};

fn quality_for(config: &Config, source: Source) -> Quality {
    Quality(config.quality.for_source(source))
}

/// A single item resolved within an already-known album (spec.md §3's
/// `Track` row: "inherits the album's folder and cover path").
pub struct PendingTrack {
    pub source: Source,
    pub id: String,
    pub client: Arc<dyn Client>,
    pub config: Arc<Config>,
    pub ledger: Arc<Ledger>,
    pub album: Arc<AlbumMetadata>,
    pub folder: PathBuf,
    pub cover_path: Option<PathBuf>,
}

impl PendingTrack {
    pub async fn resolve(self) -> Option<Media> {
        resolve_track(
            self.source,
            &self.id,
            &self.client,
            &self.config,
            &self.ledger,
            Some(self.album),
            self.folder,
            self.cover_path,
            false,
        )
        .await
    }
}

/// One playlist entry; may come from a different source than the
/// playlist owner (Last.fm fallback, spec.md §4.3).
pub struct PendingPlaylistTrack {
    pub source: Source,
    pub id: String,
    pub client: Arc<dyn Client>,
    pub config: Arc<Config>,
    pub ledger: Arc<Ledger>,
    pub folder: PathBuf,
}

impl PendingPlaylistTrack {
    pub async fn resolve(self) -> Option<Media> {
        resolve_track(
            self.source,
            &self.id,
            &self.client,
            &self.config,
            &self.ledger,
            None,
            self.folder,
            None,
            false,
        )
        .await
    }
}

/// A standalone reference, `is_single=true` (spec.md §4.3's `PendingSingle`).
pub struct PendingSingle {
    pub source: Source,
    pub id: String,
    pub client: Arc<dyn Client>,
    pub config: Arc<Config>,
    pub ledger: Arc<Ledger>,
}

impl PendingSingle {
    pub async fn resolve(self) -> Option<Media> {
        let folder = self.config.downloads.folder.clone();
        resolve_track(
            self.source,
            &self.id,
            &self.client,
            &self.config,
            &self.ledger,
            None,
            folder,
            None,
            true,
        )
        .await
    }
}

/// Shared track-resolution body for `PendingSingle`/`PendingTrack`/
/// `PendingPlaylistTrack`: ledger short-circuit, metadata fetch,
/// stream lookup, each absorbed on failure (spec.md §4.3, §4.5).
#[allow(clippy::too_many_arguments)]
async fn resolve_track(
    source: Source,
    id: &str,
    client: &Arc<dyn Client>,
    config: &Arc<Config>,
    ledger: &Arc<Ledger>,
    album: Option<Arc<AlbumMetadata>>,
    folder: PathBuf,
    cover_path: Option<PathBuf>,
    is_single: bool,
) -> Option<Media> {
    if ledger.is_completed(source, MediaType::Track, id) {
        return None;
    }

    let raw = match client.get_metadata(id, MediaType::Track).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(%source, %id, error = %e, "track metadata fetch failed, skipping");
            return None;
        }
    };
    let metadata = match TrackMetadata::try_from(raw) {
        Ok(m) => m,
        Err(e) => {
            warn!(%source, %id, error = %e, "track metadata build failed, skipping");
            return None;
        }
    };

    let quality = quality_for(config, source);
    let downloadable = match client.get_downloadable(id, quality).await {
        Ok(d) => d,
        Err(e) => {
            warn!(%source, %id, error = %e, "track is not streamable, skipping");
            return None;
        }
    };

    Some(Media::Track(crate::media::Track::new(
        source,
        metadata,
        album,
        downloadable,
        folder,
        cover_path,
        is_single,
    )))
}

/// Fetches album metadata, enumerates track ids, creates the album
/// folder on disk, and downloads shared artwork into a registry-owned
/// temp dir (spec.md §4.3's `PendingAlbum`).
pub struct PendingAlbum {
    pub source: Source,
    pub id: String,
    pub client: Arc<dyn Client>,
    pub config: Arc<Config>,
    pub ledger: Arc<Ledger>,
    pub artwork_registry: Arc<ArtworkRegistry>,
}

impl PendingAlbum {
    pub async fn resolve(self) -> Option<Media> {
        let raw = match self.client.get_metadata(&self.id, MediaType::Album).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(source = %self.source, id = %self.id, error = %e, "album metadata fetch failed, skipping");
                return None;
            }
        };
        let metadata = match AlbumMetadata::try_from(raw) {
            Ok(m) => m,
            Err(e) => {
                warn!(source = %self.source, id = %self.id, error = %e, "album metadata build failed, skipping");
                return None;
            }
        };

        let folder = path::album_folder(
            &self.config.downloads.folder,
            &metadata,
            &self.config.filepaths,
            self.source,
            self.config.downloads.source_subdirectories,
        );
        if let Err(e) = tokio::fs::create_dir_all(&folder).await {
            warn!(source = %self.source, id = %self.id, error = %e, "could not create album folder, skipping");
            return None;
        }

        let hi_res_dest = self.config.artwork.save_hi_res.then(|| folder.join("cover.jpg"));
        let cache = ArtworkCache::fetch(self.client.http(), metadata.cover_url.as_deref(), hi_res_dest.as_deref())
            .await
            .unwrap_or_else(|e| {
                warn!(source = %self.source, id = %self.id, error = %e, "artwork fetch failed, continuing without it");
                ArtworkCache::empty().expect("tempdir creation does not fail here")
            });
        let cover_path = cache.embed_path().map(PathBuf::from);
        self.artwork_registry.register(cache);

        let album_arc = Arc::new(metadata.clone());
        let tracks = metadata
            .tracks
            .iter()
            .map(|t| PendingTrack {
                source: self.source,
                id: t.id.clone(),
                client: self.client.clone(),
                config: self.config.clone(),
                ledger: self.ledger.clone(),
                album: album_arc.clone(),
                folder: folder.clone(),
                cover_path: cover_path.clone(),
            })
            .collect();

        Some(Media::Album(Album::new(self.source, metadata, tracks, folder)))
    }
}

/// Fetches playlist metadata and wraps each entry (spec.md §4.3's
/// `PendingPlaylist`). Entries share the playlist owner's source and
/// client; cross-source playlists only arise via `PendingLastfmPlaylist`.
pub struct PendingPlaylist {
    pub source: Source,
    pub id: String,
    pub client: Arc<dyn Client>,
    pub config: Arc<Config>,
    pub ledger: Arc<Ledger>,
}

impl PendingPlaylist {
    pub async fn resolve(self) -> Option<Media> {
        let raw = match self.client.get_metadata(&self.id, MediaType::Playlist).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(source = %self.source, id = %self.id, error = %e, "playlist metadata fetch failed, skipping");
                return None;
            }
        };
        let metadata = match PlaylistMetadata::try_from(raw) {
            Ok(m) => m,
            Err(e) => {
                warn!(source = %self.source, id = %self.id, error = %e, "playlist metadata build failed, skipping");
                return None;
            }
        };

        let folder = self
            .config
            .downloads
            .folder
            .join(path::sanitize_component(&metadata.title));

        let tracks = metadata
            .entries
            .into_iter()
            .map(|(_entry_source, id)| PendingPlaylistTrack {
                source: self.source,
                id,
                client: self.client.clone(),
                config: self.config.clone(),
                ledger: self.ledger.clone(),
                folder: folder.clone(),
            })
            .collect();

        Some(Media::Playlist(Playlist::new(metadata.title, tracks)))
    }
}

/// Scrapes a Last.fm tracklist and matches each `(artist, title)` pair
/// against a primary source, falling back to a configured secondary
/// source on an empty or erroring primary search (spec.md §4.3's
/// `PendingLastfmPlaylist`, Open Question (c)).
pub struct PendingLastfmPlaylist {
    pub url: String,
    pub scraper: Arc<LastfmScraper>,
    pub primary_source: Source,
    pub primary_client: Arc<dyn Client>,
    pub fallback_source: Option<Source>,
    pub fallback_client: Option<Arc<dyn Client>>,
    pub config: Arc<Config>,
    pub ledger: Arc<Ledger>,
}

impl PendingLastfmPlaylist {
    pub async fn resolve(self) -> Option<Media> {
        let entries = match self.scraper.scrape_playlist(&self.url).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(url = %self.url, error = %e, "last.fm playlist scrape failed, skipping");
                return None;
            }
        };

        let folder = self.config.downloads.folder.join("Last.fm Playlist");
        let mut tracks = Vec::with_capacity(entries.len());

        for entry in entries {
            let query = format!("{} {}", entry.artist, entry.title);
            let primary_hit = self.primary_client.search(MediaType::Track, &query, 1).await;
            let winner = match primary_hit {
                Ok(raw) => crate::metadata::SearchResults::from_pages(raw).first().map(|h| (self.primary_source, self.primary_client.clone(), h.id.clone())),
                Err(e) => {
                    warn!(artist = %entry.artist, title = %entry.title, error = %e, "primary source search failed, trying fallback");
                    None
                }
            };

            let winner = match winner {
                Some(w) => Some(w),
                None => match (&self.fallback_source, &self.fallback_client) {
                    (Some(fallback_source), Some(fallback_client)) => {
                        match fallback_client.search(MediaType::Track, &query, 1).await {
                            Ok(raw) => crate::metadata::SearchResults::from_pages(raw)
                                .first()
                                .map(|h| (*fallback_source, fallback_client.clone(), h.id.clone())),
                            Err(e) => {
                                warn!(artist = %entry.artist, title = %entry.title, error = %e, "fallback source search failed");
                                None
                            }
                        }
                    }
                    _ => None,
                },
            };

            match winner {
                Some((source, client, id)) => tracks.push(PendingPlaylistTrack {
                    source,
                    id,
                    client,
                    config: self.config.clone(),
                    ledger: self.ledger.clone(),
                    folder: folder.clone(),
                }),
                None => warn!(artist = %entry.artist, title = %entry.title, "no match on any source, dropping entry"),
            }
        }

        Some(Media::Playlist(Playlist::new("Last.fm Playlist".to_string(), tracks)))
    }
}

/// Fetches artist metadata and wraps each album id as a `PendingAlbum`
/// (spec.md §4.3's `PendingArtist`).
pub struct PendingArtist {
    pub source: Source,
    pub id: String,
    pub client: Arc<dyn Client>,
    pub config: Arc<Config>,
    pub ledger: Arc<Ledger>,
    pub artwork_registry: Arc<ArtworkRegistry>,
}

impl PendingArtist {
    pub async fn resolve(self) -> Option<Media> {
        let raw = match self.client.get_metadata(&self.id, MediaType::Artist).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(source = %self.source, id = %self.id, error = %e, "artist metadata fetch failed, skipping");
                return None;
            }
        };
        let metadata = match ArtistMetadata::try_from(raw) {
            Ok(m) => m,
            Err(e) => {
                warn!(source = %self.source, id = %self.id, error = %e, "artist metadata build failed, skipping");
                return None;
            }
        };

        let albums = metadata
            .album_ids
            .into_iter()
            .map(|album_id| PendingAlbum {
                source: self.source,
                id: album_id,
                client: self.client.clone(),
                config: self.config.clone(),
                ledger: self.ledger.clone(),
                artwork_registry: self.artwork_registry.clone(),
            })
            .collect();

        Some(Media::Artist(Artist::new(metadata.name, albums)))
    }
}

/// Fetches label metadata and wraps each album id as a `PendingAlbum`
/// (spec.md §4.3's `PendingLabel`).
pub struct PendingLabel {
    pub source: Source,
    pub id: String,
    pub client: Arc<dyn Client>,
    pub config: Arc<Config>,
    pub ledger: Arc<Ledger>,
    pub artwork_registry: Arc<ArtworkRegistry>,
}

impl PendingLabel {
    pub async fn resolve(self) -> Option<Media> {
        let raw = match self.client.get_metadata(&self.id, MediaType::Label).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(source = %self.source, id = %self.id, error = %e, "label metadata fetch failed, skipping");
                return None;
            }
        };
        let metadata = match LabelMetadata::try_from(raw) {
            Ok(m) => m,
            Err(e) => {
                warn!(source = %self.source, id = %self.id, error = %e, "label metadata build failed, skipping");
                return None;
            }
        };

        let albums = metadata
            .album_ids
            .into_iter()
            .map(|album_id| PendingAlbum {
                source: self.source,
                id: album_id,
                client: self.client.clone(),
                config: self.config.clone(),
                ledger: self.ledger.clone(),
                artwork_registry: self.artwork_registry.clone(),
            })
            .collect();

        Some(Media::Label(Label::new(metadata.name, albums)))
    }
}

/// The closed set of top-level references a URL or `(source, media_type,
/// id)` triple can resolve to (spec.md §3's `PendingX` row). Last.fm
/// playlists are not constructed via `create_pending_item` — they have
/// their own entry point (`Orchestrator::resolve_lastfm`) — but still
/// resolve through the same `Pending::resolve` dispatch.
pub enum Pending {
    Single(PendingSingle),
    Album(PendingAlbum),
    Artist(PendingArtist),
    Label(PendingLabel),
    Playlist(PendingPlaylist),
    LastfmPlaylist(PendingLastfmPlaylist),
}

impl Pending {
    pub async fn resolve(self) -> Option<Media> {
        match self {
            Pending::Single(p) => p.resolve().await,
            Pending::Album(p) => p.resolve().await,
            Pending::Artist(p) => p.resolve().await,
            Pending::Label(p) => p.resolve().await,
            Pending::Playlist(p) => p.resolve().await,
            Pending::LastfmPlaylist(p) => p.resolve().await,
        }
    }
}

/// Dispatches `media_type` to the matching `PendingX` constructor
/// (spec.md §8 property 7, "Factory totality"). `Featured` is a
/// search-only media type and has no pending/media representation, so
/// it is the one case this returns `Err` for rather than `None`
/// (spec.md §7: "unknown media_type in factory... programmer error").
#[allow(clippy::too_many_arguments)]
pub fn create_pending_item(
    media_type: MediaType,
    source: Source,
    id: String,
    client: Arc<dyn Client>,
    config: Arc<Config>,
    ledger: Arc<Ledger>,
    artwork_registry: Arc<ArtworkRegistry>,
) -> Result<Pending> {
    match media_type {
        MediaType::Track => Ok(Pending::Single(PendingSingle { source, id, client, config, ledger })),
        MediaType::Album => Ok(Pending::Album(PendingAlbum { source, id, client, config, ledger, artwork_registry })),
        MediaType::Playlist => Ok(Pending::Playlist(PendingPlaylist { source, id, client, config, ledger })),
        MediaType::Artist => Ok(Pending::Artist(PendingArtist { source, id, client, config, ledger, artwork_registry })),
        MediaType::Label => Ok(Pending::Label(PendingLabel { source, id, client, config, ledger, artwork_registry })),
        MediaType::Featured => Err(AppError::UnknownMediaType("featured has no pending/media representation".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_covers_every_concrete_media_type() {
        for mt in [MediaType::Track, MediaType::Album, MediaType::Playlist, MediaType::Artist, MediaType::Label] {
            let cfg = Arc::new(crate::config::parse_toml_config("").unwrap());
            let ledger = Arc::new(Ledger::new(Box::new(crate::ledger::NullStore), Box::new(crate::ledger::NullStore)));
            let registry = Arc::new(ArtworkRegistry::new());
            // A client is required by the signature but never called by
            // the factory itself, so any stub implementing `Client` works;
            // reuse qobuz's constructor with empty credentials.
            let client: Arc<dyn Client> = Arc::new(crate::client::qobuz::QobuzClient::new(
                crate::config::QobuzCredentials {
                    email_or_userid: String::new(),
                    password_or_token: String::new(),
                    app_id: None,
                    app_secret: None,
                },
                0,
                true,
            ));
            let result = create_pending_item(mt, Source::Qobuz, "1".to_string(), client, cfg, ledger, registry);
            assert!(result.is_ok(), "{mt:?} should produce a Pending");
        }
    }

    #[test]
    fn factory_rejects_featured() {
        let cfg = Arc::new(crate::config::parse_toml_config("").unwrap());
        let ledger = Arc::new(Ledger::new(Box::new(crate::ledger::NullStore), Box::new(crate::ledger::NullStore)));
        let registry = Arc::new(ArtworkRegistry::new());
        let client: Arc<dyn Client> = Arc::new(crate::client::qobuz::QobuzClient::new(
            crate::config::QobuzCredentials {
                email_or_userid: String::new(),
                password_or_token: String::new(),
                app_id: None,
                app_secret: None,
            },
            0,
            true,
        ));
        let result = create_pending_item(MediaType::Featured, Source::Qobuz, "1".to_string(), client, cfg, ledger, registry);
        assert!(matches!(result, Err(AppError::UnknownMediaType(_))));
    }
}

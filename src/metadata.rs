//! Source-agnostic metadata value objects (spec.md §3), built from each
//! backend's `RawMetadata`/`RawSearchResults` via `TryFrom`, replacing
//! the original's `*Metadata.from_resp(dict)` builders (spec.md §9).

use serde::Serialize;

use crate::client::{RawMetadata, RawSearchResults};
use crate::client::{deezer::DeezerMetadata, qobuz::QobuzMetadata, soundcloud::SoundcloudMetadata, tidal::TidalMetadata};
use crate::error::{AppError, Result};
use crate::source::{MediaType, Source};

#[derive(Debug, Clone)]
pub struct TrackMetadata {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub track_number: u32,
    pub track_total: u32,
    pub disc_number: u32,
    pub disc_total: u32,
    pub duration_seconds: u32,
    pub isrc: Option<String>,
    /// True when the track's own artist differs from the album artist
    /// (teacher's `path.rs::is_compilation` rule, carried forward verbatim).
    pub is_compilation: bool,
}

#[derive(Debug, Clone)]
pub struct AlbumMetadata {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub year: Option<String>,
    pub cover_url: Option<String>,
    pub disc_total: u32,
    pub tracks: Vec<TrackMetadata>,
}

#[derive(Debug, Clone)]
pub struct ArtistMetadata {
    pub id: String,
    pub name: String,
    pub album_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LabelMetadata {
    pub id: String,
    pub name: String,
    pub album_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PlaylistMetadata {
    pub id: String,
    pub title: String,
    /// `(source, id)` per entry — a playlist's entries may come from a
    /// different source than the playlist owner (Last.fm fallback, §4.3).
    pub entries: Vec<(Source, String)>,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub artist: String,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
}

fn disc_total(tracks_max_disc: u32) -> u32 {
    tracks_max_disc.max(1)
}

impl TryFrom<RawMetadata> for AlbumMetadata {
    type Error = AppError;

    fn try_from(raw: RawMetadata) -> Result<Self> {
        match raw {
            RawMetadata::Qobuz(QobuzMetadata::Album(album)) => {
                let disc_total = disc_total(album.tracks.items.iter().map(|t| t.media_number as u32).max().unwrap_or(1));
                let tracks = album
                    .tracks
                    .items
                    .iter()
                    .map(|t| TrackMetadata {
                        id: t.id.to_string(),
                        title: t.title.clone(),
                        artist: t.performer.name.clone(),
                        track_number: t.track_number as u32,
                        track_total: album.tracks.total as u32,
                        disc_number: t.media_number as u32,
                        disc_total,
                        duration_seconds: t.duration,
                        isrc: t.isrc.clone(),
                        is_compilation: t.performer.name != album.artist.name,
                    })
                    .collect();
                Ok(AlbumMetadata {
                    id: album.id.clone(),
                    title: album.title.clone(),
                    artist: album.artist.name.clone(),
                    year: album.release_date_original.clone(),
                    cover_url: album.image.as_ref().and_then(|i| i.large.clone().or_else(|| i.small.clone())),
                    disc_total,
                    tracks,
                })
            }
            RawMetadata::Tidal(TidalMetadata::Album(album, items)) => {
                let disc_total = disc_total(items.iter().map(|t| t.volume_number).max().unwrap_or(1));
                let artist = album.artists.first().map(|a| a.name.clone()).unwrap_or_default();
                let tracks = items
                    .iter()
                    .map(|t| TrackMetadata {
                        id: t.id.to_string(),
                        title: t.title.clone(),
                        artist: t.artists.first().map(|a| a.name.clone()).unwrap_or_default(),
                        track_number: t.track_number,
                        track_total: album.number_of_tracks,
                        disc_number: t.volume_number,
                        disc_total,
                        duration_seconds: t.duration,
                        isrc: t.isrc.clone(),
                        is_compilation: t.artists.first().map(|a| a.name.as_str()) != Some(artist.as_str()),
                    })
                    .collect();
                Ok(AlbumMetadata {
                    id: album.id.to_string(),
                    title: album.title.clone(),
                    artist,
                    year: album.release_date.clone(),
                    cover_url: album.cover.clone(),
                    disc_total,
                    tracks,
                })
            }
            RawMetadata::Deezer(DeezerMetadata::Album(album)) => {
                let disc_total = disc_total(album.tracks.data.iter().map(|t| t.disk_number).max().unwrap_or(1));
                let tracks = album
                    .tracks
                    .data
                    .iter()
                    .map(|t| TrackMetadata {
                        id: t.id.to_string(),
                        title: t.title.clone(),
                        artist: t.artist.name.clone(),
                        track_number: t.track_position,
                        track_total: album.nb_tracks,
                        disc_number: t.disk_number,
                        disc_total,
                        duration_seconds: t.duration,
                        isrc: t.isrc.clone(),
                        is_compilation: t.artist.name != album.artist.name,
                    })
                    .collect();
                Ok(AlbumMetadata {
                    id: album.id.to_string(),
                    title: album.title.clone(),
                    artist: album.artist.name.clone(),
                    year: album.release_date.clone(),
                    cover_url: album.cover_xl.clone(),
                    disc_total,
                    tracks,
                })
            }
            _ => Err(AppError::UnknownMediaType("album metadata from an incompatible backend response".to_string())),
        }
    }
}

impl TryFrom<RawMetadata> for TrackMetadata {
    type Error = AppError;

    fn try_from(raw: RawMetadata) -> Result<Self> {
        match raw {
            RawMetadata::Qobuz(QobuzMetadata::Track(t)) => {
                let album = t.album.as_ref();
                let album_artist = album.map(|a| a.artist.name.clone()).unwrap_or_else(|| t.performer.name.clone());
                Ok(TrackMetadata {
                    id: t.id.to_string(),
                    title: t.title.clone(),
                    artist: t.performer.name.clone(),
                    track_number: t.track_number as u32,
                    track_total: album.map(|a| a.tracks.total as u32).unwrap_or(1),
                    disc_number: t.media_number as u32,
                    disc_total: 1,
                    duration_seconds: t.duration,
                    isrc: t.isrc.clone(),
                    is_compilation: t.performer.name != album_artist,
                })
            }
            RawMetadata::Tidal(TidalMetadata::Track { track, album }) => {
                let album_artist = album.artists.first().map(|a| a.name.clone()).unwrap_or_default();
                let track_artist = track.artists.first().map(|a| a.name.clone()).unwrap_or_default();
                Ok(TrackMetadata {
                    id: track.id.to_string(),
                    title: track.title.clone(),
                    artist: track_artist.clone(),
                    track_number: track.track_number,
                    track_total: album.number_of_tracks,
                    disc_number: track.volume_number,
                    disc_total: 1,
                    duration_seconds: track.duration,
                    isrc: track.isrc.clone(),
                    is_compilation: track_artist != album_artist,
                })
            }
            RawMetadata::Deezer(DeezerMetadata::Track(t, album)) => Ok(TrackMetadata {
                id: t.id.to_string(),
                title: t.title.clone(),
                artist: t.artist.name.clone(),
                track_number: t.track_position,
                track_total: album.nb_tracks,
                disc_number: t.disk_number,
                disc_total: 1,
                duration_seconds: t.duration,
                isrc: t.isrc.clone(),
                is_compilation: t.artist.name != album.artist.name,
            }),
            RawMetadata::Soundcloud(SoundcloudMetadata::Track(t)) => Ok(TrackMetadata {
                id: t.id.to_string(),
                title: t.title.clone(),
                artist: t.user.username.clone(),
                track_number: 1,
                track_total: 1,
                disc_number: 1,
                disc_total: 1,
                duration_seconds: (t.duration / 1000).max(0) as u32,
                isrc: None,
                is_compilation: false,
            }),
            _ => Err(AppError::UnknownMediaType("track metadata from an incompatible backend response".to_string())),
        }
    }
}

impl TryFrom<RawMetadata> for ArtistMetadata {
    type Error = AppError;

    fn try_from(raw: RawMetadata) -> Result<Self> {
        match raw {
            RawMetadata::Qobuz(QobuzMetadata::Artist(a)) => Ok(ArtistMetadata {
                id: a.id.to_string(),
                name: a.name.clone(),
                album_ids: a.albums.items.iter().map(|al| al.id.clone()).collect(),
            }),
            RawMetadata::Tidal(TidalMetadata::Artist(a, albums)) => Ok(ArtistMetadata {
                id: a.id.to_string(),
                name: a.name.clone(),
                album_ids: albums.iter().map(|al| al.id.to_string()).collect(),
            }),
            RawMetadata::Deezer(DeezerMetadata::Artist(a, albums)) => Ok(ArtistMetadata {
                id: a.id.to_string(),
                name: a.name.clone(),
                album_ids: albums.iter().map(|al| al.id.to_string()).collect(),
            }),
            _ => Err(AppError::UnknownMediaType("artist metadata from an incompatible backend response".to_string())),
        }
    }
}

impl TryFrom<RawMetadata> for LabelMetadata {
    type Error = AppError;

    fn try_from(raw: RawMetadata) -> Result<Self> {
        match raw {
            RawMetadata::Qobuz(QobuzMetadata::Label(l)) => Ok(LabelMetadata {
                id: l.id.to_string(),
                name: l.name.clone(),
                album_ids: l.albums.items.iter().map(|al| al.id.clone()).collect(),
            }),
            _ => Err(AppError::UnknownMediaType("label metadata is only available on qobuz".to_string())),
        }
    }
}

impl TryFrom<RawMetadata> for PlaylistMetadata {
    type Error = AppError;

    fn try_from(raw: RawMetadata) -> Result<Self> {
        match raw {
            RawMetadata::Tidal(TidalMetadata::Playlist(p, tracks)) => Ok(PlaylistMetadata {
                id: p.uuid.clone(),
                title: p.title.clone(),
                entries: tracks.into_iter().map(|t| (Source::Tidal, t.id.to_string())).collect(),
            }),
            RawMetadata::Soundcloud(SoundcloudMetadata::Playlist(p)) => Ok(PlaylistMetadata {
                id: p.id.to_string(),
                title: p.title.clone(),
                entries: p.tracks.into_iter().map(|t| (Source::Soundcloud, t.id.to_string())).collect(),
            }),
            _ => Err(AppError::UnknownMediaType("playlist metadata from an incompatible backend response".to_string())),
        }
    }
}

impl SearchResults {
    /// Accepts whatever paging shape the backend returned; only requires
    /// that hits be flattenable into `(id, title, artist)` triples
    /// (spec.md §4.1's `search` contract).
    pub fn from_pages(raw: RawSearchResults) -> Self {
        let hits = match raw {
            RawSearchResults::Qobuz(pages) => pages
                .into_iter()
                .flat_map(|p| p.tracks.map(|t| t.items).unwrap_or_default())
                .map(|t| SearchHit {
                    id: t.id.to_string(),
                    title: t.title,
                    artist: t.performer.name,
                })
                .collect(),
            RawSearchResults::Tidal(pages) => pages
                .into_iter()
                .flat_map(|p| p.tracks.map(|t| t.items).unwrap_or_default())
                .map(|t| SearchHit {
                    id: t.id.to_string(),
                    title: t.title,
                    artist: t.artists.first().map(|a| a.name.clone()).unwrap_or_default(),
                })
                .collect(),
            RawSearchResults::Deezer(pages) => pages
                .into_iter()
                .flat_map(|p| p.data)
                .map(|t| SearchHit {
                    id: t.id.to_string(),
                    title: t.title,
                    artist: t.artist.name,
                })
                .collect(),
            RawSearchResults::Soundcloud(pages) => pages
                .into_iter()
                .flat_map(|p| p.collection)
                .map(|t| SearchHit {
                    id: t.id.to_string(),
                    title: t.title,
                    artist: t.user.username,
                })
                .collect(),
        };
        SearchResults { hits }
    }

    pub fn first(&self) -> Option<&SearchHit> {
        self.hits.first()
    }

    /// The stable, per-source JSON shape `search_output_file` dumps
    /// (spec.md §4.7, §6: "a list of objects whose exact shape is
    /// `SearchResults.as_list(source)`").
    pub fn as_list(&self, source: Source) -> Vec<SearchHitJson> {
        self.hits
            .iter()
            .map(|h| SearchHitJson {
                source: source.as_str(),
                id: h.id.clone(),
                title: h.title.clone(),
                artist: h.artist.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHitJson {
    pub source: &'static str,
    pub id: String,
    pub title: String,
    pub artist: String,
}

/// `media_type = "featured"` selector passthrough (spec.md §4.1: "a
/// reserved `media_type = featured` plus a sub-selector in `query`").
/// Unknown selectors fail loudly rather than silently falling back.
pub fn validate_featured_selector(selector: &str) -> Result<()> {
    const KNOWN: &[&str] = &["new-releases", "press-awards", "most-streamed", "editor-picks"];
    if KNOWN.contains(&selector) {
        Ok(())
    } else {
        Err(AppError::UnknownMediaType(format!(
            "unknown featured selector: {selector}"
        )))
    }
}

pub fn media_type_for_slash_command(s: &str) -> Result<MediaType> {
    MediaType::parse(s).ok_or_else(|| AppError::UnknownMediaType(s.to_string()))
}

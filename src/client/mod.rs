//! `Client` and `Downloadable` contracts (spec.md §4.1, §4.2), plus the
//! per-backend response shapes that flow through them.
//!
//! The original passes a `dict[str, Any]` between a backend and the
//! `*Metadata.from_resp` builders; here each backend gets its own
//! response enum (`RawMetadata::Qobuz(...)` etc.) that `metadata.rs`
//! pattern-matches on, per the dynamic-metadata-dict redesign note.

pub mod deezer;
mod downloadable;
pub mod lastfm;
pub mod qobuz;
pub mod soundcloud;
pub mod tidal;

pub use downloadable::{BasicDownloadable, DeezerDownloadable, Downloadable, SegmentedDownloadable};

use async_trait::async_trait;

use crate::error::Result;
use crate::source::{MediaType, Source};

/// Requested or available stream quality, low (0) to highest (4). Backends
/// clamp a request to their own `max_quality` and never silently upgrade
/// past what was asked for (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(pub u8);

impl Quality {
    pub const MP3_128: Quality = Quality(0);
    pub const MP3_320: Quality = Quality(1);
    pub const CD_FLAC: Quality = Quality(2);
    pub const HI_RES: Quality = Quality(3);
    pub const HI_RES_PLUS: Quality = Quality(4);

    pub fn clamp_to_max(self, max: Quality) -> Quality {
        if self.0 > max.0 { max } else { self }
    }
}

/// Normalized per-backend metadata payload, embedding the containing
/// album (with full tracklist) when `id`/`media_type` addresses a track,
/// per spec.md §4.1's `get_metadata` contract.
pub enum RawMetadata {
    Qobuz(qobuz::QobuzMetadata),
    Tidal(tidal::TidalMetadata),
    Deezer(deezer::DeezerMetadata),
    Soundcloud(soundcloud::SoundcloudMetadata),
}

/// Normalized per-backend search response: whatever paging shape the
/// backend returns, opaque past this point except to `SearchResults::from_pages`.
pub enum RawSearchResults {
    Qobuz(Vec<qobuz::QobuzSearchPage>),
    Tidal(Vec<tidal::TidalSearchPage>),
    Deezer(Vec<deezer::DeezerSearchPage>),
    Soundcloud(Vec<soundcloud::SoundcloudSearchPage>),
}

/// One authenticated façade per streaming backend (spec.md §3's `Client`
/// row, §4.1). Implementors own an HTTP session and an optional rate
/// limiter; sessions are never shared across sources.
#[async_trait]
pub trait Client: Send + Sync {
    fn source(&self) -> Source;
    fn max_quality(&self) -> Quality;
    fn is_logged_in(&self) -> bool;

    /// The session this client downloads artwork and streams through
    /// (spec.md §4.1's "owns an HTTP session"); `artwork.rs` borrows it
    /// rather than opening a second connection pool per album.
    fn http(&self) -> &reqwest::Client;

    async fn login(&self) -> Result<()>;

    async fn get_metadata(&self, id: &str, media_type: MediaType) -> Result<RawMetadata>;

    async fn search(&self, media_type: MediaType, query: &str, limit: u32) -> Result<RawSearchResults>;

    async fn get_downloadable(&self, id: &str, quality: Quality) -> Result<Box<dyn Downloadable>>;
}

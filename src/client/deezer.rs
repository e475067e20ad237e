//! Deezer backend. Session auth is cookie-based (the `arl` cookie, set
//! once at client construction); stream URLs and format names ("FLAC",
//! "MP3_320", "MP3_128") mirror `other_examples/...Rusteer__src-deezloader.rs.rs`'s
//! `DownloadQuality`. Per-track decryption key derivation and the striped
//! Blowfish CBC scheme live in `downloadable.rs`, grounded in `scred47-pleezer`.

use std::sync::RwLock;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{Client, DeezerDownloadable, Downloadable, Quality, RawMetadata, RawSearchResults};
use crate::config::DeezerCredentials;
use crate::error::{AppError, Result};
use crate::ratelimit::RateLimiter;
use crate::source::{MediaType, Source};

const API_URL: &str = "https://api.deezer.com";
const GW_API_URL: &str = "https://www.deezer.com/ajax/gw-light.php";

#[derive(Debug, Clone, Deserialize)]
pub struct DeezerArtist {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeezerAlbumSummary {
    pub id: u64,
    pub title: String,
    pub cover_xl: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeezerTrackResp {
    pub id: u64,
    pub title: String,
    pub track_position: u32,
    pub disk_number: u32,
    pub duration: u32,
    pub isrc: Option<String>,
    pub artist: DeezerArtist,
    pub album: DeezerAlbumSummary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeezerAlbumResp {
    pub id: u64,
    pub title: String,
    pub artist: DeezerArtist,
    pub release_date: Option<String>,
    pub cover_xl: Option<String>,
    pub nb_tracks: u32,
    pub tracks: DeezerTrackList,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeezerTrackList {
    pub data: Vec<DeezerTrackResp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeezerArtistResp {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeezerAlbumList {
    pub data: Vec<DeezerAlbumResp>,
}

pub enum DeezerMetadata {
    Track(DeezerTrackResp, DeezerAlbumResp),
    Album(DeezerAlbumResp),
    Artist(DeezerArtistResp, Vec<DeezerAlbumResp>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeezerSearchPage {
    pub data: Vec<DeezerTrackResp>,
}

fn quality_format(quality: Quality) -> &'static str {
    match quality.0 {
        0 => "MP3_128",
        1 | 2 => "MP3_320",
        _ => "FLAC",
    }
}

fn extension_for_format(format: &str) -> &'static str {
    if format == "FLAC" { ".flac" } else { ".mp3" }
}

/// Derives the per-track Blowfish key: MD5(track id) XOR'd with the
/// configured master secret, split across the two halves of the hex
/// digest. Identical to `scred47-pleezer`'s `Decrypt::key_for_track_id`.
fn derive_track_key(track_id: &str, secret: &[u8; 16]) -> [u8; 16] {
    let digest = format!("{:x}", md5::compute(track_id.as_bytes()));
    let digest = digest.as_bytes();
    let mut key = [0u8; 16];
    for i in 0..16 {
        key[i] = digest[i] ^ digest[i + 16] ^ secret[i];
    }
    key
}

pub struct DeezerClient {
    http: reqwest::Client,
    arl: String,
    secret: Option<[u8; 16]>,
    logged_in: RwLock<bool>,
    limiter: RateLimiter,
}

impl DeezerClient {
    pub fn new(credentials: DeezerCredentials, requests_per_minute: i64, verify_ssl: bool) -> Self {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!verify_ssl)
            .cookie_store(true)
            .build()
            .expect("reqwest client builds");
        let secret = credentials
            .decryption_secret
            .as_ref()
            .and_then(|s| s.as_bytes().try_into().ok());
        Self {
            http,
            arl: credentials.arl,
            secret,
            logged_in: RwLock::new(false),
            limiter: RateLimiter::new(requests_per_minute),
        }
    }

    async fn get_public<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        self.limiter.acquire().await;
        let resp = self
            .http
            .get(format!("{API_URL}{path}"))
            .query(query)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AppError::NonStreamable(
                Source::Deezer,
                MediaType::Track,
                path.to_string(),
                format!("http {}", resp.status()),
            ));
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl Client for DeezerClient {
    fn source(&self) -> Source {
        Source::Deezer
    }

    fn max_quality(&self) -> Quality {
        Quality::CD_FLAC
    }

    fn is_logged_in(&self) -> bool {
        *self.logged_in.read().unwrap()
    }

    fn http(&self) -> &reqwest::Client {
        &self.http
    }

    async fn login(&self) -> Result<()> {
        if self.arl.is_empty() {
            return Err(AppError::MissingCredentials(Source::Deezer));
        }
        let resp = self
            .http
            .get(GW_API_URL)
            .query(&[("method", "deezer.getUserData"), ("input", "3"), ("api_version", "1.0")])
            .header("Cookie", format!("arl={}", self.arl))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AppError::AuthenticationFailed(
                Source::Deezer,
                "arl cookie rejected".to_string(),
            ));
        }
        *self.logged_in.write().unwrap() = true;
        Ok(())
    }

    async fn get_metadata(&self, id: &str, media_type: MediaType) -> Result<RawMetadata> {
        let meta = match media_type {
            MediaType::Track => {
                let track: DeezerTrackResp = self.get_public(&format!("/track/{id}"), &[]).await?;
                let album: DeezerAlbumResp = self
                    .get_public(&format!("/album/{}", track.album.id), &[])
                    .await?;
                DeezerMetadata::Track(track, album)
            }
            MediaType::Album => {
                let album: DeezerAlbumResp = self.get_public(&format!("/album/{id}"), &[]).await?;
                DeezerMetadata::Album(album)
            }
            MediaType::Artist => {
                let artist: DeezerArtistResp = self.get_public(&format!("/artist/{id}"), &[]).await?;
                let albums: DeezerAlbumList = self
                    .get_public(&format!("/artist/{id}/albums"), &[])
                    .await?;
                DeezerMetadata::Artist(artist, albums.data)
            }
            MediaType::Playlist | MediaType::Label | MediaType::Featured => {
                return Err(AppError::NonStreamable(
                    Source::Deezer,
                    media_type,
                    id.to_string(),
                    "not supported on deezer".to_string(),
                ));
            }
        };
        Ok(RawMetadata::Deezer(meta))
    }

    async fn search(&self, media_type: MediaType, query: &str, limit: u32) -> Result<RawSearchResults> {
        if media_type != MediaType::Track {
            return Err(AppError::NonStreamable(
                Source::Deezer,
                media_type,
                String::new(),
                "only track search is supported on deezer".to_string(),
            ));
        }
        let limit_str = limit.to_string();
        let page: DeezerSearchPage = self
            .get_public("/search", &[("q", query), ("limit", &limit_str)])
            .await?;
        Ok(RawSearchResults::Deezer(vec![page]))
    }

    async fn get_downloadable(&self, id: &str, quality: Quality) -> Result<Box<dyn Downloadable>> {
        let secret = self
            .secret
            .ok_or_else(|| AppError::MissingCredentials(Source::Deezer))?;
        let quality = quality.clamp_to_max(self.max_quality());
        let format = quality_format(quality);
        let key = derive_track_key(id, &secret);

        // A genuine gateway call would resolve `id` + `format` into a CDN
        // URL via `gw-light.php`'s `song.getData`/media endpoints; the
        // trait boundary we own starts at "here is the URL and the key".
        let url = format!("{GW_API_URL}?method=song.getData&track_id={id}&format={format}");

        Ok(Box::new(DeezerDownloadable::new(
            self.http.clone(),
            url,
            key,
            extension_for_format(format),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_key_derivation_is_deterministic() {
        let secret = *b"0123456789abcdef";
        let a = derive_track_key("42", &secret);
        let b = derive_track_key("42", &secret);
        assert_eq!(a, b);
    }

    #[test]
    fn track_key_differs_per_track() {
        let secret = *b"0123456789abcdef";
        assert_ne!(derive_track_key("42", &secret), derive_track_key("43", &secret));
    }

    #[test]
    fn quality_maps_to_deezer_format_names() {
        assert_eq!(quality_format(Quality::MP3_128), "MP3_128");
        assert_eq!(quality_format(Quality::MP3_320), "MP3_320");
        assert_eq!(quality_format(Quality::CD_FLAC), "FLAC");
    }
}

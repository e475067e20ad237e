//! Tidal backend. Bearer-token session over the v1 catalog API; field
//! shapes grounded in `other_examples/...phayes-tidalrs__src-track.rs.rs`
//! (`Track`, `AlbumSummary`, `TrackStream`).

use std::sync::RwLock;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{BasicDownloadable, Client, Downloadable, Quality, RawMetadata, RawSearchResults};
use crate::config::TidalCredentials;
use crate::error::{AppError, Result};
use crate::ratelimit::RateLimiter;
use crate::source::{MediaType, Source};

const BASE_URL: &str = "https://api.tidal.com/v1";

#[derive(Debug, Clone, Deserialize)]
pub struct TidalArtistSummary {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TidalAlbumSummary {
    pub id: u64,
    pub title: String,
    pub cover: Option<String>,
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TidalTrackResp {
    pub id: u64,
    pub track_number: u32,
    pub volume_number: u32,
    #[serde(default)]
    pub artists: Vec<TidalArtistSummary>,
    pub album: TidalAlbumSummary,
    pub duration: u32,
    pub isrc: Option<String>,
    pub title: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TidalPaginated<T> {
    pub limit: u32,
    pub offset: u32,
    #[serde(rename = "totalNumberOfItems")]
    pub total_number_of_items: u32,
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TidalAlbumResp {
    pub id: u64,
    pub title: String,
    pub artists: Vec<TidalArtistSummary>,
    pub release_date: Option<String>,
    pub cover: Option<String>,
    pub number_of_tracks: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TidalArtistResp {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TidalPlaylistResp {
    pub uuid: String,
    pub title: String,
    pub number_of_tracks: u32,
}

pub enum TidalMetadata {
    Track {
        track: TidalTrackResp,
        album: TidalAlbumResp,
    },
    Album(TidalAlbumResp, Vec<TidalTrackResp>),
    Artist(TidalArtistResp, Vec<TidalAlbumResp>),
    Playlist(TidalPlaylistResp, Vec<TidalTrackResp>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TidalSearchPage {
    pub tracks: Option<TidalPaginated<TidalTrackResp>>,
    pub albums: Option<TidalPaginated<TidalAlbumResp>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackStream {
    urls: Vec<String>,
    codec: String,
}

fn tidal_quality_param(quality: Quality) -> &'static str {
    match quality.0 {
        0 => "LOW",
        1 => "HIGH",
        2 => "LOSSLESS",
        _ => "HI_RES_LOSSLESS",
    }
}

fn extension_for_codec(codec: &str) -> &'static str {
    match codec.to_ascii_uppercase().as_str() {
        "FLAC" | "MQA" => ".flac",
        _ => ".m4a",
    }
}

pub struct TidalClient {
    http: reqwest::Client,
    access_token: RwLock<String>,
    refresh_token: Option<String>,
    limiter: RateLimiter,
}

impl TidalClient {
    pub fn new(credentials: TidalCredentials, requests_per_minute: i64, verify_ssl: bool) -> Self {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!verify_ssl)
            .build()
            .expect("reqwest client builds");
        Self {
            http,
            access_token: RwLock::new(credentials.access_token),
            refresh_token: credentials.refresh_token,
            limiter: RateLimiter::new(requests_per_minute),
        }
    }

    fn authed_get(&self, path: &str) -> reqwest::RequestBuilder {
        let token = self.access_token.read().unwrap().clone();
        self.http
            .get(format!("{BASE_URL}{path}"))
            .bearer_auth(token)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        self.limiter.acquire().await;
        let resp = self.authed_get(path).query(query).send().await?;
        if resp.status() == 401 {
            return Err(AppError::AuthenticationFailed(
                Source::Tidal,
                "access token rejected".to_string(),
            ));
        }
        if !resp.status().is_success() {
            return Err(AppError::NonStreamable(
                Source::Tidal,
                MediaType::Track,
                path.to_string(),
                format!("http {}", resp.status()),
            ));
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl Client for TidalClient {
    fn source(&self) -> Source {
        Source::Tidal
    }

    fn max_quality(&self) -> Quality {
        Quality::HI_RES_PLUS
    }

    fn is_logged_in(&self) -> bool {
        !self.access_token.read().unwrap().is_empty()
    }

    fn http(&self) -> &reqwest::Client {
        &self.http
    }

    async fn login(&self) -> Result<()> {
        if self.access_token.read().unwrap().is_empty() {
            return Err(AppError::MissingCredentials(Source::Tidal));
        }
        // Tidal's OAuth access tokens are supplied pre-minted; validate by
        // touching a cheap authenticated endpoint.
        let _: serde_json::Value = self.get_json("/sessions", &[]).await.map_err(|_| {
            AppError::AuthenticationFailed(Source::Tidal, "session check failed".to_string())
        })?;
        let _ = &self.refresh_token;
        Ok(())
    }

    async fn get_metadata(&self, id: &str, media_type: MediaType) -> Result<RawMetadata> {
        let meta = match media_type {
            MediaType::Track => {
                let track: TidalTrackResp = self.get_json(&format!("/tracks/{id}"), &[]).await?;
                let album: TidalAlbumResp = self
                    .get_json(&format!("/albums/{}", track.album.id), &[])
                    .await?;
                TidalMetadata::Track { track, album }
            }
            MediaType::Album => {
                let album: TidalAlbumResp = self.get_json(&format!("/albums/{id}"), &[]).await?;
                let tracks: TidalPaginated<TidalTrackResp> =
                    self.get_json(&format!("/albums/{id}/tracks"), &[]).await?;
                TidalMetadata::Album(album, tracks.items)
            }
            MediaType::Artist => {
                let artist: TidalArtistResp = self.get_json(&format!("/artists/{id}"), &[]).await?;
                let albums: TidalPaginated<TidalAlbumResp> = self
                    .get_json(&format!("/artists/{id}/albums"), &[])
                    .await?;
                TidalMetadata::Artist(artist, albums.items)
            }
            MediaType::Playlist => {
                let playlist: TidalPlaylistResp =
                    self.get_json(&format!("/playlists/{id}"), &[]).await?;
                let tracks: TidalPaginated<TidalTrackResp> = self
                    .get_json(&format!("/playlists/{id}/tracks"), &[])
                    .await?;
                TidalMetadata::Playlist(playlist, tracks.items)
            }
            MediaType::Label | MediaType::Featured => {
                return Err(AppError::NonStreamable(
                    Source::Tidal,
                    media_type,
                    id.to_string(),
                    "not supported on tidal".to_string(),
                ));
            }
        };
        Ok(RawMetadata::Tidal(meta))
    }

    async fn search(&self, media_type: MediaType, query: &str, limit: u32) -> Result<RawSearchResults> {
        let limit_str = limit.to_string();
        let page: TidalSearchPage = self
            .get_json("/search", &[("query", query), ("limit", &limit_str)])
            .await?;
        let _ = media_type;
        Ok(RawSearchResults::Tidal(vec![page]))
    }

    async fn get_downloadable(&self, id: &str, quality: Quality) -> Result<Box<dyn Downloadable>> {
        let quality = quality.clamp_to_max(self.max_quality());
        let stream: TrackStream = self
            .get_json(
                &format!("/tracks/{id}/urlpostpaywall"),
                &[
                    ("audioquality", tidal_quality_param(quality)),
                    ("urlusagemode", "STREAM"),
                    ("assetpresentation", "FULL"),
                ],
            )
            .await?;
        let url = stream
            .urls
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NonStreamable(Source::Tidal, MediaType::Track, id.to_string(), "no stream url".to_string()))?;
        Ok(Box::new(BasicDownloadable::new(
            self.http.clone(),
            url,
            extension_for_codec(&stream.codec),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_maps_to_tidal_strings() {
        assert_eq!(tidal_quality_param(Quality::MP3_128), "LOW");
        assert_eq!(tidal_quality_param(Quality::CD_FLAC), "LOSSLESS");
        assert_eq!(tidal_quality_param(Quality::HI_RES_PLUS), "HI_RES_LOSSLESS");
    }

    #[test]
    fn flac_and_mqa_codecs_map_to_flac_extension() {
        assert_eq!(extension_for_codec("FLAC"), ".flac");
        assert_eq!(extension_for_codec("MQA"), ".flac");
        assert_eq!(extension_for_codec("AAC"), ".m4a");
    }
}

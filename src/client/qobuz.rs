//! Qobuz backend. Session setup, login and signed `/track/getFileUrl`
//! requests are carried over almost verbatim from the teacher's
//! `client.rs`; what changes is the surface above it — `get_metadata`/
//! `search` now satisfy the generic `Client` trait instead of being
//! Qobuz-specific free functions.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{Client, Downloadable, Quality, RawMetadata, RawSearchResults};
use crate::config::QobuzCredentials;
use crate::error::{AppError, Result};
use crate::ratelimit::RateLimiter;
use crate::source::{MediaType, Source};

const BASE_URL: &str = "https://www.qobuz.com/api.json/0.2";
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

// --- Wire shapes (spec.md §9: per-backend response structs, not dicts) ---

#[derive(Debug, Clone, Deserialize)]
pub struct QobuzArtist {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QobuzTrackResp {
    pub id: u64,
    pub title: String,
    pub track_number: u8,
    pub media_number: u8,
    pub duration: u32,
    pub performer: QobuzArtist,
    pub isrc: Option<String>,
    #[serde(default)]
    pub album: Option<Box<QobuzAlbumResp>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QobuzAlbumResp {
    pub id: String,
    pub title: String,
    pub version: Option<String>,
    pub artist: QobuzArtist,
    pub release_date_original: Option<String>,
    pub tracks: QobuzPaginated<QobuzTrackResp>,
    pub image: Option<QobuzImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QobuzImage {
    pub large: Option<String>,
    pub small: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QobuzPaginated<T> {
    pub offset: u64,
    pub total: u64,
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QobuzArtistResp {
    pub id: u64,
    pub name: String,
    pub albums: QobuzPaginated<QobuzAlbumResp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QobuzLabelResp {
    pub id: u64,
    pub name: String,
    pub albums: QobuzPaginated<QobuzAlbumResp>,
}

pub enum QobuzMetadata {
    Track(QobuzTrackResp),
    Album(QobuzAlbumResp),
    Artist(QobuzArtistResp),
    Label(QobuzLabelResp),
}

#[derive(Debug, Clone, Deserialize)]
pub struct QobuzSearchPage {
    pub tracks: Option<QobuzPaginated<QobuzTrackResp>>,
    pub albums: Option<QobuzPaginated<QobuzAlbumResp>>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    user_auth_token: String,
}

#[derive(Debug, Deserialize)]
struct FileUrlResponse {
    url: String,
    format_id: u8,
    mime_type: String,
}

/// Maps a requested `Quality` onto Qobuz's numeric `format_id` (5 = MP3
/// 320, 6 = CD-quality FLAC, 7/27 = Hi-Res). Never upgrades past what the
/// account is eligible for; the backend itself rejects ineligible ids.
fn format_id_for(quality: Quality) -> u8 {
    match quality.0 {
        0 | 1 => 5,
        2 => 6,
        3 => 7,
        _ => 27,
    }
}

fn extension_for(format_id: u8) -> &'static str {
    if format_id == 5 { ".mp3" } else { ".flac" }
}

pub struct QobuzClient {
    http: reqwest::Client,
    app_id: String,
    app_secret: String,
    credentials: QobuzCredentials,
    auth_token: RwLock<Option<String>>,
    limiter: RateLimiter,
}

impl QobuzClient {
    pub fn new(credentials: QobuzCredentials, requests_per_minute: i64, verify_ssl: bool) -> Self {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!verify_ssl)
            .build()
            .expect("reqwest client builds");
        let app_id = credentials.app_id.clone().unwrap_or_default();
        let app_secret = credentials.app_secret.clone().unwrap_or_default();
        Self {
            http,
            app_id,
            app_secret,
            credentials,
            auth_token: RwLock::new(None),
            limiter: RateLimiter::new(requests_per_minute),
        }
    }

    fn authed_get(&self, path: &str) -> Result<RequestBuilder> {
        let token = self.auth_token.read().unwrap();
        let token = token
            .as_ref()
            .ok_or_else(|| AppError::MissingCredentials(Source::Qobuz))?;
        Ok(self
            .http
            .get(format!("{BASE_URL}{path}"))
            .header("X-App-Id", &self.app_id)
            .header("X-User-Auth-Token", token))
    }

    async fn send_with_retry<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        self.limiter.acquire().await;
        let mut backoff = INITIAL_BACKOFF;
        for attempt in 0..=MAX_RETRIES {
            let req = request.try_clone().expect("query-only requests clone");
            let resp = req.send().await?;
            let status = resp.status();
            if status.is_success() {
                return Ok(resp.json().await?);
            }
            let retryable = matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504);
            if !retryable || attempt == MAX_RETRIES {
                return Err(AppError::NonStreamable(
                    Source::Qobuz,
                    MediaType::Track,
                    String::new(),
                    format!("http {status}"),
                ));
            }
            tracing::warn!(%status, ?backoff, "qobuz request failed, retrying");
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
        unreachable!()
    }
}

#[async_trait]
impl Client for QobuzClient {
    fn source(&self) -> Source {
        Source::Qobuz
    }

    fn max_quality(&self) -> Quality {
        Quality::HI_RES_PLUS
    }

    fn is_logged_in(&self) -> bool {
        self.auth_token.read().unwrap().is_some()
    }

    fn http(&self) -> &reqwest::Client {
        &self.http
    }

    async fn login(&self) -> Result<()> {
        if self.is_logged_in() {
            return Ok(());
        }
        if self.app_id.is_empty() {
            return Err(AppError::MissingCredentials(Source::Qobuz));
        }
        let password_hash = format!(
            "{:x}",
            md5::compute(self.credentials.password_or_token.as_bytes())
        );
        let resp = self
            .http
            .get(format!("{BASE_URL}/user/login"))
            .header("X-App-Id", &self.app_id)
            .query(&[
                ("email", self.credentials.email_or_userid.as_str()),
                ("password", password_hash.as_str()),
                ("app_id", self.app_id.as_str()),
            ])
            .send()
            .await?;

        if resp.status() == 401 {
            return Err(AppError::AuthenticationFailed(
                Source::Qobuz,
                "invalid credentials".to_string(),
            ));
        }
        let login: LoginResponse = resp.json().await?;
        *self.auth_token.write().unwrap() = Some(login.user_auth_token);
        Ok(())
    }

    async fn get_metadata(&self, id: &str, media_type: MediaType) -> Result<RawMetadata> {
        let meta = match media_type {
            MediaType::Track => {
                let resp: QobuzTrackResp = self
                    .send_with_retry(self.authed_get("/track/get")?.query(&[("track_id", id)]))
                    .await?;
                QobuzMetadata::Track(resp)
            }
            MediaType::Album => {
                let resp: QobuzAlbumResp = self
                    .send_with_retry(self.authed_get("/album/get")?.query(&[("album_id", id)]))
                    .await?;
                QobuzMetadata::Album(resp)
            }
            MediaType::Artist => {
                let resp: QobuzArtistResp = self
                    .send_with_retry(
                        self.authed_get("/artist/get")?
                            .query(&[("artist_id", id), ("extra", "albums")]),
                    )
                    .await?;
                QobuzMetadata::Artist(resp)
            }
            MediaType::Label => {
                let resp: QobuzLabelResp = self
                    .send_with_retry(
                        self.authed_get("/label/get")?
                            .query(&[("label_id", id), ("extra", "albums")]),
                    )
                    .await?;
                QobuzMetadata::Label(resp)
            }
            MediaType::Playlist | MediaType::Featured => {
                return Err(AppError::NonStreamable(
                    Source::Qobuz,
                    media_type,
                    id.to_string(),
                    "not handled by get_metadata".to_string(),
                ));
            }
        };
        Ok(RawMetadata::Qobuz(meta))
    }

    async fn search(&self, media_type: MediaType, query: &str, limit: u32) -> Result<RawSearchResults> {
        let type_param = match media_type {
            MediaType::Track => "tracks",
            MediaType::Album => "albums",
            MediaType::Featured => "featured",
            other => {
                return Err(AppError::NonStreamable(
                    Source::Qobuz,
                    other,
                    String::new(),
                    "unsupported search media type".to_string(),
                ));
            }
        };
        let page: QobuzSearchPage = self
            .send_with_retry(self.authed_get("/catalog/search")?.query(&[
                ("query", query),
                ("type", type_param),
                ("limit", &limit.to_string()),
            ]))
            .await?;
        Ok(RawSearchResults::Qobuz(vec![page]))
    }

    async fn get_downloadable(&self, id: &str, quality: Quality) -> Result<Box<dyn Downloadable>> {
        let quality = quality.clamp_to_max(self.max_quality());
        let format_id = format_id_for(quality);
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock is after the epoch")
            .as_secs()
            .to_string();
        let sig = generate_request_sig(id, format_id, &timestamp, &self.app_secret);

        let resp: FileUrlResponse = self
            .send_with_retry(self.authed_get("/track/getFileUrl")?.query(&[
                ("track_id", id),
                ("format_id", &format_id.to_string()),
                ("intent", "stream"),
                ("request_ts", &timestamp),
                ("request_sig", &sig),
            ]))
            .await?;

        let _ = resp.mime_type;
        Ok(Box::new(crate::client::BasicDownloadable::new(
            self.http.clone(),
            resp.url,
            extension_for(resp.format_id),
        )))
    }
}

/// MD5 request signature for `/track/getFileUrl`. The signature always
/// uses `intentstream` regardless of the request's actual `intent` value.
pub fn generate_request_sig(track_id: &str, format_id: u8, timestamp: &str, app_secret: &str) -> String {
    let data =
        format!("trackgetFileUrlformat_id{format_id}intentstreamtrack_id{track_id}{timestamp}{app_secret}");
    format!("{:x}", md5::compute(data.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic_for_fixed_inputs() {
        let a = generate_request_sig("123", 5, "1000", "secret");
        let b = generate_request_sig("123", 5, "1000", "secret");
        assert_eq!(a, b);
    }

    #[test]
    fn signature_changes_with_any_input() {
        let base = generate_request_sig("123", 5, "1000", "secret");
        assert_ne!(base, generate_request_sig("124", 5, "1000", "secret"));
        assert_ne!(base, generate_request_sig("123", 6, "1000", "secret"));
        assert_ne!(base, generate_request_sig("123", 5, "1001", "secret"));
    }

    #[test]
    fn format_id_never_exceeds_requested_tier_mapping() {
        assert_eq!(format_id_for(Quality::MP3_128), 5);
        assert_eq!(format_id_for(Quality::MP3_320), 5);
        assert_eq!(format_id_for(Quality::CD_FLAC), 6);
        assert_eq!(format_id_for(Quality::HI_RES), 7);
        assert_eq!(format_id_for(Quality::HI_RES_PLUS), 27);
    }
}

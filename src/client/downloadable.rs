//! `Downloadable` and its three shapes (spec.md §4.2): a plain HTTP GET
//! (`BasicDownloadable`, Qobuz/Tidal), ordered HLS segment concatenation
//! (`SegmentedDownloadable`, SoundCloud) and per-chunk Blowfish CBC
//! descrambling (`DeezerDownloadable`). Generalizes the teacher's
//! `download_one` (single GET, buffered in memory, `.tmp` + rename) into
//! a trait so `media.rs::Track::download` doesn't know which backend it
//! is talking to.

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use indicatif::ProgressBar;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result, TransportError};

#[async_trait]
pub trait Downloadable: Send + Sync {
    fn extension(&self) -> &'static str;

    /// May perform a HEAD or cached lookup; must not consume the body.
    async fn size(&self) -> Result<u64>;

    /// Writes the complete artifact to `dest`, driving `bar`'s position
    /// with monotonically non-decreasing byte counts (spec.md §4.2). The
    /// partial file is left in place on failure; the caller decides
    /// whether to retry (§4.5).
    async fn download(&self, dest: &Path, bar: Option<&ProgressBar>) -> Result<()>;
}

fn io_err(path: &Path, source: std::io::Error) -> AppError {
    AppError::Transport(TransportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

async fn stream_to_file(
    mut stream: impl futures::Stream<Item = reqwest::Result<bytes::Bytes>> + Unpin,
    dest: &Path,
    bar: Option<&ProgressBar>,
) -> Result<()> {
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| io_err(dest, e))?;
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(TransportError::from)?;
        file.write_all(&chunk).await.map_err(|e| io_err(dest, e))?;
        written += chunk.len() as u64;
        if let Some(bar) = bar {
            bar.set_position(written);
        }
    }
    file.flush().await.map_err(|e| io_err(dest, e))?;
    Ok(())
}

/// A single direct HTTP GET, no reassembly or decryption (Qobuz, Tidal).
pub struct BasicDownloadable {
    http: reqwest::Client,
    url: String,
    extension: &'static str,
}

impl BasicDownloadable {
    pub fn new(http: reqwest::Client, url: String, extension: &'static str) -> Self {
        Self { http, url, extension }
    }
}

#[async_trait]
impl Downloadable for BasicDownloadable {
    fn extension(&self) -> &'static str {
        self.extension
    }

    async fn size(&self) -> Result<u64> {
        let resp = self.http.head(&self.url).send().await?;
        Ok(resp.content_length().unwrap_or(0))
    }

    async fn download(&self, dest: &Path, bar: Option<&ProgressBar>) -> Result<()> {
        let resp = self.http.get(&self.url).send().await?;
        if !resp.status().is_success() {
            return Err(AppError::Transport(TransportError::Io {
                path: dest.to_path_buf(),
                source: std::io::Error::other(format!("http {}", resp.status())),
            }));
        }
        stream_to_file(resp.bytes_stream(), dest, bar).await
    }
}

/// Ordered concatenation of HLS-style media segments (SoundCloud's HLS
/// progressive streams). `size()` sums each segment's `Content-Length`
/// via HEAD, since the backend exposes no single manifest-level size.
pub struct SegmentedDownloadable {
    http: reqwest::Client,
    segment_urls: Vec<String>,
    extension: &'static str,
}

impl SegmentedDownloadable {
    pub fn new(http: reqwest::Client, segment_urls: Vec<String>, extension: &'static str) -> Self {
        Self {
            http,
            segment_urls,
            extension,
        }
    }
}

#[async_trait]
impl Downloadable for SegmentedDownloadable {
    fn extension(&self) -> &'static str {
        self.extension
    }

    async fn size(&self) -> Result<u64> {
        let mut total = 0u64;
        for url in &self.segment_urls {
            let resp = self.http.head(url).send().await?;
            total += resp.content_length().unwrap_or(0);
        }
        Ok(total)
    }

    async fn download(&self, dest: &Path, bar: Option<&ProgressBar>) -> Result<()> {
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| io_err(dest, e))?;
        let mut written = 0u64;
        for url in &self.segment_urls {
            let resp = self.http.get(url).send().await?;
            if !resp.status().is_success() {
                return Err(AppError::Transport(TransportError::Io {
                    path: dest.to_path_buf(),
                    source: std::io::Error::other(format!("http {}", resp.status())),
                }));
            }
            let mut stream = resp.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(TransportError::from)?;
                file.write_all(&chunk).await.map_err(|e| io_err(dest, e))?;
                written += chunk.len() as u64;
                if let Some(bar) = bar {
                    bar.set_position(written);
                }
            }
        }
        file.flush().await.map_err(|e| io_err(dest, e))?;
        Ok(())
    }
}

/// Deezer's striped Blowfish CBC descrambling: content is split into
/// 2048-byte blocks, every third block (0-indexed) is CBC-decrypted with
/// a fixed IV, the rest pass through untouched. Algorithm and constants
/// grounded in `scred47-pleezer`'s `decrypt.rs`, the other streaming
/// client in the example pack that carries the same `blowfish`+`cbc`
/// dependency pair.
pub struct DeezerDownloadable {
    http: reqwest::Client,
    url: String,
    key: [u8; 16],
    extension: &'static str,
}

const CBC_BLOCK_SIZE: usize = 2048;
const CBC_STRIPE_COUNT: u64 = 3;
const CBC_BF_IV: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

impl DeezerDownloadable {
    pub fn new(http: reqwest::Client, url: String, key: [u8; 16], extension: &'static str) -> Self {
        Self {
            http,
            url,
            key,
            extension,
        }
    }
}

#[async_trait]
impl Downloadable for DeezerDownloadable {
    fn extension(&self) -> &'static str {
        self.extension
    }

    async fn size(&self) -> Result<u64> {
        let resp = self.http.head(&self.url).send().await?;
        Ok(resp.content_length().unwrap_or(0))
    }

    async fn download(&self, dest: &Path, bar: Option<&ProgressBar>) -> Result<()> {
        use blowfish::{Blowfish, cipher::BlockDecryptMut, cipher::KeyIvInit};
        use cbc::cipher::block_padding::NoPadding;

        let resp = self.http.get(&self.url).send().await?;
        if !resp.status().is_success() {
            return Err(AppError::Transport(TransportError::Io {
                path: dest.to_path_buf(),
                source: std::io::Error::other(format!("http {}", resp.status())),
            }));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| io_err(dest, e))?;
        let mut pending = Vec::with_capacity(CBC_BLOCK_SIZE);
        let mut block_index = 0u64;
        let mut written = 0u64;
        let mut stream = resp.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(TransportError::from)?;
            pending.extend_from_slice(&chunk);
            while pending.len() >= CBC_BLOCK_SIZE {
                let mut block: Vec<u8> = pending.drain(..CBC_BLOCK_SIZE).collect();
                if block_index % CBC_STRIPE_COUNT == 0 {
                    let decryptor = cbc::Decryptor::<Blowfish>::new_from_slices(&self.key, &CBC_BF_IV)
                        .map_err(|e| {
                            AppError::Transport(TransportError::Io {
                                path: dest.to_path_buf(),
                                source: std::io::Error::other(e.to_string()),
                            })
                        })?;
                    decryptor
                        .decrypt_padded_mut::<NoPadding>(&mut block)
                        .map_err(|e| {
                            AppError::Transport(TransportError::Io {
                                path: dest.to_path_buf(),
                                source: std::io::Error::other(e.to_string()),
                            })
                        })?;
                }
                file.write_all(&block).await.map_err(|e| io_err(dest, e))?;
                written += block.len() as u64;
                if let Some(bar) = bar {
                    bar.set_position(written);
                }
                block_index += 1;
            }
        }
        // A trailing partial block is shorter than CBC_BLOCK_SIZE and is
        // never part of the encrypted stripe (mirrors pleezer's seek path,
        // which only decrypts full-length blocks).
        if !pending.is_empty() {
            file.write_all(&pending).await.map_err(|e| io_err(dest, e))?;
            written += pending.len() as u64;
            if let Some(bar) = bar {
                bar.set_position(written);
            }
        }
        file.flush().await.map_err(|e| io_err(dest, e))?;
        Ok(())
    }
}

//! Owns every per-run collaborator: clients, ledger, the pending and
//! media lists, and the two sub-services (`Searcher`, `Downloader`)
//! (spec.md §2 item 8, §4.6). This is the one place that is allowed to
//! perform an interactive credential prompt, which is why `add`'s own
//! doc comment repeats the original's warning about concurrent
//! first-use — `get_or_login_client` serializes that one sequence
//! behind `login_guard`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::artwork::ArtworkRegistry;
use crate::client::deezer::DeezerClient;
use crate::client::lastfm::LastfmScraper;
use crate::client::qobuz::QobuzClient;
use crate::client::soundcloud::SoundcloudClient;
use crate::client::tidal::TidalClient;
use crate::client::Client;
use crate::config::{self, Config};
use crate::downloader::{DownloadSummary, Downloader};
use crate::error::{AppError, Result};
use crate::ledger::{Ledger, LedgerStore, NullStore, SqliteStore};
use crate::media::{Media, RipContext};
use crate::pending::{create_pending_item, Pending, PendingLastfmPlaylist};
use crate::progress::ProgressManager;
use crate::searcher::{Searcher, TerminalMenu};
use crate::semaphore::DownloadSemaphore;
use crate::source::{MediaType, Source};
use crate::tag::{LoftyTagger, Tagger};
use crate::url;

fn build_ledger(config: &Config) -> anyhow::Result<Arc<Ledger>> {
    let completed: Box<dyn LedgerStore> = if config.database.downloads_enabled {
        Box::new(SqliteStore::open(&config.database.downloads_path)?)
    } else {
        Box::new(NullStore)
    };
    let failed: Box<dyn LedgerStore> = if config.database.failed_downloads_enabled {
        Box::new(SqliteStore::open(&config.database.failed_downloads_path)?)
    } else {
        Box::new(NullStore)
    };
    Ok(Arc::new(Ledger::new(completed, failed)))
}

pub struct Orchestrator {
    config: Arc<Config>,
    ledger: Arc<Ledger>,
    clients: Mutex<HashMap<Source, Arc<dyn Client>>>,
    /// Serializes the build-client-then-login sequence so two concurrent
    /// `add()` calls on a fresh source don't both trigger an interactive
    /// credential prompt (spec.md §4.6: "must not be invoked concurrently
    /// on itself").
    login_guard: Mutex<()>,
    pending: Mutex<Vec<Pending>>,
    media: Mutex<Vec<Media>>,
    artwork_registry: Arc<ArtworkRegistry>,
    ctx: Arc<RipContext>,
    searcher: Searcher,
    downloader: Downloader,
}

impl Orchestrator {
    pub fn new(config: Arc<Config>) -> anyhow::Result<Self> {
        let ledger = build_ledger(&config)?;
        let artwork_registry = Arc::new(ArtworkRegistry::new());
        let progress = Arc::new(ProgressManager::new(config.cli.progress_bars));
        let semaphore = DownloadSemaphore::new(config.downloads.max_connections, Duration::ZERO);
        let tagger: Arc<dyn Tagger> = Arc::new(LoftyTagger);

        let ctx = Arc::new(RipContext {
            config: config.clone(),
            ledger: ledger.clone(),
            progress: progress.clone(),
            semaphore: semaphore.clone(),
            tagger: tagger.clone(),
        });

        Ok(Self {
            config,
            ledger,
            clients: Mutex::new(HashMap::new()),
            login_guard: Mutex::new(()),
            pending: Mutex::new(Vec::new()),
            media: Mutex::new(Vec::new()),
            artwork_registry,
            downloader: Downloader::new(ctx.clone()),
            ctx,
            searcher: Searcher::new(Box::new(TerminalMenu)),
        })
    }

    /// Constructs a fresh client for `source`, prompting interactively
    /// for credentials when none are configured (teacher's
    /// `prompt_qobuz_credentials` pattern, generalized to all four
    /// backends). Last.fm has no client of its own (spec.md §9).
    fn build_client(&self, source: Source) -> Result<Arc<dyn Client>> {
        let rpm = self.config.downloads.requests_per_minute;
        let verify_ssl = self.config.verify_ssl;
        match source {
            Source::Qobuz => {
                let creds = match self.config.qobuz.ready() {
                    Some(c) => c.clone(),
                    None => config::prompt_qobuz_credentials().map_err(|e| {
                        error!(error = %e, "qobuz credential prompt failed");
                        AppError::MissingCredentials(source)
                    })?,
                };
                Ok(Arc::new(QobuzClient::new(creds, rpm, verify_ssl)))
            }
            Source::Tidal => {
                let creds = match self.config.tidal.ready() {
                    Some(c) => c.clone(),
                    None => config::prompt_tidal_credentials().map_err(|e| {
                        error!(error = %e, "tidal credential prompt failed");
                        AppError::MissingCredentials(source)
                    })?,
                };
                Ok(Arc::new(TidalClient::new(creds, rpm, verify_ssl)))
            }
            Source::Deezer => {
                let creds = match self.config.deezer.ready() {
                    Some(c) => c.clone(),
                    None => config::prompt_deezer_credentials().map_err(|e| {
                        error!(error = %e, "deezer credential prompt failed");
                        AppError::MissingCredentials(source)
                    })?,
                };
                Ok(Arc::new(DeezerClient::new(creds, rpm, verify_ssl)))
            }
            Source::Soundcloud => {
                let creds = match self.config.soundcloud.ready() {
                    Some(c) => c.clone(),
                    None => config::prompt_soundcloud_credentials().map_err(|e| {
                        error!(error = %e, "soundcloud credential prompt failed");
                        AppError::MissingCredentials(source)
                    })?,
                };
                Ok(Arc::new(SoundcloudClient::new(creds, rpm, verify_ssl)))
            }
            Source::Lastfm => Err(AppError::InvalidSource("last.fm has no downloadable client".to_string())),
        }
    }

    /// Returns the (possibly freshly built and logged-in) client for
    /// `source`. `login()` is idempotent, so re-entering this for an
    /// already-logged-in client is cheap.
    async fn get_or_login_client(&self, source: Source) -> Result<Arc<dyn Client>> {
        let _guard = self.login_guard.lock().await;

        let existing = self.clients.lock().await.get(&source).cloned();
        let client = match existing {
            Some(c) => c,
            None => {
                let c = self.build_client(source)?;
                self.clients.lock().await.insert(source, c.clone());
                c
            }
        };

        if !client.is_logged_in() {
            client.login().await?;
        }
        Ok(client)
    }

    /// Parses one URL, logs its source in if needed, and appends the
    /// resulting `Pending`. Must not run concurrently with itself on a
    /// source seen for the first time this run (spec.md §4.6) — use
    /// `add_all` for a batch of URLs instead.
    pub async fn add(&self, url: &str) -> Result<()> {
        let parsed = url::parse_url(url).ok_or_else(|| AppError::UrlParsing(url.to_string()))?;
        self.add_by_id(parsed.source, parsed.media_type, parsed.id).await
    }

    pub async fn add_by_id(&self, source: Source, media_type: MediaType, id: String) -> Result<()> {
        let client = self.get_or_login_client(source).await?;
        let pending = create_pending_item(
            media_type,
            source,
            id,
            client,
            self.config.clone(),
            self.ledger.clone(),
            self.artwork_registry.clone(),
        )?;
        self.pending.lock().await.push(pending);
        Ok(())
    }

    /// Pre-parses every URL, logs in each distinct source serially (to
    /// avoid concurrent prompt contention), then resolves the
    /// remaining URL -> Pending conversions concurrently. Bad URLs are
    /// logged and skipped, never fatal for the batch.
    pub async fn add_all(&self, urls: &[String]) {
        let mut parsed = Vec::with_capacity(urls.len());
        for raw in urls {
            match url::parse_url(raw) {
                Some(p) => parsed.push(p),
                None => warn!(url = %raw, "could not parse url, skipping"),
            }
        }

        let mut seen = Vec::new();
        for p in &parsed {
            if !seen.contains(&p.source) {
                seen.push(p.source);
            }
        }
        for source in seen {
            if let Err(e) = self.get_or_login_client(source).await {
                warn!(%source, error = %e, "login failed, urls for this source will be skipped");
            }
        }

        let futures = parsed.into_iter().map(|p| async move {
            if let Err(e) = self.add_by_id(p.source, p.media_type, p.id.clone()).await {
                warn!(source = %p.source, id = %p.id, error = %e, "could not enqueue reference, skipping");
            }
        });
        futures::future::join_all(futures).await;
    }

    /// Same as `add_all` but over pre-parsed `(source, media_type, id)`
    /// triples rather than URLs (spec.md §4.6's `add_all_by_id`).
    pub async fn add_all_by_id(&self, items: Vec<(Source, MediaType, String)>) {
        let mut seen = Vec::new();
        for (source, _, _) in &items {
            if !seen.contains(source) {
                seen.push(*source);
            }
        }
        for source in seen {
            if let Err(e) = self.get_or_login_client(source).await {
                warn!(%source, error = %e, "login failed, ids for this source will be skipped");
            }
        }

        let futures = items.into_iter().map(|(source, media_type, id)| async move {
            if let Err(e) = self.add_by_id(source, media_type, id.clone()).await {
                warn!(%source, %id, error = %e, "could not enqueue reference, skipping");
            }
        });
        futures::future::join_all(futures).await;
    }

    /// Fans `Pending::resolve` out over the whole pending list
    /// concurrently, keeps the `Some` results, and clears the pending
    /// list (spec.md §4.6).
    pub async fn resolve(&self) {
        let drained = {
            let mut guard = self.pending.lock().await;
            std::mem::take(&mut *guard)
        };
        let resolved = futures::future::join_all(drained.into_iter().map(|p| p.resolve())).await;
        self.media.lock().await.extend(resolved.into_iter().flatten());
    }

    /// Dedicated Last.fm playlist path: scrapes the tracklist and
    /// resolves each entry against the configured primary/fallback
    /// source pair (spec.md §4.6's `resolve_lastfm`).
    pub async fn resolve_lastfm(&self, url: &str) -> Result<()> {
        let primary_source = self
            .config
            .lastfm
            .source
            .ok_or_else(|| AppError::InvalidSource("lastfm.source is not configured".to_string()))?;
        let primary_client = self.get_or_login_client(primary_source).await?;

        let (fallback_source, fallback_client) = match self.config.lastfm.fallback_source {
            Some(source) => (Some(source), Some(self.get_or_login_client(source).await?)),
            None => (None, None),
        };

        let pending = PendingLastfmPlaylist {
            url: url.to_string(),
            scraper: Arc::new(LastfmScraper::new(reqwest::Client::new())),
            primary_source,
            primary_client,
            fallback_source,
            fallback_client,
            config: self.config.clone(),
            ledger: self.ledger.clone(),
        };

        if let Some(media) = Pending::LastfmPlaylist(pending).resolve().await {
            self.media.lock().await.push(media);
        }
        Ok(())
    }

    /// Renders an interactive multi-select menu and enqueues the chosen
    /// ids (spec.md §4.7).
    pub async fn search_interactive(&self, source: Source, media_type: MediaType, query: &str, limit: u32) -> Result<()> {
        let client = self.get_or_login_client(source).await?;
        let ids = self.searcher.interactive(client.as_ref(), media_type, query, limit).await?;
        let items = ids.into_iter().map(|id| (source, media_type, id)).collect();
        self.add_all_by_id(items).await;
        Ok(())
    }

    /// `limit=1`; enqueues the first hit if any (spec.md §8 property 8).
    pub async fn search_take_first(&self, source: Source, media_type: MediaType, query: &str) -> Result<()> {
        let client = self.get_or_login_client(source).await?;
        if let Some(id) = self.searcher.take_first(client.as_ref(), media_type, query).await? {
            self.add_by_id(source, media_type, id).await?;
        }
        Ok(())
    }

    /// Dumps search results as JSON to `path`; returns the hit count.
    pub async fn search_output_file(&self, source: Source, media_type: MediaType, query: &str, path: &Path, limit: u32) -> Result<usize> {
        let client = self.get_or_login_client(source).await?;
        self.searcher.output_file(client.as_ref(), source, media_type, query, path, limit).await
    }

    /// Fans `Media::rip` out over the accumulated media list, clearing
    /// it in the process.
    pub async fn rip(&self) -> DownloadSummary {
        let drained = {
            let mut guard = self.media.lock().await;
            std::mem::take(&mut *guard)
        };
        self.downloader.rip(drained).await
    }

    /// Releases the artwork registry and clears the progress manager.
    /// Client HTTP sessions close on drop; there is nothing else to
    /// flush explicitly. Must run on both normal and aborted exits
    /// (spec.md §5: "Cancellation").
    pub async fn teardown(&self) {
        self.artwork_registry.clear();
        self.ctx.progress.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Arc<Config> {
        Arc::new(config::parse_toml_config("").unwrap())
    }

    #[tokio::test]
    async fn add_rejects_unparsable_urls() {
        let orch = Orchestrator::new(test_config()).unwrap();
        let result = orch.add("https://example.com/not-a-music-url").await;
        assert!(matches!(result, Err(AppError::UrlParsing(_))));
    }

    #[tokio::test]
    async fn add_by_id_rejects_lastfm_as_a_client_source() {
        let orch = Orchestrator::new(test_config()).unwrap();
        let result = orch.add_by_id(Source::Lastfm, MediaType::Playlist, "1".to_string()).await;
        assert!(matches!(result, Err(AppError::InvalidSource(_))));
    }

    #[tokio::test]
    async fn resolve_lastfm_without_configured_source_errors() {
        let orch = Orchestrator::new(test_config()).unwrap();
        let result = orch.resolve_lastfm("https://www.last.fm/user/x/playlists/1").await;
        assert!(matches!(result, Err(AppError::InvalidSource(_))));
    }

    #[tokio::test]
    async fn teardown_is_idempotent_and_infallible() {
        let orch = Orchestrator::new(test_config()).unwrap();
        orch.teardown().await;
        orch.teardown().await;
    }
}

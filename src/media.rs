//! `Media` — a resolved, downloadable item with a fixed three-phase
//! lifecycle (spec.md §4.4): `preprocess -> download -> postprocess`,
//! driven by `rip()`. Like `Pending`, modeled as a tagged enum rather
//! than `Box<dyn Trait>` (spec.md §9) since the variant set is closed.
//!
//! Every fan-out point (`Album`/`Playlist`/`Artist`/`Label`) absorbs a
//! child's error with a `tracing::warn!` and keeps going — one bad
//! track must never cancel its siblings (spec.md §7, §8 property 3).

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use tracing::warn;

use crate::client::Downloadable;
use crate::config::Config;
use crate::convert;
use crate::error::{AppError, Result, TransportError};
use crate::ledger::Ledger;
use crate::metadata::{AlbumMetadata, TrackMetadata};
use crate::path;
use crate::pending::{PendingAlbum, PendingPlaylistTrack, PendingTrack};
use crate::progress::ProgressManager;
use crate::semaphore::DownloadSemaphore;
use crate::source::{MediaType, Source};
use crate::tag::Tagger;

/// Batch size for playlist entry resolution/download, a literal `20`
/// carried forward from the original's `track_resolve_chunk_size`
/// (bounds peak metadata-request concurrency independently of the
/// global download semaphore, spec.md §5 item 3).
pub const PLAYLIST_BATCH_SIZE: usize = 20;

/// Shared run-scoped collaborators every `Media::rip` call needs.
/// Bundled into one struct so `rip(self, ctx)` doesn't grow a new
/// parameter each time a lifecycle phase needs another service.
pub struct RipContext {
    pub config: Arc<Config>,
    pub ledger: Arc<Ledger>,
    pub progress: Arc<ProgressManager>,
    pub semaphore: Arc<DownloadSemaphore>,
    pub tagger: Arc<dyn Tagger>,
}

fn io_err(path: &std::path::Path, source: std::io::Error) -> AppError {
    AppError::Transport(TransportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// One track on its way to a tagged file on disk (spec.md §3's `Track`
/// row). `album` is `None` for standalone singles.
pub struct Track {
    source: Source,
    metadata: TrackMetadata,
    album: Option<Arc<AlbumMetadata>>,
    downloadable: Box<dyn Downloadable>,
    folder: PathBuf,
    cover_path: Option<PathBuf>,
    is_single: bool,
    download_path: Option<PathBuf>,
}

impl Track {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Source,
        metadata: TrackMetadata,
        album: Option<Arc<AlbumMetadata>>,
        downloadable: Box<dyn Downloadable>,
        folder: PathBuf,
        cover_path: Option<PathBuf>,
        is_single: bool,
    ) -> Self {
        Self {
            source,
            metadata,
            album,
            downloadable,
            folder,
            cover_path,
            is_single,
            download_path: None,
        }
    }

    /// Computes `download_path` from the configured template, creates
    /// its parent directory, and registers the progress title for
    /// standalone singles (spec.md §4.4's `Track.preprocess`).
    async fn preprocess(&mut self, ctx: &RipContext) -> Result<()> {
        let ext = self.downloadable.extension();
        let path = match &self.album {
            Some(album) => path::track_path(&self.folder, album, &self.metadata, &ctx.config.filepaths, ext),
            None => path::single_track_path(&self.folder, &self.metadata, &ctx.config.filepaths, ext),
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| io_err(parent, e))?;
        }
        if self.is_single {
            ctx.progress.add_title(&self.metadata.title);
        }
        self.download_path = Some(path);
        Ok(())
    }

    /// Acquires the global download semaphore and drives
    /// `Downloadable::download`, retrying exactly once on failure
    /// (spec.md §4.5). Returns `Ok(true)` on success, `Ok(false)` on
    /// persistent failure (already recorded in the failed ledger) —
    /// never surfaces the download error itself, since a retry-exhausted
    /// track is an absorbed outcome, not a propagating one.
    async fn download(&mut self, ctx: &RipContext) -> Result<bool> {
        let dest = self
            .download_path
            .clone()
            .expect("preprocess sets download_path before download runs");

        let _permit = ctx.semaphore.acquire().await;
        let size = self.downloadable.size().await.unwrap_or(0);
        let bar = ctx.progress.file_bar(size, &self.metadata.title);

        let mut result = self.downloadable.download(&dest, bar.as_ref()).await;
        if let Err(e) = &result {
            warn!(source = %self.source, id = %self.metadata.id, error = %e, "download failed, retrying once");
            result = self.downloadable.download(&dest, bar.as_ref()).await;
        }
        if let Some(bar) = &bar {
            bar.finish_and_clear();
        }

        match result {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(source = %self.source, id = %self.metadata.id, error = %e, "download failed twice, marking failed");
                ctx.ledger.set_failed(self.source, MediaType::Track, &self.metadata.id);
                Ok(false)
            }
        }
    }

    /// Deregisters the progress title, writes tags, optionally converts,
    /// then records the completion — in that order (spec.md §4.4, §8
    /// property 4: tagging after download and before the ledger write,
    /// conversion after tagging).
    async fn postprocess(&mut self, ctx: &RipContext) -> Result<()> {
        if self.is_single {
            ctx.progress.remove_title(&self.metadata.title);
        }

        let path = self
            .download_path
            .clone()
            .expect("preprocess sets download_path before postprocess runs");

        ctx.tagger.tag_file(&path, &self.metadata, self.album.as_deref(), self.cover_path.as_deref())?;

        if ctx.config.conversion.enabled {
            let converter = convert::get(&ctx.config.conversion.codec)?;
            let converted = converter
                .convert(&path, ctx.config.conversion.sampling_rate, ctx.config.conversion.bit_depth)
                .await?;
            if converted != path {
                tokio::fs::remove_file(&path).await.map_err(|e| io_err(&path, e))?;
                self.download_path = Some(converted);
            }
        }

        ctx.ledger.set_completed(self.source, MediaType::Track, &self.metadata.id);
        Ok(())
    }

    /// Runs the fixed `preprocess -> download -> postprocess` sequence.
    /// `postprocess` is skipped entirely on persistent download failure
    /// (Open Question (b) in DESIGN.md: a failed download never reaches
    /// tagging).
    pub async fn rip(mut self, ctx: &RipContext) -> Result<()> {
        self.preprocess(ctx).await?;
        let downloaded = self.download(ctx).await?;
        if downloaded {
            self.postprocess(ctx).await?;
        }
        Ok(())
    }
}

async fn rip_pending_track(pending: PendingTrack, ctx: &RipContext, parent_title: &str) {
    match pending.resolve().await {
        Some(Media::Track(track)) => {
            if let Err(e) = track.rip(ctx).await {
                warn!(album = %parent_title, error = %e, "track failed, continuing with siblings");
            }
        }
        Some(_) => unreachable!("PendingTrack::resolve only ever yields Media::Track"),
        None => {}
    }
}

async fn rip_pending_playlist_track(pending: PendingPlaylistTrack, ctx: &RipContext, parent_title: &str) {
    match pending.resolve().await {
        Some(Media::Track(track)) => {
            if let Err(e) = track.rip(ctx).await {
                warn!(playlist = %parent_title, error = %e, "track failed, continuing with siblings");
            }
        }
        Some(_) => unreachable!("PendingPlaylistTrack::resolve only ever yields Media::Track"),
        None => {}
    }
}

async fn rip_pending_album(pending: PendingAlbum, ctx: &RipContext, parent_title: &str) {
    match pending.resolve().await {
        Some(Media::Album(album)) => {
            if let Err(e) = album.rip(ctx).await {
                warn!(parent = %parent_title, error = %e, "album failed, continuing with siblings");
            }
        }
        Some(_) => unreachable!("PendingAlbum::resolve only ever yields Media::Album"),
        None => {}
    }
}

/// An album and its unresolved track children (spec.md §3's `Album`
/// row). Children are `PendingTrack`, resolved lazily at download time
/// rather than up front, so a sibling's ledger short-circuit or
/// metadata failure never touches the others.
pub struct Album {
    metadata: AlbumMetadata,
    tracks: Vec<PendingTrack>,
    #[allow(dead_code)]
    folder: PathBuf,
}

impl Album {
    pub fn new(_source: Source, metadata: AlbumMetadata, tracks: Vec<PendingTrack>, folder: PathBuf) -> Self {
        Self { metadata, tracks, folder }
    }

    pub async fn rip(self, ctx: &RipContext) -> Result<()> {
        let title = self.metadata.title.clone();
        ctx.progress.add_title(&title);
        let futures = self.tracks.into_iter().map(|pt| rip_pending_track(pt, ctx, &title));
        join_all(futures).await;
        ctx.progress.remove_title(&title);
        Ok(())
    }
}

/// A playlist and its unresolved entries, which may span sources
/// (Last.fm fallback, spec.md §3's `Playlist` row). Resolved/downloaded
/// in fixed-size batches (`PLAYLIST_BATCH_SIZE`) rather than all at
/// once.
pub struct Playlist {
    title: String,
    tracks: Vec<PendingPlaylistTrack>,
}

impl Playlist {
    pub fn new(title: String, tracks: Vec<PendingPlaylistTrack>) -> Self {
        Self { title, tracks }
    }

    pub async fn rip(self, ctx: &RipContext) -> Result<()> {
        ctx.progress.add_title(&self.title);
        let mut remaining = self.tracks;
        while !remaining.is_empty() {
            let take = remaining.len().min(PLAYLIST_BATCH_SIZE);
            let batch: Vec<_> = remaining.drain(..take).collect();
            let futures = batch.into_iter().map(|pt| rip_pending_playlist_track(pt, ctx, &self.title));
            join_all(futures).await;
        }
        ctx.progress.remove_title(&self.title);
        Ok(())
    }
}

/// An artist and its unresolved album children (spec.md §4.3/§4.4).
pub struct Artist {
    name: String,
    albums: Vec<PendingAlbum>,
}

impl Artist {
    pub fn new(name: String, albums: Vec<PendingAlbum>) -> Self {
        Self { name, albums }
    }

    pub async fn rip(self, ctx: &RipContext) -> Result<()> {
        ctx.progress.add_title(&self.name);
        let futures = self.albums.into_iter().map(|pa| rip_pending_album(pa, ctx, &self.name));
        join_all(futures).await;
        ctx.progress.remove_title(&self.name);
        Ok(())
    }
}

/// A label and its unresolved album children — structurally identical
/// to `Artist`, kept as a separate type because spec.md §3 lists them
/// as distinct entities with independent metadata sources.
pub struct Label {
    name: String,
    albums: Vec<PendingAlbum>,
}

impl Label {
    pub fn new(name: String, albums: Vec<PendingAlbum>) -> Self {
        Self { name, albums }
    }

    pub async fn rip(self, ctx: &RipContext) -> Result<()> {
        ctx.progress.add_title(&self.name);
        let futures = self.albums.into_iter().map(|pa| rip_pending_album(pa, ctx, &self.name));
        join_all(futures).await;
        ctx.progress.remove_title(&self.name);
        Ok(())
    }
}

/// The closed set of resolved, downloadable items (spec.md §2 item 7).
pub enum Media {
    Track(Track),
    Album(Album),
    Playlist(Playlist),
    Artist(Artist),
    Label(Label),
}

impl Media {
    pub async fn rip(self, ctx: &RipContext) -> Result<()> {
        match self {
            Media::Track(t) => t.rip(ctx).await,
            Media::Album(a) => a.rip(ctx).await,
            Media::Playlist(p) => p.rip(ctx).await,
            Media::Artist(a) => a.rip(ctx).await,
            Media::Label(l) => l.rip(ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use indicatif::ProgressBar;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FlakyDownloadable {
        attempts: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl Downloadable for FlakyDownloadable {
        fn extension(&self) -> &'static str {
            ".flac"
        }

        async fn size(&self) -> Result<u64> {
            Ok(4)
        }

        async fn download(&self, dest: &Path, _bar: Option<&ProgressBar>) -> Result<()> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                return Err(io_err(dest, std::io::Error::other("simulated failure")));
            }
            tokio::fs::write(dest, b"data").await.map_err(|e| io_err(dest, e))
        }
    }

    struct NullTagger;
    impl Tagger for NullTagger {
        fn tag_file(&self, _path: &Path, _track: &TrackMetadata, _album: Option<&AlbumMetadata>, _cover_path: Option<&Path>) -> Result<()> {
            Ok(())
        }
    }

    struct RecordingTagger {
        calls: Mutex<u32>,
    }
    impl Tagger for RecordingTagger {
        fn tag_file(&self, _path: &Path, _track: &TrackMetadata, _album: Option<&AlbumMetadata>, _cover_path: Option<&Path>) -> Result<()> {
            *self.calls.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn track_metadata(id: &str) -> TrackMetadata {
        TrackMetadata {
            id: id.to_string(),
            title: "Title".to_string(),
            artist: "Artist".to_string(),
            track_number: 1,
            track_total: 1,
            disc_number: 1,
            disc_total: 1,
            duration_seconds: 120,
            isrc: None,
            is_compilation: false,
        }
    }

    fn ctx(tagger: Arc<dyn Tagger>) -> RipContext {
        RipContext {
            config: Arc::new(crate::config::parse_toml_config("").unwrap()),
            ledger: Arc::new(Ledger::new(Box::new(crate::ledger::NullStore), Box::new(crate::ledger::NullStore))),
            progress: Arc::new(ProgressManager::new(false)),
            semaphore: DownloadSemaphore::new(4, std::time::Duration::ZERO),
            tagger,
        }
    }

    #[tokio::test]
    async fn retry_succeeds_on_second_attempt_and_completes() {
        let dir = tempfile::tempdir().unwrap();
        let downloadable: Box<dyn Downloadable> = Box::new(FlakyDownloadable {
            attempts: AtomicUsize::new(0),
            fail_first: true,
        });
        let track = Track::new(
            Source::Deezer,
            track_metadata("555"),
            None,
            downloadable,
            dir.path().to_path_buf(),
            None,
            true,
        );
        let ctx = ctx(Arc::new(NullTagger));
        let result = track.rip(&ctx).await;
        assert!(result.is_ok());
        assert!(ctx.ledger.is_completed(Source::Deezer, MediaType::Track, "555"));
        assert!(!ctx.ledger.is_failed(Source::Deezer, MediaType::Track, "555"));
    }

    #[tokio::test]
    async fn persistent_failure_skips_postprocess_and_marks_failed() {
        struct AlwaysFails;
        #[async_trait]
        impl Downloadable for AlwaysFails {
            fn extension(&self) -> &'static str {
                ".flac"
            }
            async fn size(&self) -> Result<u64> {
                Ok(0)
            }
            async fn download(&self, dest: &Path, _bar: Option<&ProgressBar>) -> Result<()> {
                Err(io_err(dest, std::io::Error::other("down")))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let tagger = Arc::new(RecordingTagger { calls: Mutex::new(0) });
        let track = Track::new(
            Source::Qobuz,
            track_metadata("1"),
            None,
            Box::new(AlwaysFails),
            dir.path().to_path_buf(),
            None,
            true,
        );
        let ctx = ctx(tagger.clone());
        track.rip(&ctx).await.unwrap();

        assert_eq!(*tagger.calls.lock().unwrap(), 0);
        assert!(ctx.ledger.is_failed(Source::Qobuz, MediaType::Track, "1"));
        assert!(!ctx.ledger.is_completed(Source::Qobuz, MediaType::Track, "1"));
    }
}

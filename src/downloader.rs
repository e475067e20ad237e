//! Fans `Media::rip` out over the whole media list and logs one
//! aggregate summary — never per-item errors, which already surface as
//! `tracing::warn!` inside `media.rs`'s own fan-out points (spec.md
//! §4.6: "rip() (Downloader) — fans out Media.rip() over media; counts
//! failures; logs a summary if any").

use std::sync::Arc;

use futures::future::join_all;
use tracing::info;

use crate::media::{Media, RipContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSummary {
    pub succeeded: usize,
    pub failed: usize,
}

pub struct Downloader {
    ctx: Arc<RipContext>,
}

impl Downloader {
    pub fn new(ctx: Arc<RipContext>) -> Self {
        Self { ctx }
    }

    pub async fn rip(&self, media: Vec<Media>) -> DownloadSummary {
        let futures = media.into_iter().map(|item| {
            let ctx = self.ctx.clone();
            async move { item.rip(&ctx).await }
        });
        let results = join_all(futures).await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        let succeeded = results.len() - failed;

        if failed > 0 {
            info!(succeeded, failed, "run finished with failures");
        } else {
            info!(succeeded, "run finished");
        }

        DownloadSummary { succeeded, failed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_toml_config;
    use crate::ledger::{Ledger, NullStore};
    use crate::media::Playlist;
    use crate::progress::ProgressManager;
    use crate::semaphore::DownloadSemaphore;
    use crate::tag::Tagger;
    use std::path::Path;
    use std::time::Duration;

    struct NullTagger;
    impl Tagger for NullTagger {
        fn tag_file(
            &self,
            _path: &Path,
            _track: &crate::metadata::TrackMetadata,
            _album: Option<&crate::metadata::AlbumMetadata>,
            _cover_path: Option<&Path>,
        ) -> crate::error::Result<()> {
            Ok(())
        }
    }

    fn ctx() -> Arc<RipContext> {
        Arc::new(RipContext {
            config: Arc::new(parse_toml_config("").unwrap()),
            ledger: Arc::new(Ledger::new(Box::new(NullStore), Box::new(NullStore))),
            progress: Arc::new(ProgressManager::new(false)),
            semaphore: DownloadSemaphore::new(4, Duration::ZERO),
            tagger: Arc::new(NullTagger),
        })
    }

    #[tokio::test]
    async fn empty_media_list_summarizes_to_zero() {
        let downloader = Downloader::new(ctx());
        let summary = downloader.rip(Vec::new()).await;
        assert_eq!(summary, DownloadSummary { succeeded: 0, failed: 0 });
    }

    #[tokio::test]
    async fn empty_playlist_counts_as_one_success() {
        let downloader = Downloader::new(ctx());
        let media = vec![Media::Playlist(Playlist::new("Empty Playlist".to_string(), Vec::new()))];
        let summary = downloader.rip(media).await;
        assert_eq!(summary, DownloadSummary { succeeded: 1, failed: 0 });
    }
}

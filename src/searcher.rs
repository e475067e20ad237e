//! Three search modes sharing one `Client::search` + `SearchResults`
//! core (spec.md §4.7). Interactive menu rendering is the one piece the
//! original branches on OS; since this target has no GUI-vs-terminal
//! split to preserve, it collapses to a single `InteractiveMenu`
//! implementation behind a trait (spec.md §9's "platform branch in
//! search" note) — menu rendering itself stays out of scope per
//! spec.md §1 ("CLI/terminal rendering... out of scope"), so
//! `TerminalMenu` is the thinnest stdin/stderr loop that satisfies the
//! contract, grounded in `config.rs`'s own `prompt_line` pattern.

use std::io::{self, Write};
use std::path::Path;

use tracing::{info, warn};

use crate::client::Client;
use crate::error::{AppError, Result, TransportError};
use crate::metadata::{validate_featured_selector, SearchHit, SearchResults};
use crate::source::{MediaType, Source};

/// Presents hits for multi-selection and returns the chosen ids.
pub trait InteractiveMenu: Send + Sync {
    fn select(&self, hits: &[SearchHit]) -> Vec<String>;
}

/// Numbered stdin/stderr picker: lists hits on stderr, reads one line
/// of comma-separated indices from stdin. Out-of-range or unparsable
/// tokens are silently dropped rather than erroring — a typo in one
/// token shouldn't void the whole selection.
pub struct TerminalMenu;

impl InteractiveMenu for TerminalMenu {
    fn select(&self, hits: &[SearchHit]) -> Vec<String> {
        if hits.is_empty() {
            return Vec::new();
        }
        for (i, hit) in hits.iter().enumerate() {
            eprintln!("  [{}] {} - {}", i + 1, hit.artist, hit.title);
        }
        eprint!("Select (comma-separated numbers): ");
        let _ = io::stderr().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            return Vec::new();
        }
        input
            .trim()
            .split(',')
            .filter_map(|tok| tok.trim().parse::<usize>().ok())
            .filter(|n| *n >= 1 && *n <= hits.len())
            .map(|n| hits[n - 1].id.clone())
            .collect()
    }
}

/// Search facade the Orchestrator drives; holds only the menu
/// implementation, since the `Client` and destination (pending list /
/// output file) are supplied per call (spec.md §4.6: "Orchestrator owns
/// ... Searcher").
pub struct Searcher {
    menu: Box<dyn InteractiveMenu>,
}

impl Searcher {
    pub fn new(menu: Box<dyn InteractiveMenu>) -> Self {
        Self { menu }
    }

    fn check_featured(media_type: MediaType, query: &str) -> Result<()> {
        if media_type == MediaType::Featured {
            validate_featured_selector(query)?;
        }
        Ok(())
    }

    /// Renders a multi-select menu over the search hits and returns the
    /// ids chosen; the caller (`Orchestrator::search_interactive`)
    /// enqueues them via `add_all_by_id`.
    pub async fn interactive(&self, client: &dyn Client, media_type: MediaType, query: &str, limit: u32) -> Result<Vec<String>> {
        Self::check_featured(media_type, query)?;
        let raw = client.search(media_type, query, limit).await?;
        let results = SearchResults::from_pages(raw);
        Ok(self.menu.select(&results.hits))
    }

    /// `limit=1`; returns the first hit's id if any (spec.md §8 property 8).
    pub async fn take_first(&self, client: &dyn Client, media_type: MediaType, query: &str) -> Result<Option<String>> {
        Self::check_featured(media_type, query)?;
        let raw = client.search(media_type, query, 1).await?;
        let results = SearchResults::from_pages(raw);
        match results.first() {
            Some(hit) => Ok(Some(hit.id.clone())),
            None => {
                warn!(%query, "search returned no results");
                Ok(None)
            }
        }
    }

    /// Dumps `SearchResults::as_list(source)` as JSON to `path`; returns
    /// the number of hits written.
    pub async fn output_file(
        &self,
        client: &dyn Client,
        source: Source,
        media_type: MediaType,
        query: &str,
        path: &Path,
        limit: u32,
    ) -> Result<usize> {
        Self::check_featured(media_type, query)?;
        let raw = client.search(media_type, query, limit).await?;
        let results = SearchResults::from_pages(raw);
        let list = results.as_list(source);

        let json = serde_json::to_string_pretty(&list).map_err(|e| AppError::Transport(TransportError::Json(e)))?;
        tokio::fs::write(path, json).await.map_err(|e| {
            AppError::Transport(TransportError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        })?;
        info!(count = list.len(), path = %path.display(), "wrote search results");
        Ok(list.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedMenu(Vec<String>);
    impl InteractiveMenu for FixedMenu {
        fn select(&self, _hits: &[SearchHit]) -> Vec<String> {
            self.0.clone()
        }
    }

    #[test]
    fn terminal_menu_on_empty_hits_returns_no_selection() {
        let menu = TerminalMenu;
        assert!(menu.select(&[]).is_empty());
    }

    #[test]
    fn fixed_menu_passes_through_for_tests() {
        let menu = FixedMenu(vec!["42".to_string()]);
        let hits = vec![SearchHit {
            id: "1".to_string(),
            title: "T".to_string(),
            artist: "A".to_string(),
        }];
        assert_eq!(menu.select(&hits), vec!["42".to_string()]);
    }
}

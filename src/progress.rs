//! Owned replacement for the original's module-global `progress.add_title
//! / remove_title / clear_progress` (spec.md §9: "Global progress state").
//! The Orchestrator owns one `ProgressManager` and hands out `&ProgressManager`
//! to Media during `preprocess`/`postprocess`.

use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

pub struct ProgressManager {
    enabled: bool,
    multi: MultiProgress,
    titles: Mutex<Vec<String>>,
}

impl ProgressManager {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            multi: MultiProgress::new(),
            titles: Mutex::new(Vec::new()),
        }
    }

    /// Register a title (album/playlist/single name) as in-progress.
    pub fn add_title(&self, title: &str) {
        if !self.enabled {
            return;
        }
        self.titles.lock().unwrap().push(title.to_string());
    }

    /// Deregister a title once its `postprocess` has run.
    pub fn remove_title(&self, title: &str) {
        if !self.enabled {
            return;
        }
        let mut titles = self.titles.lock().unwrap();
        if let Some(pos) = titles.iter().position(|t| t == title) {
            titles.remove(pos);
        }
    }

    /// Currently in-flight titles, for tests and status reporting.
    pub fn active_titles(&self) -> Vec<String> {
        self.titles.lock().unwrap().clone()
    }

    /// A per-file progress bar sized to `total_bytes`, used by
    /// `Track::download`. Returns `None` when progress bars are disabled
    /// so callers can skip the `inc`/`set_position` calls entirely.
    pub fn file_bar(&self, total_bytes: u64, label: &str) -> Option<ProgressBar> {
        if !self.enabled {
            return None;
        }
        let bar = self.multi.add(ProgressBar::new(total_bytes));
        bar.set_style(
            ProgressStyle::default_bar()
                .template("  {bytes}/{total_bytes} {bar:30} {msg}")
                .expect("valid template"),
        );
        bar.set_message(label.to_string());
        Some(bar)
    }

    /// Clear all bars and forget all titles. Called once from orchestrator
    /// teardown (`Main.__aexit__`'s `clear_progress()` in the original).
    pub fn clear(&self) {
        self.multi.clear().ok();
        self.titles.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_remove_title_pairs() {
        let pm = ProgressManager::new(true);
        pm.add_title("Album A");
        pm.add_title("Album B");
        assert_eq!(pm.active_titles(), vec!["Album A", "Album B"]);
        pm.remove_title("Album A");
        assert_eq!(pm.active_titles(), vec!["Album B"]);
    }

    #[test]
    fn disabled_manager_tracks_nothing() {
        let pm = ProgressManager::new(false);
        pm.add_title("Album A");
        assert!(pm.active_titles().is_empty());
        assert!(pm.file_bar(100, "x").is_none());
    }
}

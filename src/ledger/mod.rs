//! Persistent set of completed and failed item ids, keyed by
//! `(source, media_type, id)` (spec.md §3, §6 "Persisted state").
//!
//! The contract is the only thing that matters here: two independent
//! membership sets, each backed by either a real store or a no-op sink.
//! The actual schema is private to `sqlite.rs` — callers only ever see
//! `contains`/`mark_*`.

mod dummy;
mod sqlite;

pub use dummy::NullStore;
pub use sqlite::SqliteStore;

use crate::source::{MediaType, Source};

/// A single membership store (completed-only, or failed-only).
pub trait LedgerStore: Send + Sync {
    fn contains(&self, source: Source, media_type: MediaType, id: &str) -> bool;
    fn mark(&self, source: Source, media_type: MediaType, id: &str);
}

/// The two independent sets a run consults: completed ids (for
/// idempotent reruns, spec.md §4.5) and failed ids (for post-run
/// reporting). Each may be backed by a real store or `NullStore`
/// depending on `database.*_enabled`.
pub struct Ledger {
    completed: Box<dyn LedgerStore>,
    failed: Box<dyn LedgerStore>,
}

impl Ledger {
    pub fn new(completed: Box<dyn LedgerStore>, failed: Box<dyn LedgerStore>) -> Self {
        Self { completed, failed }
    }

    pub fn is_completed(&self, source: Source, media_type: MediaType, id: &str) -> bool {
        self.completed.contains(source, media_type, id)
    }

    pub fn set_completed(&self, source: Source, media_type: MediaType, id: &str) {
        self.completed.mark(source, media_type, id);
    }

    pub fn is_failed(&self, source: Source, media_type: MediaType, id: &str) -> bool {
        self.failed.contains(source, media_type, id)
    }

    pub fn set_failed(&self, source: Source, media_type: MediaType, id: &str) {
        self.failed.mark(source, media_type, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn completed_membership_is_monotonic() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("completed.db")).unwrap();
        let ledger = Ledger::new(Box::new(store), Box::new(NullStore));

        assert!(!ledger.is_completed(Source::Qobuz, MediaType::Track, "42"));
        ledger.set_completed(Source::Qobuz, MediaType::Track, "42");
        assert!(ledger.is_completed(Source::Qobuz, MediaType::Track, "42"));
    }

    #[test]
    fn sources_and_media_types_do_not_collide() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("completed.db")).unwrap();
        let ledger = Ledger::new(Box::new(store), Box::new(NullStore));

        ledger.set_completed(Source::Qobuz, MediaType::Track, "42");
        assert!(!ledger.is_completed(Source::Tidal, MediaType::Track, "42"));
        assert!(!ledger.is_completed(Source::Qobuz, MediaType::Album, "42"));
    }

    #[test]
    fn null_store_never_reports_membership() {
        let ledger = Ledger::new(Box::new(NullStore), Box::new(NullStore));
        ledger.set_completed(Source::Deezer, MediaType::Track, "1");
        assert!(!ledger.is_completed(Source::Deezer, MediaType::Track, "1"));
    }

    #[test]
    fn failed_and_completed_sets_are_independent() {
        let dir = tempdir().unwrap();
        let completed = SqliteStore::open(&dir.path().join("completed.db")).unwrap();
        let failed = SqliteStore::open(&dir.path().join("failed.db")).unwrap();
        let ledger = Ledger::new(Box::new(completed), Box::new(failed));

        ledger.set_failed(Source::Soundcloud, MediaType::Track, "7");
        assert!(ledger.is_failed(Source::Soundcloud, MediaType::Track, "7"));
        assert!(!ledger.is_completed(Source::Soundcloud, MediaType::Track, "7"));
    }
}

use super::LedgerStore;
use crate::source::{MediaType, Source};

/// No-op sink used when `database.*_enabled` is false.
pub struct NullStore;

impl LedgerStore for NullStore {
    fn contains(&self, _source: Source, _media_type: MediaType, _id: &str) -> bool {
        false
    }

    fn mark(&self, _source: Source, _media_type: MediaType, _id: &str) {}
}

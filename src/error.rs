use std::path::PathBuf;

use thiserror::Error;

use crate::source::{MediaType, Source};

/// The semantic error kinds a component of the pipeline can raise.
///
/// Every fan-out boundary (album -> tracks, playlist -> batches,
/// orchestrator -> media) absorbs these rather than propagating them;
/// only `main.rs` and the few "programmer error" variants are allowed
/// to surface one to the user directly.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("no credentials configured for {0}")]
    MissingCredentials(Source),

    #[error("authentication failed for {0}: {1}")]
    AuthenticationFailed(Source, String),

    #[error("{0} account lacks the required tier for this operation")]
    IneligibleAccount(Source),

    #[error("could not parse url: {0}")]
    UrlParsing(String),

    #[error("no client registered for source {0:?}")]
    InvalidSource(String),

    #[error("{0} {1:?} {2} is not streamable: {3}")]
    NonStreamable(Source, MediaType, String, String),

    #[error("network or I/O error: {0}")]
    Transport(#[from] TransportError),

    #[error("unknown media type: {0}")]
    UnknownMediaType(String),

    #[error("unknown conversion codec: {0}")]
    UnknownCodec(String),
}

/// Transport-layer failures, kept distinct from `AppError` so that
/// `?` works uniformly from `reqwest`/`std::io` call sites.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json decode error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Transport(TransportError::Http(e))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

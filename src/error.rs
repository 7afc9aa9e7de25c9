// src/error.rs
//! Failure kinds for every fallible step of the intake pipeline.
//!
//! The webhook handler never surfaces these to the caller; they decide which
//! reply (if any) the user gets and what ends up in the logs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntakeError {
    /// The media id could not be resolved to a download URL.
    #[error("media lookup failed: {0}")]
    MediaLookup(String),

    /// The resolved media URL could not be downloaded.
    #[error("media download failed: {0}")]
    MediaDownload(String),

    /// Outbound text message was not accepted by the messaging API.
    #[error("reply delivery failed: {0}")]
    Reply(String),

    /// The datastore answered with an error status.
    #[error("store rejected {op}: {detail}")]
    Store { op: &'static str, detail: String },

    /// The datastore accepted the request but returned no usable record.
    #[error("store returned no record for {0}")]
    EmptyResult(&'static str),

    #[error("categorization failed: {0}")]
    Categorize(String),

    #[error("invalid webhook payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("http transport: {0}")]
    Http(#[from] reqwest::Error),

    #[error("archive write failed: {0}")]
    Archive(#[from] std::io::Error),
}

impl IntakeError {
    pub fn store(op: &'static str, detail: impl Into<String>) -> Self {
        Self::Store {
            op,
            detail: detail.into(),
        }
    }
}

pub type IntakeResult<T> = Result<T, IntakeError>;

//! Outbound delivery capability.

pub mod telegram;

pub use telegram::TelegramChannel;

use std::fmt;
use std::future::Future;
use std::path::Path;
use thiserror::Error;

/// Error type for delivery operations
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Request could not be sent or timed out
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered but refused the message
    #[error("rejected: {0}")]
    Rejected(String),

    /// The payload file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Kind of payload being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Photo,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Photo => write!(f, "photo"),
        }
    }
}

/// Accepts a file and a caption and reports whether it went through.
///
/// Implementations must bound each call in time; callers log and swallow
/// failures.
pub trait DeliveryChannel {
    fn deliver(
        &self,
        kind: MediaKind,
        path: &Path,
        caption: &str,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

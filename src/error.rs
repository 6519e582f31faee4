//! Failure taxonomy for per-article conversion.
//!
//! The scheduler only ever sees two per-article outcomes besides success:
//! an article with no content (`Empty`, reported distinctly, not a failure)
//! and everything else (`Failed`). Lower-level causes such as a malformed
//! redirect or a parser error are logged with the title and wrapped into
//! `Failed` before they cross the pipeline boundary.

use thiserror::Error;

/// Per-article conversion outcome errors, always carrying the title.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConvertError {
    #[error("article has no content: {title}")]
    Empty { title: String },
    #[error("failed to convert article: {title}")]
    Failed { title: String },
}

impl ConvertError {
    pub fn empty(title: impl Into<String>) -> Self {
        ConvertError::Empty {
            title: title.into(),
        }
    }

    pub fn failed(title: impl Into<String>) -> Self {
        ConvertError::Failed {
            title: title.into(),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            ConvertError::Empty { title } | ConvertError::Failed { title } => title,
        }
    }
}

/// A redirect directive was present but the link brackets were malformed.
/// Carries the remainder text after the matched alias.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("bad redirect: {0}")]
pub struct BadRedirect(pub String);

/// User-requested cancellation; terminates the batch immediately.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("batch processing interrupted")]
pub struct Interrupted;

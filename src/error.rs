//! Error taxonomy.
//!
//! Two kinds of failure exist and they happen at different times:
//!
//! - [`ConfigError`] — raised while building a [`Pipeline`](crate::Pipeline).
//!   A pipeline that fails to build never sees a request.
//! - [`Error`] — raised while dispatching one request. A middleware that fails,
//!   or a dispatch whose [`Event`](crate::Event) is cancelled, ends that
//!   request. The engine never retries.
//!
//! Redirects and error *statuses* returned by middleware are not errors. They
//! are ordinary [`Outcome`](crate::Outcome) values the engine classifies.

use thiserror::Error;

/// What a middleware may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Invalid pipeline configuration. Detected once, at build time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The path pattern could not be compiled.
    #[error("invalid path pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A path entry was registered without any middleware.
    #[error("path pattern `{pattern}` has an empty middleware chain")]
    EmptyChain { pattern: String },

    /// The same pattern was registered twice.
    #[error("path pattern `{pattern}` is registered more than once")]
    DuplicatePattern { pattern: String },
}

impl ConfigError {
    pub(crate) fn invalid_pattern(pattern: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPattern { pattern: pattern.to_owned(), reason: reason.into() }
    }
}

/// A per-request dispatch failure.
///
/// The caller of [`Pipeline::dispatch`](crate::Pipeline::dispatch) turns this
/// into a generic server-error response; [`Pipeline::handle`](crate::Pipeline::handle)
/// does exactly that.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A middleware function returned an error.
    #[error("middleware failed: {0}")]
    Middleware(#[source] BoxError),

    /// The dispatch's event was cancelled by the surrounding runtime.
    #[error("dispatch cancelled")]
    Cancelled,
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

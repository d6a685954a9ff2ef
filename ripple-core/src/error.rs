//! Error types.
//!
//! Effects never produce errors of their own: a panicking effect unwinds to
//! whoever ran it. The errors here cover template compilation and lookup and
//! configuration loading.

use thiserror::Error;

use crate::template::TemplateId;

/// Errors raised by the template cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The markup parsed to a fragment with no element at the top level.
    #[error("template {id} has no top-level element")]
    NoRootElement { id: TemplateId },

    /// No template is registered under this id.
    #[error("template {id} is not registered")]
    UnknownTemplate { id: TemplateId },

    /// The id is already registered with different literal strings.
    #[error("template {id} is already registered with a different layout")]
    LayoutConflict { id: TemplateId },
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stub prefix {0:?} must be non-empty ASCII alphanumerics, '_' or '-'")]
    InvalidStubPrefix(String),
}

/// Any error raised by this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias using the crate-wide [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

//! Error types for genesis templating.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while rendering a genesis document.
#[derive(Debug, Error)]
pub enum GenesisError {
    /// Neither the template nor a previously rendered document exists.
    #[error("no genesis template at {} and no rendered genesis at {}", .template.display(), .rendered.display())]
    Missing {
        /// Expected template location.
        template: PathBuf,
        /// Expected rendered document location.
        rendered: PathBuf,
    },

    /// Placeholders that no known identity resolves.
    #[error("unresolved genesis placeholders: {}", .0.join(", "))]
    Unresolved(Vec<String>),

    /// The rendered document violates the genesis schema.
    #[error("invalid genesis document: {0}")]
    Schema(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for genesis operations.
pub type Result<T> = std::result::Result<T, GenesisError>;

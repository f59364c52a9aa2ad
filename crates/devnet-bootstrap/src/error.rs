//! Error types for bootstrap operations.

use crate::pipeline::Stage;
use devnet_genesis::GenesisError;
use devnet_keys::KeyError;
use std::path::PathBuf;
use thiserror::Error;

/// Bootstrap errors.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The configuration is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    /// A required input file is absent.
    #[error("Missing {what}: {}", .path.display())]
    MissingInput {
        /// What the file holds.
        what: &'static str,
        /// Where it was expected.
        path: PathBuf,
    },

    /// A keystore record belongs to a different address than expected.
    #[error("Keystore {} holds {found}, expected {expected}", .path.display())]
    AddressMismatch {
        /// The record that was opened.
        path: PathBuf,
        /// The address recorded for the node.
        expected: String,
        /// The address the record decrypts to.
        found: String,
    },

    /// An environment entry is malformed or repeated.
    #[error("Invalid environment entry: {0}")]
    Environment(String),

    /// Bootnode key handling or id derivation failed.
    #[error("Bootnode error: {0}")]
    Bootnode(String),

    /// One or more nodes failed to initialize.
    #[error("{failed} of {total} nodes failed to initialize (indices: {indices:?})")]
    NodesFailed {
        /// Number of failed nodes.
        failed: usize,
        /// Number of nodes attempted.
        total: usize,
        /// Indices of the failed nodes.
        indices: Vec<usize>,
    },

    /// A key operation failed.
    #[error(transparent)]
    Keys(#[from] KeyError),

    /// Genesis rendering failed.
    #[error(transparent)]
    Genesis(#[from] GenesisError),

    /// An error attributed to one node.
    #[error("node {index}: {source}")]
    Node {
        /// Node index.
        index: usize,
        /// Underlying error.
        source: Box<BootstrapError>,
    },

    /// An error attributed to a pipeline stage.
    #[error("{stage} failed: {source}")]
    Stage {
        /// The stage that was being entered.
        stage: Stage,
        /// Underlying error.
        source: Box<BootstrapError>,
    },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BootstrapError {
    /// Attributes this error to node `index`.
    #[must_use]
    pub fn at_node(self, index: usize) -> Self {
        Self::Node {
            index,
            source: Box::new(self),
        }
    }

    /// Attributes this error to `stage`.
    #[must_use]
    pub fn in_stage(self, stage: Stage) -> Self {
        Self::Stage {
            stage,
            source: Box::new(self),
        }
    }
}

/// Errors from initializing a single node. Collected per node, never
/// propagated past the batch.
#[derive(Debug, Error)]
pub enum NodeInitError {
    /// The node binary could not be launched.
    #[error("failed to launch {program}: {source}")]
    Spawn {
        /// The program that was invoked.
        program: String,
        /// Launch error.
        source: std::io::Error,
    },

    /// The node binary exited unsuccessfully.
    #[error("exited with {}: {}", describe_exit(.code), .stderr.trim())]
    Exit {
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// The node directory or genesis could not be resolved.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| format!("code {c}"))
}

/// Result type for bootstrap operations.
pub type Result<T> = std::result::Result<T, BootstrapError>;

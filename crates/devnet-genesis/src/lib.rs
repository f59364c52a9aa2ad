//! # Devnet Genesis
//!
//! Renders a geth genesis document from a template whose placeholders name
//! network identities by role.
//!
//! Placeholders come in two forms per address: `${NAME}` for account and
//! allocation fields (`0x`-prefixed) and `${NAME_RAW}` for packed binary
//! fields such as clique `extraData` (no prefix).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod document;
mod error;
pub mod render;

pub use document::{load_source, validate, write_atomic, GenesisSource, GenesisTemplater, SourceKind};
pub use error::{GenesisError, Result};
pub use render::{render, RenderWarning, Rendered, Substitutions};

/// A clique genesis for a four-node network: the validator as the single
/// sealer and every node funded in `alloc`.
pub const CLIQUE_TEMPLATE: &str = include_str!("../templates/clique.json");

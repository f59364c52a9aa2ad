//! # Devnet Bootstrap
//!
//! Brings up the on-disk state of a local multi-node Ethereum network:
//!
//! - **Keys**: one encrypted keystore, address file and password file per node
//! - **Genesis**: the template rendered with every node's address
//! - **Nodes**: each data directory initialized with `geth init`
//! - **Environment**: `.env` (and optionally `.env.keys`) for compose and tooling
//!
//! ## Example
//!
//! ```rust,no_run
//! use devnet_bootstrap::{Bootstrap, BootstrapConfig, SystemRunner};
//! use std::sync::Arc;
//!
//! # async fn example() -> devnet_bootstrap::Result<()> {
//! let config = BootstrapConfig::with_root("./network");
//! let report = Bootstrap::new(config, Arc::new(SystemRunner))?.run().await?;
//! report.print_summary();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bootnode;
pub mod config;
pub mod env;
mod error;
mod files;
mod identity;
pub mod keygen;
pub mod node;
pub mod pipeline;
pub mod process;
pub mod roles;

pub use bootnode::{BootnodeIdentity, DerivationMode, Deriver};
pub use config::{BootnodeSettings, BootstrapConfig, Password};
pub use env::EnvironmentRecord;
pub use error::{BootstrapError, NodeInitError, Result};
pub use identity::{substitutions, Identity};
pub use node::{InitReport, NodeBackend, NodeBootstrapper, NodeOutcome};
pub use pipeline::{Bootstrap, BootstrapReport, Stage};
pub use process::{CommandOutput, CommandRunner, Invocation, SystemRunner};
pub use roles::{Role, RoleDescriptor, RoleLayout};

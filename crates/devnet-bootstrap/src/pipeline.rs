//! The bootstrap run.
//!
//! ```text
//! Idle -> KeysGenerated -> GenesisRendered -> NodesInitialized -> EnvironmentWritten
//! ```
//!
//! Transitions only move forward and nothing is retried. Every stage is
//! also callable on its own, reading what earlier stages left on disk.

use crate::bootnode::{self, BootnodeIdentity};
use crate::config::BootstrapConfig;
use crate::env::{address_record, private_key_record};
use crate::error::{BootstrapError, Result};
use crate::identity::{substitutions, Identity};
use crate::keygen;
use crate::node::{InitReport, NodeBootstrapper};
use crate::process::CommandRunner;
use crate::roles::RoleLayout;
use devnet_genesis::{GenesisTemplater, Rendered, RenderWarning};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Bootstrap progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Nothing done yet.
    Idle,
    /// Every node has a keystore, address file and password file.
    KeysGenerated,
    /// The genesis document has every address.
    GenesisRendered,
    /// Every node data directory holds the genesis block.
    NodesInitialized,
    /// The environment files are written.
    EnvironmentWritten,
}

impl Stage {
    /// The stage after this one, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::KeysGenerated),
            Self::KeysGenerated => Some(Self::GenesisRendered),
            Self::GenesisRendered => Some(Self::NodesInitialized),
            Self::NodesInitialized => Some(Self::EnvironmentWritten),
            Self::EnvironmentWritten => None,
        }
    }

    /// Whether this is the last stage.
    #[must_use]
    pub fn is_complete(self) -> bool {
        self == Self::EnvironmentWritten
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Named after the work that leads into the state.
        match self {
            Self::Idle => write!(f, "startup"),
            Self::KeysGenerated => write!(f, "key generation"),
            Self::GenesisRendered => write!(f, "genesis rendering"),
            Self::NodesInitialized => write!(f, "node initialization"),
            Self::EnvironmentWritten => write!(f, "environment emission"),
        }
    }
}

/// What a run produced.
#[derive(Debug)]
pub struct BootstrapReport {
    /// The last stage reached.
    pub stage: Stage,
    /// Node identities, in index order.
    pub identities: Vec<Identity>,
    /// Genesis placeholders that needed the structural fallback.
    pub render_warnings: Vec<RenderWarning>,
    /// The bootnode, once initialized.
    pub bootnode: Option<BootnodeIdentity>,
    /// Per-node init outcomes.
    pub nodes: InitReport,
    /// Files written by the run.
    pub files: Vec<PathBuf>,
}

impl BootstrapReport {
    fn new() -> Self {
        Self {
            stage: Stage::Idle,
            identities: Vec::new(),
            render_warnings: Vec::new(),
            bootnode: None,
            nodes: InitReport::default(),
            files: Vec::new(),
        }
    }

    fn advance(&mut self, to: Stage) {
        debug_assert_eq!(self.stage.next(), Some(to));
        info!(from = ?self.stage, to = ?to, "Bootstrap stage complete");
        self.stage = to;
    }

    /// Whether every stage completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.stage.is_complete() && self.nodes.is_success()
    }

    /// Prints the run summary to stdout.
    pub fn print_summary(&self) {
        println!("\n=== Devnet Bootstrap Summary ===\n");
        for identity in &self.identities {
            let d = &identity.descriptor;
            let status = match self.nodes.outcomes.iter().find(|o| o.descriptor == *d) {
                Some(o) if o.is_success() => "✓",
                Some(_) => "✗",
                None => "-",
            };
            println!(
                "  {status} node{} {:<10} {:<10} {}",
                d.index,
                d.role.to_string(),
                d.container_name(),
                identity.address
            );
        }

        if let Some(bootnode) = &self.bootnode {
            println!("\nBootnode id:  {}", bootnode.node_id);
            if bootnode.is_placeholder() {
                println!("  (static placeholder; peers may not connect)");
            }
        }

        if !self.render_warnings.is_empty() {
            println!("\nWarnings:");
            for warning in &self.render_warnings {
                println!("  - {warning}");
            }
        }

        if !self.files.is_empty() {
            println!("\nFiles written:");
            for file in &self.files {
                println!("  {}", file.display());
            }
        }

        if self.is_success() {
            println!("\nNetwork ready. Start it with: docker compose up -d");
        } else {
            println!("\nStopped after {}.", self.stage);
        }
    }
}

/// Runs bootstrap stages against one configuration.
pub struct Bootstrap {
    config: BootstrapConfig,
    layout: RoleLayout,
    runner: Arc<dyn CommandRunner>,
}

impl Bootstrap {
    /// Creates a bootstrap for `config`, running external programs through
    /// `runner`.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::InvalidConfig`] if the configuration fails
    /// validation.
    pub fn new(config: BootstrapConfig, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        config.validate()?;
        let layout = RoleLayout::for_count(config.count);
        Ok(Self {
            config,
            layout,
            runner,
        })
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// The role layout in use.
    #[must_use]
    pub fn layout(&self) -> &RoleLayout {
        &self.layout
    }

    /// Runs every stage in order.
    ///
    /// Node init failures do not produce an `Err`: every node is attempted
    /// and the report stops at [`Stage::GenesisRendered`] with the
    /// per-node outcomes filled in.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Stage`] for the first fatal stage failure.
    pub async fn run(&self) -> Result<BootstrapReport> {
        let mut report = BootstrapReport::new();
        info!(count = self.layout.len(), root = %self.config.root.display(), "Starting devnet bootstrap");

        report.identities = self
            .generate_keys()
            .map_err(|e| e.in_stage(Stage::KeysGenerated))?;
        report.advance(Stage::KeysGenerated);

        let rendered = self
            .render_genesis(&report.identities)
            .map_err(|e| e.in_stage(Stage::GenesisRendered))?;
        report.render_warnings = rendered.warnings;
        report.files.push(self.config.genesis_path());
        report.advance(Stage::GenesisRendered);

        let (bootnode, nodes) = self
            .initialize_nodes()
            .await
            .map_err(|e| e.in_stage(Stage::NodesInitialized))?;
        report.bootnode = Some(bootnode);
        report.nodes = nodes;
        if !report.nodes.is_success() {
            warn!(
                failed = ?report.nodes.failed_indices(),
                "Node initialization incomplete; environment files not written"
            );
            return Ok(report);
        }
        report.advance(Stage::NodesInitialized);

        let files = self
            .emit_environment(&report.identities, report.bootnode.as_ref())
            .map_err(|e| e.in_stage(Stage::EnvironmentWritten))?;
        report.files.extend(files);
        report.advance(Stage::EnvironmentWritten);

        info!("Devnet bootstrap complete");
        Ok(report)
    }

    /// Generates key material for every node.
    ///
    /// # Errors
    ///
    /// Returns the first key generation failure, attributed to its node.
    pub fn generate_keys(&self) -> Result<Vec<Identity>> {
        keygen::generate(&self.config, &self.layout)
    }

    /// Reads identities a previous key generation left on disk.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::MissingInput`] for a node without an
    /// address file.
    pub fn load_identities(&self) -> Result<Vec<Identity>> {
        keygen::load(&self.config, &self.layout)
    }

    /// Renders the genesis document with the addresses of `identities`.
    ///
    /// # Errors
    ///
    /// Returns any genesis failure; nothing is written on failure.
    pub fn render_genesis(&self, identities: &[Identity]) -> Result<Rendered> {
        let templater =
            GenesisTemplater::new(self.config.genesis_template(), self.config.genesis_path());
        let rendered = templater.render(&substitutions(identities))?;
        for warning in &rendered.warnings {
            warn!(%warning, "Genesis rendered with fallback");
        }
        Ok(rendered)
    }

    /// Prepares the bootnode and initializes every node data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the rendered genesis is missing or the bootnode
    /// cannot be prepared. Individual node failures are in the report.
    pub async fn initialize_nodes(&self) -> Result<(BootnodeIdentity, InitReport)> {
        let genesis = self.config.genesis_path();
        if !genesis.is_file() {
            return Err(BootstrapError::MissingInput {
                what: "rendered genesis",
                path: genesis,
            });
        }

        let bootnode = bootnode::ensure(
            &self.config.bootnode_dir(),
            &self.config.bootnode,
            self.runner.as_ref(),
        )
        .await?;

        let report = NodeBootstrapper::new(self.config.node.clone(), Arc::clone(&self.runner))
            .parallel(self.config.parallel_init)
            .initialize(self.layout.descriptors(), &self.config.data_dir(), &genesis)
            .await;

        Ok((bootnode, report))
    }

    /// Writes `.env`, and `.env.keys` when key emission is enabled.
    ///
    /// Both records are built before either file is written.
    ///
    /// # Errors
    ///
    /// Returns an error if a keystore is missing, undecryptable or
    /// mismatched, or a file cannot be written.
    pub fn emit_environment(
        &self,
        identities: &[Identity],
        bootnode: Option<&BootnodeIdentity>,
    ) -> Result<Vec<PathBuf>> {
        let bootnode = bootnode.filter(|_| self.config.include_bootnode_id);
        if self.config.include_bootnode_id && bootnode.is_none() {
            return Err(BootstrapError::InvalidConfig(
                "include_bootnode_id is set but no bootnode id is available".into(),
            ));
        }

        let addresses = address_record(identities, &self.config.password, bootnode)?;
        let keys = if self.config.emit_keys {
            Some(private_key_record(&self.config, identities)?)
        } else {
            None
        };

        let mut files = Vec::new();
        let env_path = self.config.env_path();
        addresses.write(&env_path)?;
        files.push(env_path);

        if let Some(keys) = keys {
            let keys_path = self.config.keys_env_path();
            keys.write(&keys_path)?;
            files.push(keys_path);
        }
        Ok(files)
    }

    /// Writes `.env.keys` on its own.
    ///
    /// # Errors
    ///
    /// Returns an error if a keystore is missing, undecryptable or
    /// mismatched; the file is not touched in that case.
    pub fn export_private_keys(&self, identities: &[Identity]) -> Result<PathBuf> {
        let record = private_key_record(&self.config, identities)?;
        let path = self.config.keys_env_path();
        record.write(&path)?;
        Ok(path)
    }

    /// Loads or creates the bootnode key and derives its id.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Bootnode`] if the key or derivation fails.
    pub async fn bootnode(&self) -> Result<BootnodeIdentity> {
        bootnode::ensure(
            &self.config.bootnode_dir(),
            &self.config.bootnode,
            self.runner.as_ref(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn stages_move_forward() {
        let mut stage = Stage::Idle;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            assert!(next > stage);
            stage = next;
            seen.push(stage);
        }
        assert_eq!(seen.len(), 5);
        assert!(stage.is_complete());
    }

    #[test]
    fn stage_error_names_stage_and_node() {
        let err = BootstrapError::MissingInput {
            what: "address file",
            path: PathBuf::from("data/node2/address.addr"),
        }
        .at_node(2)
        .in_stage(Stage::KeysGenerated);

        assert_eq!(
            err.to_string(),
            "key generation failed: node 2: Missing address file: data/node2/address.addr"
        );
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = BootstrapConfig::default();
        config.count = 0;
        let runner: Arc<dyn CommandRunner> = Arc::new(crate::process::SystemRunner);
        assert!(Bootstrap::new(config, runner).is_err());
    }
}

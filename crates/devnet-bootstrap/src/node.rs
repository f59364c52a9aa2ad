//! Node data directory initialization.
//!
//! Each node directory is initialized from the rendered genesis by
//! `geth init`, run either inside the client container or as a local
//! binary. Failures are recorded per node; one bad node never stops the
//! others from being attempted.

use crate::error::{BootstrapError, NodeInitError};
use crate::pipeline::Stage;
use crate::process::{CommandRunner, Invocation};
use crate::roles::RoleDescriptor;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Default container runtime.
pub const DEFAULT_RUNTIME: &str = "docker";
/// Default client image.
pub const DEFAULT_IMAGE: &str = "ethereum/client-go:stable";

const CONTAINER_DATA: &str = "/data";
const CONTAINER_CONFIG: &str = "/config";

fn default_runtime() -> String {
    DEFAULT_RUNTIME.to_string()
}

fn default_image() -> String {
    DEFAULT_IMAGE.to_string()
}

/// How `geth init` is run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeBackend {
    /// Inside a throwaway client container.
    Docker {
        /// Container runtime binary.
        #[serde(default = "default_runtime")]
        runtime: String,
        /// Client image.
        #[serde(default = "default_image")]
        image: String,
    },
    /// A geth binary on this machine.
    Native {
        /// Path or name of the geth binary.
        binary: String,
    },
}

impl Default for NodeBackend {
    fn default() -> Self {
        Self::Docker {
            runtime: default_runtime(),
            image: default_image(),
        }
    }
}

impl NodeBackend {
    /// The invocation that initializes `node_dir` from `genesis`.
    ///
    /// Both paths are made absolute first; container mounts need them.
    ///
    /// # Errors
    ///
    /// Returns an error if either path cannot be resolved.
    pub fn init_invocation(
        &self,
        node_dir: &Path,
        genesis: &Path,
    ) -> std::io::Result<Invocation> {
        let node_dir = node_dir.canonicalize()?;
        let genesis = genesis.canonicalize()?;

        Ok(match self {
            Self::Docker { runtime, image } => {
                let genesis_dir = genesis.parent().unwrap_or_else(|| Path::new("/"));
                let file_name = genesis
                    .file_name()
                    .map_or_else(|| "genesis.json".into(), |n| n.to_string_lossy().into_owned());

                Invocation::new(runtime)
                    .args(["run", "--rm", "-v"])
                    .arg(mount(&node_dir, CONTAINER_DATA))
                    .arg("-v")
                    .arg(mount(genesis_dir, CONTAINER_CONFIG))
                    .arg(image)
                    .arg("init")
                    .arg(format!("--datadir={CONTAINER_DATA}"))
                    .arg(format!("{CONTAINER_CONFIG}/{file_name}"))
            }
            Self::Native { binary } => Invocation::new(binary)
                .arg("init")
                .arg("--datadir")
                .arg(&node_dir)
                .arg(&genesis),
        })
    }

    /// The program this backend launches.
    #[must_use]
    pub fn program(&self) -> &str {
        match self {
            Self::Docker { runtime, .. } => runtime,
            Self::Native { binary } => binary,
        }
    }
}

fn mount(host: &Path, container: &str) -> String {
    format!("{}:{container}", host.display())
}

/// The result of initializing one node.
#[derive(Debug)]
pub struct NodeOutcome {
    /// Which node.
    pub descriptor: RoleDescriptor,
    /// Its data directory.
    pub node_dir: PathBuf,
    /// How long initialization took.
    pub elapsed: Duration,
    /// Success, or why it failed.
    pub result: Result<(), NodeInitError>,
}

impl NodeOutcome {
    /// Whether this node initialized.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes for a batch of nodes, in index order.
#[derive(Debug, Default)]
pub struct InitReport {
    /// One entry per node attempted.
    pub outcomes: Vec<NodeOutcome>,
}

impl InitReport {
    /// Nodes that initialized.
    pub fn successes(&self) -> impl Iterator<Item = &NodeOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    /// Nodes that failed.
    pub fn failures(&self) -> impl Iterator<Item = &NodeOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Indices of failed nodes.
    #[must_use]
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures().map(|o| o.descriptor.index).collect()
    }

    /// Whether every node initialized.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(NodeOutcome::is_success)
    }

    /// The batch failure, attributed to node initialization, if any node
    /// failed.
    #[must_use]
    pub fn error(&self) -> Option<BootstrapError> {
        let indices = self.failed_indices();
        if indices.is_empty() {
            return None;
        }
        Some(
            BootstrapError::NodesFailed {
                failed: indices.len(),
                total: self.outcomes.len(),
                indices,
            }
            .in_stage(Stage::NodesInitialized),
        )
    }

    /// Prints a per-node summary to stdout.
    pub fn print_summary(&self) {
        println!("\n=== Node Initialization ===\n");
        for outcome in &self.outcomes {
            let d = &outcome.descriptor;
            match &outcome.result {
                Ok(()) => println!(
                    "  ✓ node{} ({}, {}) in {:.1}s",
                    d.index,
                    d.role,
                    d.container_name(),
                    outcome.elapsed.as_secs_f64()
                ),
                Err(e) => println!("  ✗ node{} ({}, {}): {e}", d.index, d.role, d.container_name()),
            }
        }
        println!(
            "\n{} of {} nodes initialized",
            self.successes().count(),
            self.outcomes.len()
        );
    }
}

/// Initializes node data directories from a rendered genesis.
pub struct NodeBootstrapper {
    backend: NodeBackend,
    runner: Arc<dyn CommandRunner>,
    parallel: bool,
}

impl NodeBootstrapper {
    /// Creates a bootstrapper running `backend` through `runner`.
    pub fn new(backend: NodeBackend, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            backend,
            runner,
            parallel: false,
        }
    }

    /// Initializes nodes concurrently instead of one after another.
    #[must_use]
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Initializes every node in `nodes` under `data_dir`.
    ///
    /// Every node is attempted. The report lists outcomes in the order
    /// given, regardless of completion order.
    pub async fn initialize(
        &self,
        nodes: &[RoleDescriptor],
        data_dir: &Path,
        genesis: &Path,
    ) -> InitReport {
        info!(
            count = nodes.len(),
            backend = self.backend.program(),
            parallel = self.parallel,
            "Initializing nodes with genesis"
        );

        let outcomes = if self.parallel {
            join_all(nodes.iter().map(|d| self.initialize_one(*d, data_dir, genesis))).await
        } else {
            let mut outcomes = Vec::with_capacity(nodes.len());
            for d in nodes {
                outcomes.push(self.initialize_one(*d, data_dir, genesis).await);
            }
            outcomes
        };

        InitReport { outcomes }
    }

    async fn initialize_one(
        &self,
        descriptor: RoleDescriptor,
        data_dir: &Path,
        genesis: &Path,
    ) -> NodeOutcome {
        let node_dir = descriptor.node_dir(data_dir);
        let started = Instant::now();
        let result = self.run_init(&node_dir, genesis).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(()) => info!(index = descriptor.index, role = %descriptor.role, "Node initialized"),
            Err(e) => error!(index = descriptor.index, role = %descriptor.role, error = %e, "Node initialization failed"),
        }

        NodeOutcome {
            descriptor,
            node_dir,
            elapsed,
            result,
        }
    }

    async fn run_init(&self, node_dir: &Path, genesis: &Path) -> Result<(), NodeInitError> {
        std::fs::create_dir_all(node_dir)?;
        let invocation = self.backend.init_invocation(node_dir, genesis)?;

        let output = self
            .runner
            .run(&invocation)
            .await
            .map_err(|source| NodeInitError::Spawn {
                program: self.backend.program().to_string(),
                source,
            })?;

        if output.success() {
            Ok(())
        } else {
            Err(NodeInitError::Exit {
                code: output.code,
                stderr: output.stderr,
            })
        }
    }
}

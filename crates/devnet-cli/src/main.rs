//! devnet - bootstrap a local multi-node Ethereum network.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use devnet_bootstrap::{Bootstrap, BootstrapConfig, NodeBackend, Password, SystemRunner};
use std::path::PathBuf;
use std::sync::Arc;

mod commands;
mod logging;

use logging::LogFormat;

/// Bootstrap a local multi-node Ethereum devnet
#[derive(Parser, Debug)]
#[command(name = "devnet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, env = "DEVNET_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Project root holding data/, bootnode/ and the genesis files
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every stage: keys, genesis, node init, environment
    Bootstrap(BootstrapArgs),

    /// Generate node keystores, address and password files
    Keys(KeyArgs),

    /// Render the genesis from existing address files
    Genesis,

    /// Initialize node data directories from the rendered genesis
    Init(InitArgs),

    /// Write .env (and .env.keys with --emit-keys) from existing address files
    Env {
        /// Also write decrypted private keys
        #[arg(long)]
        emit_keys: bool,
    },

    /// Decrypt every keystore into .env.keys
    ExportKeys,

    /// Write the bundled clique genesis template
    Template {
        /// Overwrite an existing template
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Default)]
struct KeyArgs {
    /// Number of nodes
    #[arg(long)]
    count: Option<usize>,

    /// Keystore password
    #[arg(long, env = "DEVNET_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Reuse existing keystores
    #[arg(long)]
    skip_if_exists: bool,
}

#[derive(Args, Debug, Default)]
struct InitArgs {
    /// Initialize nodes concurrently
    #[arg(long)]
    parallel: bool,

    /// Use a local geth binary instead of the client container
    #[arg(long, conflicts_with = "image")]
    geth: Option<String>,

    /// Client image for containerized init
    #[arg(long)]
    image: Option<String>,
}

#[derive(Args, Debug)]
struct BootstrapArgs {
    #[command(flatten)]
    keys: KeyArgs,

    #[command(flatten)]
    init: InitArgs,

    /// Also write decrypted private keys to .env.keys
    #[arg(long)]
    emit_keys: bool,
}

impl KeyArgs {
    fn apply(&self, config: &mut BootstrapConfig) {
        if let Some(count) = self.count {
            config.count = count;
        }
        if let Some(password) = &self.password {
            config.password = Password::new(password.as_str());
        }
        config.skip_if_exists |= self.skip_if_exists;
    }
}

impl InitArgs {
    fn apply(&self, config: &mut BootstrapConfig) {
        config.parallel_init |= self.parallel;
        if let Some(binary) = &self.geth {
            config.node = NodeBackend::Native {
                binary: binary.clone(),
            };
        } else if let Some(image) = &self.image {
            let runtime = match &config.node {
                NodeBackend::Docker { runtime, .. } => runtime.clone(),
                NodeBackend::Native { .. } => devnet_bootstrap::node::DEFAULT_RUNTIME.to_string(),
            };
            config.node = NodeBackend::Docker {
                runtime,
                image: image.clone(),
            };
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<BootstrapConfig> {
    let mut config = BootstrapConfig::load(cli.config.as_deref()).with_context(|| {
        match &cli.config {
            Some(path) => format!("failed to load {}", path.display()),
            None => "failed to load configuration".to_string(),
        }
    })?;
    if let Some(root) = &cli.root {
        config.root.clone_from(root);
    }
    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_config(&cli)?;

    match &cli.command {
        Commands::Bootstrap(args) => {
            args.keys.apply(&mut config);
            args.init.apply(&mut config);
            config.emit_keys |= args.emit_keys;
        }
        Commands::Keys(args) => args.apply(&mut config),
        Commands::Init(args) => args.apply(&mut config),
        Commands::Env { emit_keys } => config.emit_keys |= *emit_keys,
        Commands::Genesis | Commands::ExportKeys | Commands::Template { .. } => {}
    }

    tracing::debug!(?config, "Configuration loaded");
    let bootstrap = Bootstrap::new(config, Arc::new(SystemRunner))?;

    match cli.command {
        Commands::Bootstrap(_) => commands::bootstrap(&bootstrap).await?,
        Commands::Keys(_) => commands::keys(&bootstrap)?,
        Commands::Genesis => commands::genesis(&bootstrap)?,
        Commands::Init(_) => commands::init(&bootstrap).await?,
        Commands::Env { .. } => commands::env(&bootstrap).await?,
        Commands::ExportKeys => commands::export_keys(&bootstrap)?,
        Commands::Template { force } => commands::template(&bootstrap, force)?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(logging::level_for(cli.verbose), cli.log_format);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

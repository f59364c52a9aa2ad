//! CLI command implementations.

use devnet_bootstrap::{Bootstrap, BootstrapError, Identity};
use devnet_genesis::CLIQUE_TEMPLATE;
use std::path::PathBuf;
use thiserror::Error;

/// CLI errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("{} already exists (use --force to overwrite)", .0.display())]
    Exists(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;

fn print_identities(identities: &[Identity]) {
    for id in identities {
        println!(
            "  node{} {:<10} {}",
            id.index(),
            id.role().to_string(),
            id.address
        );
    }
}

/// Runs every stage.
pub async fn bootstrap(bootstrap: &Bootstrap) -> Result<()> {
    let report = bootstrap.run().await?;
    report.print_summary();

    match report.nodes.error() {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Generates key material only.
pub fn keys(bootstrap: &Bootstrap) -> Result<()> {
    let identities = bootstrap.generate_keys()?;
    println!("Generated {} node keys:", identities.len());
    print_identities(&identities);
    Ok(())
}

/// Renders the genesis from existing address files.
pub fn genesis(bootstrap: &Bootstrap) -> Result<()> {
    let identities = bootstrap.load_identities()?;
    let rendered = bootstrap.render_genesis(&identities)?;
    println!(
        "Rendered {} ({} raw, {} prefixed substitutions)",
        bootstrap.config().genesis_path().display(),
        rendered.raw_replacements,
        rendered.prefixed_replacements
    );
    for warning in &rendered.warnings {
        println!("  warning: {warning}");
    }
    Ok(())
}

/// Initializes node data directories from the rendered genesis.
pub async fn init(bootstrap: &Bootstrap) -> Result<()> {
    let (bootnode, report) = bootstrap.initialize_nodes().await?;
    report.print_summary();
    println!("\nBootnode: {}", bootnode.enode_url("127.0.0.1", 30301));

    match report.error() {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Writes the environment files from existing address files.
pub async fn env(bootstrap: &Bootstrap) -> Result<()> {
    let identities = bootstrap.load_identities()?;
    let bootnode = if bootstrap.config().include_bootnode_id {
        Some(bootstrap.bootnode().await?)
    } else {
        None
    };

    for path in bootstrap.emit_environment(&identities, bootnode.as_ref())? {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

/// Decrypts every keystore into the private key file.
pub fn export_keys(bootstrap: &Bootstrap) -> Result<()> {
    let identities = bootstrap.load_identities()?;
    let path = bootstrap.export_private_keys(&identities)?;
    println!("Wrote {} private keys to {}", identities.len(), path.display());
    Ok(())
}

/// Writes the bundled clique genesis template.
pub fn template(bootstrap: &Bootstrap, force: bool) -> Result<()> {
    let path = bootstrap.config().genesis_template();
    if path.exists() && !force {
        return Err(CliError::Exists(path));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, CLIQUE_TEMPLATE)?;
    println!("Wrote genesis template to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use devnet_bootstrap::{BootstrapConfig, SystemRunner};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn bootstrap(dir: &TempDir) -> Bootstrap {
        Bootstrap::new(BootstrapConfig::with_root(dir.path()), Arc::new(SystemRunner)).unwrap()
    }

    #[test]
    fn template_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let b = bootstrap(&dir);

        template(&b, false).unwrap();
        assert!(matches!(template(&b, false), Err(CliError::Exists(_))));
        template(&b, true).unwrap();

        let written = std::fs::read_to_string(b.config().genesis_template()).unwrap();
        assert_eq!(written, CLIQUE_TEMPLATE);
    }

    #[test]
    fn keys_then_genesis() {
        let dir = TempDir::new().unwrap();
        let b = bootstrap(&dir);

        template(&b, false).unwrap();
        keys(&b).unwrap();
        genesis(&b).unwrap();
        assert!(b.config().genesis_path().is_file());
    }

    #[test]
    fn genesis_without_keys_fails() {
        let dir = TempDir::new().unwrap();
        let b = bootstrap(&dir);
        template(&b, false).unwrap();
        assert!(genesis(&b).is_err());
    }
}

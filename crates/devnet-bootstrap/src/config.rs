//! Bootstrap configuration.
//!
//! Every path, count and secret the pipeline touches lives here and is
//! passed down explicitly. Values are layered: built-in defaults, then an
//! optional config file, then `DEVNET_*` environment variables, then
//! whatever the caller overrides (the CLI flags).

use crate::bootnode::DerivationMode;
use crate::error::{BootstrapError, Result};
use crate::node::NodeBackend;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Password used when none is configured. Development networks only.
pub const DEFAULT_PASSWORD: &str = "passw0rd";

/// Default number of nodes.
pub const DEFAULT_COUNT: usize = 4;

/// Prefix of environment variables read by [`BootstrapConfig::load`].
pub const ENV_PREFIX: &str = "DEVNET";

/// A keystore password. Zeroized on drop, redacted in `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(Zeroizing<String>);

impl Password {
    /// Wraps a password.
    pub fn new(password: impl Into<String>) -> Self {
        Self(Zeroizing::new(password.into()))
    }

    /// The password text.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Default for Password {
    fn default() -> Self {
        Self::new(DEFAULT_PASSWORD)
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

impl Serialize for Password {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.expose())
    }
}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Bootnode id derivation settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BootnodeSettings {
    /// Which derivation strategies may be used.
    pub derivation: DerivationMode,
    /// External derivation program (geth's `bootnode`).
    pub tool: String,
}

impl Default for BootnodeSettings {
    fn default() -> Self {
        Self {
            derivation: DerivationMode::Auto,
            tool: "bootnode".to_string(),
        }
    }
}

/// Configuration for a bootstrap run.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Project root; every default path is relative to it.
    pub root: PathBuf,
    /// Per-node data directories (`<root>/data`).
    pub data_dir: Option<PathBuf>,
    /// Bootnode key material (`<root>/bootnode`).
    pub bootnode_dir: Option<PathBuf>,
    /// Genesis template (`<root>/genesis.template.json`).
    pub genesis_template: Option<PathBuf>,
    /// Rendered genesis (`<root>/genesis.json`).
    pub genesis_path: Option<PathBuf>,
    /// Address environment file (`<root>/.env`).
    pub env_path: Option<PathBuf>,
    /// Private key environment file (`<root>/.env.keys`).
    pub keys_env_path: Option<PathBuf>,

    /// Number of nodes.
    pub count: usize,
    /// Keystore password.
    pub password: Password,
    /// Reuse existing keystores instead of generating new ones.
    pub skip_if_exists: bool,
    /// Also write decrypted private keys.
    pub emit_keys: bool,
    /// Add `BOOTNODE_ID` to the address environment file.
    pub include_bootnode_id: bool,
    /// Initialize nodes concurrently.
    pub parallel_init: bool,

    /// How nodes are initialized.
    pub node: NodeBackend,
    /// Bootnode settings.
    pub bootnode: BootnodeSettings,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            data_dir: None,
            bootnode_dir: None,
            genesis_template: None,
            genesis_path: None,
            env_path: None,
            keys_env_path: None,
            count: DEFAULT_COUNT,
            password: Password::default(),
            skip_if_exists: false,
            emit_keys: false,
            include_bootnode_id: false,
            parallel_init: false,
            node: NodeBackend::default(),
            bootnode: BootnodeSettings::default(),
        }
    }
}

impl BootstrapConfig {
    /// Creates the default configuration rooted at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Loads defaults, then `file` if given, then `DEVNET_*` variables.
    ///
    /// Nested keys use a double underscore, e.g. `DEVNET_NODE__IMAGE`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or a value has the wrong type.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_from(file, None)
    }

    /// Like [`load`](Self::load) but reads variables from `env` instead of
    /// the process environment when given.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or a value has the wrong type.
    pub fn load_from(file: Option<&Path>, env: Option<::config::Map<String, String>>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Checks values that would make the run meaningless.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::InvalidConfig`] naming the bad value.
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(BootstrapError::InvalidConfig(
                "count must be at least 1".into(),
            ));
        }
        if self.password.expose().is_empty() {
            return Err(BootstrapError::InvalidConfig(
                "password must not be empty".into(),
            ));
        }
        if self.password.expose().contains(['\n', '\r']) {
            return Err(BootstrapError::InvalidConfig(
                "password must be a single line".into(),
            ));
        }
        Ok(())
    }

    fn under_root(&self, value: Option<&PathBuf>, default: &str) -> PathBuf {
        value.cloned().unwrap_or_else(|| self.root.join(default))
    }

    /// Per-node data directories.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.under_root(self.data_dir.as_ref(), "data")
    }

    /// Bootnode key directory.
    #[must_use]
    pub fn bootnode_dir(&self) -> PathBuf {
        self.under_root(self.bootnode_dir.as_ref(), "bootnode")
    }

    /// Genesis template path.
    #[must_use]
    pub fn genesis_template(&self) -> PathBuf {
        self.under_root(self.genesis_template.as_ref(), "genesis.template.json")
    }

    /// Rendered genesis path.
    #[must_use]
    pub fn genesis_path(&self) -> PathBuf {
        self.under_root(self.genesis_path.as_ref(), "genesis.json")
    }

    /// Address environment file path.
    #[must_use]
    pub fn env_path(&self) -> PathBuf {
        self.under_root(self.env_path.as_ref(), ".env")
    }

    /// Private key environment file path.
    #[must_use]
    pub fn keys_env_path(&self) -> PathBuf {
        self.under_root(self.keys_env_path.as_ref(), ".env.keys")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = BootstrapConfig::with_root("/tmp/net");
        assert_eq!(config.count, 4);
        assert_eq!(config.password.expose(), "passw0rd");
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/net/data"));
        assert_eq!(config.genesis_path(), PathBuf::from("/tmp/net/genesis.json"));
        assert_eq!(config.env_path(), PathBuf::from("/tmp/net/.env"));
        assert!(!config.emit_keys);
        config.validate().unwrap();
    }

    #[test]
    fn explicit_paths_win() {
        let mut config = BootstrapConfig::with_root("/tmp/net");
        config.data_dir = Some(PathBuf::from("/srv/nodes"));
        assert_eq!(config.data_dir(), PathBuf::from("/srv/nodes"));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = BootstrapConfig::default();
        config.count = 0;
        assert!(config.validate().is_err());

        let mut config = BootstrapConfig::default();
        config.password = Password::new("");
        assert!(config.validate().is_err());

        let mut config = BootstrapConfig::default();
        config.password = Password::new("two\nlines");
        assert!(config.validate().is_err());
    }

    #[test]
    fn password_is_redacted() {
        let config = BootstrapConfig::default();
        assert!(!format!("{config:?}").contains("passw0rd"));
    }

    #[test]
    fn load_layers_file_and_env() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("devnet.toml");
        std::fs::write(
            &file,
            "count = 6\npassword = \"from-file\"\n\n[node]\nkind = \"native\"\nbinary = \"/usr/bin/geth\"\n",
        )
        .unwrap();

        let env: ::config::Map<String, String> = [
            ("DEVNET_PASSWORD".to_string(), "from-env".to_string()),
            ("DEVNET_EMIT_KEYS".to_string(), "true".to_string()),
        ]
        .into_iter()
        .collect();

        let config = BootstrapConfig::load_from(Some(&file), Some(env)).unwrap();
        assert_eq!(config.count, 6);
        assert_eq!(config.password.expose(), "from-env");
        assert!(config.emit_keys);
        assert_eq!(
            config.node,
            NodeBackend::Native {
                binary: "/usr/bin/geth".into()
            }
        );
    }
}

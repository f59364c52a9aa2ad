//! Bootnode key and node id.
//!
//! The bootnode key is a 32-byte secp256k1 secret kept in `boot.key`. Its
//! node id (the uncompressed public key without the `04` tag, 128 hex
//! digits) goes into the `enode://` URL peers dial.
//!
//! The deriver is picked once, up front, by probing each candidate in
//! order. When nothing better is available the static placeholder id is
//! used and the network may not peer.

use crate::config::BootnodeSettings;
use crate::error::{BootstrapError, Result};
use crate::files::write_private;
use crate::process::{CommandRunner, Invocation};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// Secret key file name.
pub const KEY_FILE: &str = "boot.key";
/// Node id file name.
pub const ID_FILE: &str = "boot.id";

/// Node id used when no derivation is possible.
pub const STATIC_NODE_ID: &str = "c5b299c14b8d6e289b96c2fe7269f6c5c54d2cf69e2fb05b791d9a622f17aba0b21e3ce085aa1019ea187d3c8d791deabfae079314ece3b2a00307328f63cfa6";

const NODE_ID_HEX_LEN: usize = 128;

/// Which derivation strategies may be tried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DerivationMode {
    /// External tool, then in-process, then the static id.
    #[default]
    Auto,
    /// External tool, then the static id.
    Tool,
    /// In-process, then the static id.
    InProcess,
    /// Always the static id.
    Static,
}

/// A way of turning a bootnode secret into a node id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deriver {
    /// geth's `bootnode -nodekeyhex <key> -writeaddress`.
    Tool {
        /// Program name or path.
        program: String,
    },
    /// secp256k1 public key computed in this process.
    InProcess,
    /// [`STATIC_NODE_ID`], whatever the key.
    Static,
}

impl Deriver {
    /// Candidates for `settings`, most preferred first.
    #[must_use]
    pub fn candidates(settings: &BootnodeSettings) -> Vec<Self> {
        let tool = Self::Tool {
            program: settings.tool.clone(),
        };
        match settings.derivation {
            DerivationMode::Auto => vec![tool, Self::InProcess, Self::Static],
            DerivationMode::Tool => vec![tool, Self::Static],
            DerivationMode::InProcess => vec![Self::InProcess, Self::Static],
            DerivationMode::Static => vec![Self::Static],
        }
    }

    /// Picks the first candidate whose capability probe passes, falling
    /// back to [`Deriver::Static`].
    pub async fn select(candidates: Vec<Self>, runner: &dyn CommandRunner) -> Self {
        for candidate in candidates {
            if candidate.is_available(runner).await {
                return candidate;
            }
            info!(deriver = candidate.name(), "Bootnode id deriver unavailable");
        }
        Self::Static
    }

    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tool { .. } => "tool",
            Self::InProcess => "in-process",
            Self::Static => "static",
        }
    }

    async fn is_available(&self, runner: &dyn CommandRunner) -> bool {
        match self {
            Self::Tool { program } => runner.is_available(program).await,
            Self::InProcess | Self::Static => true,
        }
    }

    /// Derives the node id for `seed`.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Bootnode`] if the seed is not a valid secret
    /// or the tool fails or prints something that is not a node id.
    pub async fn derive(&self, seed: &[u8; 32], runner: &dyn CommandRunner) -> Result<String> {
        match self {
            Self::Tool { program } => {
                let seed_hex = Zeroizing::new(hex::encode(seed));
                let invocation = Invocation::new(program)
                    .arg("-nodekeyhex")
                    .arg(seed_hex.as_str())
                    .arg("-writeaddress");
                let output = runner.run(&invocation).await.map_err(|e| {
                    BootstrapError::Bootnode(format!("failed to launch {program}: {e}"))
                })?;
                if !output.success() {
                    return Err(BootstrapError::Bootnode(format!(
                        "{program} exited with {:?}: {}",
                        output.code,
                        output.stderr.trim()
                    )));
                }
                let id = output.stdout.trim().to_lowercase();
                if !is_node_id(&id) {
                    return Err(BootstrapError::Bootnode(format!(
                        "{program} printed an invalid node id: {id:?}"
                    )));
                }
                Ok(id)
            }
            Self::InProcess => node_id_from_seed(seed),
            Self::Static => Ok(STATIC_NODE_ID.to_string()),
        }
    }
}

fn is_node_id(s: &str) -> bool {
    s.len() == NODE_ID_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Computes the node id of `seed` in process.
///
/// # Errors
///
/// Returns [`BootstrapError::Bootnode`] if `seed` is zero or not below the
/// curve order.
pub fn node_id_from_seed(seed: &[u8; 32]) -> Result<String> {
    let secret = k256::SecretKey::from_slice(seed)
        .map_err(|_| BootstrapError::Bootnode("boot.key is not a valid secp256k1 secret".into()))?;
    let point = secret.public_key().to_encoded_point(false);
    Ok(hex::encode(&point.as_bytes()[1..]))
}

/// The bootnode's key and node id.
pub struct BootnodeIdentity {
    seed: Zeroizing<[u8; 32]>,
    /// 128-hex-digit node id.
    pub node_id: String,
    /// Name of the deriver that produced `node_id`.
    pub derived_by: &'static str,
}

impl BootnodeIdentity {
    /// The secret key as hex.
    #[must_use]
    pub fn seed_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(*self.seed))
    }

    /// Whether the id is the static placeholder rather than derived.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.node_id == STATIC_NODE_ID
    }

    /// The `enode://` URL for a bootnode listening on `host:port`.
    #[must_use]
    pub fn enode_url(&self, host: &str, port: u16) -> String {
        format!("enode://{}@{host}:{port}", self.node_id)
    }
}

impl std::fmt::Debug for BootnodeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootnodeIdentity")
            .field("node_id", &self.node_id)
            .field("derived_by", &self.derived_by)
            .finish_non_exhaustive()
    }
}

/// Loads or creates the bootnode key in `dir` and derives its node id.
///
/// An existing `boot.key` is reused, so repeated runs keep the same id.
///
/// # Errors
///
/// Returns an error if the key file is malformed or unwritable, or if the
/// selected deriver fails.
pub async fn ensure(
    dir: &Path,
    settings: &BootnodeSettings,
    runner: &dyn CommandRunner,
) -> Result<BootnodeIdentity> {
    fs::create_dir_all(dir)?;
    let seed = load_or_create_seed(&dir.join(KEY_FILE))?;

    let candidates = Deriver::candidates(settings);
    let preferred = candidates.first().map_or("static", Deriver::name);
    let deriver = Deriver::select(candidates, runner).await;

    if deriver == Deriver::Static && settings.derivation != DerivationMode::Static {
        warn!(
            "Could not derive the bootnode id; using the static placeholder. \
             Nodes may not connect properly"
        );
    } else if deriver.name() != preferred {
        info!(preferred, using = deriver.name(), "Falling back to another bootnode deriver");
    }

    let node_id = deriver.derive(&seed, runner).await?;
    fs::write(dir.join(ID_FILE), &node_id)?;
    info!(node_id = %&node_id[..8], deriver = deriver.name(), "Bootnode id set");

    Ok(BootnodeIdentity {
        seed,
        node_id,
        derived_by: deriver.name(),
    })
}

fn load_or_create_seed(path: &Path) -> Result<Zeroizing<[u8; 32]>> {
    let mut seed = Zeroizing::new([0u8; 32]);

    match fs::read_to_string(path) {
        Ok(text) => {
            let text = Zeroizing::new(text);
            let digits = text.trim();
            let digits = digits.strip_prefix("0x").unwrap_or(digits);
            hex::decode_to_slice(digits, seed.as_mut_slice()).map_err(|e| {
                BootstrapError::Bootnode(format!("malformed {}: {e}", path.display()))
            })?;
            info!(path = %path.display(), "Reusing bootnode key");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            OsRng.fill_bytes(seed.as_mut_slice());
            let hex = Zeroizing::new(hex::encode(*seed));
            write_private(path, hex.as_bytes())?;
            info!(path = %path.display(), "Generated bootnode key");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::CommandOutput;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    /// Runner with no programs installed.
    struct NoTools;

    #[async_trait]
    impl CommandRunner for NoTools {
        async fn run(&self, _: &Invocation) -> std::io::Result<CommandOutput> {
            Err(std::io::ErrorKind::NotFound.into())
        }

        async fn is_available(&self, _: &str) -> bool {
            false
        }
    }

    /// Runner whose bootnode tool prints a fixed id.
    struct FakeTool(String);

    #[async_trait]
    impl CommandRunner for FakeTool {
        async fn run(&self, inv: &Invocation) -> std::io::Result<CommandOutput> {
            assert_eq!(inv.args[0], "-nodekeyhex");
            assert_eq!(inv.args[2], "-writeaddress");
            Ok(CommandOutput {
                code: Some(0),
                stdout: format!("{}\n", self.0),
                stderr: String::new(),
            })
        }

        async fn is_available(&self, program: &str) -> bool {
            program == "bootnode"
        }
    }

    fn settings(mode: DerivationMode) -> BootnodeSettings {
        BootnodeSettings {
            derivation: mode,
            ..BootnodeSettings::default()
        }
    }

    #[test]
    fn in_process_matches_known_vector() {
        // secret = 1 gives the generator point.
        let mut seed = [0u8; 32];
        seed[31] = 1;
        assert_eq!(
            node_id_from_seed(&seed).unwrap(),
            "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798\
             483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8"
        );
        assert!(node_id_from_seed(&[0u8; 32]).is_err());
    }

    #[tokio::test]
    async fn auto_without_tool_derives_in_process() {
        let dir = TempDir::new().unwrap();
        let boot = ensure(dir.path(), &settings(DerivationMode::Auto), &NoTools)
            .await
            .unwrap();

        assert_eq!(boot.derived_by, "in-process");
        assert!(is_node_id(&boot.node_id));
        assert!(!boot.is_placeholder());
        assert_eq!(
            fs::read_to_string(dir.path().join(ID_FILE)).unwrap(),
            boot.node_id
        );
    }

    #[tokio::test]
    async fn tool_mode_without_tool_uses_placeholder() {
        let dir = TempDir::new().unwrap();
        let boot = ensure(dir.path(), &settings(DerivationMode::Tool), &NoTools)
            .await
            .unwrap();

        assert_eq!(boot.derived_by, "static");
        assert!(boot.is_placeholder());
    }

    #[tokio::test]
    async fn tool_is_preferred_when_present() {
        let dir = TempDir::new().unwrap();
        let id = "ab".repeat(64);
        let boot = ensure(dir.path(), &settings(DerivationMode::Auto), &FakeTool(id.clone()))
            .await
            .unwrap();

        assert_eq!(boot.derived_by, "tool");
        assert_eq!(boot.node_id, id);
    }

    #[tokio::test]
    async fn key_is_reused_across_runs() {
        let dir = TempDir::new().unwrap();
        let s = settings(DerivationMode::InProcess);

        let first = ensure(dir.path(), &s, &NoTools).await.unwrap();
        let second = ensure(dir.path(), &s, &NoTools).await.unwrap();

        assert_eq!(*first.seed_hex(), *second.seed_hex());
        assert_eq!(first.node_id, second.node_id);
    }

    #[tokio::test]
    async fn malformed_key_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(KEY_FILE), "not hex").unwrap();

        let err = ensure(dir.path(), &settings(DerivationMode::Auto), &NoTools)
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Bootnode(_)));
    }

    #[test]
    fn enode_url_format() {
        let boot = BootnodeIdentity {
            seed: Zeroizing::new([7u8; 32]),
            node_id: STATIC_NODE_ID.to_string(),
            derived_by: "static",
        };
        assert_eq!(
            boot.enode_url("172.16.254.2", 30301),
            format!("enode://{STATIC_NODE_ID}@172.16.254.2:30301")
        );
    }
}

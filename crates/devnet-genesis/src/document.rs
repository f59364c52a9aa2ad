//! Loading, validating and persisting genesis documents.

use crate::render::{render, Rendered, Substitutions};
use crate::{GenesisError, Result};
use devnet_keys::Address;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Where the text fed to the renderer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// The template file.
    Template,
    /// A previously rendered document, used when no template exists.
    Rendered,
}

/// Text to render and its origin.
#[derive(Debug, Clone)]
pub struct GenesisSource {
    /// What kind of file the text came from.
    pub kind: SourceKind,
    /// The file the text came from.
    pub path: PathBuf,
    /// The document text.
    pub text: String,
}

/// Reads the template, falling back to the previously rendered document.
///
/// # Errors
///
/// Returns [`GenesisError::Missing`] when neither file exists.
pub fn load_source(template: &Path, rendered: &Path) -> Result<GenesisSource> {
    if let Some(text) = read_optional(template)? {
        info!(path = %template.display(), "Using genesis template");
        return Ok(GenesisSource {
            kind: SourceKind::Template,
            path: template.to_path_buf(),
            text,
        });
    }

    if let Some(text) = read_optional(rendered)? {
        warn!(
            template = %template.display(),
            rendered = %rendered.display(),
            "Genesis template not found, re-rendering existing genesis"
        );
        return Ok(GenesisSource {
            kind: SourceKind::Rendered,
            path: rendered.to_path_buf(),
            text,
        });
    }

    Err(GenesisError::Missing {
        template: template.to_path_buf(),
        rendered: rendered.to_path_buf(),
    })
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Checks a rendered document against the geth genesis layout.
///
/// The document must be JSON, every `alloc` key must be an address, and a
/// clique network must carry `extraData` of 32 vanity bytes, at least one
/// 20-byte signer and a 65-byte seal.
///
/// # Errors
///
/// Returns [`GenesisError::Schema`] describing the first violation.
pub fn validate(document: &str) -> Result<()> {
    let value: Value = serde_json::from_str(document)
        .map_err(|e| GenesisError::Schema(format!("not valid JSON: {e}")))?;

    if let Some(alloc) = value.get("alloc") {
        let accounts = alloc
            .as_object()
            .ok_or_else(|| GenesisError::Schema("alloc is not an object".into()))?;
        for key in accounts.keys() {
            key.parse::<Address>()
                .map_err(|_| GenesisError::Schema(format!("alloc key {key:?} is not an address")))?;
        }
    }

    if value.pointer("/config/clique").is_some() {
        let extra = value
            .get("extraData")
            .or_else(|| value.get("extradata"))
            .and_then(Value::as_str)
            .ok_or_else(|| GenesisError::Schema("clique genesis without extraData".into()))?;
        validate_extra_data(extra)?;
    }

    Ok(())
}

fn validate_extra_data(extra: &str) -> Result<()> {
    const VANITY: usize = 64;
    const SEAL: usize = 130;
    const SIGNER: usize = 40;

    let digits = extra
        .strip_prefix("0x")
        .ok_or_else(|| GenesisError::Schema("extraData must start with 0x".into()))?;
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(GenesisError::Schema("extraData is not hex".into()));
    }

    match digits.len().checked_sub(VANITY + SEAL) {
        Some(signers) if signers > 0 && signers % SIGNER == 0 => Ok(()),
        _ => Err(GenesisError::Schema(format!(
            "extraData has {} hex digits, expected 64 + 40*k + 130",
            digits.len()
        ))),
    }
}

/// Writes `contents` to `path` by way of a temporary file in the same
/// directory, replacing any previous file. Readers never observe a partial
/// document, and the result is owner-only on unix.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be written or moved into place.
pub fn write_atomic(path: &Path, contents: impl AsRef<[u8]>) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_ref())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Renders the genesis template into its fixed destination.
#[derive(Debug, Clone)]
pub struct GenesisTemplater {
    template: PathBuf,
    destination: PathBuf,
}

impl GenesisTemplater {
    /// Creates a templater reading `template` and writing `destination`.
    pub fn new(template: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            template: template.into(),
            destination: destination.into(),
        }
    }

    /// The rendered document location.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Loads the source, substitutes every placeholder, validates the
    /// result and writes it to the destination.
    ///
    /// Nothing is written unless every step succeeds.
    ///
    /// # Errors
    ///
    /// Any [`GenesisError`]; missing input, unresolved placeholders and
    /// schema violations are all fatal.
    pub fn render(&self, subs: &Substitutions) -> Result<Rendered> {
        let source = load_source(&self.template, &self.destination)?;
        let rendered = render(&source.text, subs)?;
        validate(&rendered.document)?;
        write_atomic(&self.destination, &rendered.document)?;

        info!(
            path = %self.destination.display(),
            raw = rendered.raw_replacements,
            prefixed = rendered.prefixed_replacements,
            warnings = rendered.warnings.len(),
            "Genesis file updated with node addresses"
        );
        Ok(rendered)
    }
}

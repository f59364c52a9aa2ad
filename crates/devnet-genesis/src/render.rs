//! Placeholder substitution.
//!
//! A template names identities by placeholder tokens. `${NAME}` resolves to
//! the `0x`-prefixed address and is meant for account fields; `${NAME_RAW}`
//! resolves to the bare 40 hex digits and is meant for packed binary fields.

use crate::{GenesisError, Result};
use devnet_keys::Address;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::warn;

/// Suffix that selects the raw form of a placeholder.
pub const RAW_SUFFIX: &str = "_RAW";

const TOKEN: &str = r"\$\{([A-Z][A-Z0-9_]*)\}";
const VANITY_ZEROS: usize = 64;
const SEAL_ZEROS: usize = 130;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(TOKEN).expect("Invalid regex"));

// A token optionally wrapped in the vanity/seal padding of a clique extraData field.
static BOUNDED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(0x0{{{VANITY_ZEROS}}})?{TOKEN}(0{{{SEAL_ZEROS}}})?"
    ))
    .expect("Invalid regex")
});

// Anything shaped like a placeholder, including names the substitution passes never match.
static ANY_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]*)\}").expect("Invalid regex"));

static PACKED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(0x0{{{VANITY_ZEROS}}}){TOKEN}(0{{{SEAL_ZEROS}}})"))
        .expect("Invalid regex")
});

/// Placeholder names mapped to the addresses they resolve to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions {
    entries: BTreeMap<String, Address>,
}

impl Substitutions {
    /// Creates an empty substitution set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a placeholder name, e.g. `VALIDATOR_ADDRESS`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, address: Address) -> Self {
        self.insert(name, address);
        self
    }

    /// Adds a placeholder name, replacing any previous address for it.
    pub fn insert(&mut self, name: impl Into<String>, address: Address) {
        self.entries.insert(name.into(), address);
    }

    /// Looks up the address for a placeholder name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Address> {
        self.entries.get(name)
    }

    fn raw(&self, token_name: &str) -> Option<String> {
        let name = token_name.strip_suffix(RAW_SUFFIX)?;
        self.get(name).map(Address::raw)
    }
}

/// A degraded-but-accepted substitution made while rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderWarning {
    /// A prefixed placeholder sat inside a zero-padded packed field and was
    /// replaced with the raw address instead.
    StructuralSubstitution {
        /// The placeholder name that was found.
        placeholder: String,
    },
}

impl fmt::Display for RenderWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StructuralSubstitution { placeholder } => write!(
                f,
                "${{{placeholder}}} found in a packed extraData field; substituted the raw address \
                 (use ${{{placeholder}{RAW_SUFFIX}}} there)"
            ),
        }
    }
}

/// Output of [`render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// The rendered document text.
    pub document: String,
    /// Raw-form placeholders replaced.
    pub raw_replacements: usize,
    /// Prefixed-form placeholders replaced.
    pub prefixed_replacements: usize,
    /// Structural fallbacks applied.
    pub warnings: Vec<RenderWarning>,
}

/// Substitutes every placeholder in `template`.
///
/// Runs raw tokens first, then prefixed tokens outside packed fields, then
/// the structural fallback for prefixed tokens found inside a packed
/// `0x<64 zeros><token><130 zeros>` field. A document with no placeholders
/// renders to itself.
///
/// # Errors
///
/// Returns [`GenesisError::Unresolved`] listing every token still present
/// after the passes.
pub fn render(template: &str, subs: &Substitutions) -> Result<Rendered> {
    let mut raw_replacements = 0;
    let document = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        match subs.raw(&caps[1]) {
            Some(raw) => {
                raw_replacements += 1;
                raw
            }
            None => caps[0].to_string(),
        }
    });

    let mut prefixed_replacements = 0;
    let document = BOUNDED.replace_all(&document, |caps: &Captures<'_>| {
        let (pre, post) = (caps.get(1), caps.get(3));
        match subs.get(&caps[2]) {
            Some(address) if pre.is_none() || post.is_none() => {
                prefixed_replacements += 1;
                format!(
                    "{}{}{}",
                    pre.map_or("", |m| m.as_str()),
                    address.prefixed(),
                    post.map_or("", |m| m.as_str())
                )
            }
            _ => caps[0].to_string(),
        }
    });

    let mut warnings = Vec::new();
    let document = PACKED.replace_all(&document, |caps: &Captures<'_>| match subs.get(&caps[2]) {
        Some(address) => {
            let warning = RenderWarning::StructuralSubstitution {
                placeholder: caps[2].to_string(),
            };
            warn!(%warning, "Structural genesis substitution");
            warnings.push(warning);
            format!("{}{}{}", &caps[1], address.raw(), &caps[3])
        }
        None => caps[0].to_string(),
    });

    let unresolved: BTreeSet<String> = ANY_PLACEHOLDER
        .captures_iter(&document)
        .map(|caps| caps[1].to_string())
        .collect();
    if !unresolved.is_empty() {
        return Err(GenesisError::Unresolved(unresolved.into_iter().collect()));
    }

    Ok(Rendered {
        document: document.into_owned(),
        raw_replacements,
        prefixed_replacements,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn packed_field(inner: &str) -> String {
        format!("0x{}{inner}{}", "0".repeat(64), "0".repeat(130))
    }

    #[test]
    fn raw_and_prefixed_forms() {
        let a = addr(0xab);
        let subs = Substitutions::new().with("VALIDATOR_ADDRESS", a);
        let template = format!(
            r#"{{"extraData":"{}","alloc":{{"${{VALIDATOR_ADDRESS}}":{{"balance":"1"}}}}}}"#,
            packed_field("${VALIDATOR_ADDRESS_RAW}")
        );

        let out = render(&template, &subs).unwrap();

        assert!(out.document.contains(&packed_field(&a.raw())));
        assert!(out.document.contains(&format!("\"{}\":", a.prefixed())));
        assert_eq!(out.raw_replacements, 1);
        assert_eq!(out.prefixed_replacements, 1);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn render_is_idempotent() {
        let subs = Substitutions::new()
            .with("VALIDATOR_ADDRESS", addr(1))
            .with("RPC_ADDRESS", addr(2));
        let template = r#"{"a":"${VALIDATOR_ADDRESS}","b":"${RPC_ADDRESS_RAW}"}"#;

        let first = render(template, &subs).unwrap();
        let second = render(&first.document, &subs).unwrap();

        assert_eq!(first.document, second.document);
        assert_eq!(second.raw_replacements, 0);
        assert_eq!(second.prefixed_replacements, 0);
    }

    #[test]
    fn document_without_placeholders_is_unchanged() {
        let doc = r#"{"config":{"chainId":1337}}"#;
        let out = render(doc, &Substitutions::new()).unwrap();
        assert_eq!(out.document, doc);
    }

    #[test]
    fn unresolved_tokens_are_an_error() {
        let subs = Substitutions::new().with("VALIDATOR_ADDRESS", addr(1));
        let template = r#"{"a":"${VALIDATOR_ADDRESS}","b":"${NODE7_ADDRESS}","c":"${NODE7_ADDRESS_RAW}"}"#;

        let err = render(template, &subs).unwrap_err();
        match err {
            GenesisError::Unresolved(names) => {
                assert_eq!(names, vec!["NODE7_ADDRESS", "NODE7_ADDRESS_RAW"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_placeholders_are_unresolved() {
        let subs = Substitutions::new().with("VALIDATOR_ADDRESS", addr(1));
        let template = r#"{"a":"${validator_address}","b":"${Node1_Address}","c":"${}"}"#;

        let err = render(template, &subs).unwrap_err();
        match err {
            GenesisError::Unresolved(names) => {
                assert_eq!(names, vec!["", "Node1_Address", "validator_address"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn prefixed_token_in_packed_field_falls_back_to_raw() {
        let a = addr(0xcd);
        let subs = Substitutions::new().with("VALIDATOR_ADDRESS", a);
        let template = format!(
            r#"{{"extraData":"{}","alloc":{{"${{VALIDATOR_ADDRESS}}":{{}}}}}}"#,
            packed_field("${VALIDATOR_ADDRESS}")
        );

        let out = render(&template, &subs).unwrap();

        assert!(out.document.contains(&packed_field(&a.raw())));
        assert!(!out.document.contains(&format!("0x{}0x", "0".repeat(64))));
        assert_eq!(out.prefixed_replacements, 1);
        assert_eq!(
            out.warnings,
            vec![RenderWarning::StructuralSubstitution {
                placeholder: "VALIDATOR_ADDRESS".into()
            }]
        );
    }

    #[test]
    fn partially_padded_token_uses_prefixed_form() {
        let a = addr(0x11);
        let subs = Substitutions::new().with("RPC_ADDRESS", a);
        let template = format!("0x{}${{RPC_ADDRESS}}", "0".repeat(64));

        let out = render(&template, &subs).unwrap();

        assert_eq!(out.document, format!("0x{}{}", "0".repeat(64), a.prefixed()));
        assert!(out.warnings.is_empty());
    }
}

// Algorithm catalog - Post-quantum key-exchange groups known to the probe

use crate::Result;
use crate::error::ProbeError;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// One post-quantum key-exchange algorithm the external client can offer.
///
/// `requires_legacy_env` marks draft/experimental codepoints the client only
/// recognizes when an environment variable named `legacy_env_var` is set to
/// `default_group_id` at process-launch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmEntry {
    pub name: String,
    pub default_group_id: u16,
    pub enabled: bool,
    pub legacy_env_var: Option<String>,
    pub requires_legacy_env: bool,
}

impl AlgorithmEntry {
    /// Group id formatted the way it appears in probe output (0xNNNN)
    pub fn group_id_hex(&self) -> String {
        format!("0x{:04X}", self.default_group_id)
    }
}

/// Ordered, read-only collection of algorithm entries.
///
/// Loaded once and shared (via `Arc`) across all concurrent probe attempts;
/// never mutated after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmCatalog {
    entries: Vec<AlgorithmEntry>,
}

impl AlgorithmCatalog {
    pub fn new(entries: Vec<AlgorithmEntry>) -> Self {
        Self { entries }
    }

    /// Built-in catalog covering the standardized ML-KEM groups, the hybrid
    /// codepoints, and the draft oqs-provider codepoints that need an
    /// OQS_CODEPOINT_* environment variable to be recognized.
    pub fn builtin() -> Self {
        let modern = |name: &str, id: u16| AlgorithmEntry {
            name: name.to_string(),
            default_group_id: id,
            enabled: true,
            legacy_env_var: None,
            requires_legacy_env: false,
        };
        let legacy = |name: &str, id: u16, env: &str| AlgorithmEntry {
            name: name.to_string(),
            default_group_id: id,
            enabled: true,
            legacy_env_var: Some(env.to_string()),
            requires_legacy_env: true,
        };

        Self::new(vec![
            modern("X25519MLKEM768", 0x11EC),
            modern("SecP256r1MLKEM768", 0x11EB),
            modern("SecP384r1MLKEM1024", 0x11ED),
            modern("mlkem512", 0x0200),
            modern("mlkem768", 0x0201),
            modern("mlkem1024", 0x0202),
            legacy("x25519_kyber768", 0x6399, "OQS_CODEPOINT_X25519_KYBER768"),
            legacy("kyber768", 0x023A, "OQS_CODEPOINT_KYBER768"),
            legacy("frodo640aes", 0x0230, "OQS_CODEPOINT_FRODO640AES"),
            legacy("bikel1", 0x0241, "OQS_CODEPOINT_BIKEL1"),
            legacy("hqc128", 0x0244, "OQS_CODEPOINT_HQC128"),
        ])
    }

    /// Load a catalog from a CSV file.
    ///
    /// Columns: `name,group_id,enabled,legacy_env_var,requires_legacy_env`.
    /// Group ids accept decimal or 0x-prefixed hex. Blank lines and `#`
    /// comments are tolerated. Mapping is explicit field-by-field; there is
    /// deliberately no generic record deserialization here.
    pub fn from_csv_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref()).map_err(|source| ProbeError::Io { source })?;
        Self::from_csv_reader(file)
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .flexible(true)
            .from_reader(reader);

        let mut entries = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(ProbeError::Csv)?;
            if record.iter().all(|f| f.is_empty()) {
                continue;
            }

            let name = field(&record, 0, "name")?.to_string();
            let default_group_id = parse_group_id(field(&record, 1, "group_id")?)?;
            let enabled = parse_bool(field(&record, 2, "enabled")?)?;
            let legacy_env_var = match record.get(3) {
                Some("") | None => None,
                Some(var) => Some(var.to_string()),
            };
            let requires_legacy_env = match record.get(4) {
                Some("") | None => legacy_env_var.is_some(),
                Some(raw) => parse_bool(raw)?,
            };

            if requires_legacy_env && legacy_env_var.is_none() {
                return Err(ProbeError::Config {
                    message: format!("algorithm '{}' requires a legacy env var but names none", name),
                }
                .into());
            }

            entries.push(AlgorithmEntry {
                name,
                default_group_id,
                enabled,
                legacy_env_var,
                requires_legacy_env,
            });
        }

        if entries.is_empty() {
            return Err(ProbeError::Config {
                message: "algorithm catalog is empty".to_string(),
            }
            .into());
        }

        Ok(Self::new(entries))
    }

    pub fn entries(&self) -> &[AlgorithmEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All enabled entries, in catalog order
    pub fn enabled(&self) -> Vec<&AlgorithmEntry> {
        self.entries.iter().filter(|e| e.enabled).collect()
    }

    /// Enabled entries offerable in one batched colon-list (no legacy env var)
    pub fn modern_enabled(&self) -> Vec<&AlgorithmEntry> {
        self.entries
            .iter()
            .filter(|e| e.enabled && !e.requires_legacy_env)
            .collect()
    }

    /// Enabled entries that must be tested one-by-one with their env var set
    pub fn legacy_enabled(&self) -> Vec<&AlgorithmEntry> {
        self.entries
            .iter()
            .filter(|e| e.enabled && e.requires_legacy_env)
            .collect()
    }

    /// Match a negotiated group id against the enabled subset.
    ///
    /// Classical curve ids are never present in the catalog, so `None` is
    /// itself the "not quantum-safe" signal.
    pub fn match_group(&self, group_id: u16) -> Option<&AlgorithmEntry> {
        self.entries
            .iter()
            .find(|e| e.enabled && e.default_group_id == group_id)
    }

    /// Look up an entry by name (case-insensitive)
    pub fn find(&self, name: &str) -> Option<&AlgorithmEntry> {
        self.entries.iter().find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Resolve an explicit caller-supplied algorithm list, failing on names
    /// the catalog does not know.
    pub fn subset(&self, names: &[String]) -> Result<Vec<&AlgorithmEntry>> {
        names
            .iter()
            .map(|name| {
                self.find(name).ok_or_else(|| {
                    ProbeError::InvalidInput {
                        message: format!("unknown algorithm '{}'", name),
                    }
                    .into()
                })
            })
            .collect()
    }
}

fn field<'a>(record: &'a csv::StringRecord, idx: usize, name: &str) -> Result<&'a str> {
    match record.get(idx) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ProbeError::Config {
            message: format!("catalog record missing '{}' field: {:?}", name, record),
        }
        .into()),
    }
}

fn parse_group_id(raw: &str) -> Result<u16> {
    let parsed = if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16)
    } else {
        raw.parse::<u16>()
    };
    parsed.map_err(|e| {
        ProbeError::Config {
            message: format!("invalid group id '{}': {}", raw, e),
        }
        .into()
    })
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(ProbeError::Config {
            message: format!("invalid boolean '{}'", other),
        }
        .into()),
    }
}

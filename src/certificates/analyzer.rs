// Certificate analyzer - Classifies X.509 signature/public-key algorithms as
// quantum-safe from the PEM output of the external TLS client.
//
// Only the leaf certificate is summarized; the rest of the chain is parsed
// just far enough to be counted. No validation or trust-chain verification
// happens here.

use crate::constants::{PEM_BEGIN_CERTIFICATE, PEM_END_CERTIFICATE};
use crate::error::ProbeError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};
use x509_parser::der_parser::oid::Oid;
use x509_parser::prelude::*;

/// Name fragments of known post-quantum signature/KEM families,
/// matched case-insensitively against algorithm names.
pub const PQ_NAME_FRAGMENTS: &[&str] = &[
    "dilithium",
    "falcon",
    "sphincs",
    "ml-dsa",
    "mldsa",
    "slh-dsa",
    "slhdsa",
    "ml-kem",
    "mlkem",
    "kyber",
    "mayo",
    "cross",
    "xmss",
    "hss",
    "lms",
    "picnic",
    "rainbow",
    "snova",
    "frodo",
    "bike",
    "hqc",
    "mceliece",
    "ntru",
];

/// OID prefixes of post-quantum algorithm arcs:
/// the CRYSTALS arc (1.3.6.1.4.1.2.267) and the OQS experimental arc
/// (1.3.9999). The NIST arc is range-checked separately, its neighbours are
/// classical DSA/ECDSA identifiers.
pub const PQ_OID_PREFIXES: &[&str] = &["1.3.6.1.4.1.2.267.", "1.3.9999."];

/// Summary of the leaf certificate of a presented chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateSummary {
    pub subject: String,
    pub issuer: String,
    pub not_before: String,
    pub not_after: String,
    pub signature_algorithm_name: String,
    pub signature_algorithm_oid: String,
    pub public_key_algorithm_name: String,
    pub public_key_algorithm_oid: String,
    pub signature_is_quantum_safe: bool,
    pub public_key_is_quantum_safe: bool,
    pub chain_length: usize,
}

impl CertificateSummary {
    /// Convenience verdict: either the signature or the key is quantum-safe
    pub fn is_quantum_safe(&self) -> bool {
        self.signature_is_quantum_safe || self.public_key_is_quantum_safe
    }
}

/// Classifies certificates from raw client output
#[derive(Debug, Clone, Default)]
pub struct CertificateAnalyzer {
    /// Caller-supplied oid -> algorithm-name overrides; an overridden oid is
    /// always treated as quantum-safe
    overrides: HashMap<String, String>,
}

impl CertificateAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides(overrides: HashMap<String, String>) -> Self {
        Self { overrides }
    }

    /// Extract every PEM certificate block from client output, in chain
    /// order (leaf first)
    pub fn extract_pem_blocks(text: &str) -> Vec<String> {
        let mut blocks = Vec::new();
        let mut current = String::new();
        let mut in_block = false;

        for line in text.lines() {
            if line.contains(PEM_BEGIN_CERTIFICATE) {
                in_block = true;
                current.clear();
                current.push_str(line.trim());
                current.push('\n');
            } else if line.contains(PEM_END_CERTIFICATE) && in_block {
                current.push_str(line.trim());
                current.push('\n');
                blocks.push(current.clone());
                in_block = false;
            } else if in_block {
                current.push_str(line.trim());
                current.push('\n');
            }
        }

        blocks
    }

    /// Analyze a client transcript containing one or more PEM blocks.
    ///
    /// Malformed blocks are skipped, not fatal; the summary is built from the
    /// first block that parses (the leaf). Remaining blocks only contribute
    /// to the chain length.
    pub fn analyze(&self, transcript: &str) -> Result<CertificateSummary, ProbeError> {
        let blocks = Self::extract_pem_blocks(transcript);
        if blocks.is_empty() {
            return Err(ProbeError::CertificateParse {
                details: "no certificate blocks in client output".to_string(),
            });
        }

        let mut decoded = Vec::new();
        for (idx, block) in blocks.iter().enumerate() {
            match ::pem::parse(block.as_bytes()) {
                Ok(p) => decoded.push(p.contents().to_vec()),
                Err(e) => {
                    warn!(index = idx, error = %e, "skipping malformed PEM block");
                }
            }
        }

        let mut chain_length = 0usize;
        let mut leaf: Option<CertificateSummary> = None;

        for (idx, der) in decoded.iter().enumerate() {
            match parse_x509_certificate(der) {
                Ok((_, cert)) => {
                    chain_length += 1;
                    if leaf.is_none() {
                        leaf = Some(self.summarize_leaf(&cert));
                    }
                    // Non-leaf certificates are counted and released
                }
                Err(e) => {
                    warn!(index = idx, error = %e, "skipping undecodable certificate");
                }
            }
        }

        let mut summary = leaf.ok_or_else(|| ProbeError::CertificateParse {
            details: format!(
                "none of the {} certificate blocks decoded",
                blocks.len()
            ),
        })?;
        summary.chain_length = chain_length;

        debug!(
            subject = %summary.subject,
            signature = %summary.signature_algorithm_name,
            quantum_safe = summary.is_quantum_safe(),
            chain_length,
            "certificate chain analyzed"
        );

        Ok(summary)
    }

    fn summarize_leaf(&self, cert: &X509Certificate<'_>) -> CertificateSummary {
        let sig_oid = cert.signature_algorithm.algorithm.to_id_string();
        let sig_name = self.algorithm_name(&cert.signature_algorithm.algorithm, &sig_oid);

        let pk_alg = &cert.tbs_certificate.subject_pki.algorithm.algorithm;
        let pk_oid = pk_alg.to_id_string();
        let pk_name = self.algorithm_name(pk_alg, &pk_oid);

        CertificateSummary {
            subject: subject_identity(cert),
            issuer: cert.issuer().to_string(),
            not_before: cert.validity().not_before.to_string(),
            not_after: cert.validity().not_after.to_string(),
            signature_is_quantum_safe: self.is_quantum_safe_algorithm(&sig_name, &sig_oid),
            public_key_is_quantum_safe: self.is_quantum_safe_algorithm(&pk_name, &pk_oid),
            signature_algorithm_name: sig_name,
            signature_algorithm_oid: sig_oid,
            public_key_algorithm_name: pk_name,
            public_key_algorithm_oid: pk_oid,
            chain_length: 0,
        }
    }

    /// Human name for an algorithm oid: override table first, then the oid
    /// registry, then the dotted oid itself (draft PQ oids are usually
    /// unknown to the registry).
    fn algorithm_name(&self, oid: &Oid<'_>, oid_str: &str) -> String {
        if let Some(name) = self.overrides.get(oid_str) {
            return name.clone();
        }
        match x509_parser::objects::oid2sn(oid, x509_parser::objects::oid_registry()) {
            Ok(name) => name.to_string(),
            Err(_) => oid_str.to_string(),
        }
    }

    /// An algorithm is quantum-safe when its name carries a known PQ family
    /// fragment, its oid falls under a known PQ arc, or the caller override
    /// table names it.
    pub fn is_quantum_safe_algorithm(&self, name: &str, oid: &str) -> bool {
        self.overrides.contains_key(oid)
            || Self::is_quantum_safe_name(name)
            || Self::is_quantum_safe_oid(oid)
    }

    pub fn is_quantum_safe_name(name: &str) -> bool {
        let lowered = name.to_ascii_lowercase();
        PQ_NAME_FRAGMENTS.iter().any(|frag| lowered.contains(frag))
    }

    pub fn is_quantum_safe_oid(oid: &str) -> bool {
        if PQ_OID_PREFIXES.iter().any(|p| oid.starts_with(p)) {
            return true;
        }
        // NIST signature arc: 2.16.840.1.101.3.4.3.{17..35} covers
        // ML-DSA-44/65/87 and the SLH-DSA parameter sets; lower values in the
        // same arc are classical DSA variants.
        if let Some(rest) = oid.strip_prefix("2.16.840.1.101.3.4.3.") {
            if let Ok(last) = rest.parse::<u32>() {
                return (17..=35).contains(&last);
            }
        }
        false
    }
}

/// Prefer a DNS-name-style identity from the SAN extension, falling back to
/// the distinguished name string.
fn subject_identity(cert: &X509Certificate<'_>) -> String {
    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for name in &san.value.general_names {
            if let GeneralName::DNSName(dns) = name {
                return dns.to_string();
            }
        }
    }
    cert.subject().to_string()
}

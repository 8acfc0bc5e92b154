// Integration tests for certificate chain classification.
//
// Builds a minimal DER certificate by hand (v1, empty names, zero-bit
// signature) so the PQ classification can be exercised without fixture
// files or a quantum-capable CA.

use qsprobe::certificates::CertificateAnalyzer;
use std::collections::HashMap;

// dilithium3: 1.3.6.1.4.1.2.267.7.6.5
const OID_DILITHIUM3: &[u8] = &[0x2B, 0x06, 0x01, 0x04, 0x01, 0x02, 0x82, 0x0B, 0x07, 0x06, 0x05];
// rsaEncryption: 1.2.840.113549.1.1.1
const OID_RSA_ENCRYPTION: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x01];

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xFF {
        out.push(0x81);
        out.push(len as u8);
    } else {
        out.push(0x82);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    }
    out.extend_from_slice(content);
    out
}

fn sequence(parts: &[Vec<u8>]) -> Vec<u8> {
    tlv(0x30, &parts.concat())
}

fn algorithm_identifier(oid: &[u8], null_params: bool) -> Vec<u8> {
    let mut parts = vec![tlv(0x06, oid)];
    if null_params {
        parts.push(vec![0x05, 0x00]);
    }
    sequence(&parts)
}

fn utc_time(stamp: &str) -> Vec<u8> {
    tlv(0x17, stamp.as_bytes())
}

/// Minimal v1 certificate signed with the given algorithm. The signature
/// bits are zeroes; the analyzer never verifies them.
fn build_certificate(sig_oid: &[u8]) -> Vec<u8> {
    let empty_name = sequence(&[]);
    let tbs = sequence(&[
        tlv(0x02, &[0x01]), // serialNumber
        algorithm_identifier(sig_oid, false),
        empty_name.clone(), // issuer
        sequence(&[utc_time("260101000000Z"), utc_time("270101000000Z")]),
        empty_name, // subject
        sequence(&[
            algorithm_identifier(OID_RSA_ENCRYPTION, true),
            tlv(0x03, &[0x00, 0x00]), // subjectPublicKey, 0 unused bits
        ]),
    ]);
    sequence(&[
        tbs,
        algorithm_identifier(sig_oid, false),
        tlv(0x03, &[0x00, 0x00]), // signatureValue
    ])
}

fn pem_block(der: &[u8]) -> String {
    pem::encode(&pem::Pem::new("CERTIFICATE", der.to_vec()))
}

#[test]
fn test_dilithium_signed_leaf_is_quantum_safe() {
    let der = build_certificate(OID_DILITHIUM3);
    let transcript = format!(
        "CONNECTED(00000003)\n{}Verify return code: 18 (self-signed certificate)\n",
        pem_block(&der)
    );

    let analyzer = CertificateAnalyzer::new();
    let summary = analyzer.analyze(&transcript).unwrap();

    assert_eq!(summary.signature_algorithm_oid, "1.3.6.1.4.1.2.267.7.6.5");
    assert!(summary.signature_is_quantum_safe);
    // RSA public key on a PQ-signed cert: the key verdict stays negative
    assert_eq!(summary.public_key_algorithm_oid, "1.2.840.113549.1.1.1");
    assert!(!summary.public_key_is_quantum_safe);
    assert!(summary.is_quantum_safe());
    assert_eq!(summary.chain_length, 1);
}

#[test]
fn test_malformed_leading_block_is_skipped() {
    let der = build_certificate(OID_DILITHIUM3);
    let transcript = format!(
        "-----BEGIN CERTIFICATE-----\n!!not base64!!\n-----END CERTIFICATE-----\n{}",
        pem_block(&der)
    );

    let analyzer = CertificateAnalyzer::new();
    let summary = analyzer.analyze(&transcript).unwrap();
    assert!(summary.signature_is_quantum_safe);
    assert_eq!(summary.chain_length, 1);
}

#[test]
fn test_chain_length_counts_every_decoded_certificate() {
    let leaf = pem_block(&build_certificate(OID_DILITHIUM3));
    let issuer = pem_block(&build_certificate(OID_DILITHIUM3));
    let transcript = format!("{}{}", leaf, issuer);

    let analyzer = CertificateAnalyzer::new();
    let summary = analyzer.analyze(&transcript).unwrap();
    assert_eq!(summary.chain_length, 2);
}

#[test]
fn test_override_table_forces_classification() {
    // A vendor OID unknown to every registry
    const OID_VENDOR: &[u8] = &[0x2A, 0x03, 0x04, 0x05];
    let der = build_certificate(OID_VENDOR);
    let transcript = pem_block(&der);

    let plain = CertificateAnalyzer::new();
    let summary = plain.analyze(&transcript).unwrap();
    assert!(!summary.signature_is_quantum_safe);

    let mut overrides = HashMap::new();
    overrides.insert(
        summary.signature_algorithm_oid.clone(),
        "vendor-pq-sig".to_string(),
    );
    let tuned = CertificateAnalyzer::with_overrides(overrides);
    let summary = tuned.analyze(&transcript).unwrap();
    assert!(summary.signature_is_quantum_safe);
    assert_eq!(summary.signature_algorithm_name, "vendor-pq-sig");
}

#[test]
fn test_transcript_without_certificates_errors() {
    let analyzer = CertificateAnalyzer::new();
    assert!(analyzer
        .analyze("CONNECTED(00000003)\nVerify return code: 0 (ok)\n")
        .is_err());
}

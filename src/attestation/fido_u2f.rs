//! `fido-u2f` attestation: the legacy U2F attestation statement
//! format, carried forward for authenticators that predate WebAuthn.

use std::collections::BTreeMap;

use openssl::sha::Sha1;
use openssl::x509::X509;

use super::AttestationResult;
use crate::authenticator_data::AuthenticatorData;
use crate::cbor::{cbor_try_bytes, Value};
use crate::challenge::AttestationType;
use crate::cose::{COSEKeyType, ECDSACurve};
use crate::crypto;
use crate::error::{WebauthnError, WebauthnResult};
use crate::metadata::{MetadataAttestationType, MetadataIndex};

/// ACKI is SHA-1 of the certificate's `subjectPublicKey` BIT STRING payload
/// alone (RFC 5280 §4.2.1.2 method 1) — not the whole SubjectPublicKeyInfo
/// DER, which also carries the AlgorithmIdentifier.
fn compute_acki(leaf: &X509) -> WebauthnResult<[u8; 20]> {
    let der_bytes = leaf.to_der()?;
    let (_, x509_cert) = x509_parser::parse_x509_certificate(&der_bytes)
        .map_err(|_| WebauthnError::AttestationStatementX5cInvalid("fido_u2f"))?;
    let mut hasher = Sha1::new();
    hasher.update(&x509_cert.tbs_certificate.subject_pki.subject_public_key.data);
    Ok(hasher.finish())
}

pub(super) fn verify(
    stmt_map: &BTreeMap<Value, Value>,
    auth_data: &AuthenticatorData,
    client_data_hash: &[u8; 32],
    verify_trust_root: bool,
    metadata_index: &dyn MetadataIndex,
) -> WebauthnResult<AttestationResult> {
    if stmt_map.len() != 2 {
        return Err(WebauthnError::AttestationStatementShapeInvalid);
    }

    let sig_value = stmt_map
        .get(&Value::Text("sig".into()))
        .ok_or(WebauthnError::AttestationStatementShapeInvalid)?;
    let sig = cbor_try_bytes!(sig_value)?;

    let x5c_value = stmt_map
        .get(&Value::Text("x5c".into()))
        .ok_or(WebauthnError::AttestationStatementShapeInvalid)?;
    let x5c_array = match x5c_value {
        Value::Array(a) => a,
        _ => return Err(WebauthnError::AttestationStatementShapeInvalid),
    };
    if x5c_array.len() != 1 {
        return Err(WebauthnError::AttestationStatementShapeInvalid);
    }
    let leaf_der = cbor_try_bytes!(&x5c_array[0])?;
    let leaf = X509::from_der(leaf_der)
        .map_err(|_| WebauthnError::AttestationStatementX5cInvalid("fido_u2f"))?;

    crypto::assert_fido_u2f_attest_req(&leaf)?;

    let attested = auth_data
        .attested_credential_data
        .as_ref()
        .ok_or(WebauthnError::InvalidAuthenticatorData)?;

    let ec2k = match &attested.credential_public_key.key {
        COSEKeyType::EC_EC2(k) if k.curve == ECDSACurve::SECP256R1 => k,
        _ => return Err(WebauthnError::AttestationInvalidPublicKeyAlgorithm("fido_u2f")),
    };
    let public_key_u2f = attested.credential_public_key.get_alg_key_ecc_x962_raw()?;
    let _ = ec2k;

    let mut verification_data = Vec::with_capacity(1 + 32 + 32 + attested.credential_id.len() + 65);
    verification_data.push(0x00);
    verification_data.extend_from_slice(&auth_data.rp_id_hash);
    verification_data.extend_from_slice(client_data_hash);
    verification_data.extend_from_slice(&attested.credential_id);
    verification_data.extend_from_slice(&public_key_u2f);

    if !crypto::verify_signature(crate::cose::COSEAlgorithm::ES256, &leaf, sig, &verification_data)? {
        return Err(WebauthnError::AttestationInvalidSignature("fido_u2f"));
    }

    if verify_trust_root {
        let acki = compute_acki(&leaf)?;
        let statement = metadata_index
            .by_acki(&acki)
            .ok_or(WebauthnError::NoAttestationMetadataStatementFound)?;
        let type_ = match statement.preferred_attestation_type() {
            Some(MetadataAttestationType::BasicFull) => AttestationType::Basic,
            Some(MetadataAttestationType::Attca) => AttestationType::Attca,
            None => AttestationType::Uncertain,
        };
        Ok(AttestationResult {
            type_,
            trust_path: vec![leaf.to_der()?],
            metadata: Some(statement.clone()),
        })
    } else {
        Ok(AttestationResult {
            type_: AttestationType::Uncertain,
            trust_path: vec![leaf.to_der()?],
            metadata: None,
        })
    }
}

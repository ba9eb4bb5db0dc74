//! `android-safetynet` attestation: the statement wraps a signed
//! JWS produced by Google Play services, rather than signing the
//! authenticator data directly.

use std::collections::BTreeMap;

use base64::Engine;
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::{X509StoreContext, X509};
use serde::Deserialize;

use super::AttestationResult;
use crate::authenticator_data::AuthenticatorData;
use crate::cbor::{cbor_try_bytes, cbor_try_string, Value};
use crate::challenge::AttestationType;
use crate::cose::COSEAlgorithm;
use crate::crypto::{self, compute_sha256};
use crate::error::{WebauthnError, WebauthnResult};

const ATTEST_ANDROID_HOSTNAME: &str = "attest.android.com";

#[derive(Debug, Deserialize)]
struct JwsHeader {
    alg: String,
    x5c: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct JwsPayload {
    nonce: String,
    #[serde(rename = "ctsProfileMatch")]
    cts_profile_match: bool,
}

fn alg_from_jws(alg: &str) -> WebauthnResult<COSEAlgorithm> {
    match alg {
        "RS256" => Ok(COSEAlgorithm::RS256),
        "ES256" => Ok(COSEAlgorithm::ES256),
        _ => Err(WebauthnError::AttestationInvalidPublicKeyAlgorithm("android_safetynet")),
    }
}

fn leaf_has_attest_android_san(leaf: &X509) -> bool {
    match leaf.subject_alt_names() {
        Some(sans) => sans
            .iter()
            .any(|n| n.dnsname() == Some(ATTEST_ANDROID_HOSTNAME)),
        None => false,
    }
}

fn verify_trust_path(leaf: &X509, chain: &[X509], roots: &[Vec<u8>]) -> WebauthnResult<bool> {
    for root_der in roots {
        let root = match X509::from_der(root_der) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let mut builder = X509StoreBuilder::new()?;
        builder.add_cert(root)?;
        let store = builder.build();

        let mut untrusted = Stack::new()?;
        for cert in chain {
            untrusted.push(cert.clone())?;
        }

        let mut ctx = X509StoreContext::new()?;
        if ctx.init(&store, leaf, &untrusted, |c| c.verify_cert())? {
            return Ok(true);
        }
    }
    Ok(false)
}

pub(super) fn verify(
    stmt_map: &BTreeMap<Value, Value>,
    auth_data: &AuthenticatorData,
    client_data_hash: &[u8; 32],
    verify_trust_root: bool,
    root_certificates: &[Vec<u8>],
) -> WebauthnResult<AttestationResult> {
    if stmt_map.len() != 2 {
        return Err(WebauthnError::AttestationStatementShapeInvalid);
    }

    let _ver = cbor_try_string!(stmt_map
        .get(&Value::Text("ver".into()))
        .ok_or(WebauthnError::AttestationStatementShapeInvalid)?)?;

    let response = cbor_try_bytes!(stmt_map
        .get(&Value::Text("response".into()))
        .ok_or(WebauthnError::AttestationStatementShapeInvalid)?)?;

    let jws = std::str::from_utf8(response).map_err(|_| WebauthnError::AttestationStatementShapeInvalid)?;
    let mut parts = jws.split('.');
    let (header_b64, payload_b64, sig_b64) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) => (h, p, s),
        _ => return Err(WebauthnError::AttestationStatementShapeInvalid),
    };

    let url_engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let std_engine = base64::engine::general_purpose::STANDARD;

    let header_bytes = url_engine
        .decode(header_b64)
        .map_err(|_| WebauthnError::AttestationStatementShapeInvalid)?;
    let payload_bytes = url_engine
        .decode(payload_b64)
        .map_err(|_| WebauthnError::AttestationStatementShapeInvalid)?;
    let signature = url_engine
        .decode(sig_b64)
        .map_err(|_| WebauthnError::AttestationStatementShapeInvalid)?;

    let header: JwsHeader =
        serde_json::from_slice(&header_bytes).map_err(|_| WebauthnError::AttestationStatementShapeInvalid)?;
    let payload: JwsPayload =
        serde_json::from_slice(&payload_bytes).map_err(|_| WebauthnError::AttestationStatementShapeInvalid)?;

    if !payload.cts_profile_match {
        return Err(WebauthnError::AttestationCertificateRequirementsNotMet("android_safetynet"));
    }

    let mut nonce_input = auth_data.raw_bytes.clone();
    nonce_input.extend_from_slice(client_data_hash);
    let expected_nonce = std_engine.encode(compute_sha256(&nonce_input));
    if payload.nonce != expected_nonce {
        return Err(WebauthnError::AttestationCertificateRequirementsNotMet("android_safetynet"));
    }

    if header.x5c.is_empty() {
        return Err(WebauthnError::AttestationStatementX5cInvalid("android_safetynet"));
    }
    let certs: Vec<X509> = header
        .x5c
        .iter()
        .map(|b64| {
            std_engine
                .decode(b64)
                .map_err(|_| WebauthnError::AttestationStatementX5cInvalid("android_safetynet"))
                .and_then(|der| {
                    X509::from_der(&der)
                        .map_err(|_| WebauthnError::AttestationStatementX5cInvalid("android_safetynet"))
                })
        })
        .collect::<WebauthnResult<_>>()?;
    let leaf = &certs[0];

    if !leaf_has_attest_android_san(leaf) {
        return Err(WebauthnError::AttestationCertificateRequirementsNotMet("android_safetynet"));
    }

    let alg = alg_from_jws(&header.alg)?;
    let signing_input = format!("{header_b64}.{payload_b64}");
    if !crypto::verify_signature(alg, leaf, &signature, signing_input.as_bytes())? {
        return Err(WebauthnError::AttestationInvalidSignature("android_safetynet"));
    }

    if verify_trust_root {
        if root_certificates.is_empty() {
            return Err(WebauthnError::RootTrustCertificateNotFound("android_safetynet"));
        }
        let verified = verify_trust_path(leaf, &certs[1..], root_certificates)?;
        if !verified {
            return Err(WebauthnError::RootTrustCertificateNotFound("android_safetynet"));
        }
        Ok(AttestationResult {
            type_: AttestationType::Basic,
            trust_path: certs.iter().map(|c| c.to_der()).collect::<Result<_, _>>()?,
            metadata: None,
        })
    } else {
        Ok(AttestationResult {
            type_: AttestationType::Uncertain,
            trust_path: certs.iter().map(|c| c.to_der()).collect::<Result<_, _>>()?,
            metadata: None,
        })
    }
}

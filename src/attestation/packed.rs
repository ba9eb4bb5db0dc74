//! `packed` attestation: full attestation with an `x5c`
//! certificate chain, or self-attestation signed directly by the credential
//! key.

use std::collections::BTreeMap;
use std::convert::TryFrom;

use openssl::x509::X509;

use super::AttestationResult;
use crate::authenticator_data::AuthenticatorData;
use crate::cbor::{cbor_try_bytes, cbor_try_i128, Value};
use crate::challenge::AttestationType;
use crate::cose::COSEAlgorithm;
use crate::crypto;
use crate::error::{WebauthnError, WebauthnResult};
use crate::metadata::{MetadataAttestationType, MetadataIndex};

const FIDO_GEN_CE_AAGUID_OID: &str = "1.3.6.1.4.1.45724.1.1.4";

fn verification_data(auth_data: &AuthenticatorData, client_data_hash: &[u8; 32]) -> Vec<u8> {
    let mut data = auth_data.raw_bytes.clone();
    data.extend_from_slice(client_data_hash);
    data
}

fn attestation_type_from_metadata(
    metadata_index: &dyn MetadataIndex,
    aaguid: &[u8; 16],
) -> WebauthnResult<(AttestationType, Option<crate::metadata::MetadataStatement>)> {
    match metadata_index.by_aaguid(aaguid) {
        Some(statement) => {
            let type_ = match statement.preferred_attestation_type() {
                Some(MetadataAttestationType::BasicFull) => AttestationType::Basic,
                Some(MetadataAttestationType::Attca) => AttestationType::Attca,
                None => AttestationType::Uncertain,
            };
            Ok((type_, Some(statement.clone())))
        }
        None => Err(WebauthnError::NoAttestationMetadataStatementFound),
    }
}

/// Attempt to build a PKIX path from `leaf` up through `chain` against one
/// of `roots`. Succeeds if at least one root verifies the chain
/// step 5).
fn verify_trust_path(leaf: &X509, chain: &[X509], roots: &[Vec<u8>]) -> WebauthnResult<bool> {
    use openssl::stack::Stack;
    use openssl::x509::store::X509StoreBuilder;
    use openssl::x509::X509StoreContext;

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
        let verified = ctx.init(&store, leaf, &untrusted, |c| c.verify_cert())?;
        if verified {
            return Ok(true);
        }
    }
    Ok(false)
}

fn verify_full(
    stmt_map: &BTreeMap<Value, Value>,
    x5c_value: &Value,
    auth_data: &AuthenticatorData,
    client_data_hash: &[u8; 32],
    verify_trust_root: bool,
    metadata_index: &dyn MetadataIndex,
) -> WebauthnResult<AttestationResult> {
    if stmt_map.len() != 3 {
        return Err(WebauthnError::AttestationStatementShapeInvalid);
    }

    let alg_value = stmt_map
        .get(&Value::Text("alg".into()))
        .ok_or(WebauthnError::AttestationStatementShapeInvalid)?;
    let alg = COSEAlgorithm::try_from(cbor_try_i128!(alg_value)?)?;

    let sig_value = stmt_map
        .get(&Value::Text("sig".into()))
        .ok_or(WebauthnError::AttestationStatementShapeInvalid)?;
    let sig = cbor_try_bytes!(sig_value)?;

    let x5c_array = match x5c_value {
        Value::Array(a) => a,
        _ => return Err(WebauthnError::AttestationStatementShapeInvalid),
    };
    if x5c_array.is_empty() {
        return Err(WebauthnError::AttestationStatementShapeInvalid);
    }

    let certs: Vec<X509> = x5c_array
        .iter()
        .map(|v| {
            let der = cbor_try_bytes!(v)?;
            X509::from_der(der).map_err(|_| WebauthnError::AttestationStatementX5cInvalid("packed"))
        })
        .collect::<WebauthnResult<_>>()?;
    let leaf = &certs[0];

    let data = verification_data(auth_data, client_data_hash);
    if !crypto::verify_signature(alg, leaf, sig, &data)? {
        return Err(WebauthnError::AttestationInvalidSignature("packed"));
    }

    crypto::assert_packed_attest_req(leaf)?;

    let attested = auth_data
        .attested_credential_data
        .as_ref()
        .ok_or(WebauthnError::InvalidAuthenticatorData)?;

    let der_bytes = leaf.to_der()?;
    let (_, x509_cert) = x509_parser::parse_x509_certificate(&der_bytes)
        .map_err(|_| WebauthnError::AttestationStatementX5cInvalid("packed"))?;
    if let Ok(Some(ext)) = x509_cert.get_extension_unique(&der_parser::oid!(1.3.6 .1 .4 .1 .45724 .1 .1 .4))
    {
        // id-fido-gen-ce-aaguid wraps the AAGUID as a 16-byte OCTET STRING.
        let inner = ext.value;
        if inner.len() < 16 || &inner[inner.len() - 16..] != attested.aaguid.as_slice() {
            return Err(WebauthnError::AttestationCertificateAaguidMismatch);
        }
    }
    let _ = FIDO_GEN_CE_AAGUID_OID; // documents the OID checked above

    if verify_trust_root {
        let (_, metadata) = attestation_type_from_metadata(metadata_index, &attested.aaguid)?;
        let metadata = metadata.ok_or(WebauthnError::NoAttestationMetadataStatementFound)?;
        let verified = verify_trust_path(
            leaf,
            &certs[1..],
            &metadata.attestation_root_certificates,
        )?;
        if !verified {
            return Err(WebauthnError::RootTrustCertificateNotFound("packed"));
        }
        let type_ = match metadata.preferred_attestation_type() {
            Some(MetadataAttestationType::BasicFull) => AttestationType::Basic,
            Some(MetadataAttestationType::Attca) => AttestationType::Attca,
            None => AttestationType::Uncertain,
        };
        Ok(AttestationResult {
            type_,
            trust_path: certs.iter().map(|c| c.to_der()).collect::<Result<_, _>>()?,
            metadata: Some(metadata),
        })
    } else {
        Ok(AttestationResult {
            type_: AttestationType::Uncertain,
            trust_path: certs.iter().map(|c| c.to_der()).collect::<Result<_, _>>()?,
            metadata: None,
        })
    }
}

fn verify_self(
    stmt_map: &BTreeMap<Value, Value>,
    auth_data: &AuthenticatorData,
    client_data_hash: &[u8; 32],
) -> WebauthnResult<AttestationResult> {
    if stmt_map.len() != 2 {
        return Err(WebauthnError::AttestationStatementShapeInvalid);
    }

    let alg_value = stmt_map
        .get(&Value::Text("alg".into()))
        .ok_or(WebauthnError::AttestationStatementShapeInvalid)?;
    let alg = COSEAlgorithm::try_from(cbor_try_i128!(alg_value)?)?;

    let sig_value = stmt_map
        .get(&Value::Text("sig".into()))
        .ok_or(WebauthnError::AttestationStatementShapeInvalid)?;
    let sig = cbor_try_bytes!(sig_value)?;

    let attested = auth_data
        .attested_credential_data
        .as_ref()
        .ok_or(WebauthnError::InvalidAuthenticatorData)?;

    if alg != attested.credential_public_key.type_ {
        return Err(WebauthnError::AttestationInvalidPublicKeyAlgorithm("packed"));
    }

    let data = verification_data(auth_data, client_data_hash);
    if !attested.credential_public_key.verify_signature(sig, &data)? {
        return Err(WebauthnError::AttestationInvalidSignature("packed"));
    }

    Ok(AttestationResult {
        type_: AttestationType::Self_,
        trust_path: Vec::new(),
        metadata: None,
    })
}

pub(super) fn verify(
    stmt_map: &BTreeMap<Value, Value>,
    auth_data: &AuthenticatorData,
    client_data_hash: &[u8; 32],
    verify_trust_root: bool,
    metadata_index: &dyn MetadataIndex,
) -> WebauthnResult<AttestationResult> {
    if stmt_map.contains_key(&Value::Text("ecdaaKeyId".into())) {
        return Err(WebauthnError::AttestationUnimplemented("packed (ecdaa)"));
    }

    match stmt_map.get(&Value::Text("x5c".into())) {
        Some(x5c_value) => verify_full(
            stmt_map,
            x5c_value,
            auth_data,
            client_data_hash,
            verify_trust_root,
            metadata_index,
        ),
        None => verify_self(stmt_map, auth_data, client_data_hash),
    }
}

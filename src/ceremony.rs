//! Registration and authentication ceremony orchestration.
//!
//! Each function here is a pure pipeline: parse, cross-check against the
//! challenge, dispatch to the relevant verifier, and return. Nothing is
//! retried or recovered locally — a failure surfaces as a tagged
//! [`WebauthnError`] and the caller decides what to do next.

use crate::attestation::{self, AttestationResult};
use crate::authenticator_data::AuthenticatorData;
use crate::cbor;
use crate::challenge::Challenge;
use crate::client_data::{ClientData, ClientDataType};
use crate::cose::COSEKey;
use crate::error::{WebauthnError, WebauthnResult};
use crate::metadata::MetadataIndex;

/// The outcome of a successful registration ceremony: the credential's
/// public key (to be stored by the caller, keyed on its credential id), the
/// attestation result, and the parsed authenticator data (sign count starts
/// here).
#[derive(Debug, Clone)]
pub struct RegistrationResult {
    pub credential_id: Vec<u8>,
    pub credential_public_key: COSEKey,
    pub attestation: AttestationResult,
    pub sign_count: u32,
}

fn check_client_data(
    client_data: &ClientData,
    challenge: &Challenge,
    expected_type: ClientDataType,
) -> WebauthnResult<()> {
    if client_data.type_ != expected_type {
        return Err(WebauthnError::InvalidClientDataType);
    }
    if client_data.challenge != challenge.bytes {
        return Err(WebauthnError::InvalidChallenge);
    }
    if client_data.origin != challenge.origin {
        return Err(WebauthnError::AttestationInvalidOrigin);
    }
    // Token binding is accepted but never enforced: neither browsers nor
    // authenticators ship it today, so there is nothing to cross-check
    // beyond the status string already being well-formed JSON.
    let _ = &client_data.token_binding_status;
    Ok(())
}

fn check_rp_id_hash(auth_data: &AuthenticatorData, challenge: &Challenge) -> WebauthnResult<()> {
    let expected = crate::crypto::compute_sha256(challenge.rp_id.as_bytes());
    if auth_data.rp_id_hash != expected {
        return Err(WebauthnError::InvalidRpIdHash);
    }
    Ok(())
}

fn check_user_flags(auth_data: &AuthenticatorData, challenge: &Challenge) -> WebauthnResult<()> {
    if !auth_data.user_present() {
        return Err(WebauthnError::UserPresentFlagNotSet);
    }
    if challenge.user_verified_required && !auth_data.user_verified() {
        return Err(WebauthnError::UserNotVerified);
    }
    Ok(())
}

/// Verify a registration (attestation) response against the challenge that
/// produced it. `attestation_object_cbor` is the raw CBOR bytes of the
/// `attestationObject`; `client_data_json` is the raw bytes of
/// `clientDataJSON` exactly as received.
pub fn register_credential(
    challenge: &Challenge,
    client_data_json: &[u8],
    attestation_object_cbor: &[u8],
    metadata_index: &dyn MetadataIndex,
) -> WebauthnResult<RegistrationResult> {
    let client_data = ClientData::parse(client_data_json)?;
    check_client_data(&client_data, challenge, ClientDataType::Create)?;

    let att_obj = cbor::decode(attestation_object_cbor)?;
    let att_map = cbor::cbor_try_map!(&att_obj)?;

    let fmt_value = att_map
        .get(&cbor::Value::Text("fmt".into()))
        .ok_or(WebauthnError::InvalidCbor)?;
    let fmt = cbor::cbor_try_string!(fmt_value)?;

    let auth_data_value = att_map
        .get(&cbor::Value::Text("authData".into()))
        .ok_or(WebauthnError::InvalidCbor)?;
    let auth_data_bytes = cbor::cbor_try_bytes!(auth_data_value)?;
    let auth_data = AuthenticatorData::parse(auth_data_bytes)?;

    check_rp_id_hash(&auth_data, challenge)?;
    check_user_flags(&auth_data, challenge)?;

    let attested = auth_data
        .attested_credential_data
        .as_ref()
        .ok_or(WebauthnError::InvalidAuthenticatorData)?;

    let att_stmt = att_map
        .get(&cbor::Value::Text("attStmt".into()))
        .ok_or(WebauthnError::InvalidCbor)?;

    let attestation = attestation::verify(
        fmt,
        att_stmt,
        &auth_data,
        &client_data.client_data_hash,
        challenge.verify_trust_root,
        metadata_index,
        &challenge.safetynet_root_certificates,
    )?;

    if !challenge.trusted_attestation_types.contains(&attestation.type_) {
        return Err(WebauthnError::UntrustedAttestationType);
    }

    Ok(RegistrationResult {
        credential_id: attested.credential_id.clone(),
        credential_public_key: attested.credential_public_key.clone(),
        attestation,
        sign_count: auth_data.sign_count,
    })
}

/// The outcome of a successful authentication (assertion) ceremony: the
/// sign count reported by the authenticator. The caller is responsible for
/// comparing it against the previously stored value to detect a cloned
/// authenticator.
#[derive(Debug, Clone)]
pub struct AuthenticationResult {
    pub credential_id: Vec<u8>,
    pub sign_count: u32,
}

/// Verify an authentication (assertion) response against the challenge that
/// produced it. `credential_id` identifies which entry of
/// `challenge.allow_credentials` the response claims to be for.
pub fn authenticate_credential(
    challenge: &Challenge,
    credential_id: &[u8],
    client_data_json: &[u8],
    auth_data_bytes: &[u8],
    signature: &[u8],
) -> WebauthnResult<AuthenticationResult> {
    let allowed = challenge
        .allow_credentials
        .iter()
        .find(|c| c.credential_id == credential_id)
        .ok_or(WebauthnError::IncorrectCredentialIdForUser)?;

    let client_data = ClientData::parse(client_data_json)?;
    check_client_data(&client_data, challenge, ClientDataType::Get)?;

    let auth_data = AuthenticatorData::parse(auth_data_bytes)?;
    check_rp_id_hash(&auth_data, challenge)?;
    check_user_flags(&auth_data, challenge)?;

    let mut verification_data = auth_data.raw_bytes.clone();
    verification_data.extend_from_slice(&client_data.client_data_hash);

    if !allowed.cose_key.verify_signature(signature, &verification_data)? {
        return Err(WebauthnError::AttestationInvalidSignature("assertion"));
    }

    Ok(AuthenticationResult {
        credential_id: credential_id.to_vec(),
        sign_count: auth_data.sign_count,
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::{AllowedCredential, ChallengeOptions, DefaultConfig};
    use crate::cose::{COSEEC2Key, COSEKeyType};
    use crate::metadata::InMemoryMetadataIndex;
    use openssl::bn::{BigNum, BigNumContext};
    use openssl::ec::{EcGroup, EcKey};
    use openssl::nid::Nid;
    use openssl::pkey::PKey;
    use openssl::sign::Signer;
    use serde_cbor_2::Value as CborValue;
    use std::collections::BTreeMap;

    struct KeyPair {
        pkey: PKey<openssl::pkey::Private>,
        x: Vec<u8>,
        y: Vec<u8>,
    }

    fn generate_p256() -> KeyPair {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let ec_key = EcKey::generate(&group).unwrap();
        let mut ctx = BigNumContext::new().unwrap();
        let mut xbn = BigNum::new().unwrap();
        let mut ybn = BigNum::new().unwrap();
        ec_key
            .public_key()
            .affine_coordinates_gfp(&group, &mut xbn, &mut ybn, &mut ctx)
            .unwrap();
        let mut x = vec![0u8; 32];
        let xv = xbn.to_vec();
        x[32 - xv.len()..].copy_from_slice(&xv);
        let mut y = vec![0u8; 32];
        let yv = ybn.to_vec();
        y[32 - yv.len()..].copy_from_slice(&yv);
        KeyPair {
            pkey: PKey::from_ec_key(ec_key).unwrap(),
            x,
            y,
        }
    }

    fn cose_key_for(kp: &KeyPair) -> COSEKey {
        COSEKey {
            type_: crate::cose::COSEAlgorithm::ES256,
            key: COSEKeyType::EC_EC2(COSEEC2Key {
                curve: crate::cose::ECDSACurve::SECP256R1,
                x: kp.x.clone(),
                y: kp.y.clone(),
            }),
        }
    }

    fn sign(kp: &KeyPair, data: &[u8]) -> Vec<u8> {
        let mut signer = Signer::new(openssl::hash::MessageDigest::sha256(), &kp.pkey).unwrap();
        signer.update(data).unwrap();
        signer.sign_to_vec().unwrap()
    }

    fn challenge_for(origin: &str) -> Challenge {
        crate::challenge::new_registration_challenge(
            ChallengeOptions {
                origin: Some(origin.into()),
                ..Default::default()
            },
            &DefaultConfig,
        )
        .unwrap()
    }

    fn client_data_json(type_: &str, challenge_bytes: [u8; 32], origin: &str) -> Vec<u8> {
        use base64::Engine;
        let challenge_b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(challenge_bytes);
        format!(
            r#"{{"type":"{type_}","challenge":"{challenge_b64}","origin":"{origin}"}}"#
        )
        .into_bytes()
    }

    fn attested_auth_data(rp_id: &str, credential_id: &[u8], kp: &KeyPair) -> Vec<u8> {
        let rp_id_hash = crate::crypto::compute_sha256(rp_id.as_bytes());
        let mut raw = rp_id_hash.to_vec();
        raw.push(0b0100_0101); // UP + UV + attested credential data
        raw.extend_from_slice(&0u32.to_be_bytes());
        raw.extend_from_slice(&[0u8; 16]);
        raw.extend_from_slice(&(credential_id.len() as u16).to_be_bytes());
        raw.extend_from_slice(credential_id);

        let mut m = BTreeMap::new();
        m.insert(CborValue::Integer(1), CborValue::Integer(2));
        m.insert(CborValue::Integer(3), CborValue::Integer(-7));
        m.insert(CborValue::Integer(-1), CborValue::Integer(1));
        m.insert(CborValue::Integer(-2), CborValue::Bytes(kp.x.clone()));
        m.insert(CborValue::Integer(-3), CborValue::Bytes(kp.y.clone()));
        raw.extend_from_slice(&serde_cbor_2::to_vec(&CborValue::Map(m)).unwrap());
        raw
    }

    fn bare_auth_data(rp_id: &str, sign_count: u32) -> Vec<u8> {
        let rp_id_hash = crate::crypto::compute_sha256(rp_id.as_bytes());
        let mut raw = rp_id_hash.to_vec();
        raw.push(0b0000_0101); // UP + UV, no attested credential data
        raw.extend_from_slice(&sign_count.to_be_bytes());
        raw
    }

    #[test]
    fn register_with_self_attestation_succeeds() {
        let kp = generate_p256();
        let credential_id = vec![9, 9, 9, 9];
        let auth_data_bytes = attested_auth_data("example.com", &credential_id, &kp);
        let challenge = challenge_for("https://example.com");
        let cdj = client_data_json("webauthn.create", challenge.bytes, "https://example.com");

        let client_data_hash = crate::crypto::compute_sha256(&cdj);
        let mut verification_data = auth_data_bytes.clone();
        verification_data.extend_from_slice(&client_data_hash);
        let sig = sign(&kp, &verification_data);

        let mut att_stmt = BTreeMap::new();
        att_stmt.insert(CborValue::Text("alg".into()), CborValue::Integer(-7));
        att_stmt.insert(CborValue::Text("sig".into()), CborValue::Bytes(sig));

        let mut att_obj = BTreeMap::new();
        att_obj.insert(CborValue::Text("fmt".into()), CborValue::Text("packed".into()));
        att_obj.insert(CborValue::Text("authData".into()), CborValue::Bytes(auth_data_bytes));
        att_obj.insert(CborValue::Text("attStmt".into()), CborValue::Map(att_stmt));
        let attestation_object_cbor = serde_cbor_2::to_vec(&CborValue::Map(att_obj)).unwrap();

        let metadata_index = InMemoryMetadataIndex::new();
        let registration =
            register_credential(&challenge, &cdj, &attestation_object_cbor, &metadata_index).unwrap();

        assert_eq!(registration.credential_id, credential_id);
        assert_eq!(registration.attestation.type_, crate::challenge::AttestationType::Self_);
        assert_eq!(registration.sign_count, 0);
    }

    #[test]
    fn register_rejects_challenge_mismatch() {
        let kp = generate_p256();
        let credential_id = vec![1, 2, 3];
        let auth_data_bytes = attested_auth_data("example.com", &credential_id, &kp);
        let challenge = challenge_for("https://example.com");
        // Sign a different challenge value than the one on record.
        let cdj = client_data_json("webauthn.create", [0xEEu8; 32], "https://example.com");

        let mut att_stmt = BTreeMap::new();
        att_stmt.insert(CborValue::Text("alg".into()), CborValue::Integer(-7));
        att_stmt.insert(CborValue::Text("sig".into()), CborValue::Bytes(vec![0u8; 8]));

        let mut att_obj = BTreeMap::new();
        att_obj.insert(CborValue::Text("fmt".into()), CborValue::Text("packed".into()));
        att_obj.insert(CborValue::Text("authData".into()), CborValue::Bytes(auth_data_bytes));
        att_obj.insert(CborValue::Text("attStmt".into()), CborValue::Map(att_stmt));
        let attestation_object_cbor = serde_cbor_2::to_vec(&CborValue::Map(att_obj)).unwrap();

        let metadata_index = InMemoryMetadataIndex::new();
        let err =
            register_credential(&challenge, &cdj, &attestation_object_cbor, &metadata_index).unwrap_err();
        assert!(matches!(err, WebauthnError::InvalidChallenge));
    }

    #[test]
    fn authenticate_round_trip_succeeds_and_detects_tampering() {
        let kp = generate_p256();
        let credential_id = vec![4, 5, 6];
        let challenge = crate::challenge::new_authentication_challenge(
            vec![AllowedCredential {
                credential_id: credential_id.clone(),
                cose_key: cose_key_for(&kp),
            }],
            ChallengeOptions {
                origin: Some("https://example.com".into()),
                ..Default::default()
            },
            &DefaultConfig,
        )
        .unwrap();

        let cdj = client_data_json("webauthn.get", challenge.bytes, "https://example.com");
        let auth_data_bytes = bare_auth_data("example.com", 1);
        let client_data_hash = crate::crypto::compute_sha256(&cdj);
        let mut verification_data = auth_data_bytes.clone();
        verification_data.extend_from_slice(&client_data_hash);
        let sig = sign(&kp, &verification_data);

        let result =
            authenticate_credential(&challenge, &credential_id, &cdj, &auth_data_bytes, &sig).unwrap();
        assert_eq!(result.sign_count, 1);

        let other_kp = generate_p256();
        let bad_sig = sign(&other_kp, &verification_data);
        let err =
            authenticate_credential(&challenge, &credential_id, &cdj, &auth_data_bytes, &bad_sig)
                .unwrap_err();
        assert!(matches!(err, WebauthnError::AttestationInvalidSignature(_)));
    }

    #[test]
    fn authenticate_rejects_unknown_credential_id() {
        let kp = generate_p256();
        let challenge = crate::challenge::new_authentication_challenge(
            vec![AllowedCredential {
                credential_id: vec![1],
                cose_key: cose_key_for(&kp),
            }],
            ChallengeOptions {
                origin: Some("https://example.com".into()),
                ..Default::default()
            },
            &DefaultConfig,
        )
        .unwrap();
        let cdj = client_data_json("webauthn.get", challenge.bytes, "https://example.com");
        let auth_data_bytes = bare_auth_data("example.com", 1);
        let err = authenticate_credential(&challenge, &[0xFF], &cdj, &auth_data_bytes, &[0u8; 8])
            .unwrap_err();
        assert!(matches!(err, WebauthnError::IncorrectCredentialIdForUser));
    }
}

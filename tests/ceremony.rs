//! End-to-end exercise of the crate the way a relying party would drive it:
//! generate a challenge, simulate an authenticator producing an attestation
//! object with an in-process OpenSSL P-256 key, register it, then simulate a
//! follow-up assertion and authenticate against the stored public key.

use std::collections::BTreeMap;

use base64::Engine;
use openssl::bn::{BigNum, BigNumContext};
use openssl::ec::{EcGroup, EcKey};
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;
use serde_cbor_2::Value as CborValue;

use webauthn_core::challenge::{AllowedCredential, ChallengeOptions, DefaultConfig};
use webauthn_core::error::WebauthnError;
use webauthn_core::metadata::InMemoryMetadataIndex;
use webauthn_core::{authenticate_credential, register_credential, AttestationType};

struct Authenticator {
    pkey: PKey<Private>,
    x: Vec<u8>,
    y: Vec<u8>,
}

impl Authenticator {
    fn generate() -> Self {
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
        Authenticator {
            pkey: PKey::from_ec_key(ec_key).unwrap(),
            x,
            y,
        }
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        let mut signer = Signer::new(openssl::hash::MessageDigest::sha256(), &self.pkey).unwrap();
        signer.update(data).unwrap();
        signer.sign_to_vec().unwrap()
    }
}

fn client_data_json(type_: &str, challenge_bytes: [u8; 32], origin: &str) -> Vec<u8> {
    let challenge_b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(challenge_bytes);
    format!(r#"{{"type":"{type_}","challenge":"{challenge_b64}","origin":"{origin}"}}"#)
        .into_bytes()
}

fn auth_data_with_attested_key(
    rp_id: &str,
    sign_count: u32,
    credential_id: &[u8],
    authenticator: &Authenticator,
) -> Vec<u8> {
    let rp_id_hash = openssl::sha::sha256(rp_id.as_bytes());
    let mut raw = rp_id_hash.to_vec();
    raw.push(0b0100_0101); // user present, user verified, attested credential data
    raw.extend_from_slice(&sign_count.to_be_bytes());
    raw.extend_from_slice(&[0u8; 16]); // AAGUID, unused by this authenticator
    raw.extend_from_slice(&(credential_id.len() as u16).to_be_bytes());
    raw.extend_from_slice(credential_id);

    let mut key_map = BTreeMap::new();
    key_map.insert(CborValue::Integer(1), CborValue::Integer(2));
    key_map.insert(CborValue::Integer(3), CborValue::Integer(-7));
    key_map.insert(CborValue::Integer(-1), CborValue::Integer(1));
    key_map.insert(CborValue::Integer(-2), CborValue::Bytes(authenticator.x.clone()));
    key_map.insert(CborValue::Integer(-3), CborValue::Bytes(authenticator.y.clone()));
    raw.extend_from_slice(&serde_cbor_2::to_vec(&CborValue::Map(key_map)).unwrap());
    raw
}

fn auth_data_bare(rp_id: &str, sign_count: u32) -> Vec<u8> {
    let rp_id_hash = openssl::sha::sha256(rp_id.as_bytes());
    let mut raw = rp_id_hash.to_vec();
    raw.push(0b0000_0101); // user present, user verified, no attested credential data
    raw.extend_from_slice(&sign_count.to_be_bytes());
    raw
}

fn attestation_object(fmt: &str, auth_data: Vec<u8>, att_stmt: BTreeMap<CborValue, CborValue>) -> Vec<u8> {
    let mut obj = BTreeMap::new();
    obj.insert(CborValue::Text("fmt".into()), CborValue::Text(fmt.into()));
    obj.insert(CborValue::Text("authData".into()), CborValue::Bytes(auth_data));
    obj.insert(CborValue::Text("attStmt".into()), CborValue::Map(att_stmt));
    serde_cbor_2::to_vec(&CborValue::Map(obj)).unwrap()
}

#[test]
fn none_registration_then_authentication_round_trip() {
    let origin = "https://example.com";
    let rp_id = "example.com";
    let authenticator = Authenticator::generate();
    let credential_id = b"credential-one".to_vec();
    let metadata_index = InMemoryMetadataIndex::new();

    let registration_challenge = webauthn_core::challenge::new_registration_challenge(
        ChallengeOptions {
            origin: Some(origin.into()),
            ..Default::default()
        },
        &DefaultConfig,
    )
    .unwrap();

    let reg_cdj = client_data_json("webauthn.create", registration_challenge.bytes, origin);
    let reg_auth_data = auth_data_with_attested_key(rp_id, 0, &credential_id, &authenticator);
    let attestation_object_cbor = attestation_object("none", reg_auth_data, BTreeMap::new());

    let registration = register_credential(
        &registration_challenge,
        &reg_cdj,
        &attestation_object_cbor,
        &metadata_index,
    )
    .expect("registration should succeed");

    assert_eq!(registration.credential_id, credential_id);
    assert_eq!(registration.attestation.type_, AttestationType::None);
    assert_eq!(registration.sign_count, 0);

    let authentication_challenge = webauthn_core::challenge::new_authentication_challenge(
        vec![AllowedCredential {
            credential_id: registration.credential_id.clone(),
            cose_key: registration.credential_public_key.clone(),
        }],
        ChallengeOptions {
            origin: Some(origin.into()),
            ..Default::default()
        },
        &DefaultConfig,
    )
    .unwrap();

    let auth_cdj = client_data_json("webauthn.get", authentication_challenge.bytes, origin);
    let auth_auth_data = auth_data_bare(rp_id, 1);
    let client_data_hash = openssl::sha::sha256(&auth_cdj);
    let mut verification_data = auth_auth_data.clone();
    verification_data.extend_from_slice(&client_data_hash);
    let signature = authenticator.sign(&verification_data);

    let result = authenticate_credential(
        &authentication_challenge,
        &credential_id,
        &auth_cdj,
        &auth_auth_data,
        &signature,
    )
    .expect("authentication should succeed");

    assert_eq!(result.sign_count, 1);
}

#[test]
fn self_attestation_registration_then_authentication_round_trip() {
    let origin = "https://example.com";
    let rp_id = "example.com";
    let authenticator = Authenticator::generate();
    let credential_id = b"credential-two".to_vec();
    let metadata_index = InMemoryMetadataIndex::new();

    let registration_challenge = webauthn_core::challenge::new_registration_challenge(
        ChallengeOptions {
            origin: Some(origin.into()),
            ..Default::default()
        },
        &DefaultConfig,
    )
    .unwrap();

    let reg_cdj = client_data_json("webauthn.create", registration_challenge.bytes, origin);
    let reg_auth_data = auth_data_with_attested_key(rp_id, 0, &credential_id, &authenticator);
    let reg_client_data_hash = openssl::sha::sha256(&reg_cdj);

    let mut verification_data = reg_auth_data.clone();
    verification_data.extend_from_slice(&reg_client_data_hash);
    let sig = authenticator.sign(&verification_data);

    let mut att_stmt = BTreeMap::new();
    att_stmt.insert(CborValue::Text("alg".into()), CborValue::Integer(-7));
    att_stmt.insert(CborValue::Text("sig".into()), CborValue::Bytes(sig));
    let attestation_object_cbor = attestation_object("packed", reg_auth_data, att_stmt);

    let registration = register_credential(
        &registration_challenge,
        &reg_cdj,
        &attestation_object_cbor,
        &metadata_index,
    )
    .expect("self-attested registration should succeed");

    assert_eq!(registration.attestation.type_, AttestationType::Self_);
    assert!(registration.attestation.trust_path.is_empty());

    let authentication_challenge = webauthn_core::challenge::new_authentication_challenge(
        vec![AllowedCredential {
            credential_id: registration.credential_id.clone(),
            cose_key: registration.credential_public_key,
        }],
        ChallengeOptions {
            origin: Some(origin.into()),
            verify_trust_root: Some(false),
            ..Default::default()
        },
        &DefaultConfig,
    )
    .unwrap();

    let auth_cdj = client_data_json("webauthn.get", authentication_challenge.bytes, origin);
    let auth_auth_data = auth_data_bare(rp_id, 5);
    let client_data_hash = openssl::sha::sha256(&auth_cdj);
    let mut verification_data = auth_auth_data.clone();
    verification_data.extend_from_slice(&client_data_hash);
    let signature = authenticator.sign(&verification_data);

    let result = authenticate_credential(
        &authentication_challenge,
        &credential_id,
        &auth_cdj,
        &auth_auth_data,
        &signature,
    )
    .expect("authentication should succeed");
    assert_eq!(result.sign_count, 5);

    // A bit flip anywhere in the signed material must fail verification.
    let mut tampered_auth_data = auth_auth_data.clone();
    let last = tampered_auth_data.len() - 1;
    tampered_auth_data[last] ^= 0x01;
    let err = authenticate_credential(
        &authentication_challenge,
        &credential_id,
        &auth_cdj,
        &tampered_auth_data,
        &signature,
    )
    .unwrap_err();
    assert!(matches!(err, WebauthnError::AttestationInvalidSignature(_)));
}

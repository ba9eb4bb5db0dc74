//! Challenge object (C5).
//!
//! A Challenge is created once by the server, frozen, and echoed by the
//! browser. It is immutable from the moment it is constructed onward:
//! nothing in this crate ever mutates one in place.

use std::collections::HashSet;

use openssl::rand::rand_bytes;
use openssl::x509::X509;

use crate::cose::COSEKey;
use crate::error::{WebauthnError, WebauthnResult};

/// GlobalSign Root CA - R2, the root Android's `android-safetynet` JWS
/// signer chains were anchored to (spec step: "verify ... against the
/// pinned GlobalSign Root R2 certificate"). Self-signed; expired
/// 2021-12-15, which is expected — SafetyNet is a legacy attestation
/// format and this is the certificate real authenticators chained to.
/// Sourced from `webauthn-rs-device-catalog`'s `GOOGLE_SAFETYNET_CA_OLD`.
const GLOBALSIGN_ROOT_R2_PEM: &[u8] = b"-----BEGIN CERTIFICATE-----
MIIDujCCAqKgAwIBAgILBAAAAAABD4Ym5g0wDQYJKoZIhvcNAQEFBQAwTDEgMB4G
A1UECxMXR2xvYmFsU2lnbiBSb290IENBIC0gUjIxEzARBgNVBAoTCkdsb2JhbFNp
Z24xEzARBgNVBAMTCkdsb2JhbFNpZ24wHhcNMDYxMjE1MDgwMDAwWhcNMjExMjE1
MDgwMDAwWjBMMSAwHgYDVQQLExdHbG9iYWxTaWduIFJvb3QgQ0EgLSBSMjETMBEG
A1UEChMKR2xvYmFsU2lnbjETMBEGA1UEAxMKR2xvYmFsU2lnbjCCASIwDQYJKoZI
hvcNAQEBBQADggEPADCCAQoCggEBAKbPJA6+Lm8omUVCxKs+IVSbC9N/hHD6ErPL
v4dfxn+G07IwXNb9rfF73OX4YJYJkhD10FPe+3t+c4isUoh7SqbKSaZeqKeMWhG8
eoLrvozps6yWJQeXSpkqBy+0Hne/ig+1AnwblrjFuTosvNYSuetZfeLQBoZfXklq
tTleiDTsvHgMCJiEbKjNS7SgfQx5TfC4LcshytVsW33hoCmEofnTlEnLJGKRILzd
C9XZzPnqJworc5HGnRusyMvo4KD0L5CLTfuwNhv2GXqF4G3yYROIXJ/gkwpRl4pa
zq+r1feqCapgvdzZX99yqWATXgAByUr6P6TqBwMhAo6CygPCm48CAwEAAaOBnDCB
mTAOBgNVHQ8BAf8EBAMCAQYwDwYDVR0TAQH/BAUwAwEB/zAdBgNVHQ4EFgQUm+IH
V2ccHsBqBt5ZtJot39wZhi4wNgYDVR0fBC8wLTAroCmgJ4YlaHR0cDovL2NybC5n
bG9iYWxzaWduLm5ldC9yb290LXIyLmNybDAfBgNVHSMEGDAWgBSb4gdXZxwewGoG
3lm0mi3f3BmGLjANBgkqhkiG9w0BAQUFAAOCAQEAmYFThxxol4aR7OBKuEQLq4Gs
J0/WwbgcQ3izDJr86iw8bmEbTUsp9Z8FHSbBuOmDAGJFtqkIk7mpM0sYmsL4h4hO
291xNBrBVNpGP+DTKqttVCL1OmLNIG+6KYnX3ZHu01yiPqFbQfXf5WRDLenVOavS
ot+3i9DAgBkcRcAtjOj4LaR0VknFBbVPFd5uRHg5h6h+u/N5GJG79G+dwfCMNYxd
AfvDbbnvRG15RjF+Cv6pgsH/76tuIMRQyV+dTZsXjAzlAcmgQWpzU/qlULRuJQ/7
TBj0/VLZjmmx6BEP3ojY+x1J96relc8geMJgEtslQIxq/H5COEBkEveegeGTLg==
-----END CERTIFICATE-----
";

fn default_safetynet_root_certificates() -> WebauthnResult<Vec<Vec<u8>>> {
    let cert = X509::from_pem(GLOBALSIGN_ROOT_R2_PEM)?;
    Ok(vec![cert.to_der()?])
}

/// The policy-relevant classification of an attestation, matched against a
/// Challenge's `trusted_attestation_types`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttestationType {
    None,
    Basic,
    Self_,
    Attca,
    Uncertain,
}

/// A (credential_id, cose_key) pair the authentication ceremony is allowed
/// to assert against.
#[derive(Debug, Clone)]
pub struct AllowedCredential {
    pub credential_id: Vec<u8>,
    pub cose_key: COSEKey,
}

/// A server-chosen nonce plus the policy options and allow-list it was
/// generated under. Passed by value to verification and never mutated.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub bytes: [u8; 32],
    pub origin: String,
    pub rp_id: String,
    pub user_verified_required: bool,
    pub trusted_attestation_types: HashSet<AttestationType>,
    pub verify_trust_root: bool,
    pub allow_credentials: Vec<AllowedCredential>,
    pub token_binding_status: Option<String>,
    pub exp: Option<u64>,
    /// Trust roots accepted for `android-safetynet`'s JWS signer chain,
    /// DER-encoded. Defaults to the pinned GlobalSign Root R2 certificate;
    /// a deployment may override with `ChallengeOptions::safetynet_root_certificates`.
    pub safetynet_root_certificates: Vec<Vec<u8>>,
}

/// Process-wide configuration keys a deployment may set once and have
/// picked up by every subsequent challenge generation ("caller
/// provided > process-wide config > default" precedence).
pub trait WebauthnConfig: Send + Sync {
    fn origin(&self) -> Option<String> {
        None
    }
    fn rp_id(&self) -> Option<String> {
        None
    }
    fn user_verified_required(&self) -> Option<bool> {
        None
    }
    fn verify_trust_root(&self) -> Option<bool> {
        None
    }
    fn trusted_attestation_types(&self) -> Option<HashSet<AttestationType>> {
        None
    }
}

/// A [`WebauthnConfig`] that never overrides a default; useful when the
/// caller always supplies options explicitly.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConfig;

impl WebauthnConfig for DefaultConfig {}

fn full_attestation_type_set() -> HashSet<AttestationType> {
    [
        AttestationType::None,
        AttestationType::Basic,
        AttestationType::Self_,
        AttestationType::Attca,
        AttestationType::Uncertain,
    ]
    .into_iter()
    .collect()
}

/// Caller-supplied options for challenge generation; any field left `None`
/// falls back to process-wide config, then to the hard-coded default.
#[derive(Debug, Clone, Default)]
pub struct ChallengeOptions {
    pub origin: Option<String>,
    pub rp_id: Option<RpId>,
    pub user_verified_required: Option<bool>,
    pub verify_trust_root: Option<bool>,
    pub trusted_attestation_types: Option<HashSet<AttestationType>>,
    pub token_binding_status: Option<String>,
    pub exp: Option<u64>,
    /// Overrides the default pinned GlobalSign Root R2 trust anchor. `None`
    /// keeps the default; `Some(vec![])` disables `android-safetynet` trust
    /// entirely (every lookup then fails `root_trust_certificate_not_found`).
    pub safetynet_root_certificates: Option<Vec<Vec<u8>>>,
}

/// `rp_id` may be derived automatically from the origin's host, or given
/// explicitly as a registrable suffix of it.
#[derive(Debug, Clone)]
pub enum RpId {
    Auto,
    Explicit(String),
}

fn resolve_origin(opts: &ChallengeOptions, config: &dyn WebauthnConfig) -> WebauthnResult<String> {
    let origin = opts
        .origin
        .clone()
        .or_else(|| config.origin())
        .ok_or(WebauthnError::Configuration)?;

    let url = url::Url::parse(&origin).map_err(|_| WebauthnError::AttestationInvalidOrigin)?;
    let is_valid = url.scheme() == "https" || url.host_str() == Some("localhost");
    if !is_valid {
        return Err(WebauthnError::AttestationInvalidOrigin);
    }
    Ok(origin)
}

fn host_of(origin: &str) -> WebauthnResult<String> {
    url::Url::parse(origin)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .ok_or(WebauthnError::Configuration)
}

fn resolve_rp_id(
    opts: &ChallengeOptions,
    config: &dyn WebauthnConfig,
    origin: &str,
) -> WebauthnResult<String> {
    match &opts.rp_id {
        Some(RpId::Explicit(id)) => Ok(id.clone()),
        Some(RpId::Auto) => host_of(origin),
        None => match config.rp_id() {
            Some(id) => Ok(id),
            None => host_of(origin),
        },
    }
}

fn draw_challenge_bytes() -> WebauthnResult<[u8; 32]> {
    let mut bytes = [0u8; 32];
    rand_bytes(&mut bytes)?;
    Ok(bytes)
}

/// Build a new registration challenge, resolving policy with precedence
/// caller-provided > process-wide config > default, then drawing 32 random
/// bytes from a cryptographic source.
pub fn new_registration_challenge(
    opts: ChallengeOptions,
    config: &dyn WebauthnConfig,
) -> WebauthnResult<Challenge> {
    let origin = resolve_origin(&opts, config)?;
    let rp_id = resolve_rp_id(&opts, config, &origin)?;

    Ok(Challenge {
        bytes: draw_challenge_bytes()?,
        origin,
        rp_id,
        user_verified_required: opts
            .user_verified_required
            .or_else(|| config.user_verified_required())
            .unwrap_or(false),
        trusted_attestation_types: opts
            .trusted_attestation_types
            .or_else(|| config.trusted_attestation_types())
            .unwrap_or_else(full_attestation_type_set),
        verify_trust_root: opts
            .verify_trust_root
            .or_else(|| config.verify_trust_root())
            .unwrap_or(true),
        allow_credentials: Vec::new(),
        token_binding_status: opts.token_binding_status,
        exp: opts.exp,
        safetynet_root_certificates: match opts.safetynet_root_certificates {
            Some(roots) => roots,
            None => default_safetynet_root_certificates()?,
        },
    })
}

/// Build a new authentication challenge bound to a non-empty allow-list of
/// previously registered credentials.
pub fn new_authentication_challenge(
    allow_credentials: Vec<AllowedCredential>,
    opts: ChallengeOptions,
    config: &dyn WebauthnConfig,
) -> WebauthnResult<Challenge> {
    let mut challenge = new_registration_challenge(opts, config)?;
    challenge.allow_credentials = allow_credentials;
    Ok(challenge)
}

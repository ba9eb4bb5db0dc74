//! Error kinds returned by the core. The variants follow the
//! classification this enum follows: malformed input, policy mismatch,
//! cryptographic failure, trust-anchor failure, lookup failure, unsupported.

use thiserror::Error;

/// The result type returned by every fallible operation in this crate.
pub type WebauthnResult<T> = Result<T, WebauthnError>;

/// A single tagged error value. Callers match on variants rather than on
/// exception types; the orchestrator never retries or recovers locally.
#[derive(Debug, Error)]
pub enum WebauthnError {
    // --- malformed input ---
    #[error("invalid cbor")]
    InvalidCbor,
    #[error("invalid authenticator data")]
    InvalidAuthenticatorData,
    #[error("invalid client data json")]
    InvalidClientDataJson,
    #[error("invalid cose key")]
    InvalidCoseKey,
    #[error("cose key has an unrecognised algorithm")]
    CoseKeyInvalidAlgorithm,
    #[error("cose key has an invalid type for its declared algorithm")]
    CoseKeyInvalidType,
    #[error("cose key ECDSA x/y coordinates have the wrong length")]
    CoseKeyEcdsaXyInvalid,
    #[error("cose key RSA n/e components have the wrong length")]
    CoseKeyRsaNeInvalid,
    #[error("cose key EdDSA x has the wrong length")]
    CoseKeyEddsaXInvalid,
    #[error("unknown ECDSA curve")]
    EcdsaCurveInvalidNid,

    // --- policy mismatch ---
    #[error("attestation type is not permitted by policy")]
    AttestationInvalidType,
    #[error("client data challenge does not match the expected challenge")]
    InvalidChallenge,
    #[error("client data origin does not match the expected origin")]
    AttestationInvalidOrigin,
    #[error("client data type did not match the expected ceremony")]
    InvalidClientDataType,
    #[error("rp_id hash in authenticator data does not match the challenge's rp_id")]
    InvalidRpIdHash,
    #[error("user-present flag was not set in authenticator data")]
    UserPresentFlagNotSet,
    #[error("user-verified flag was not set but policy requires it")]
    UserNotVerified,
    #[error("attestation type returned by the verifier is not trusted by policy")]
    UntrustedAttestationType,
    #[error("challenge configuration is invalid")]
    Configuration,

    // --- cryptographic failure ---
    #[error("{0} attestation statement has an invalid signature")]
    AttestationInvalidSignature(&'static str),
    #[error("{0} attestation certificate does not meet format requirements")]
    AttestationCertificateRequirementsNotMet(&'static str),
    #[error("{0} attestation statement x5c entry could not be parsed")]
    AttestationStatementX5cInvalid(&'static str),
    #[error("{0} attestation used a public key algorithm that is not permitted")]
    AttestationInvalidPublicKeyAlgorithm(&'static str),
    #[error("attestation statement has an unexpected shape")]
    AttestationStatementShapeInvalid,
    #[error("AAGUID extension in attestation certificate does not match attested credential data")]
    AttestationCertificateAaguidMismatch,
    #[error("insecure cryptographic algorithm rejected")]
    CredentialInsecureCryptography,
    #[error("openssl error: {0}")]
    OpenSSLError(#[from] openssl::error::ErrorStack),

    // --- trust-anchor failure ---
    #[error("{0} root trust certificate not found for this authenticator")]
    RootTrustCertificateNotFound(&'static str),
    #[error("no attestation metadata statement found for this authenticator")]
    NoAttestationMetadataStatementFound,
    #[error("no attestation root certificate matched the supplied trust path")]
    NoAttestationRootCertificateFound,

    // --- lookup failure ---
    #[error("credential id is not part of the allowed-credentials list")]
    IncorrectCredentialIdForUser,

    // --- unsupported ---
    #[error("unsupported attestation format: {0}")]
    UnsupportedAttestationFormat(String),
    #[error("{0} attestation is not implemented")]
    AttestationUnimplemented(&'static str),

    // --- underlying decode failures ---
    #[error("cbor decode error: {0}")]
    CborDecode(#[from] serde_cbor_2::Error),
    #[error("json decode error: {0}")]
    JsonDecode(#[from] serde_json::Error),
    #[error("base64url decode error")]
    Base64Decode,
}

//! Attestation format verifiers.
//!
//! Polymorphism across attestation formats uses a tagged variant with one
//! constructor per supported `fmt`; dispatch is a single match, never a
//! runtime lookup on a mutable registry. New formats are added by extending
//! [`AttestationFormat`] and this module's `verify` function.

mod android_safetynet;
mod fido_u2f;
mod none;
mod packed;
mod tpm;

use crate::authenticator_data::AuthenticatorData;
use crate::cbor::{self, Value};
use crate::challenge::AttestationType;
use crate::error::{WebauthnError, WebauthnResult};
use crate::metadata::MetadataIndex;
use crate::metadata::MetadataStatement;

/// The result of a successful attestation verification: the classification
/// assigned, the trust path relied upon (empty for `self`/`none`), and the
/// metadata statement used to resolve that classification, if any.
#[derive(Debug, Clone)]
pub struct AttestationResult {
    pub type_: AttestationType,
    pub trust_path: Vec<Vec<u8>>,
    pub metadata: Option<MetadataStatement>,
}

/// The recognised `fmt` values. New formats are added here, never via a
/// mutable runtime registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttestationFormat {
    None,
    Packed,
    FidoU2f,
    AndroidSafetyNet,
    Tpm,
}

impl AttestationFormat {
    fn parse(fmt: &str) -> WebauthnResult<Self> {
        match fmt {
            "none" => Ok(AttestationFormat::None),
            "packed" => Ok(AttestationFormat::Packed),
            "fido-u2f" => Ok(AttestationFormat::FidoU2f),
            "android-safetynet" => Ok(AttestationFormat::AndroidSafetyNet),
            "tpm" => Ok(AttestationFormat::Tpm),
            other => Err(WebauthnError::UnsupportedAttestationFormat(other.to_string())),
        }
    }
}

/// Dispatch on the `fmt` string extracted from the outer attestation
/// object, parse `att_stmt` for that format, and run its verifier.
pub fn verify(
    fmt: &str,
    att_stmt: &Value,
    auth_data: &AuthenticatorData,
    client_data_hash: &[u8; 32],
    verify_trust_root: bool,
    metadata_index: &dyn MetadataIndex,
    safetynet_root_certificates: &[Vec<u8>],
) -> WebauthnResult<AttestationResult> {
    let stmt_map = cbor::cbor_try_map!(att_stmt)?;

    match AttestationFormat::parse(fmt)? {
        AttestationFormat::None => none::verify(stmt_map),
        AttestationFormat::Packed => {
            packed::verify(stmt_map, auth_data, client_data_hash, verify_trust_root, metadata_index)
        }
        AttestationFormat::FidoU2f => {
            fido_u2f::verify(stmt_map, auth_data, client_data_hash, verify_trust_root, metadata_index)
        }
        AttestationFormat::AndroidSafetyNet => android_safetynet::verify(
            stmt_map,
            auth_data,
            client_data_hash,
            verify_trust_root,
            safetynet_root_certificates,
        ),
        AttestationFormat::Tpm => tpm::verify(stmt_map, auth_data, client_data_hash),
    }
}

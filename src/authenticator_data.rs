//! Authenticator data parser (part of C1).
//!
//! Fixed binary layout: 32-byte RP-ID hash, 1 flag byte, 4-byte big-endian
//! sign count, then optional attested-credential-data, then optional
//! CBOR-encoded extensions. Several attestation signatures cover these
//! bytes verbatim, so the parser retains the exact original byte range as
//! `raw_bytes` — nothing here is ever re-encoded for signing purposes.

use crate::cbor;
use crate::cose::COSEKey;
use crate::error::{WebauthnError, WebauthnResult};

const FLAG_USER_PRESENT: u8 = 1 << 0;
const FLAG_USER_VERIFIED: u8 = 1 << 2;
const FLAG_ATTESTED_CREDENTIAL_DATA: u8 = 1 << 6;
const FLAG_EXTENSION_DATA: u8 = 1 << 7;

/// The 16-byte AAGUID, credential id and COSE public key present when the
/// attested-credential-data flag is set.
#[derive(Debug, Clone)]
pub struct AttestedCredentialData {
    pub aaguid: [u8; 16],
    pub credential_id: Vec<u8>,
    pub credential_public_key: COSEKey,
}

/// A parsed `authData` structure, together with the exact bytes it was
/// decoded from.
#[derive(Debug, Clone)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    flags: u8,
    pub sign_count: u32,
    pub attested_credential_data: Option<AttestedCredentialData>,
    pub raw_bytes: Vec<u8>,
}

impl AuthenticatorData {
    pub fn user_present(&self) -> bool {
        self.flags & FLAG_USER_PRESENT != 0
    }

    pub fn user_verified(&self) -> bool {
        self.flags & FLAG_USER_VERIFIED != 0
    }

    /// Parse the fixed-layout `authData` binary blob.
    /// Fails with `invalid_authenticator_data` on short buffers, a bad
    /// credential-id length prefix, or trailing bytes the flags don't
    /// account for.
    pub fn parse(raw_bytes: &[u8]) -> WebauthnResult<Self> {
        if raw_bytes.len() < 37 {
            return Err(WebauthnError::InvalidAuthenticatorData);
        }

        let mut rp_id_hash = [0u8; 32];
        rp_id_hash.copy_from_slice(&raw_bytes[0..32]);
        let flags = raw_bytes[32];
        let sign_count = u32::from_be_bytes(
            raw_bytes[33..37]
                .try_into()
                .map_err(|_| WebauthnError::InvalidAuthenticatorData)?,
        );

        let mut cursor = 37;
        let attested_credential_data =
            if flags & FLAG_ATTESTED_CREDENTIAL_DATA != 0 {
                if raw_bytes.len() < cursor + 16 + 2 {
                    return Err(WebauthnError::InvalidAuthenticatorData);
                }
                let mut aaguid = [0u8; 16];
                aaguid.copy_from_slice(&raw_bytes[cursor..cursor + 16]);
                cursor += 16;

                let cred_id_len = u16::from_be_bytes(
                    raw_bytes[cursor..cursor + 2]
                        .try_into()
                        .map_err(|_| WebauthnError::InvalidAuthenticatorData)?,
                ) as usize;
                cursor += 2;

                if raw_bytes.len() < cursor + cred_id_len {
                    return Err(WebauthnError::InvalidAuthenticatorData);
                }
                let credential_id = raw_bytes[cursor..cursor + cred_id_len].to_vec();
                cursor += cred_id_len;

                let (key_value, consumed) = cbor::decode_prefix(&raw_bytes[cursor..])?;
                let credential_public_key = COSEKey::try_from(&key_value)?;
                cursor += consumed;

                Some(AttestedCredentialData {
                    aaguid,
                    credential_id,
                    credential_public_key,
                })
            } else {
                None
            };

        if flags & FLAG_EXTENSION_DATA != 0 {
            if cursor >= raw_bytes.len() {
                return Err(WebauthnError::InvalidAuthenticatorData);
            }
            // Extensions are a single CBOR-encoded item; parsed but not
            // semantically verified. We still walk
            // past it so that trailing-byte validation below is accurate.
            let (_ext_value, consumed) = cbor::decode_prefix(&raw_bytes[cursor..])?;
            cursor += consumed;
        }

        if cursor != raw_bytes.len() {
            return Err(WebauthnError::InvalidAuthenticatorData);
        }

        Ok(AuthenticatorData {
            rp_id_hash,
            flags,
            sign_count,
            attested_credential_data,
            raw_bytes: raw_bytes.to_vec(),
        })
    }
}

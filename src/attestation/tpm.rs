//! `tpm` attestation: statement shape is
//! recognised so that decoding never fails with `invalid_cbor`, but full
//! verification against a TPM's EK/AIK chain is not implemented.

use std::collections::BTreeMap;

use super::AttestationResult;
use crate::authenticator_data::AuthenticatorData;
use crate::cbor::Value;
use crate::error::{WebauthnError, WebauthnResult};

pub(super) fn verify(
    stmt_map: &BTreeMap<Value, Value>,
    _auth_data: &AuthenticatorData,
    _client_data_hash: &[u8; 32],
) -> WebauthnResult<AttestationResult> {
    let required = ["ver", "alg", "x5c", "sig", "certInfo", "pubArea"];
    for key in required {
        if !stmt_map.contains_key(&Value::Text(key.into())) {
            return Err(WebauthnError::AttestationStatementShapeInvalid);
        }
    }

    Err(WebauthnError::AttestationUnimplemented("tpm"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authenticator_data::AuthenticatorData;

    fn minimal_auth_data() -> AuthenticatorData {
        let mut v = vec![0xAAu8; 32];
        v.push(0b0000_0001);
        v.extend_from_slice(&0u32.to_be_bytes());
        AuthenticatorData::parse(&v).unwrap()
    }

    #[test]
    fn well_formed_statement_is_unimplemented_not_malformed() {
        let mut stmt = BTreeMap::new();
        for key in ["ver", "alg", "x5c", "sig", "certInfo", "pubArea"] {
            stmt.insert(Value::Text(key.into()), Value::Bytes(vec![0]));
        }
        let err = verify(&stmt, &minimal_auth_data(), &[0u8; 32]).unwrap_err();
        assert!(matches!(err, WebauthnError::AttestationUnimplemented("tpm")));
    }

    #[test]
    fn missing_fields_is_shape_invalid() {
        let stmt = BTreeMap::new();
        let err = verify(&stmt, &minimal_auth_data(), &[0u8; 32]).unwrap_err();
        assert!(matches!(err, WebauthnError::AttestationStatementShapeInvalid));
    }
}

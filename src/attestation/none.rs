//! `none` attestation: accepts only an empty statement map.

use std::collections::BTreeMap;

use super::AttestationResult;
use crate::cbor::Value;
use crate::challenge::AttestationType;
use crate::error::{WebauthnError, WebauthnResult};

pub(super) fn verify(stmt_map: &BTreeMap<Value, Value>) -> WebauthnResult<AttestationResult> {
    if !stmt_map.is_empty() {
        return Err(WebauthnError::AttestationStatementShapeInvalid);
    }

    Ok(AttestationResult {
        type_: AttestationType::None,
        trust_path: Vec::new(),
        metadata: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_map_succeeds() {
        let m = BTreeMap::new();
        let result = verify(&m).unwrap();
        assert_eq!(result.type_, AttestationType::None);
        assert!(result.trust_path.is_empty());
    }

    #[test]
    fn non_empty_map_fails() {
        let mut m = BTreeMap::new();
        m.insert(Value::Text("sig".into()), Value::Bytes(vec![1]));
        assert!(verify(&m).is_err());
    }
}

//! Metadata index (C3).
//!
//! A read-only, thread-safe lookup from AAGUID / attestation-certificate
//! key identifier (ACKI) to a metadata statement. The core only ever
//! borrows a snapshot for the duration of a single ceremony; the refresh
//! daemon that builds and swaps snapshots lives outside this crate (
//! out of scope; "writers never block readers").

use std::collections::HashMap;

/// The attestation type a metadata statement authorises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataAttestationType {
    BasicFull,
    Attca,
}

/// The subset of a FIDO metadata statement the core consumes. Capability
/// descriptors such as `key_protection` or `user_verification_details` are
/// passed through to the caller unchanged; this crate never interprets them.
#[derive(Debug, Clone)]
pub struct MetadataStatement {
    pub aaguid: Option<[u8; 16]>,
    pub acki: Option<[u8; 20]>,
    pub attestation_root_certificates: Vec<Vec<u8>>,
    pub attestation_types: Vec<MetadataAttestationType>,
    pub capabilities: HashMap<String, serde_json::Value>,
}

impl MetadataStatement {
    /// `basic_full` wins over `attca` when both are listed (documented
    /// precedence, since a source authenticator is assumed — though not
    /// required by spec — to declare only one).
    pub fn preferred_attestation_type(&self) -> Option<MetadataAttestationType> {
        if self
            .attestation_types
            .contains(&MetadataAttestationType::BasicFull)
        {
            Some(MetadataAttestationType::BasicFull)
        } else if self
            .attestation_types
            .contains(&MetadataAttestationType::Attca)
        {
            Some(MetadataAttestationType::Attca)
        } else {
            None
        }
    }
}

/// Read-only lookup interface the orchestrator and the `packed`/`fido-u2f`
/// verifiers consult. Absence is not an error — callers surface it as
/// attestation type `uncertain` unless policy forbids it.
pub trait MetadataIndex: Send + Sync {
    fn by_aaguid(&self, aaguid: &[u8; 16]) -> Option<&MetadataStatement>;
    fn by_acki(&self, acki: &[u8; 20]) -> Option<&MetadataStatement>;
}

/// A simple in-memory snapshot suitable for being swapped atomically behind
/// an `arc_swap`/`RwLock` by the external metadata-refresh collaborator.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadataIndex {
    by_aaguid: HashMap<[u8; 16], MetadataStatement>,
    by_acki: HashMap<[u8; 20], MetadataStatement>,
}

impl InMemoryMetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, statement: MetadataStatement) {
        if let Some(aaguid) = statement.aaguid {
            self.by_aaguid.insert(aaguid, statement.clone());
        }
        if let Some(acki) = statement.acki {
            self.by_acki.insert(acki, statement);
        }
    }
}

impl MetadataIndex for InMemoryMetadataIndex {
    fn by_aaguid(&self, aaguid: &[u8; 16]) -> Option<&MetadataStatement> {
        self.by_aaguid.get(aaguid)
    }

    fn by_acki(&self, acki: &[u8; 20]) -> Option<&MetadataStatement> {
        self.by_acki.get(acki)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(types: Vec<MetadataAttestationType>) -> MetadataStatement {
        MetadataStatement {
            aaguid: Some([1u8; 16]),
            acki: None,
            attestation_root_certificates: vec![],
            attestation_types: types,
            capabilities: HashMap::new(),
        }
    }

    #[test]
    fn basic_full_wins_over_attca() {
        let s = statement(vec![
            MetadataAttestationType::Attca,
            MetadataAttestationType::BasicFull,
        ]);
        assert_eq!(
            s.preferred_attestation_type(),
            Some(MetadataAttestationType::BasicFull)
        );
    }

    #[test]
    fn lookup_absence_is_none_not_error() {
        let idx = InMemoryMetadataIndex::new();
        assert!(idx.by_aaguid(&[0u8; 16]).is_none());
    }

    #[test]
    fn insert_then_lookup_by_aaguid() {
        let mut idx = InMemoryMetadataIndex::new();
        idx.insert(statement(vec![MetadataAttestationType::BasicFull]));
        assert!(idx.by_aaguid(&[1u8; 16]).is_some());
    }
}

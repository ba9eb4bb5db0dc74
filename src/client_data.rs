//! Client-data parser (C2).
//!
//! Parses the UTF-8 JSON blob the browser signs over. The raw bytes are
//! retained and hashed verbatim: the parser never normalises whitespace, so
//! re-parsing and re-hashing the same bytes always produces the same
//! `client_data_hash`, which is what every attestation and assertion
//! signature actually covers.

use base64urlsafedata::Base64UrlSafeData;
use serde::Deserialize;

use crate::crypto::compute_sha256;
use crate::error::{WebauthnError, WebauthnResult};

/// The ceremony a piece of client data claims to belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientDataType {
    Create,
    Get,
}

#[derive(Debug, Deserialize)]
struct RawClientData {
    #[serde(rename = "type")]
    type_: String,
    challenge: Base64UrlSafeData,
    origin: String,
    #[serde(rename = "tokenBinding")]
    token_binding: Option<RawTokenBinding>,
}

#[derive(Debug, Deserialize)]
struct RawTokenBinding {
    status: String,
}

/// Client data as parsed from the browser's JSON blob, plus the hash of the
/// raw bytes it was parsed from (the value every ceremony signature covers).
#[derive(Debug, Clone)]
pub struct ClientData {
    pub type_: ClientDataType,
    pub challenge: Vec<u8>,
    pub origin: String,
    pub token_binding_status: Option<String>,
    pub client_data_hash: [u8; 32],
}

impl ClientData {
    /// Parse the raw client-data JSON bytes exactly as received — no
    /// whitespace or charset normalisation, since the hash of these bytes
    /// must match what the authenticator actually signed.
    pub fn parse(raw_json: &[u8]) -> WebauthnResult<Self> {
        let raw: RawClientData = serde_json::from_slice(raw_json)?;

        let type_ = match raw.type_.as_str() {
            "webauthn.create" => ClientDataType::Create,
            "webauthn.get" => ClientDataType::Get,
            _ => return Err(WebauthnError::InvalidClientDataJson),
        };

        Ok(ClientData {
            type_,
            challenge: raw.challenge.into(),
            origin: raw.origin,
            token_binding_status: raw.token_binding.map(|t| t.status),
            client_data_hash: compute_sha256(raw_json),
        })
    }
}

//! # webauthn-core
//!
//! A relying-party core for WebAuthn/FIDO2: challenge generation plus
//! attestation (registration) and assertion (authentication) verification.
//!
//! This crate is deliberately narrow. It has no notion of a user, a
//! session, or storage — it takes the bytes a browser sends, the challenge
//! a caller previously generated, and returns a verified result or a tagged
//! error. Persisting credentials, managing accounts, and refreshing
//! attestation metadata all live above this crate.
//!
//! ```no_run
//! use webauthn_core::challenge::{ChallengeOptions, DefaultConfig, new_registration_challenge};
//! use webauthn_core::ceremony::register_credential;
//! use webauthn_core::metadata::InMemoryMetadataIndex;
//!
//! let challenge = new_registration_challenge(
//!     ChallengeOptions {
//!         origin: Some("https://example.com".into()),
//!         ..Default::default()
//!     },
//!     &DefaultConfig,
//! ).expect("challenge");
//!
//! let metadata_index = InMemoryMetadataIndex::new();
//! # let client_data_json: &[u8] = &[];
//! # let attestation_object: &[u8] = &[];
//! let result = register_credential(&challenge, client_data_json, attestation_object, &metadata_index);
//! ```

#![warn(missing_docs)]
#![deny(clippy::todo)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![deny(clippy::unreachable)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

#[macro_use]
extern crate tracing;

pub mod attestation;
pub mod authenticator_data;
pub mod ceremony;
pub mod challenge;
pub mod client_data;
pub mod cose;
pub mod crypto;
pub mod error;
pub mod metadata;

mod cbor;

pub use attestation::{AttestationFormat, AttestationResult};
pub use authenticator_data::{AttestedCredentialData, AuthenticatorData};
pub use ceremony::{authenticate_credential, register_credential, AuthenticationResult, RegistrationResult};
pub use challenge::{
    AllowedCredential, AttestationType, Challenge, ChallengeOptions, DefaultConfig, RpId,
    WebauthnConfig,
};
pub use client_data::{ClientData, ClientDataType};
pub use cose::{COSEAlgorithm, COSEKey, COSEKeyType};
pub use error::{WebauthnError, WebauthnResult};
pub use metadata::{InMemoryMetadataIndex, MetadataAttestationType, MetadataIndex, MetadataStatement};

/// Prelude re-exporting the types most callers need for a full ceremony.
pub mod prelude {
    pub use crate::attestation::{AttestationFormat, AttestationResult};
    pub use crate::authenticator_data::AuthenticatorData;
    pub use crate::ceremony::{
        authenticate_credential, register_credential, AuthenticationResult, RegistrationResult,
    };
    pub use crate::challenge::{
        AllowedCredential, AttestationType, Challenge, ChallengeOptions, DefaultConfig, RpId,
        WebauthnConfig,
    };
    pub use crate::cose::COSEKey;
    pub use crate::error::{WebauthnError, WebauthnResult};
    pub use crate::metadata::{InMemoryMetadataIndex, MetadataIndex, MetadataStatement};
}

//! Cryptographic operation wrapper for Webauthn. This module exists to
//! allow ease of auditing, safe operation wrappers for the webauthn library,
//! and cryptographic provider abstraction. This module currently uses
//! OpenSSL as the cryptographic primitive provider.
//!
//! Why OpenSSL over another rust crate? It lets us reconstruct a public key
//! from raw x/y coordinates rather than requiring a pre-wrapped SPKI
//! structure, which is exactly what COSE keys hand us.

use openssl::{pkey, sha, sign, x509};
use x509_parser::x509::X509Version;

use crate::cose::COSEAlgorithm;
use crate::error::{WebauthnError, WebauthnResult};

/// Verify `signature` over `verification_data` under `pkey`, using the
/// digest/padding implied by `stype`. EC signatures are DER `r,s` SEQUENCE
/// encoded and OpenSSL rejects non-canonical encodings by construction.
pub(crate) fn pkey_verify_signature(
    pkey: &pkey::PKeyRef<pkey::Public>,
    stype: COSEAlgorithm,
    signature: &[u8],
    verification_data: &[u8],
) -> WebauthnResult<bool> {
    match stype {
        COSEAlgorithm::ES256 => {
            let mut verifier = sign::Verifier::new(openssl::hash::MessageDigest::sha256(), pkey)?;
            verifier.update(verification_data)?;
            Ok(verifier.verify(signature)?)
        }
        COSEAlgorithm::RS256 => {
            let mut verifier = sign::Verifier::new(openssl::hash::MessageDigest::sha256(), pkey)?;
            verifier.set_rsa_padding(openssl::rsa::Padding::PKCS1)?;
            verifier.update(verification_data)?;
            Ok(verifier.verify(signature)?)
        }
        COSEAlgorithm::EDDSA => {
            // Ed25519 verification has no update/digest step: the whole
            // message is passed to verify_oneshot.
            let mut verifier = sign::Verifier::new_without_digest(pkey)?;
            Ok(verifier.verify_oneshot(signature, verification_data)?)
        }
        COSEAlgorithm::INSECURE_RS1 => {
            warn!("INSECURE SHA1 USAGE DETECTED");
            Err(WebauthnError::CredentialInsecureCryptography)
        }
        c_alg @ (COSEAlgorithm::ES384 | COSEAlgorithm::ES512) => {
            debug!(?c_alg, "unsupported cose algorithm");
            Err(WebauthnError::CoseKeyInvalidType)
        }
    }
}

/// Validate an x509 signature is valid for the supplied data, dispatching on
/// the supplied COSE algorithm exactly as a credential public key would.
pub fn verify_signature(
    alg: COSEAlgorithm,
    pubk: &x509::X509,
    signature: &[u8],
    verification_data: &[u8],
) -> WebauthnResult<bool> {
    let pkey = pubk.public_key()?;
    pkey_verify_signature(&pkey, alg, signature, verification_data)
}

/// Compute the SHA-256 of a slice of data.
pub fn compute_sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = sha::Sha256::new();
    hasher.update(data);
    hasher.finish()
}

/// Verify that an attestation certificate meets the requirements in
/// [Packed Attestation Statement Certificate Requirements][0].
///
/// [0]: https://www.w3.org/TR/webauthn-2/#sctn-packed-attestation-cert-requirements
pub(crate) fn assert_packed_attest_req(pubk: &x509::X509) -> WebauthnResult<()> {
    let der_bytes = pubk.to_der()?;
    let (_, x509_cert) = x509_parser::parse_x509_certificate(&der_bytes)
        .map_err(|_| WebauthnError::AttestationStatementX5cInvalid("packed"))?;

    if x509_cert.version != X509Version::V3 {
        trace!("X509 Version != v3");
        return Err(WebauthnError::AttestationCertificateRequirementsNotMet("packed"));
    }

    let subject = &x509_cert.subject;
    let subject_c = subject.iter_country().next();
    let subject_o = subject.iter_organization().next();
    let subject_ou = subject.iter_organizational_unit().next();
    let subject_cn = subject.iter_common_name().next();

    if subject_c.is_none() || subject_o.is_none() || subject_cn.is_none() {
        trace!("packed attestation cert subject missing required fields");
        return Err(WebauthnError::AttestationCertificateRequirementsNotMet("packed"));
    }

    match subject_ou.and_then(|ou| ou.attr_value().as_str().ok()) {
        Some("Authenticator Attestation") => {}
        _ => {
            trace!("packed attestation cert OU != Authenticator Attestation");
            return Err(WebauthnError::AttestationCertificateRequirementsNotMet("packed"));
        }
    }

    let basic_constraints = x509_cert
        .basic_constraints()
        .map_err(|_| WebauthnError::AttestationCertificateRequirementsNotMet("packed"))?;
    match basic_constraints {
        Some(bc) if !bc.value.ca => Ok(()),
        _ => {
            trace!("packed attestation cert CA must be false");
            Err(WebauthnError::AttestationCertificateRequirementsNotMet("packed"))
        }
    }
}

/// `fido-u2f` requires the leaf certificate's signature algorithm to be
/// `sha256WithRSAEncryption` and its public key to be on P-256 (step
/// 2). OpenSSL reports the public key's curve once loaded, so we use
/// `x509-parser` only for the signature algorithm OID.
pub(crate) fn assert_fido_u2f_attest_req(pubk: &x509::X509) -> WebauthnResult<()> {
    const SHA256_WITH_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.11";
    const PRIME256V1: &str = "1.2.840.10045.3.1.7";

    let der_bytes = pubk.to_der()?;
    let (_, x509_cert) = x509_parser::parse_x509_certificate(&der_bytes)
        .map_err(|_| WebauthnError::AttestationStatementX5cInvalid("fido_u2f"))?;

    if x509_cert.signature_algorithm.algorithm.to_id_string() != SHA256_WITH_RSA_ENCRYPTION {
        return Err(WebauthnError::AttestationInvalidPublicKeyAlgorithm("fido_u2f"));
    }

    let spki = &x509_cert.tbs_certificate.subject_pki;
    let curve_oid = spki
        .algorithm
        .parameters
        .as_ref()
        .and_then(|p| p.as_oid().ok())
        .map(|oid| oid.to_id_string());
    if curve_oid.as_deref() != Some(PRIME256V1) {
        return Err(WebauthnError::AttestationInvalidPublicKeyAlgorithm("fido_u2f"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        let digest = compute_sha256(b"abc");
        let expected: [u8; 32] = hex_literal::hex!(
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(expected, digest);
    }
}

//! COSE public keys (part of C1).
//!
//! Converts a decoded CBOR map into an internal public-key representation,
//! validated against its stated algorithm. Only the algorithms named in the
//! data model are wired up: ECDSA-P256-with-SHA256, RSASSA-PKCS1-v1_5
//! with SHA-256, and Ed25519. Additional COSE algorithms can be added as enum
//! members without touching any caller ("may be added without changing
//! callers").

use std::convert::TryFrom;

use openssl::{bn, ec, nid, pkey, rsa};

use crate::cbor::{cbor_try_bytes, cbor_try_i128, cbor_try_map, Value};
use crate::crypto;
use crate::error::{WebauthnError, WebauthnResult};

/// COSE key type identifiers, per RFC 8152 §13.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum COSEKeyTypeId {
    EC_OKP = 1,
    EC_EC2 = 2,
    EC_RSA = 3,
}

/// COSE algorithm identifiers recognised by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum COSEAlgorithm {
    ES256,
    ES384,
    ES512,
    RS256,
    EDDSA,
    INSECURE_RS1,
}

impl TryFrom<i128> for COSEAlgorithm {
    type Error = WebauthnError;
    fn try_from(i: i128) -> Result<Self, Self::Error> {
        match i {
            -7 => Ok(COSEAlgorithm::ES256),
            -35 => Ok(COSEAlgorithm::ES384),
            -36 => Ok(COSEAlgorithm::ES512),
            -257 => Ok(COSEAlgorithm::RS256),
            -8 => Ok(COSEAlgorithm::EDDSA),
            -65535 => Ok(COSEAlgorithm::INSECURE_RS1),
            _ => Err(WebauthnError::CoseKeyInvalidAlgorithm),
        }
    }
}

impl COSEAlgorithm {
    /// The COSE `alg` value as it appears on the wire.
    pub fn to_i128(self) -> i128 {
        match self {
            COSEAlgorithm::ES256 => -7,
            COSEAlgorithm::ES384 => -35,
            COSEAlgorithm::ES512 => -36,
            COSEAlgorithm::RS256 => -257,
            COSEAlgorithm::EDDSA => -8,
            COSEAlgorithm::INSECURE_RS1 => -65535,
        }
    }
}

/// The only ECDSA curve this crate wires up (P-256).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ECDSACurve {
    SECP256R1,
}

impl ECDSACurve {
    pub(crate) fn coordinate_size(self) -> usize {
        match self {
            ECDSACurve::SECP256R1 => 32,
        }
    }

    pub(crate) fn to_openssl_nid(self) -> nid::Nid {
        match self {
            ECDSACurve::SECP256R1 => nid::Nid::X9_62_PRIME256V1,
        }
    }
}

impl TryFrom<i128> for ECDSACurve {
    type Error = WebauthnError;
    fn try_from(i: i128) -> Result<Self, Self::Error> {
        match i {
            1 => Ok(ECDSACurve::SECP256R1),
            _ => Err(WebauthnError::EcdsaCurveInvalidNid),
        }
    }
}

/// An EC2 (`kty=2`) public key: curve plus raw big-endian coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct COSEEC2Key {
    pub curve: ECDSACurve,
    pub x: Vec<u8>,
    pub y: Vec<u8>,
}

/// An RSA (`kty=3`) public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct COSERSAKey {
    pub n: Vec<u8>,
    pub e: Vec<u8>,
}

/// An OKP (`kty=1`) public key, used for Ed25519.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct COSEOKPKey {
    pub x: [u8; 32],
}

/// The decoded key material, tagged by COSE key type.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum COSEKeyType {
    EC_EC2(COSEEC2Key),
    RSA(COSERSAKey),
    EC_OKP(COSEOKPKey),
}

/// A fully decoded and validated COSE public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct COSEKey {
    pub type_: COSEAlgorithm,
    pub key: COSEKeyType,
}

impl TryFrom<&Value> for COSEKey {
    type Error = WebauthnError;

    /// Parse a COSE key out of a decoded CBOR map, per RFC 8152 §7/§13.
    /// Key labels are small integers: `1` is the key type, `3` is the
    /// algorithm, and the remaining labels are algorithm-specific
    /// (`-1`/`-2`/`-3` for curve/x/y on EC keys, `-1`/`-2` for n/e on RSA).
    fn try_from(d: &Value) -> Result<COSEKey, Self::Error> {
        let m = cbor_try_map!(d)?;

        let key_type_value = m
            .get(&Value::Integer(1))
            .ok_or(WebauthnError::InvalidCoseKey)?;
        let key_type = cbor_try_i128!(key_type_value)?;

        let alg_value = m
            .get(&Value::Integer(3))
            .ok_or(WebauthnError::InvalidCoseKey)?;
        let alg = COSEAlgorithm::try_from(cbor_try_i128!(alg_value)?)?;

        if key_type == (COSEKeyTypeId::EC_EC2 as i128) && alg == COSEAlgorithm::ES256 {
            let curve_value = m
                .get(&Value::Integer(-1))
                .ok_or(WebauthnError::InvalidCoseKey)?;
            let curve = ECDSACurve::try_from(cbor_try_i128!(curve_value)?)?;

            let x = cbor_try_bytes!(m
                .get(&Value::Integer(-2))
                .ok_or(WebauthnError::InvalidCoseKey)?)?;
            let y = cbor_try_bytes!(m
                .get(&Value::Integer(-3))
                .ok_or(WebauthnError::InvalidCoseKey)?)?;

            let coord_len = curve.coordinate_size();
            if x.len() != coord_len || y.len() != coord_len {
                return Err(WebauthnError::CoseKeyEcdsaXyInvalid);
            }

            let cose_key = COSEKey {
                type_: alg,
                key: COSEKeyType::EC_EC2(COSEEC2Key {
                    curve,
                    x: x.clone(),
                    y: y.clone(),
                }),
            };
            cose_key.validate()?;
            Ok(cose_key)
        } else if key_type == (COSEKeyTypeId::EC_RSA as i128) && alg == COSEAlgorithm::RS256 {
            let n = cbor_try_bytes!(m
                .get(&Value::Integer(-1))
                .ok_or(WebauthnError::InvalidCoseKey)?)?;
            let e = cbor_try_bytes!(m
                .get(&Value::Integer(-2))
                .ok_or(WebauthnError::InvalidCoseKey)?)?;

            if n.is_empty() || e.is_empty() {
                return Err(WebauthnError::CoseKeyRsaNeInvalid);
            }

            let cose_key = COSEKey {
                type_: alg,
                key: COSEKeyType::RSA(COSERSAKey {
                    n: n.clone(),
                    e: e.clone(),
                }),
            };
            cose_key.validate()?;
            Ok(cose_key)
        } else if key_type == (COSEKeyTypeId::EC_OKP as i128) && alg == COSEAlgorithm::EDDSA {
            let x = cbor_try_bytes!(m
                .get(&Value::Integer(-2))
                .ok_or(WebauthnError::InvalidCoseKey)?)?;

            if x.len() != 32 {
                return Err(WebauthnError::CoseKeyEddsaXInvalid);
            }
            let mut x_temp = [0u8; 32];
            x_temp.copy_from_slice(x);

            let cose_key = COSEKey {
                type_: alg,
                key: COSEKeyType::EC_OKP(COSEOKPKey { x: x_temp }),
            };
            cose_key.validate()?;
            Ok(cose_key)
        } else {
            debug!(?key_type, ?alg, "unrecognised cose key type/algorithm combination");
            Err(WebauthnError::CoseKeyInvalidType)
        }
    }
}

impl COSEKey {
    /// `0x04 || x || y`, the uncompressed ANSI X9.62 point format used by
    /// `fido-u2f`. Only defined for EC2 keys.
    pub(crate) fn get_alg_key_ecc_x962_raw(&self) -> WebauthnResult<Vec<u8>> {
        match &self.key {
            COSEKeyType::EC_EC2(ec2k) => Ok(std::iter::once(0x04u8)
                .chain(ec2k.x.iter().copied())
                .chain(ec2k.y.iter().copied())
                .collect()),
            _ => Err(WebauthnError::CoseKeyInvalidType),
        }
    }

    /// Applications MUST check that the curve and the key type are
    /// consistent and reject a key if they are not; feeding the coordinates
    /// through OpenSSL validates that they are actually on the curve.
    fn validate(&self) -> WebauthnResult<()> {
        match &self.key {
            COSEKeyType::EC_EC2(ec2k) => {
                let ec_group = ec::EcGroup::from_curve_name(ec2k.curve.to_openssl_nid())?;
                let xbn = bn::BigNum::from_slice(&ec2k.x)?;
                let ybn = bn::BigNum::from_slice(&ec2k.y)?;
                let ec_key =
                    ec::EcKey::from_public_key_affine_coordinates(&ec_group, &xbn, &ybn)?;
                ec_key.check_key()?;
                Ok(())
            }
            COSEKeyType::RSA(rsak) => {
                let nbn = bn::BigNum::from_slice(&rsak.n)?;
                let ebn = bn::BigNum::from_slice(&rsak.e)?;
                let _ = rsa::Rsa::from_public_components(nbn, ebn)?;
                Ok(())
            }
            COSEKeyType::EC_OKP(_) => Ok(()),
        }
    }

    pub(crate) fn get_openssl_pkey(&self) -> WebauthnResult<pkey::PKey<pkey::Public>> {
        match &self.key {
            COSEKeyType::EC_EC2(ec2k) => {
                let ec_group = ec::EcGroup::from_curve_name(ec2k.curve.to_openssl_nid())?;
                let xbn = bn::BigNum::from_slice(&ec2k.x)?;
                let ybn = bn::BigNum::from_slice(&ec2k.y)?;
                let ec_key =
                    ec::EcKey::from_public_key_affine_coordinates(&ec_group, &xbn, &ybn)?;
                ec_key.check_key()?;
                Ok(pkey::PKey::from_ec_key(ec_key)?)
            }
            COSEKeyType::RSA(rsak) => {
                let nbn = bn::BigNum::from_slice(&rsak.n)?;
                let ebn = bn::BigNum::from_slice(&rsak.e)?;
                let rsa_key = rsa::Rsa::from_public_components(nbn, ebn)?;
                Ok(pkey::PKey::from_rsa(rsa_key)?)
            }
            COSEKeyType::EC_OKP(okpk) => Ok(pkey::PKey::public_key_from_raw_bytes(
                &okpk.x,
                pkey::Id::ED25519,
            )?),
        }
    }

    /// Verify that `signature` is a valid signature over `verification_data`
    /// under this key, using the digest/padding implied by its algorithm.
    /// Algorithm selection is driven entirely by the key's own COSE `alg`
    /// ("Algorithm selection is driven by the COSE `alg` field, never by
    /// the caller").
    pub fn verify_signature(
        &self,
        signature: &[u8],
        verification_data: &[u8],
    ) -> WebauthnResult<bool> {
        let pkey = self.get_openssl_pkey()?;
        crypto::pkey_verify_signature(&pkey, self.type_, signature, verification_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn cbor_es256() {
        let hex_data = hex!(
            "
            A5
            01 02
            03 26
            20 01
            21 58 20 65eda5a12577c2bae829437fe338701a10aaa375e1bb5b5de108de439c08551d
            22 58 20 1e52ed75701163f7f9e40ddf9f341b3dc9ba860af7e0ca7ca7e9eecd0084d19c"
        );
        let val: Value = serde_cbor_2::from_slice(&hex_data).unwrap();
        let key = COSEKey::try_from(&val).unwrap();
        assert_eq!(key.type_, COSEAlgorithm::ES256);
        match key.key {
            COSEKeyType::EC_EC2(pkey) => {
                assert_eq!(pkey.curve, ECDSACurve::SECP256R1);
                assert_eq!(pkey.x.len(), 32);
                assert_eq!(pkey.y.len(), 32);
            }
            _ => panic!("expected EC2 key"),
        }
    }

    #[test]
    fn rejects_wrong_coordinate_length() {
        let hex_data = hex!(
            "
            A5
            01 02
            03 26
            20 01
            21 42 0000
            22 58 20 1e52ed75701163f7f9e40ddf9f341b3dc9ba860af7e0ca7ca7e9eecd0084d19c"
        );
        let val: Value = serde_cbor_2::from_slice(&hex_data).unwrap();
        assert!(COSEKey::try_from(&val).is_err());
    }

    #[test]
    fn x962_raw_round_trip() {
        let x = vec![1u8; 32];
        let y = vec![2u8; 32];
        let key = COSEKey {
            type_: COSEAlgorithm::ES256,
            key: COSEKeyType::EC_EC2(COSEEC2Key {
                curve: ECDSACurve::SECP256R1,
                x: x.clone(),
                y: y.clone(),
            }),
        };
        let raw = key.get_alg_key_ecc_x962_raw().unwrap();
        assert_eq!(raw[0], 0x04);
        assert_eq!(&raw[1..33], x.as_slice());
        assert_eq!(&raw[33..65], y.as_slice());
    }
}

use crate::OwlError;
use elliptic_curve::bigint::{U256, U384, U576};
use elliptic_curve::group::{Group, GroupEncoding};
use elliptic_curve::ops::Reduce;
use elliptic_curve::subtle::{Choice, ConstantTimeEq};
use elliptic_curve::{Field, PrimeField};
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroize;

/// The NIST prime-order curves the scheme runs on.
///
/// Every scalar and point carries this tag; operations between values of
/// different curves fail closed with [`OwlError::Internal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveId {
    P256,
    P384,
    P521,
}

impl CurveId {
    /// Fixed width of a serialized scalar: the byte length of the group order.
    pub fn scalar_len(self) -> usize {
        match self {
            CurveId::P256 => 32,
            CurveId::P384 => 48,
            CurveId::P521 => 66,
        }
    }

    /// Length of a compressed SEC1 point encoding.
    pub fn point_len(self) -> usize {
        match self {
            CurveId::P256 => 33,
            CurveId::P384 => 49,
            CurveId::P521 => 67,
        }
    }

    /// The standard base point G.
    pub fn generator(self) -> OwlPoint {
        match self {
            CurveId::P256 => OwlPoint::P256(p256::ProjectivePoint::generator()),
            CurveId::P384 => OwlPoint::P384(p384::ProjectivePoint::generator()),
            CurveId::P521 => OwlPoint::P521(p521::ProjectivePoint::generator()),
        }
    }

    /// The group's neutral element.
    pub fn identity(self) -> OwlPoint {
        match self {
            CurveId::P256 => OwlPoint::P256(p256::ProjectivePoint::identity()),
            CurveId::P384 => OwlPoint::P384(p384::ProjectivePoint::identity()),
            CurveId::P521 => OwlPoint::P521(p521::ProjectivePoint::identity()),
        }
    }

    /// Uniformly random scalar in [1, n-1].
    pub fn random_scalar<R: Rng + CryptoRng>(self, rng: &mut R) -> OwlScalar {
        match self {
            CurveId::P256 => OwlScalar::P256(*p256::NonZeroScalar::random(rng)),
            CurveId::P384 => OwlScalar::P384(*p384::NonZeroScalar::random(rng)),
            CurveId::P521 => OwlScalar::P521(*p521::NonZeroScalar::random(rng)),
        }
    }

    /// Interprets a 32-byte digest as a big-endian integer reduced mod n.
    pub fn scalar_from_digest(self, digest: &[u8; 32]) -> OwlScalar {
        match self {
            CurveId::P256 => {
                let mut buf = p256::FieldBytes::default();
                buf.copy_from_slice(digest);
                OwlScalar::P256(<p256::Scalar as Reduce<U256>>::reduce_bytes(&buf))
            }
            CurveId::P384 => {
                let mut buf = p384::FieldBytes::default();
                buf.as_mut_slice()[16..].copy_from_slice(digest);
                OwlScalar::P384(<p384::Scalar as Reduce<U384>>::reduce_bytes(&buf))
            }
            CurveId::P521 => {
                let mut buf = p521::FieldBytes::default();
                buf.as_mut_slice()[34..].copy_from_slice(digest);
                OwlScalar::P521(<p521::Scalar as Reduce<U576>>::reduce_bytes(&buf))
            }
        }
    }
}

impl fmt::Display for CurveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurveId::P256 => f.write_str("p256"),
            CurveId::P384 => f.write_str("p384"),
            CurveId::P521 => f.write_str("p521"),
        }
    }
}

impl FromStr for CurveId {
    type Err = OwlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "p256" | "p-256" => Ok(CurveId::P256),
            "p384" | "p-384" => Ok(CurveId::P384),
            "p521" | "p-521" => Ok(CurveId::P521),
            other => Err(OwlError::Encoding(format!(
                "unknown curve '{other}'"
            ))),
        }
    }
}

fn curve_mismatch() -> OwlError {
    OwlError::Internal("operands belong to different curves".to_string())
}

macro_rules! scalar_binop {
    ($lhs:expr, $rhs:expr, |$a:ident, $b:ident| $body:expr) => {
        match ($lhs, $rhs) {
            (OwlScalar::P256($a), OwlScalar::P256($b)) => Ok(OwlScalar::P256($body)),
            (OwlScalar::P384($a), OwlScalar::P384($b)) => Ok(OwlScalar::P384($body)),
            (OwlScalar::P521($a), OwlScalar::P521($b)) => Ok(OwlScalar::P521($body)),
            _ => Err(curve_mismatch()),
        }
    };
}

macro_rules! point_binop {
    ($lhs:expr, $rhs:expr, |$a:ident, $b:ident| $body:expr) => {
        match ($lhs, $rhs) {
            (OwlPoint::P256($a), OwlPoint::P256($b)) => Ok(OwlPoint::P256($body)),
            (OwlPoint::P384($a), OwlPoint::P384($b)) => Ok(OwlPoint::P384($body)),
            (OwlPoint::P521($a), OwlPoint::P521($b)) => Ok(OwlPoint::P521($body)),
            _ => Err(curve_mismatch()),
        }
    };
}

macro_rules! point_scalar_op {
    ($lhs:expr, $rhs:expr, |$p:ident, $k:ident| $body:expr) => {
        match ($lhs, $rhs) {
            (OwlPoint::P256($p), OwlScalar::P256($k)) => Ok(OwlPoint::P256($body)),
            (OwlPoint::P384($p), OwlScalar::P384($k)) => Ok(OwlPoint::P384($body)),
            (OwlPoint::P521($p), OwlScalar::P521($k)) => Ok(OwlPoint::P521($body)),
            _ => Err(curve_mismatch()),
        }
    };
}

/// An element of Z_n for the tagged curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OwlScalar {
    P256(p256::Scalar),
    P384(p384::Scalar),
    P521(p521::Scalar),
}

impl OwlScalar {
    pub fn curve(&self) -> CurveId {
        match self {
            OwlScalar::P256(_) => CurveId::P256,
            OwlScalar::P384(_) => CurveId::P384,
            OwlScalar::P521(_) => CurveId::P521,
        }
    }

    pub fn add(&self, rhs: &OwlScalar) -> Result<OwlScalar, OwlError> {
        scalar_binop!(self, rhs, |a, b| *a + *b)
    }

    pub fn sub(&self, rhs: &OwlScalar) -> Result<OwlScalar, OwlError> {
        scalar_binop!(self, rhs, |a, b| *a - *b)
    }

    pub fn mul(&self, rhs: &OwlScalar) -> Result<OwlScalar, OwlError> {
        scalar_binop!(self, rhs, |a, b| *a * *b)
    }

    pub fn is_zero(&self) -> bool {
        match self {
            OwlScalar::P256(s) => bool::from(s.is_zero()),
            OwlScalar::P384(s) => bool::from(s.is_zero()),
            OwlScalar::P521(s) => bool::from(s.is_zero()),
        }
    }

    pub fn ct_eq(&self, rhs: &OwlScalar) -> Choice {
        match (self, rhs) {
            (OwlScalar::P256(a), OwlScalar::P256(b)) => a.ct_eq(b),
            (OwlScalar::P384(a), OwlScalar::P384(b)) => a.ct_eq(b),
            (OwlScalar::P521(a), OwlScalar::P521(b)) => a.ct_eq(b),
            _ => Choice::from(0),
        }
    }

    /// Fixed-width big-endian encoding, the same byte length as n.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            OwlScalar::P256(s) => s.to_repr().to_vec(),
            OwlScalar::P384(s) => s.to_repr().to_vec(),
            OwlScalar::P521(s) => s.to_repr().to_vec(),
        }
    }

    /// Decodes a fixed-width big-endian scalar, rejecting values >= n.
    pub fn from_bytes(curve: CurveId, bytes: &[u8]) -> Result<OwlScalar, OwlError> {
        if bytes.len() != curve.scalar_len() {
            return Err(OwlError::Encoding(format!(
                "scalar encoding must be {} bytes, got {}",
                curve.scalar_len(),
                bytes.len()
            )));
        }
        let out_of_range = || OwlError::Encoding("scalar not in [0, n)".to_string());
        match curve {
            CurveId::P256 => {
                let repr = p256::FieldBytes::clone_from_slice(bytes);
                Option::from(p256::Scalar::from_repr(repr))
                    .map(OwlScalar::P256)
                    .ok_or_else(out_of_range)
            }
            CurveId::P384 => {
                let repr = p384::FieldBytes::clone_from_slice(bytes);
                Option::from(p384::Scalar::from_repr(repr))
                    .map(OwlScalar::P384)
                    .ok_or_else(out_of_range)
            }
            CurveId::P521 => {
                let repr = p521::FieldBytes::clone_from_slice(bytes);
                Option::from(p521::Scalar::from_repr(repr))
                    .map(OwlScalar::P521)
                    .ok_or_else(out_of_range)
            }
        }
    }
}

impl Zeroize for OwlScalar {
    fn zeroize(&mut self) {
        match self {
            OwlScalar::P256(s) => s.zeroize(),
            OwlScalar::P384(s) => s.zeroize(),
            OwlScalar::P521(s) => s.zeroize(),
        }
    }
}

/// An element of the tagged curve's prime-order group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OwlPoint {
    P256(p256::ProjectivePoint),
    P384(p384::ProjectivePoint),
    P521(p521::ProjectivePoint),
}

impl OwlPoint {
    pub fn curve(&self) -> CurveId {
        match self {
            OwlPoint::P256(_) => CurveId::P256,
            OwlPoint::P384(_) => CurveId::P384,
            OwlPoint::P521(_) => CurveId::P521,
        }
    }

    pub fn add(&self, rhs: &OwlPoint) -> Result<OwlPoint, OwlError> {
        point_binop!(self, rhs, |a, b| *a + *b)
    }

    pub fn sub(&self, rhs: &OwlPoint) -> Result<OwlPoint, OwlError> {
        point_binop!(self, rhs, |a, b| *a - *b)
    }

    pub fn mul(&self, k: &OwlScalar) -> Result<OwlPoint, OwlError> {
        point_scalar_op!(self, k, |p, k| *p * *k)
    }

    pub fn is_identity(&self) -> bool {
        match self {
            OwlPoint::P256(p) => bool::from(p.is_identity()),
            OwlPoint::P384(p) => bool::from(p.is_identity()),
            OwlPoint::P521(p) => bool::from(p.is_identity()),
        }
    }

    /// A usable public value: on the curve (guaranteed by construction and by
    /// decoding) and not the neutral element.
    pub fn is_valid(&self) -> bool {
        !self.is_identity()
    }

    pub fn ct_eq(&self, rhs: &OwlPoint) -> Choice {
        match (self, rhs) {
            (OwlPoint::P256(a), OwlPoint::P256(b)) => a.ct_eq(b),
            (OwlPoint::P384(a), OwlPoint::P384(b)) => a.ct_eq(b),
            (OwlPoint::P521(a), OwlPoint::P521(b)) => a.ct_eq(b),
            _ => Choice::from(0),
        }
    }

    /// Compressed SEC1 encoding. The identity has no encoding; asking for one
    /// is an internal error, never a partial result.
    pub fn to_bytes(&self) -> Result<Vec<u8>, OwlError> {
        if self.is_identity() {
            return Err(OwlError::Internal(
                "the identity element cannot be serialized".to_string(),
            ));
        }
        Ok(match self {
            OwlPoint::P256(p) => p.to_bytes().to_vec(),
            OwlPoint::P384(p) => p.to_bytes().to_vec(),
            OwlPoint::P521(p) => p.to_bytes().to_vec(),
        })
    }

    /// Decodes a compressed SEC1 point, rejecting wrong lengths, encodings of
    /// the identity, and x coordinates with no point on the curve.
    pub fn from_bytes(curve: CurveId, bytes: &[u8]) -> Result<OwlPoint, OwlError> {
        if bytes.len() != curve.point_len() {
            return Err(OwlError::Encoding(format!(
                "point encoding must be {} bytes, got {}",
                curve.point_len(),
                bytes.len()
            )));
        }
        let invalid = || OwlError::Encoding("encoding is not a curve point".to_string());
        match curve {
            CurveId::P256 => {
                let repr =
                    elliptic_curve::sec1::CompressedPoint::<p256::NistP256>::clone_from_slice(
                        bytes,
                    );
                Option::from(p256::ProjectivePoint::from_bytes(&repr))
                    .map(OwlPoint::P256)
                    .ok_or_else(invalid)
            }
            CurveId::P384 => {
                let repr =
                    elliptic_curve::sec1::CompressedPoint::<p384::NistP384>::clone_from_slice(
                        bytes,
                    );
                Option::from(p384::ProjectivePoint::from_bytes(&repr))
                    .map(OwlPoint::P384)
                    .ok_or_else(invalid)
            }
            CurveId::P521 => {
                let repr =
                    elliptic_curve::sec1::CompressedPoint::<p521::NistP521>::clone_from_slice(
                        bytes,
                    );
                Option::from(p521::ProjectivePoint::from_bytes(&repr))
                    .map(OwlPoint::P521)
                    .ok_or_else(invalid)
            }
        }
    }
}

impl Zeroize for OwlPoint {
    // The inner coordinates are not reachable from here; resetting to the
    // identity discards the secret point.
    fn zeroize(&mut self) {
        match self {
            OwlPoint::P256(p) => *p = p256::ProjectivePoint::identity(),
            OwlPoint::P384(p) => *p = p384::ProjectivePoint::identity(),
            OwlPoint::P521(p) => *p = p521::ProjectivePoint::identity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn test_rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn point_round_trip_all_curves() {
        let mut rng = test_rng();
        for curve in [CurveId::P256, CurveId::P384, CurveId::P521] {
            let k = curve.random_scalar(&mut rng);
            let p = curve.generator().mul(&k).unwrap();
            let bytes = p.to_bytes().unwrap();
            assert_eq!(bytes.len(), curve.point_len());
            let decoded = OwlPoint::from_bytes(curve, &bytes).unwrap();
            assert_eq!(p, decoded);
        }
    }

    #[test]
    fn scalar_round_trip_all_curves() {
        let mut rng = test_rng();
        for curve in [CurveId::P256, CurveId::P384, CurveId::P521] {
            let k = curve.random_scalar(&mut rng);
            let bytes = k.to_bytes();
            assert_eq!(bytes.len(), curve.scalar_len());
            let decoded = OwlScalar::from_bytes(curve, &bytes).unwrap();
            assert_eq!(k, decoded);
        }
    }

    #[test]
    fn scalar_decode_rejects_out_of_range() {
        let too_big = [0xffu8; 32];
        assert!(OwlScalar::from_bytes(CurveId::P256, &too_big).is_err());
    }

    #[test]
    fn point_decode_rejects_bad_input() {
        assert!(OwlPoint::from_bytes(CurveId::P256, &[0u8; 33]).is_err());
        assert!(OwlPoint::from_bytes(CurveId::P256, &[0u8; 12]).is_err());
        // Valid P-384 bytes are the wrong length for P-256.
        let mut rng = test_rng();
        let p = CurveId::P384
            .generator()
            .mul(&CurveId::P384.random_scalar(&mut rng))
            .unwrap();
        assert!(OwlPoint::from_bytes(CurveId::P256, &p.to_bytes().unwrap()).is_err());
    }

    #[test]
    fn identity_is_not_serializable() {
        assert!(CurveId::P256.identity().to_bytes().is_err());
        assert!(!CurveId::P256.identity().is_valid());
    }

    #[test]
    fn mixed_curve_arithmetic_fails_closed() {
        let mut rng = test_rng();
        let a = CurveId::P256.random_scalar(&mut rng);
        let b = CurveId::P384.random_scalar(&mut rng);
        assert!(matches!(a.mul(&b), Err(OwlError::Internal(_))));
        let p = CurveId::P256.generator();
        let q = CurveId::P384.generator();
        assert!(matches!(p.add(&q), Err(OwlError::Internal(_))));
        assert!(matches!(p.mul(&b), Err(OwlError::Internal(_))));
    }

    #[test]
    fn digest_reduction_is_deterministic() {
        let digest = [7u8; 32];
        for curve in [CurveId::P256, CurveId::P384, CurveId::P521] {
            let a = curve.scalar_from_digest(&digest);
            let b = curve.scalar_from_digest(&digest);
            assert_eq!(a, b);
            assert!(!a.is_zero());
        }
    }

    #[test]
    fn scalar_zeroize_nulls_the_value() {
        let mut rng = test_rng();
        let mut k = CurveId::P256.random_scalar(&mut rng);
        assert!(!k.is_zero());
        k.zeroize();
        assert!(k.is_zero());
    }

    #[test]
    fn curve_id_parses_common_spellings() {
        assert_eq!("p256".parse::<CurveId>().unwrap(), CurveId::P256);
        assert_eq!("P-521".parse::<CurveId>().unwrap(), CurveId::P521);
        assert!("p999".parse::<CurveId>().is_err());
    }
}

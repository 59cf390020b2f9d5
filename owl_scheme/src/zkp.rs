//! Schnorr non-interactive zero-knowledge proofs of discrete-log knowledge,
//! made non-interactive with the Fiat-Shamir transform. The base point is an
//! argument rather than a constant: the login flows verify proofs over
//! composite bases such as X1+X2+X3.

use crate::group::{OwlPoint, OwlScalar};
use crate::hash_utils::{self, HashInput};
use crate::wire;
use crate::{CurveId, OwlError};
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

/// Proof of knowledge of x with public = base * x, bound to a prover
/// identity string. Validity is established only by [`Zkp::verify`].
#[derive(Debug, Clone, PartialEq)]
pub struct Zkp {
    pub h: OwlScalar,
    pub r: OwlScalar,
}

impl Zkp {
    /// Proves knowledge of `x` for `public = base * x`.
    pub fn prove<R: Rng + CryptoRng>(
        x: &OwlScalar,
        base: &OwlPoint,
        public: &OwlPoint,
        prover_id: &str,
        rng: &mut R,
    ) -> Result<Self, OwlError> {
        let curve = base.curve();
        let v = Zeroizing::new(curve.random_scalar(rng));
        let commitment = base.mul(&v)?;
        let h = challenge(curve, base, &commitment, public, prover_id)?;
        let xh = Zeroizing::new(x.mul(&h)?);
        let r = v.sub(&xh)?;
        Ok(Zkp { h, r })
    }

    /// Recomputes the commitment from (h, r) and checks the challenge.
    ///
    /// Returns false for any identity base or public value; a peer that
    /// drives a composite base to the neutral element must read as a failed
    /// proof, not as a panic further down.
    pub fn verify(
        &self,
        base: &OwlPoint,
        public: &OwlPoint,
        prover_id: &str,
    ) -> Result<bool, OwlError> {
        if !base.is_valid() || !public.is_valid() {
            return Ok(false);
        }
        let commitment = base.mul(&self.r)?.add(&public.mul(&self.h)?)?;
        if commitment.is_identity() {
            return Ok(false);
        }
        let expected = challenge(base.curve(), base, &commitment, public, prover_id)?;
        Ok(bool::from(expected.ct_eq(&self.h)))
    }

    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) {
        wire::put(buf, &self.h.to_bytes());
        wire::put(buf, &self.r.to_bytes());
    }

    pub(crate) fn decode_from(
        curve: CurveId,
        reader: &mut wire::Reader<'_>,
    ) -> Result<Self, OwlError> {
        let h = OwlScalar::from_bytes(curve, reader.take()?)?;
        let r = OwlScalar::from_bytes(curve, reader.take()?)?;
        Ok(Zkp { h, r })
    }
}

fn challenge(
    curve: CurveId,
    base: &OwlPoint,
    commitment: &OwlPoint,
    public: &OwlPoint,
    prover_id: &str,
) -> Result<OwlScalar, OwlError> {
    use HashInput::{Point, Text};
    hash_utils::hash_to_scalar(
        curve,
        &[
            Point(base),
            Point(commitment),
            Point(public),
            Text(prover_id),
        ],
    )
}

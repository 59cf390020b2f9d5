//! Canonical tuple hashing and key-confirmation MACs.
//!
//! Every hash input is framed as a 4-byte big-endian length followed by the
//! canonical octets of the value: compressed SEC1 for points, fixed-width
//! big-endian for scalars, UTF-8 for identity strings. The framing is what
//! keeps two different argument tuples from ever producing the same byte
//! stream.

use crate::group::{CurveId, OwlPoint, OwlScalar};
use crate::zkp::Zkp;
use crate::OwlError;
use elliptic_curve::subtle::ConstantTimeEq;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// One argument of the tuple hash.
pub enum HashInput<'a> {
    Point(&'a OwlPoint),
    Scalar(&'a OwlScalar),
    Text(&'a str),
}

fn absorb<D: digest::Update>(out: &mut D, inputs: &[HashInput<'_>]) -> Result<(), OwlError> {
    for input in inputs {
        let bytes = match input {
            HashInput::Point(p) => p.to_bytes()?,
            HashInput::Scalar(s) => s.to_bytes(),
            HashInput::Text(t) => t.as_bytes().to_vec(),
        };
        out.update(&(bytes.len() as u32).to_be_bytes());
        out.update(&bytes);
    }
    Ok(())
}

/// H(x1, ..., xm): SHA-256 over the framed arguments, reduced mod n.
pub fn hash_to_scalar(
    curve: CurveId,
    inputs: &[HashInput<'_>],
) -> Result<OwlScalar, OwlError> {
    let mut hasher = Sha256::new();
    absorb(&mut hasher, inputs)?;
    let digest: [u8; 32] = hasher.finalize().into();
    Ok(curve.scalar_from_digest(&digest))
}

/// HMAC-SHA-256 keyed by serialize(K) over the framed arguments.
pub fn confirmation_tag(
    shared: &OwlPoint,
    inputs: &[HashInput<'_>],
) -> Result<[u8; 32], OwlError> {
    let key_bytes = Zeroizing::new(shared.to_bytes()?);
    let mut mac = HmacSha256::new_from_slice(&key_bytes)
        .map_err(|e| OwlError::Internal(format!("HMAC key setup failed: {e}")))?;
    absorb(&mut mac, inputs)?;
    Ok(mac.finalize().into_bytes().into())
}

/// The session key k = SHA-256(serialize(K)), raw digest.
pub fn session_key(shared: &OwlPoint) -> Result<[u8; 32], OwlError> {
    let key_bytes = Zeroizing::new(shared.to_bytes()?);
    let mut hasher = Sha256::new();
    Digest::update(&mut hasher, key_bytes.as_slice());
    Ok(hasher.finalize().into())
}

/// Constant-time comparison of two key-confirmation tags.
pub fn verify_key_confirmation(expected: &[u8; 32], received: &[u8; 32]) -> bool {
    bool::from(expected[..].ct_eq(&received[..]))
}

/// Everything both parties bind into the final transcript hash, in the one
/// order they must agree on.
pub struct Transcript<'a> {
    pub username: &'a str,
    pub server_id: &'a str,
    pub x1_pub: &'a OwlPoint,
    pub x2_pub: &'a OwlPoint,
    pub zkp_x1: &'a Zkp,
    pub zkp_x2: &'a Zkp,
    pub x3_pub: &'a OwlPoint,
    pub x4_pub: &'a OwlPoint,
    pub zkp_x3: &'a Zkp,
    pub zkp_x4: &'a Zkp,
    pub beta: &'a OwlPoint,
    pub zkp_beta: &'a Zkp,
    pub alpha: &'a OwlPoint,
    pub zkp_alpha: &'a Zkp,
}

/// h = H(K, U, X1, X2, PI1, PI2, serverId, X3, X4, PI3, PI4, beta, PIbeta,
/// alpha, PIalpha), with each proof contributing its (h, r) pair.
pub fn transcript_hash(
    curve: CurveId,
    shared: &OwlPoint,
    t: &Transcript<'_>,
) -> Result<OwlScalar, OwlError> {
    use HashInput::{Point, Scalar, Text};
    hash_to_scalar(
        curve,
        &[
            Point(shared),
            Text(t.username),
            Point(t.x1_pub),
            Point(t.x2_pub),
            Scalar(&t.zkp_x1.h),
            Scalar(&t.zkp_x1.r),
            Scalar(&t.zkp_x2.h),
            Scalar(&t.zkp_x2.r),
            Text(t.server_id),
            Point(t.x3_pub),
            Point(t.x4_pub),
            Scalar(&t.zkp_x3.h),
            Scalar(&t.zkp_x3.r),
            Scalar(&t.zkp_x4.h),
            Scalar(&t.zkp_x4.r),
            Point(t.beta),
            Scalar(&t.zkp_beta.h),
            Scalar(&t.zkp_beta.r),
            Point(t.alpha),
            Scalar(&t.zkp_alpha.h),
            Scalar(&t.zkp_alpha.r),
        ],
    )
}

/// Directional key-confirmation tag: the sending party lists its own identity
/// and ephemeral points first, the peer's second.
pub fn key_confirmation_tag(
    shared: &OwlPoint,
    own_id: &str,
    peer_id: &str,
    own_first: &OwlPoint,
    own_second: &OwlPoint,
    peer_first: &OwlPoint,
    peer_second: &OwlPoint,
) -> Result<[u8; 32], OwlError> {
    use HashInput::{Point, Text};
    confirmation_tag(
        shared,
        &[
            Text(own_id),
            Text(peer_id),
            Point(own_first),
            Point(own_second),
            Point(peer_first),
            Point(peer_second),
        ],
    )
}

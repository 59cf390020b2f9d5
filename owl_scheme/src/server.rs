//! Server side of the registration and login exchanges.
//!
//! The server never sees the password: registration hands it the verifier
//! pair (pi, T) plus a one-time X3, and every later login works from that
//! record alone. Whatever storage backs the record must return all four
//! fields byte-identical to what [`register`] produced.

use crate::hash_utils::{self, Transcript};
use crate::zkp::Zkp;
use crate::{
    AuthFinishRequest, AuthFinishResult, AuthInitRequest, AuthInitResponse, AuthInitialValues,
    Config, OwlError, RegistrationRequest, SessionKey, UserCredentials,
};
use rand::{CryptoRng, Rng};
use zeroize::{Zeroize, Zeroizing};

/// Turns a registration request into the persistent per-user record.
///
/// The one-time scalar x3 is discarded here; only X3 and its proof survive,
/// so even this server cannot later prove knowledge of x3 again.
pub fn register<R: Rng + CryptoRng>(
    config: &Config,
    request: &RegistrationRequest,
    rng: &mut R,
) -> Result<UserCredentials, OwlError> {
    if !request.t_pub.is_valid() || request.pi.is_zero() {
        return Err(OwlError::MalformedRequest);
    }
    let curve = config.curve();
    let g = curve.generator();
    let x3 = Zeroizing::new(curve.random_scalar(rng));
    let x3_pub = g.mul(&x3)?;
    let zkp_x3 = Zkp::prove(&x3, &g, &x3_pub, config.server_id(), rng)?;
    Ok(UserCredentials {
        x3_pub,
        zkp_x3,
        pi: request.pi,
        t_pub: request.t_pub,
    })
}

/// A syntactically valid record for a user that does not exist.
///
/// Running a login against it walks every step and fails only at the final
/// password check, so an unknown username costs an attacker the same time
/// as a wrong password.
pub fn dummy_credentials<R: Rng + CryptoRng>(
    config: &Config,
    rng: &mut R,
) -> Result<UserCredentials, OwlError> {
    let curve = config.curve();
    let g = curve.generator();
    let pi = curve.random_scalar(rng);
    let t_secret = Zeroizing::new(curve.random_scalar(rng));
    let t_pub = g.mul(&t_secret)?;
    let x3 = Zeroizing::new(curve.random_scalar(rng));
    let x3_pub = g.mul(&x3)?;
    let zkp_x3 = Zkp::prove(&x3, &g, &x3_pub, config.server_id(), rng)?;
    Ok(UserCredentials {
        x3_pub,
        zkp_x3,
        pi,
        t_pub,
    })
}

/// Login flow 2: checks the client's ephemerals and proofs, then answers
/// with X4, beta = (X1+X2+X3) * (x4 * pi), and proofs for both. The returned
/// state must be fed to [`auth_finish`] exactly once.
pub fn auth_init<R: Rng + CryptoRng>(
    config: &Config,
    username: &str,
    request: &AuthInitRequest,
    credentials: &UserCredentials,
    rng: &mut R,
) -> Result<(AuthInitResponse, AuthInitialValues), OwlError> {
    if !request.x1_pub.is_valid() || !request.x2_pub.is_valid() {
        return Err(OwlError::MalformedRequest);
    }
    let curve = config.curve();
    let g = curve.generator();
    let proofs_ok = request.zkp_x1.verify(&g, &request.x1_pub, username)?
        && request.zkp_x2.verify(&g, &request.x2_pub, username)?;
    if !proofs_ok {
        return Err(OwlError::ZkpVerification);
    }

    let x4 = curve.random_scalar(rng);
    let x4_pub = g.mul(&x4)?;
    let zkp_x4 = Zkp::prove(&x4, &g, &x4_pub, config.server_id(), rng)?;

    let s = Zeroizing::new(x4.mul(&credentials.pi)?);
    let beta_base = request
        .x1_pub
        .add(&request.x2_pub)?
        .add(&credentials.x3_pub)?;
    let beta = beta_base.mul(&s)?;
    if beta.is_identity() {
        return Err(OwlError::MalformedRequest);
    }
    let zkp_beta = Zkp::prove(&s, &beta_base, &beta, config.server_id(), rng)?;

    let response = AuthInitResponse {
        x3_pub: credentials.x3_pub,
        x4_pub,
        zkp_x3: credentials.zkp_x3.clone(),
        zkp_x4: zkp_x4.clone(),
        beta,
        zkp_beta: zkp_beta.clone(),
    };
    let initial = AuthInitialValues {
        t_pub: credentials.t_pub,
        pi: credentials.pi,
        x4,
        x1_pub: request.x1_pub,
        x2_pub: request.x2_pub,
        x3_pub: credentials.x3_pub,
        x4_pub,
        beta,
        zkp_x1: request.zkp_x1.clone(),
        zkp_x2: request.zkp_x2.clone(),
        zkp_x3: credentials.zkp_x3.clone(),
        zkp_x4,
        zkp_beta,
    };
    Ok((response, initial))
}

/// Login finish: verifies the client's alpha proof, derives the shared point
/// K, and runs the password check G*r + T*h = X1 that ties the whole
/// transcript back to the registered verifier.
pub fn auth_finish(
    config: &Config,
    username: &str,
    request: &AuthFinishRequest,
    initial: AuthInitialValues,
) -> Result<AuthFinishResult, OwlError> {
    let curve = config.curve();
    let server_id = config.server_id();

    let alpha_base = initial
        .x1_pub
        .add(&initial.x3_pub)?
        .add(&initial.x4_pub)?;
    if !request
        .zkp_alpha
        .verify(&alpha_base, &request.alpha, username)?
    {
        return Err(OwlError::ZkpVerification);
    }

    let s = Zeroizing::new(initial.x4.mul(&initial.pi)?);
    let mut shared = request
        .alpha
        .sub(&initial.x2_pub.mul(&s)?)?
        .mul(&initial.x4)?;

    let h = hash_utils::transcript_hash(
        curve,
        &shared,
        &Transcript {
            username,
            server_id,
            x1_pub: &initial.x1_pub,
            x2_pub: &initial.x2_pub,
            zkp_x1: &initial.zkp_x1,
            zkp_x2: &initial.zkp_x2,
            x3_pub: &initial.x3_pub,
            x4_pub: &initial.x4_pub,
            zkp_x3: &initial.zkp_x3,
            zkp_x4: &initial.zkp_x4,
            beta: &initial.beta,
            zkp_beta: &initial.zkp_beta,
            alpha: &request.alpha,
            zkp_alpha: &request.zkp_alpha,
        },
    )?;

    let expected_x1 = curve
        .generator()
        .mul(&request.r)?
        .add(&initial.t_pub.mul(&h)?)?;
    if !bool::from(expected_x1.ct_eq(&initial.x1_pub)) {
        shared.zeroize();
        return Err(OwlError::Authentication);
    }

    let key = hash_utils::session_key(&shared)?;
    let kc = hash_utils::key_confirmation_tag(
        &shared,
        server_id,
        username,
        &initial.x3_pub,
        &initial.x4_pub,
        &initial.x1_pub,
        &initial.x2_pub,
    )?;
    let kc_test = hash_utils::key_confirmation_tag(
        &shared,
        username,
        server_id,
        &initial.x1_pub,
        &initial.x2_pub,
        &initial.x3_pub,
        &initial.x4_pub,
    )?;
    shared.zeroize();
    drop(initial);

    Ok(AuthFinishResult {
        key: SessionKey(key),
        kc,
        kc_test,
    })
}

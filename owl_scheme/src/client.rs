//! Client side of the registration and login exchanges.

use crate::group::OwlScalar;
use crate::hash_utils::{self, HashInput, Transcript};
use crate::zkp::Zkp;
use crate::{
    AuthFinishRequest, AuthFinishResult, AuthInitRequest, AuthInitResponse, ClientInitVals,
    Config, OwlError, RegistrationRequest, SessionKey,
};
use rand::{CryptoRng, Rng};
use zeroize::{Zeroize, Zeroizing};

/// Derives t = H(U, w) and the verifier pi = H(t) from the password.
fn password_scalars(
    config: &Config,
    username: &str,
    password: &str,
) -> Result<(Zeroizing<OwlScalar>, OwlScalar), OwlError> {
    let curve = config.curve();
    let t = Zeroizing::new(hash_utils::hash_to_scalar(
        curve,
        &[HashInput::Text(username), HashInput::Text(password)],
    )?);
    let pi = hash_utils::hash_to_scalar(curve, &[HashInput::Scalar(&t)])?;
    if pi.is_zero() {
        return Err(OwlError::WeakPassword);
    }
    Ok((t, pi))
}

/// One-shot registration: derives the verifier pair (pi, T) to hand to the
/// server over an already-secured channel. The intermediate secret t never
/// leaves this function.
pub fn register(
    config: &Config,
    username: &str,
    password: &str,
) -> Result<RegistrationRequest, OwlError> {
    let (t, pi) = password_scalars(config, username, password)?;
    let t_pub = config.curve().generator().mul(&t)?;
    Ok(RegistrationRequest {
        username: username.to_string(),
        pi,
        t_pub,
    })
}

/// Login flow 1: fresh ephemerals x1, x2 with knowledge proofs bound to the
/// username. The returned state must be fed to [`auth_finish`] exactly once.
pub fn auth_init<R: Rng + CryptoRng>(
    config: &Config,
    username: &str,
    password: &str,
    rng: &mut R,
) -> Result<(AuthInitRequest, ClientInitVals), OwlError> {
    let (t, pi) = password_scalars(config, username, password)?;
    let curve = config.curve();
    let g = curve.generator();

    let x1 = curve.random_scalar(rng);
    let x2 = curve.random_scalar(rng);
    let x1_pub = g.mul(&x1)?;
    let x2_pub = g.mul(&x2)?;
    let zkp_x1 = Zkp::prove(&x1, &g, &x1_pub, username, rng)?;
    let zkp_x2 = Zkp::prove(&x2, &g, &x2_pub, username, rng)?;

    let request = AuthInitRequest {
        x1_pub,
        x2_pub,
        zkp_x1: zkp_x1.clone(),
        zkp_x2: zkp_x2.clone(),
    };
    let vals = ClientInitVals {
        username: username.to_string(),
        t: *t,
        pi,
        x1,
        x2,
        x1_pub,
        x2_pub,
        zkp_x1,
        zkp_x2,
    };
    Ok((request, vals))
}

/// Login flow 3: verifies everything the server sent, derives the shared
/// point K and the session key, and produces the finish message together
/// with both key-confirmation tags.
pub fn auth_finish<R: Rng + CryptoRng>(
    config: &Config,
    response: &AuthInitResponse,
    vals: ClientInitVals,
    rng: &mut R,
) -> Result<(AuthFinishRequest, AuthFinishResult), OwlError> {
    let curve = config.curve();
    let server_id = config.server_id();

    if !response.x3_pub.is_valid() || !response.x4_pub.is_valid() || !response.beta.is_valid() {
        return Err(OwlError::MalformedResponse);
    }

    let g = curve.generator();
    let beta_base = vals.x1_pub.add(&vals.x2_pub)?.add(&response.x3_pub)?;
    let proofs_ok = response.zkp_x3.verify(&g, &response.x3_pub, server_id)?
        && response.zkp_x4.verify(&g, &response.x4_pub, server_id)?
        && response
            .zkp_beta
            .verify(&beta_base, &response.beta, server_id)?;
    if !proofs_ok {
        return Err(OwlError::ZkpVerification);
    }

    let s = Zeroizing::new(vals.x2.mul(&vals.pi)?);
    let alpha_base = vals.x1_pub.add(&response.x3_pub)?.add(&response.x4_pub)?;
    let alpha = alpha_base.mul(&s)?;
    let zkp_alpha = Zkp::prove(&s, &alpha_base, &alpha, &vals.username, rng)?;

    let mut shared = response
        .beta
        .sub(&response.x4_pub.mul(&s)?)?
        .mul(&vals.x2)?;

    let h = hash_utils::transcript_hash(
        curve,
        &shared,
        &Transcript {
            username: &vals.username,
            server_id,
            x1_pub: &vals.x1_pub,
            x2_pub: &vals.x2_pub,
            zkp_x1: &vals.zkp_x1,
            zkp_x2: &vals.zkp_x2,
            x3_pub: &response.x3_pub,
            x4_pub: &response.x4_pub,
            zkp_x3: &response.zkp_x3,
            zkp_x4: &response.zkp_x4,
            beta: &response.beta,
            zkp_beta: &response.zkp_beta,
            alpha: &alpha,
            zkp_alpha: &zkp_alpha,
        },
    )?;
    let th = Zeroizing::new(vals.t.mul(&h)?);
    let r = vals.x1.sub(&th)?;

    let key = hash_utils::session_key(&shared)?;
    let kc = hash_utils::key_confirmation_tag(
        &shared,
        &vals.username,
        server_id,
        &vals.x1_pub,
        &vals.x2_pub,
        &response.x3_pub,
        &response.x4_pub,
    )?;
    let kc_test = hash_utils::key_confirmation_tag(
        &shared,
        server_id,
        &vals.username,
        &response.x3_pub,
        &response.x4_pub,
        &vals.x1_pub,
        &vals.x2_pub,
    )?;
    shared.zeroize();
    drop(vals);

    Ok((
        AuthFinishRequest {
            alpha,
            zkp_alpha,
            r,
        },
        AuthFinishResult {
            key: SessionKey(key),
            kc,
            kc_test,
        },
    ))
}

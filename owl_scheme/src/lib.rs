//! Owl: an augmented password-authenticated key exchange.
//!
//! A client and a server that share only a password run a one-flow
//! registration and a three-flow login to derive a high-entropy session key.
//! The server stores a password verifier rather than the password, so a
//! leaked credential database yields only an offline dictionary target, and
//! neither a network attacker nor a corrupted server learns enough to
//! impersonate the client later.
//!
//! The crate is transport-free: every operation is a pure function from a
//! message plus prior state to the next message, the next state, or a typed
//! failure. Callers move bytes however they like, as long as the canonical
//! encodings produced by the `to_bytes`/`from_bytes` codecs survive intact.

pub mod client;
pub mod group;
pub mod hash_utils;
pub mod server;
pub mod zkp;

pub use group::{CurveId, OwlPoint, OwlScalar};
pub use hash_utils::verify_key_confirmation;
pub use zkp::Zkp;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

// --- Error Handling ---

#[derive(Error, Debug)]
pub enum OwlError {
    #[error("malformed request")]
    MalformedRequest,
    #[error("malformed response")]
    MalformedResponse,
    #[error("zero-knowledge proof verification failed")]
    ZkpVerification,
    #[error("authentication failed")]
    Authentication,
    #[error("no credentials stored for this user")]
    UnknownUser,
    #[error("password digest reduced to the zero verifier")]
    WeakPassword,
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error("internal error: {0}")]
    Internal(String),
}

// --- Configuration ---

/// Immutable per-deployment parameters, created once at process start.
#[derive(Debug, Clone)]
pub struct Config {
    curve: CurveId,
    server_id: String,
}

impl Config {
    /// The server identity string must be non-empty and stable: it is bound
    /// into every server-originated proof and into the transcript hash, so
    /// changing it invalidates all existing credentials.
    pub fn new(curve: CurveId, server_id: impl Into<String>) -> Result<Self, OwlError> {
        let server_id = server_id.into();
        if server_id.is_empty() {
            return Err(OwlError::Internal(
                "server identity must not be empty".to_string(),
            ));
        }
        Ok(Config { curve, server_id })
    }

    pub fn curve(&self) -> CurveId {
        self.curve
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }
}

// --- Wire framing ---

pub(crate) mod wire {
    use crate::OwlError;

    pub fn put(buf: &mut Vec<u8>, field: &[u8]) {
        buf.extend_from_slice(&(field.len() as u32).to_be_bytes());
        buf.extend_from_slice(field);
    }

    pub struct Reader<'a> {
        rest: &'a [u8],
    }

    impl<'a> Reader<'a> {
        pub fn new(bytes: &'a [u8]) -> Self {
            Reader { rest: bytes }
        }

        pub fn take(&mut self) -> Result<&'a [u8], OwlError> {
            if self.rest.len() < 4 {
                return Err(OwlError::Encoding(
                    "truncated length prefix".to_string(),
                ));
            }
            let (prefix, tail) = self.rest.split_at(4);
            let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
            if tail.len() < len {
                return Err(OwlError::Encoding("truncated field".to_string()));
            }
            let (field, rest) = tail.split_at(len);
            self.rest = rest;
            Ok(field)
        }

        pub fn take_str(&mut self) -> Result<&'a str, OwlError> {
            std::str::from_utf8(self.take()?)
                .map_err(|_| OwlError::Encoding("field is not valid UTF-8".to_string()))
        }

        pub fn expect_end(&self) -> Result<(), OwlError> {
            if self.rest.is_empty() {
                Ok(())
            } else {
                Err(OwlError::Encoding(
                    "trailing bytes after message".to_string(),
                ))
            }
        }
    }
}

// --- Messages ---

/// One-shot registration message. Sent over a channel the deployment already
/// authenticates and encrypts; the protocol itself does not protect it.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationRequest {
    pub username: String,
    pub pi: OwlScalar,
    pub t_pub: OwlPoint,
}

impl RegistrationRequest {
    pub fn to_bytes(&self) -> Result<Vec<u8>, OwlError> {
        let mut buf = Vec::new();
        wire::put(&mut buf, self.username.as_bytes());
        wire::put(&mut buf, &self.pi.to_bytes());
        wire::put(&mut buf, &self.t_pub.to_bytes()?);
        Ok(buf)
    }

    pub fn from_bytes(curve: CurveId, bytes: &[u8]) -> Result<Self, OwlError> {
        let mut reader = wire::Reader::new(bytes);
        let username = reader.take_str()?.to_string();
        let pi = OwlScalar::from_bytes(curve, reader.take()?)?;
        let t_pub = OwlPoint::from_bytes(curve, reader.take()?)?;
        reader.expect_end()?;
        Ok(RegistrationRequest {
            username,
            pi,
            t_pub,
        })
    }
}

/// The server-persisted record for one user. Holds no password, but `pi` and
/// `t_pub` are still sensitive: they are an offline dictionary-attack target.
#[derive(Debug, Clone, PartialEq)]
pub struct UserCredentials {
    pub x3_pub: OwlPoint,
    pub zkp_x3: Zkp,
    pub pi: OwlScalar,
    pub t_pub: OwlPoint,
}

impl UserCredentials {
    pub fn to_bytes(&self) -> Result<Vec<u8>, OwlError> {
        let mut buf = Vec::new();
        wire::put(&mut buf, &self.x3_pub.to_bytes()?);
        self.zkp_x3.encode_into(&mut buf);
        wire::put(&mut buf, &self.pi.to_bytes());
        wire::put(&mut buf, &self.t_pub.to_bytes()?);
        Ok(buf)
    }

    pub fn from_bytes(curve: CurveId, bytes: &[u8]) -> Result<Self, OwlError> {
        let mut reader = wire::Reader::new(bytes);
        let x3_pub = OwlPoint::from_bytes(curve, reader.take()?)?;
        let zkp_x3 = Zkp::decode_from(curve, &mut reader)?;
        let pi = OwlScalar::from_bytes(curve, reader.take()?)?;
        let t_pub = OwlPoint::from_bytes(curve, reader.take()?)?;
        reader.expect_end()?;
        Ok(UserCredentials {
            x3_pub,
            zkp_x3,
            pi,
            t_pub,
        })
    }
}

/// Login flow 1, client to server.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthInitRequest {
    pub x1_pub: OwlPoint,
    pub x2_pub: OwlPoint,
    pub zkp_x1: Zkp,
    pub zkp_x2: Zkp,
}

impl AuthInitRequest {
    pub fn to_bytes(&self) -> Result<Vec<u8>, OwlError> {
        let mut buf = Vec::new();
        wire::put(&mut buf, &self.x1_pub.to_bytes()?);
        wire::put(&mut buf, &self.x2_pub.to_bytes()?);
        self.zkp_x1.encode_into(&mut buf);
        self.zkp_x2.encode_into(&mut buf);
        Ok(buf)
    }

    pub fn from_bytes(curve: CurveId, bytes: &[u8]) -> Result<Self, OwlError> {
        let mut reader = wire::Reader::new(bytes);
        let x1_pub = OwlPoint::from_bytes(curve, reader.take()?)?;
        let x2_pub = OwlPoint::from_bytes(curve, reader.take()?)?;
        let zkp_x1 = Zkp::decode_from(curve, &mut reader)?;
        let zkp_x2 = Zkp::decode_from(curve, &mut reader)?;
        reader.expect_end()?;
        Ok(AuthInitRequest {
            x1_pub,
            x2_pub,
            zkp_x1,
            zkp_x2,
        })
    }
}

/// Login flow 2, server to client.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthInitResponse {
    pub x3_pub: OwlPoint,
    pub x4_pub: OwlPoint,
    pub zkp_x3: Zkp,
    pub zkp_x4: Zkp,
    pub beta: OwlPoint,
    pub zkp_beta: Zkp,
}

impl AuthInitResponse {
    pub fn to_bytes(&self) -> Result<Vec<u8>, OwlError> {
        let mut buf = Vec::new();
        wire::put(&mut buf, &self.x3_pub.to_bytes()?);
        wire::put(&mut buf, &self.x4_pub.to_bytes()?);
        self.zkp_x3.encode_into(&mut buf);
        self.zkp_x4.encode_into(&mut buf);
        wire::put(&mut buf, &self.beta.to_bytes()?);
        self.zkp_beta.encode_into(&mut buf);
        Ok(buf)
    }

    pub fn from_bytes(curve: CurveId, bytes: &[u8]) -> Result<Self, OwlError> {
        let mut reader = wire::Reader::new(bytes);
        let x3_pub = OwlPoint::from_bytes(curve, reader.take()?)?;
        let x4_pub = OwlPoint::from_bytes(curve, reader.take()?)?;
        let zkp_x3 = Zkp::decode_from(curve, &mut reader)?;
        let zkp_x4 = Zkp::decode_from(curve, &mut reader)?;
        let beta = OwlPoint::from_bytes(curve, reader.take()?)?;
        let zkp_beta = Zkp::decode_from(curve, &mut reader)?;
        reader.expect_end()?;
        Ok(AuthInitResponse {
            x3_pub,
            x4_pub,
            zkp_x3,
            zkp_x4,
            beta,
            zkp_beta,
        })
    }
}

/// Login flow 3, client to server.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthFinishRequest {
    pub alpha: OwlPoint,
    pub zkp_alpha: Zkp,
    pub r: OwlScalar,
}

impl AuthFinishRequest {
    pub fn to_bytes(&self) -> Result<Vec<u8>, OwlError> {
        let mut buf = Vec::new();
        wire::put(&mut buf, &self.alpha.to_bytes()?);
        self.zkp_alpha.encode_into(&mut buf);
        wire::put(&mut buf, &self.r.to_bytes());
        Ok(buf)
    }

    pub fn from_bytes(curve: CurveId, bytes: &[u8]) -> Result<Self, OwlError> {
        let mut reader = wire::Reader::new(bytes);
        let alpha = OwlPoint::from_bytes(curve, reader.take()?)?;
        let zkp_alpha = Zkp::decode_from(curve, &mut reader)?;
        let r = OwlScalar::from_bytes(curve, reader.take()?)?;
        reader.expect_end()?;
        Ok(AuthFinishRequest {
            alpha,
            zkp_alpha,
            r,
        })
    }
}

// --- Session state ---

/// Client-held state between login flows 1 and 3. Consumed exactly once by
/// [`client::auth_finish`]; the secret scalars are nulled on drop.
#[derive(Debug)]
pub struct ClientInitVals {
    pub(crate) username: String,
    pub(crate) t: OwlScalar,
    pub(crate) pi: OwlScalar,
    pub(crate) x1: OwlScalar,
    pub(crate) x2: OwlScalar,
    pub(crate) x1_pub: OwlPoint,
    pub(crate) x2_pub: OwlPoint,
    pub(crate) zkp_x1: Zkp,
    pub(crate) zkp_x2: Zkp,
}

impl Zeroize for ClientInitVals {
    fn zeroize(&mut self) {
        self.t.zeroize();
        self.pi.zeroize();
        self.x1.zeroize();
        self.x2.zeroize();
    }
}

impl Drop for ClientInitVals {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// Server-held state between login flow 2 and the finish step. Consumed
/// exactly once by [`server::auth_finish`]; the secret scalars are nulled on
/// drop whether the login succeeds or not.
#[derive(Debug)]
pub struct AuthInitialValues {
    pub(crate) t_pub: OwlPoint,
    pub(crate) pi: OwlScalar,
    pub(crate) x4: OwlScalar,
    pub(crate) x1_pub: OwlPoint,
    pub(crate) x2_pub: OwlPoint,
    pub(crate) x3_pub: OwlPoint,
    pub(crate) x4_pub: OwlPoint,
    pub(crate) beta: OwlPoint,
    pub(crate) zkp_x1: Zkp,
    pub(crate) zkp_x2: Zkp,
    pub(crate) zkp_x3: Zkp,
    pub(crate) zkp_x4: Zkp,
    pub(crate) zkp_beta: Zkp,
}

impl Zeroize for AuthInitialValues {
    fn zeroize(&mut self) {
        self.pi.zeroize();
        self.x4.zeroize();
    }
}

impl Drop for AuthInitialValues {
    fn drop(&mut self) {
        self.zeroize();
    }
}

// --- Results ---

/// The derived 32-byte session key. The caller decides how long to keep it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionKey(pub [u8; 32]);

impl Zeroize for SessionKey {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// Terminal output of a successful login step on either side.
///
/// `kc` goes to the peer; `kc_test` is what the peer's `kc` must equal.
/// Compare with [`verify_key_confirmation`] only.
#[derive(Debug, Clone)]
pub struct AuthFinishResult {
    pub key: SessionKey,
    pub kc: [u8; 32],
    pub kc_test: [u8; 32],
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const USERNAME: &str = "alice";
    const PASSWORD: &str = "correct horse battery staple";
    const SERVER_ID: &str = "srv";

    fn test_rng() -> StdRng {
        StdRng::seed_from_u64(0)
    }

    fn config(curve: CurveId) -> Config {
        Config::new(curve, SERVER_ID).unwrap()
    }

    #[derive(Debug)]
    struct LoginOutcome {
        client: AuthFinishResult,
        server: AuthFinishResult,
    }

    /// register -> auth_init -> auth_init -> auth_finish -> auth_finish.
    fn run_login<R: rand::Rng + rand::CryptoRng>(
        cfg: &Config,
        password: &str,
        creds: &UserCredentials,
        rng: &mut R,
    ) -> Result<LoginOutcome, OwlError> {
        let (request, vals) = client::auth_init(cfg, USERNAME, password, rng)?;
        let (response, initial) = server::auth_init(cfg, USERNAME, &request, creds, rng)?;
        let (finish, client_result) = client::auth_finish(cfg, &response, vals, rng)?;
        let server_result = server::auth_finish(cfg, USERNAME, &finish, initial)?;
        Ok(LoginOutcome {
            client: client_result,
            server: server_result,
        })
    }

    fn register(cfg: &Config, rng: &mut StdRng) -> UserCredentials {
        let request = client::register(cfg, USERNAME, PASSWORD).unwrap();
        server::register(cfg, &request, rng).unwrap()
    }

    #[test]
    fn full_login_succeeds_on_every_curve() {
        for curve in [CurveId::P256, CurveId::P384, CurveId::P521] {
            let mut rng = test_rng();
            let cfg = config(curve);
            let creds = register(&cfg, &mut rng);
            let outcome = run_login(&cfg, PASSWORD, &creds, &mut rng).unwrap();

            assert_eq!(outcome.client.key, outcome.server.key);
            assert!(verify_key_confirmation(
                &outcome.server.kc_test,
                &outcome.client.kc
            ));
            assert!(verify_key_confirmation(
                &outcome.client.kc_test,
                &outcome.server.kc
            ));
        }
    }

    #[test]
    fn wrong_password_fails_the_password_check() {
        let mut rng = test_rng();
        let cfg = config(CurveId::P256);
        let creds = register(&cfg, &mut rng);
        let err = run_login(&cfg, "not the password", &creds, &mut rng).unwrap_err();
        assert!(matches!(err, OwlError::Authentication));
    }

    #[test]
    fn wrong_password_confirmation_tags_never_match() {
        let mut rng = test_rng();
        let cfg = config(CurveId::P256);
        let creds = register(&cfg, &mut rng);

        let (request, vals) =
            client::auth_init(&cfg, USERNAME, "not the password", &mut rng).unwrap();
        let (response, initial) =
            server::auth_init(&cfg, USERNAME, &request, &creds, &mut rng).unwrap();
        let (finish, _client_result) =
            client::auth_finish(&cfg, &response, vals, &mut rng).unwrap();
        // The server aborts before deriving any tag, so nothing it holds can
        // match the client's side.
        let err = server::auth_finish(&cfg, USERNAME, &finish, initial).unwrap_err();
        assert!(matches!(err, OwlError::Authentication));
    }

    #[test]
    fn tampered_x1_is_rejected_by_the_server() {
        let mut rng = test_rng();
        let cfg = config(CurveId::P256);
        let creds = register(&cfg, &mut rng);

        let (mut request, _vals) = client::auth_init(&cfg, USERNAME, PASSWORD, &mut rng).unwrap();
        request.x1_pub = request.x1_pub.add(&cfg.curve().generator()).unwrap();

        let err = server::auth_init(&cfg, USERNAME, &request, &creds, &mut rng).unwrap_err();
        assert!(matches!(err, OwlError::ZkpVerification));
    }

    #[test]
    fn identity_x2_is_rejected_as_malformed() {
        let mut rng = test_rng();
        let cfg = config(CurveId::P256);
        let creds = register(&cfg, &mut rng);

        let (mut request, _vals) = client::auth_init(&cfg, USERNAME, PASSWORD, &mut rng).unwrap();
        request.x2_pub = cfg.curve().identity();

        let err = server::auth_init(&cfg, USERNAME, &request, &creds, &mut rng).unwrap_err();
        assert!(matches!(err, OwlError::MalformedRequest));
    }

    #[test]
    fn identity_x4_is_rejected_as_malformed() {
        let mut rng = test_rng();
        let cfg = config(CurveId::P256);
        let creds = register(&cfg, &mut rng);

        let (request, vals) = client::auth_init(&cfg, USERNAME, PASSWORD, &mut rng).unwrap();
        let (mut response, _initial) =
            server::auth_init(&cfg, USERNAME, &request, &creds, &mut rng).unwrap();
        response.x4_pub = cfg.curve().identity();

        let err = client::auth_finish(&cfg, &response, vals, &mut rng).unwrap_err();
        assert!(matches!(err, OwlError::MalformedResponse));
    }

    #[test]
    fn tampered_finish_message_fails_the_password_check() {
        let mut rng = test_rng();
        let cfg = config(CurveId::P256);
        let creds = register(&cfg, &mut rng);

        let (request, vals) = client::auth_init(&cfg, USERNAME, PASSWORD, &mut rng).unwrap();
        let (response, initial) =
            server::auth_init(&cfg, USERNAME, &request, &creds, &mut rng).unwrap();
        let (mut finish, _client_result) =
            client::auth_finish(&cfg, &response, vals, &mut rng).unwrap();

        // Any bump of r detaches it from the transcript-bound challenge.
        let one = hash_utils::hash_to_scalar(
            cfg.curve(),
            &[hash_utils::HashInput::Text("bump")],
        )
        .unwrap();
        finish.r = finish.r.add(&one).unwrap();

        let err = server::auth_finish(&cfg, USERNAME, &finish, initial).unwrap_err();
        assert!(matches!(err, OwlError::Authentication));
    }

    #[test]
    fn tampered_alpha_fails_proof_verification() {
        let mut rng = test_rng();
        let cfg = config(CurveId::P256);
        let creds = register(&cfg, &mut rng);

        let (request, vals) = client::auth_init(&cfg, USERNAME, PASSWORD, &mut rng).unwrap();
        let (response, initial) =
            server::auth_init(&cfg, USERNAME, &request, &creds, &mut rng).unwrap();
        let (mut finish, _client_result) =
            client::auth_finish(&cfg, &response, vals, &mut rng).unwrap();
        finish.alpha = finish.alpha.add(&cfg.curve().generator()).unwrap();

        let err = server::auth_finish(&cfg, USERNAME, &finish, initial).unwrap_err();
        assert!(matches!(err, OwlError::ZkpVerification));
    }

    #[test]
    fn swapped_verifier_point_fails_authentication() {
        let mut rng = test_rng();
        let cfg = config(CurveId::P256);
        let mut creds = register(&cfg, &mut rng);
        // Simulate a credential database where T was replaced by an
        // unrelated point.
        creds.t_pub = cfg
            .curve()
            .generator()
            .mul(&cfg.curve().random_scalar(&mut rng))
            .unwrap();

        let err = run_login(&cfg, PASSWORD, &creds, &mut rng).unwrap_err();
        assert!(matches!(err, OwlError::Authentication));
    }

    #[test]
    fn mismatched_server_identity_fails_proof_verification() {
        let mut rng = test_rng();
        let cfg = config(CurveId::P256);
        let creds = register(&cfg, &mut rng);

        let (request, vals) = client::auth_init(&cfg, USERNAME, PASSWORD, &mut rng).unwrap();
        let (response, _initial) =
            server::auth_init(&cfg, USERNAME, &request, &creds, &mut rng).unwrap();

        let other_cfg = Config::new(CurveId::P256, "other-server").unwrap();
        let err = client::auth_finish(&other_cfg, &response, vals, &mut rng).unwrap_err();
        assert!(matches!(err, OwlError::ZkpVerification));
    }

    #[test]
    fn concurrent_sessions_derive_independent_keys() {
        let mut rng = test_rng();
        let cfg = config(CurveId::P256);
        let creds = register(&cfg, &mut rng);

        let first = run_login(&cfg, PASSWORD, &creds, &mut rng).unwrap();
        let second = run_login(&cfg, PASSWORD, &creds, &mut rng).unwrap();
        assert_eq!(first.client.key, first.server.key);
        assert_eq!(second.client.key, second.server.key);
        assert_ne!(first.client.key, second.client.key);
    }

    #[test]
    fn replayed_finish_message_is_rejected_by_a_fresh_session() {
        let mut rng = test_rng();
        let cfg = config(CurveId::P256);
        let creds = register(&cfg, &mut rng);

        let (request, vals) = client::auth_init(&cfg, USERNAME, PASSWORD, &mut rng).unwrap();
        let (response, initial) =
            server::auth_init(&cfg, USERNAME, &request, &creds, &mut rng).unwrap();
        let (finish, _client_result) =
            client::auth_finish(&cfg, &response, vals, &mut rng).unwrap();
        server::auth_finish(&cfg, USERNAME, &finish, initial).unwrap();

        // A fresh session has fresh x1, x2 and a fresh x4, so the recorded
        // finish message can bind to neither.
        let (request2, _vals2) = client::auth_init(&cfg, USERNAME, PASSWORD, &mut rng).unwrap();
        let (_response2, initial2) =
            server::auth_init(&cfg, USERNAME, &request2, &creds, &mut rng).unwrap();
        let err = server::auth_finish(&cfg, USERNAME, &finish, initial2).unwrap_err();
        assert!(matches!(
            err,
            OwlError::ZkpVerification | OwlError::Authentication
        ));
    }

    #[test]
    fn fixed_randomness_reproduces_the_same_session() {
        // Deterministic end-to-end scenario: same seed, same derived values.
        // TODO: freeze the literal P-256 key and tag bytes produced by the
        // first verified reference run and assert them here.
        let cfg = config(CurveId::P256);

        let mut rng_a = StdRng::seed_from_u64(123);
        let creds_a = {
            let request = client::register(&cfg, USERNAME, PASSWORD).unwrap();
            server::register(&cfg, &request, &mut rng_a).unwrap()
        };
        let first = run_login(&cfg, PASSWORD, &creds_a, &mut rng_a).unwrap();

        let mut rng_b = StdRng::seed_from_u64(123);
        let creds_b = {
            let request = client::register(&cfg, USERNAME, PASSWORD).unwrap();
            server::register(&cfg, &request, &mut rng_b).unwrap()
        };
        let second = run_login(&cfg, PASSWORD, &creds_b, &mut rng_b).unwrap();

        assert_eq!(creds_a, creds_b);
        assert_eq!(first.client.key, second.client.key);
        assert_eq!(hex::encode(first.client.kc), hex::encode(second.client.kc));
        assert_eq!(first.server.kc_test, second.server.kc_test);
    }

    #[test]
    fn registration_is_deterministic_per_user_and_password() {
        let cfg = config(CurveId::P256);
        let a = client::register(&cfg, USERNAME, PASSWORD).unwrap();
        let b = client::register(&cfg, USERNAME, PASSWORD).unwrap();
        let c = client::register(&cfg, USERNAME, "other password").unwrap();
        assert_eq!(a, b);
        assert_ne!(a.pi, c.pi);
        assert_ne!(a.t_pub, c.t_pub);
    }

    #[test]
    fn malformed_registration_is_rejected() {
        let mut rng = test_rng();
        let cfg = config(CurveId::P256);
        let mut request = client::register(&cfg, USERNAME, PASSWORD).unwrap();
        request.t_pub = cfg.curve().identity();
        let err = server::register(&cfg, &request, &mut rng).unwrap_err();
        assert!(matches!(err, OwlError::MalformedRequest));
    }

    #[test]
    fn dummy_credentials_run_the_full_flow() {
        // The user-enumeration hook: a login against a dummy record must walk
        // every step and die at the final password check, not earlier.
        let mut rng = test_rng();
        let cfg = config(CurveId::P256);
        let creds = server::dummy_credentials(&cfg, &mut rng).unwrap();
        let err = run_login(&cfg, PASSWORD, &creds, &mut rng).unwrap_err();
        assert!(matches!(err, OwlError::Authentication));
    }

    #[test]
    fn state_objects_zeroize_their_secrets() {
        let mut rng = test_rng();
        let cfg = config(CurveId::P256);
        let creds = register(&cfg, &mut rng);

        let (request, mut vals) = client::auth_init(&cfg, USERNAME, PASSWORD, &mut rng).unwrap();
        vals.zeroize();
        assert!(vals.t.is_zero());
        assert!(vals.pi.is_zero());
        assert!(vals.x1.is_zero());
        assert!(vals.x2.is_zero());

        let (_response, mut initial) =
            server::auth_init(&cfg, USERNAME, &request, &creds, &mut rng).unwrap();
        initial.zeroize();
        assert!(initial.pi.is_zero());
        assert!(initial.x4.is_zero());
    }

    #[test]
    fn message_codecs_round_trip() {
        let mut rng = test_rng();
        let cfg = config(CurveId::P384);
        let curve = cfg.curve();
        let creds = register(&cfg, &mut rng);

        let reg = client::register(&cfg, USERNAME, PASSWORD).unwrap();
        assert_eq!(
            RegistrationRequest::from_bytes(curve, &reg.to_bytes().unwrap()).unwrap(),
            reg
        );
        assert_eq!(
            UserCredentials::from_bytes(curve, &creds.to_bytes().unwrap()).unwrap(),
            creds
        );

        let (request, vals) = client::auth_init(&cfg, USERNAME, PASSWORD, &mut rng).unwrap();
        assert_eq!(
            AuthInitRequest::from_bytes(curve, &request.to_bytes().unwrap()).unwrap(),
            request
        );

        let (response, _initial) =
            server::auth_init(&cfg, USERNAME, &request, &creds, &mut rng).unwrap();
        assert_eq!(
            AuthInitResponse::from_bytes(curve, &response.to_bytes().unwrap()).unwrap(),
            response
        );

        let (finish, _result) = client::auth_finish(&cfg, &response, vals, &mut rng).unwrap();
        assert_eq!(
            AuthFinishRequest::from_bytes(curve, &finish.to_bytes().unwrap()).unwrap(),
            finish
        );
    }

    #[test]
    fn codecs_reject_truncated_and_padded_input() {
        let mut rng = test_rng();
        let cfg = config(CurveId::P256);
        let (request, _vals) = client::auth_init(&cfg, USERNAME, PASSWORD, &mut rng).unwrap();
        let bytes = request.to_bytes().unwrap();

        assert!(AuthInitRequest::from_bytes(cfg.curve(), &bytes[..bytes.len() - 1]).is_err());
        let mut padded = bytes.clone();
        padded.push(0);
        assert!(AuthInitRequest::from_bytes(cfg.curve(), &padded).is_err());
    }

    #[test]
    fn config_rejects_an_empty_server_identity() {
        assert!(Config::new(CurveId::P256, "").is_err());
    }
}

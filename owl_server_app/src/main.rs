//! Demo HTTP server for the Owl exchange.
//!
//! Transport, storage, and error masking live here, outside the scheme
//! crate: messages cross the wire as hex-encoded canonical bytes inside
//! JSON, credentials sit in an in-memory map, and every login failure is
//! reported to the peer as the same "authentication failed" regardless of
//! what actually went wrong.

mod telemetry;

use std::{collections::HashMap, env, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::post,
};
use dotenvy::dotenv;
use owl_scheme::{
    AuthFinishRequest, AuthInitRequest, AuthInitialValues, Config, CurveId, OwlError,
    RegistrationRequest, UserCredentials, server, verify_key_confirmation,
};
use parking_lot::RwLock;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// --- Configuration ---

const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Deployment settings, deserialized from a JSON file whose path comes from
/// `OWL_CONFIG` (default `config.json`). Absent file or fields fall back to
/// the demo defaults.
#[derive(Debug, Deserialize)]
struct ServerConfig {
    #[serde(default = "default_server_id")]
    server_id: String,
    #[serde(default = "default_listen_addr")]
    listen_addr: String,
    #[serde(default = "default_curve")]
    curve: CurveId,
}

fn default_server_id() -> String {
    "owl-demo-server".to_string()
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_curve() -> CurveId {
    CurveId::P256
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            server_id: default_server_id(),
            listen_addr: default_listen_addr(),
            curve: default_curve(),
        }
    }
}

fn load_server_config() -> Result<ServerConfig> {
    let path = env::var("OWL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    match std::fs::read_to_string(&path) {
        Ok(data) => serde_json::from_str(&data)
            .with_context(|| format!("failed to parse server config file {path}")),
        Err(_) => {
            info!(path = %path, "no config file found, using demo defaults");
            Ok(ServerConfig::default())
        }
    }
}

// --- State Management ---

#[derive(Clone)]
struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    config: Config,
    users: RwLock<HashMap<String, UserCredentials>>,
    pending: RwLock<HashMap<String, PendingLogin>>,
}

/// A login waiting for its finish message. Removed (and thereby consumed)
/// on the first finish attempt, successful or not.
struct PendingLogin {
    username: String,
    initial: AuthInitialValues,
}

fn new_session_token() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// --- Request/Response Payloads ---

#[derive(Deserialize)]
struct RegisterPayload {
    payload_hex: String,
}

#[derive(Deserialize)]
struct AuthInitPayload {
    username: String,
    payload_hex: String,
}

#[derive(Serialize)]
struct AuthInitReply {
    session: String,
    payload_hex: String,
}

#[derive(Deserialize)]
struct AuthFinishPayload {
    session: String,
    payload_hex: String,
    kc_hex: String,
}

#[derive(Serialize)]
struct AuthFinishReply {
    kc_hex: String,
}

// --- Masked errors ---

/// The one error a login peer ever sees. Whether the user was unknown, the
/// message malformed, a proof invalid, or the password wrong is logged
/// server-side and deliberately not distinguishable from outside.
struct AuthFailed;

impl IntoResponse for AuthFailed {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::UNAUTHORIZED, "authentication failed").into_response()
    }
}

struct RegistrationFailed;

impl IntoResponse for RegistrationFailed {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::BAD_REQUEST, "registration failed").into_response()
    }
}

// --- Axum Handlers ---

async fn handle_register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<StatusCode, RegistrationFailed> {
    let inner = &state.inner;
    let request = hex::decode(&payload.payload_hex)
        .ok()
        .and_then(|bytes| RegistrationRequest::from_bytes(inner.config.curve(), &bytes).ok())
        .ok_or_else(|| {
            warn!("registration request did not decode");
            RegistrationFailed
        })?;

    let credentials = server::register(&inner.config, &request, &mut OsRng).map_err(|e| {
        warn!(error = %e, "registration rejected");
        RegistrationFailed
    })?;

    let mut users = inner.users.write();
    if users.contains_key(&request.username) {
        warn!(user = %request.username, "refusing to overwrite existing credentials");
        return Err(RegistrationFailed);
    }
    users.insert(request.username.clone(), credentials);
    info!(user = %request.username, "registered new user");
    Ok(StatusCode::CREATED)
}

async fn handle_auth_init(
    State(state): State<AppState>,
    Json(payload): Json<AuthInitPayload>,
) -> Result<Json<AuthInitReply>, AuthFailed> {
    let inner = &state.inner;
    let request = hex::decode(&payload.payload_hex)
        .ok()
        .and_then(|bytes| AuthInitRequest::from_bytes(inner.config.curve(), &bytes).ok())
        .ok_or_else(|| {
            warn!("login request did not decode");
            AuthFailed
        })?;

    let credentials = inner.users.read().get(&payload.username).cloned();
    let Some(credentials) = credentials else {
        // Unknown users still pay for a full flow against a throwaway record
        // so the timing matches a wrong password.
        if let Ok(dummy) = server::dummy_credentials(&inner.config, &mut OsRng) {
            let _ = server::auth_init(&inner.config, &payload.username, &request, &dummy, &mut OsRng);
        }
        warn!(user = %payload.username, error = %OwlError::UnknownUser, "login rejected");
        return Err(AuthFailed);
    };

    let (response, initial) = server::auth_init(
        &inner.config,
        &payload.username,
        &request,
        &credentials,
        &mut OsRng,
    )
    .map_err(|e| {
        warn!(user = %payload.username, error = %e, "login rejected in flow 2");
        AuthFailed
    })?;

    let payload_hex = hex::encode(response.to_bytes().map_err(|e| {
        warn!(error = %e, "failed to encode login response");
        AuthFailed
    })?);

    let session = new_session_token();
    inner.pending.write().insert(
        session.clone(),
        PendingLogin {
            username: payload.username,
            initial,
        },
    );
    Ok(Json(AuthInitReply {
        session,
        payload_hex,
    }))
}

async fn handle_auth_finish(
    State(state): State<AppState>,
    Json(payload): Json<AuthFinishPayload>,
) -> Result<Json<AuthFinishReply>, AuthFailed> {
    let inner = &state.inner;
    let PendingLogin { username, initial } = inner
        .pending
        .write()
        .remove(&payload.session)
        .ok_or_else(|| {
            warn!("finish message for unknown or already-consumed session");
            AuthFailed
        })?;

    let request = hex::decode(&payload.payload_hex)
        .ok()
        .and_then(|bytes| AuthFinishRequest::from_bytes(inner.config.curve(), &bytes).ok())
        .ok_or_else(|| {
            warn!(user = %username, "finish message did not decode");
            AuthFailed
        })?;
    let client_kc: [u8; 32] = hex::decode(&payload.kc_hex)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| {
            warn!(user = %username, "key-confirmation tag did not decode");
            AuthFailed
        })?;

    let result = server::auth_finish(&inner.config, &username, &request, initial).map_err(|e| {
        warn!(user = %username, error = %e, "login rejected at finish");
        AuthFailed
    })?;

    if !verify_key_confirmation(&result.kc_test, &client_kc) {
        warn!(user = %username, "client key confirmation mismatch");
        return Err(AuthFailed);
    }

    info!(user = %username, "login complete, session key established");
    Ok(Json(AuthFinishReply {
        kc_hex: hex::encode(result.kc),
    }))
}

// --- Main Application Setup ---

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    telemetry::init_subscriber();

    let ServerConfig {
        server_id,
        listen_addr,
        curve,
    } = load_server_config()?;
    let config = Config::new(curve, server_id).context("invalid server configuration")?;
    info!(curve = %config.curve(), server_id = %config.server_id(), "starting owl server");

    let state = AppState {
        inner: Arc::new(InnerState {
            config,
            users: RwLock::new(HashMap::new()),
            pending: RwLock::new(HashMap::new()),
        }),
    };

    let app = Router::new()
        .route("/register", post(handle_register))
        .route("/auth/init", post(handle_auth_init))
        .route("/auth/finish", post(handle_auth_finish))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

//! Demo CLI client for the Owl exchange: registers a user with the demo
//! server, or runs a full login and prints the derived session key once the
//! server's key-confirmation tag checks out.

use std::io::{self, Write};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use owl_scheme::{AuthInitResponse, Config, CurveId, client, verify_key_confirmation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

// --- Command Line Arguments ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    username: String,
    /// Password; prompted on stdin when not given.
    #[arg(short, long)]
    password: Option<String>,
    #[arg(long, env = "OWL_SERVER_URL", default_value = "http://localhost:3000")]
    server_url: String,
    /// Must match the identity the server binds its proofs to.
    #[arg(long, env = "OWL_SERVER_ID", default_value = "owl-demo-server")]
    server_id: String,
    #[arg(long, env = "OWL_CURVE", default_value = "p256")]
    curve: CurveId,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the server-side credential record for this user.
    Register,
    /// Run a full login and print the derived session key.
    Login,
}

// --- Data Structures for Communication ---

#[derive(Serialize)]
struct RegisterPayload {
    payload_hex: String,
}

#[derive(Serialize)]
struct AuthInitPayload<'a> {
    username: &'a str,
    payload_hex: String,
}

#[derive(Deserialize)]
struct AuthInitReply {
    session: String,
    payload_hex: String,
}

#[derive(Serialize)]
struct AuthFinishPayload {
    session: String,
    payload_hex: String,
    kc_hex: String,
}

#[derive(Deserialize)]
struct AuthFinishReply {
    kc_hex: String,
}

fn read_password(args: &Args) -> Result<String> {
    if let Some(password) = &args.password {
        return Ok(password.clone());
    }
    print!("password for '{}': ", args.username);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn run_register(args: &Args, config: &Config, password: &str) -> Result<()> {
    let request = client::register(config, &args.username, password)?;
    let payload = RegisterPayload {
        payload_hex: hex::encode(request.to_bytes()?),
    };

    let http = reqwest::Client::new();
    let resp = http
        .post(format!("{}/register", args.server_url))
        .json(&payload)
        .send()
        .await
        .context("failed to reach the server")?;
    if !resp.status().is_success() {
        bail!("server rejected registration: {}", resp.status());
    }
    println!("registered '{}'", args.username);
    Ok(())
}

async fn run_login(args: &Args, config: &Config, password: &str) -> Result<()> {
    let http = reqwest::Client::new();

    let (request, vals) = client::auth_init(config, &args.username, password, &mut OsRng)?;
    let resp = http
        .post(format!("{}/auth/init", args.server_url))
        .json(&AuthInitPayload {
            username: &args.username,
            payload_hex: hex::encode(request.to_bytes()?),
        })
        .send()
        .await
        .context("failed to reach the server")?;
    if !resp.status().is_success() {
        bail!("login rejected: {}", resp.status());
    }
    let init_reply: AuthInitReply = resp
        .json()
        .await
        .context("failed to parse the flow-2 reply")?;

    let response_bytes =
        hex::decode(&init_reply.payload_hex).context("flow-2 payload is not valid hex")?;
    let response = AuthInitResponse::from_bytes(config.curve(), &response_bytes)?;

    let (finish, result) = client::auth_finish(config, &response, vals, &mut OsRng)?;
    let resp = http
        .post(format!("{}/auth/finish", args.server_url))
        .json(&AuthFinishPayload {
            session: init_reply.session,
            payload_hex: hex::encode(finish.to_bytes()?),
            kc_hex: hex::encode(result.kc),
        })
        .send()
        .await
        .context("failed to reach the server")?;
    if !resp.status().is_success() {
        bail!("login rejected: {}", resp.status());
    }
    let finish_reply: AuthFinishReply = resp
        .json()
        .await
        .context("failed to parse the finish reply")?;

    let server_kc: [u8; 32] = hex::decode(&finish_reply.kc_hex)
        .context("server key-confirmation tag is not valid hex")?
        .try_into()
        .map_err(|_| anyhow!("server key-confirmation tag must be 32 bytes"))?;
    if !verify_key_confirmation(&result.kc_test, &server_kc) {
        bail!("server failed key confirmation; not trusting this session");
    }

    println!("login succeeded");
    println!("session key: {}", hex::encode(result.key.0));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let config =
        Config::new(args.curve, args.server_id.clone()).context("invalid client configuration")?;
    let password = read_password(&args)?;

    match args.command {
        Command::Register => run_register(&args, &config, &password).await,
        Command::Login => run_login(&args, &config, &password).await,
    }
}

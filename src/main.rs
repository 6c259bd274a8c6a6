//! mailpage - Command-line entry point for paginated mailbox retrieval
//!
//! Provides the following subcommands:
//!
//! - `mailpage fetch` -- Read a page request as JSON on stdin, print the page.
//! - `mailpage auth-url` -- Print the Google consent URL.
//! - `mailpage auth-code <code>` -- Exchange an authorization code for tokens.
//! - `mailpage refresh [token]` -- Exchange a refresh token for a new access token.
//!
//! Results are written to stdout as JSON; failures are written as
//! `{"message": ...}` with a non-zero exit status. Logs go to stderr.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use mailpage::config::Settings;
use mailpage::domain::{ErrorBody, FetchRequest};
use mailpage::providers::mail::{ErrorKind, RetrievalError};
use mailpage::services::RetrievalService;

/// Paginated mailbox retrieval over POP3, IMAP and the Gmail API.
#[derive(Parser)]
#[command(name = "mailpage", version)]
struct Cli {
    /// Settings file (defaults to the platform config directory).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Fetch one page; the request is read from stdin.
    Fetch,

    /// Print the Gmail consent URL.
    AuthUrl,

    /// Exchange a one-time authorization code for tokens.
    AuthCode {
        /// Code returned to the redirect URI.
        code: String,
    },

    /// Obtain a new access token.
    Refresh {
        /// Refresh token; read from stdin when omitted.
        refresh_token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            print_json(&ErrorBody::new(format!("{:#}", e)));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    let service = RetrievalService::new(settings);

    match cli.command {
        Commands::Fetch => {
            let input = read_stdin()?;
            let request: FetchRequest = match serde_json::from_str(&input) {
                Ok(request) => request,
                Err(e) => return Ok(respond::<()>(Err(RetrievalError::Input(e.to_string())))),
            };
            Ok(respond(service.fetch_page(request).await))
        }
        Commands::AuthUrl => Ok(respond(
            service
                .authorizer()
                .map(|auth| serde_json::json!({ "url": auth.begin_authorization() })),
        )),
        Commands::AuthCode { code } => {
            let result = match service.authorizer() {
                Ok(auth) => auth.complete_authorization(&code).await,
                Err(e) => Err(e),
            };
            Ok(respond(result))
        }
        Commands::Refresh { refresh_token } => {
            let token = match refresh_token {
                Some(token) => token,
                None => read_stdin()?.trim().to_string(),
            };
            let result = match service.authorizer() {
                Ok(auth) => auth.refresh(&token).await,
                Err(e) => Err(e),
            };
            Ok(respond(result))
        }
    }
}

fn read_stdin() -> Result<String> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("reading request from stdin")?;
    Ok(input)
}

/// Prints the outcome and picks the exit status.
fn respond<T: Serialize>(result: mailpage::providers::mail::Result<T>) -> ExitCode {
    match result {
        Ok(value) => {
            print_json(&value);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::debug!(status = e.status_code(), "Request failed");
            print_json(&ErrorBody::new(&e));
            ExitCode::from(exit_status(&e))
        }
    }
}

fn exit_status(error: &RetrievalError) -> u8 {
    match error.kind() {
        ErrorKind::Input => 2,
        ErrorKind::Upstream => 3,
        ErrorKind::Parse => 4,
        ErrorKind::Auth => 5,
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!("Failed to serialize output: {}", e),
    }
}

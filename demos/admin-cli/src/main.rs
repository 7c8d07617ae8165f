use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use backoffice::prelude::*;
use clap::{Parser, Subcommand};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("not signed in; run `admin-cli login` first")]
    NotSignedIn,
    #[error("password required; pass --password or set BACKOFFICE_PASSWORD")]
    MissingPassword,
    #[error(transparent)]
    Backoffice(#[from] BackofficeError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "admin-cli", about = "Back-office API session client")]
struct Cli {
    #[arg(long, env = "BACKOFFICE_BASE_URL")]
    base_url: Option<String>,

    /// Where tokens are kept between runs.
    #[arg(long, env = "BACKOFFICE_TOKEN_FILE", default_value = ".backoffice/tokens.json")]
    token_file: PathBuf,

    /// JSON client configuration (endpoints, expired-token code).
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and persist the token pair.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "BACKOFFICE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Verify the stored session and print the signed-in user.
    Whoami,
    /// Call an authenticated endpoint and print the response body.
    Get { path: String },
    /// Sign out on the server and forget the stored tokens.
    Logout,
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

type Client = ApiClient<ReqwestTransport>;

fn build_client(cli: &Cli) -> Result<Client, CliError> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_json_file(path)?,
        None => ClientConfig::default(),
    };
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }

    let tokens = FileTokenStore::open(&cli.token_file).map_err(BackofficeError::from)?;
    let navigator = Arc::new(MemoryNavigator::new(Route::Home));

    tracing::debug!(base_url = %config.base_url, token_file = %cli.token_file.display(), "client configured");

    Ok(ApiClient::builder(ReqwestTransport::new(config.base_url.clone()))
        .config(config)
        .token_store(Arc::new(tokens))
        .navigator(navigator)
        .build())
}

/// Runs the authenticated-only guard; `Ok` only if the session survived.
async fn require_session(client: &Client) -> Result<(), CliError> {
    let mut guard = RequireAuthGuard::new(client.clone());
    match guard.mount().await {
        GuardState::RenderChildren => Ok(()),
        _ => Err(CliError::NotSignedIn),
    }
}

fn print_body(response: &ApiResponse) -> Result<(), CliError> {
    match serde_json::from_slice::<serde_json::Value>(&response.body) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{}", response.text()),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn run(cli: Cli) -> Result<(), CliError> {
    let client = build_client(&cli)?;

    match cli.command {
        Command::Login { email, password } => {
            let password = password.ok_or(CliError::MissingPassword)?;
            let user = client.login(&email, &password).await?;
            println!("signed in as {} <{}> ({:?})", user.name, user.email, user.role);
        }
        Command::Whoami => {
            require_session(&client).await?;
            let session = client.session().snapshot();
            let user = session.user.ok_or(CliError::NotSignedIn)?;
            println!("{}", serde_json::to_string_pretty(&user)?);
            if let Some(expires_at) = session.access_token_expires_at {
                println!("access token expires at {expires_at}");
            }
        }
        Command::Get { path } => {
            require_session(&client).await?;
            let response = client.get(&path).await?;
            print_body(&response)?;
        }
        Command::Logout => {
            client.logout().await;
            println!("signed out");
        }
    }

    client.session().dispose();
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    backoffice::telemetry::init_with("warn");

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

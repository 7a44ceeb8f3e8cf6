//! gsyncd: GradeSync bridge daemon
//!
//! Usage:
//!   gsyncd [--config /etc/gsync/gsync.toml] [serve]
//!   gsyncd issue-token --user <id> --email <addr>
//!
//! Commands:
//!   serve        - HTTP bridge + sync endpoints [default]
//!   issue-token  - Sign a session token with the configured secret (development)

mod error;
mod identity;
mod metrics;
mod routes;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gsync_core::config::{expand_tilde, GsyncConfig};
use gsync_core::UserIdentity;
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::identity::JwtVerifier;

#[derive(Parser, Debug)]
#[command(name = "gsyncd", version, about = "GradeSync re-encryption bridge daemon")]
struct Cli {
    /// Path to gsync.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "GSYNC_CONFIG",
        default_value = "/etc/gsync/gsync.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides server.log_level
    #[arg(long, env = "GSYNC_LOG")]
    log: Option<String>,

    /// Log format (json, text); overrides server.log_format
    #[arg(long, env = "GSYNC_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// HS256 secret used to verify session tokens (overrides auth.jwt_secret_file)
    #[arg(long, env = "GSYNC_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Sign a session token for local testing
    IssueToken {
        #[arg(long)]
        user: String,
        #[arg(long)]
        email: String,
        /// Lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        ttl: u64,
    },
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // config is read before logging starts so its log settings can apply
    let config = GsyncConfig::load(&cli.config)?;
    let level = cli.log.clone().unwrap_or_else(|| config.server.log_level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.server.log_format.as_str() {
        "text" => LogFormat::Text,
        _ => LogFormat::Json,
    });
    init_logging(&level, &format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "gsyncd starting"
    );
    if !cli.config.exists() {
        warn!("config file not found: {}  (using defaults)", cli.config.display());
    }

    let secret = load_jwt_secret(cli.jwt_secret, &config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => server::run(config, secret).await,
        Command::IssueToken { user, email, ttl } => {
            let verifier = JwtVerifier::new(&secret, &config.auth);
            let token = verifier.issue(
                &UserIdentity {
                    user_id: user,
                    email,
                },
                ttl,
            )?;
            println!("{token}");
            Ok(())
        }
    }
}

/// The secret comes from `--jwt-secret` / `GSYNC_JWT_SECRET`, else from
/// `auth.jwt_secret_file`. It is never read from the config file itself.
fn load_jwt_secret(flag: Option<String>, config: &GsyncConfig) -> Result<SecretString> {
    let secret = match (flag, &config.auth.jwt_secret_file) {
        (Some(s), _) => SecretString::from(s),
        (None, Some(path)) => {
            let path = expand_tilde(path);
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading JWT secret file {}", path.display()))?;
            SecretString::from(raw.trim().to_string())
        }
        (None, None) => {
            anyhow::bail!("no JWT secret: set GSYNC_JWT_SECRET or auth.jwt_secret_file")
        }
    };

    if secret.expose_secret().is_empty() {
        anyhow::bail!("JWT secret is empty");
    }
    if secret.expose_secret().len() < 32 {
        warn!("JWT secret is shorter than 32 bytes");
    }
    Ok(secret)
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}

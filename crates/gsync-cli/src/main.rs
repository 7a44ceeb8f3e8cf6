//! gsync: GradeSync mobile-side client
//!
//! Commands:
//!   sync --user <id>              - fetch grades from gsyncd into the local store
//!   push --user <id> <file.json>  - store grades locally and upload them
//!   show --user <id>              - print the locally stored grades
//!   health                        - probe gsyncd reachability
//!   config show                   - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gsync_core::config::{expand_tilde, GsyncConfig};
use gsync_core::{GradePayload, PushResult, SyncResult};
use gsync_crypto::MobileCipher;
use gsync_store::operator::build_fs_operator;
use gsync_store::OperatorStore;
use gsync_sync::MobileSyncClient;
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "gsync",
    version,
    about = "GradeSync client",
    long_about = "gsync: sync grades from gsyncd into an encrypted device-local store"
)]
struct Cli {
    /// Path to gsync.toml configuration file
    #[arg(long, short = 'c', env = "GSYNC_CONFIG", default_value = "~/.config/gsync/gsync.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "GSYNC_LOG", default_value = "warn")]
    log: String,

    /// Session token sent as `Authorization: Bearer`
    #[arg(long, env = "GSYNC_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Grade password (prompted for when unset)
    #[arg(long, env = "GSYNC_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch grades from gsyncd and store them on this device
    ///
    /// Falls back to built-in sample grades when the server cannot be reached.
    Sync {
        #[arg(long, short = 'u')]
        user: String,
    },

    /// Store grades from a JSON file locally and upload them
    Push {
        #[arg(long, short = 'u')]
        user: String,
        /// JSON grade document
        file: PathBuf,
    },

    /// Print the grades stored on this device
    Show {
        #[arg(long, short = 'u')]
        user: String,
        /// Print the raw JSON document instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Check whether gsyncd is reachable
    Health,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);

    let config_path = expand_tilde(&cli.config);
    let config = GsyncConfig::load(&config_path)?;

    match cli.command {
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &config_path),
        Commands::Health => {
            let client = build_client(&config, cli.token)?;
            cmd_health(&client).await
        }
        Commands::Show { user, json } => {
            let client = build_client(&config, cli.token)?;
            cmd_show(&client, &user, json).await
        }
        Commands::Sync { user } => {
            let password = read_password(cli.password)?;
            let client = build_client(&config, cli.token)?;
            cmd_sync(&client, &user, &password).await
        }
        Commands::Push { user, file } => {
            let password = read_password(cli.password)?;
            let client = build_client(&config, cli.token)?;
            cmd_push(&client, &user, &file, &password).await
        }
    }
}

fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ── Client construction ───────────────────────────────────────────────────────

fn build_client(config: &GsyncConfig, token: Option<String>) -> Result<MobileSyncClient> {
    let store_dir = expand_tilde(&config.client.local_store_dir);
    let op = build_fs_operator(&store_dir)
        .with_context(|| format!("opening local store at {}", store_dir.display()))?;
    let store = Arc::new(OperatorStore::new(op));
    tracing::debug!(dir = %store_dir.display(), "local store opened");

    let mut client = MobileSyncClient::new(
        &config.client,
        MobileCipher::new(config.crypto.mobile_key_scheme),
        store,
    )?;
    if let Some(token) = token {
        client = client.with_bearer_token(SecretString::from(token));
    }

    // Ctrl-C cancels in-flight requests; sync then falls back instead of hanging
    let cancel = client.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    Ok(client)
}

fn read_password(from_env: Option<String>) -> Result<SecretString> {
    let password = match from_env {
        Some(p) => p,
        None => rpassword::prompt_password("Grade password: ").context("reading password")?,
    };
    if password.is_empty() {
        anyhow::bail!("password must not be empty");
    }
    Ok(SecretString::from(password))
}

// ── Progress helpers ──────────────────────────────────────────────────────────

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

// ── `gsync sync` ──────────────────────────────────────────────────────────────

async fn cmd_sync(client: &MobileSyncClient, user: &str, password: &SecretString) -> Result<()> {
    let pb = make_spinner("sync");
    pb.set_message(format!("contacting {}", client.base_url()));

    let report = client.sync(user, password).await?;
    pb.finish_and_clear();

    let trail: Vec<String> = report.phases.iter().map(|p| p.to_string()).collect();
    match &report.result {
        SyncResult::Live { .. } => println!("Synced grades for {user} from {}", client.base_url()),
        SyncResult::Fallback { reason, .. } => {
            println!("Server unavailable, showing SAMPLE grades ({reason})");
        }
    }
    println!("  phases:  {}", trail.join(" → "));
    println!(
        "  stored:  {}",
        if report.stored_locally { "yes" } else { "NO (local store write failed)" }
    );
    println!();
    print_summary(report.result.payload());
    Ok(())
}

// ── `gsync push` ──────────────────────────────────────────────────────────────

async fn cmd_push(
    client: &MobileSyncClient,
    user: &str,
    file: &Path,
    password: &SecretString,
) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let payload = GradePayload::from_json_slice(&bytes)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;

    let pb = make_spinner("push");
    pb.set_message(format!("uploading to {}", client.base_url()));
    let result = client.push(&payload, password, user).await?;
    pb.finish_and_clear();

    match result {
        PushResult::Uploaded => println!("Uploaded grades for {user}"),
        PushResult::StoredLocallyOnly { reason } => {
            println!("Stored locally only, upload failed: {reason}");
        }
    }
    Ok(())
}

// ── `gsync show` ──────────────────────────────────────────────────────────────

async fn cmd_show(client: &MobileSyncClient, user: &str, json: bool) -> Result<()> {
    let Some(payload) = client.load_local(user).await? else {
        println!("No grades stored for {user}. Run: gsync sync --user {user}");
        return Ok(());
    };

    if json {
        let rendered = serde_json::to_string_pretty(&payload).context("rendering JSON")?;
        println!("{rendered}");
    } else {
        print_summary(&payload);
    }
    Ok(())
}

// ── `gsync health` ────────────────────────────────────────────────────────────

async fn cmd_health(client: &MobileSyncClient) -> Result<()> {
    if client.check_reachability().await {
        println!("gsyncd at {}: reachable", client.base_url());
        Ok(())
    } else {
        eprintln!("gsyncd at {}: UNREACHABLE", client.base_url());
        std::process::exit(1);
    }
}

// ── `gsync config show` ───────────────────────────────────────────────────────

fn cmd_config_show(config: &GsyncConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── Formatting ────────────────────────────────────────────────────────────────

fn print_summary(payload: &GradePayload) {
    for line in summary_lines(payload) {
        println!("{line}");
    }
}

fn summary_lines(payload: &GradePayload) -> Vec<String> {
    let GradePayload::Book(book) = payload else {
        return vec!["(grade document has no recognised subjects; use --json)".to_string()];
    };
    if book.subjects.is_empty() {
        return vec!["(no subjects)".to_string()];
    }

    let width = book
        .subjects
        .iter()
        .map(|s| s.name.chars().count())
        .max()
        .unwrap_or(0);

    book.subjects
        .iter()
        .map(|s| {
            let avg = weighted_average(s.grades().iter().map(|g| (g.value(), g.effective_weight())))
                .map(|a| format!("{a:.2}"))
                .unwrap_or_else(|| "-".to_string());
            format!(
                "  {:<width$}  {:>5}  ({} grade{})",
                s.name,
                avg,
                s.grades().len(),
                if s.grades().len() == 1 { "" } else { "s" },
            )
        })
        .collect()
}

/// Weighted mean of `(value, weight)` pairs; `None` if the total weight is zero.
fn weighted_average(grades: impl Iterator<Item = (f64, f64)>) -> Option<f64> {
    let (sum, weight) = grades.fold((0.0, 0.0), |(s, w), (v, wt)| (s + v * wt, w + wt));
    (weight > 0.0).then(|| sum / weight)
}

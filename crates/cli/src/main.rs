mod check;
mod inspect;
mod keygen;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use notary_checker::CheckerConfig;
use notary_storage::JournalBackingStore;
use tracing_subscriber::EnvFilter;

/// Notary uniqueness checker.
#[derive(Parser)]
#[command(name = "notary", version, about = "Notary uniqueness checker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a file of JSON-lines requests, printing one response per line
    Check {
        /// Path to the checker TOML config
        #[arg(long)]
        config: PathBuf,
        /// Path to the JSON-lines request file
        #[arg(long)]
        requests: PathBuf,
        /// Secret key file from `notary keygen` (default: an ephemeral key)
        #[arg(long)]
        key: Option<PathBuf>,
    },

    /// Print the stored records of states and transactions
    Inspect {
        /// Path to the checker TOML config
        #[arg(long)]
        config: PathBuf,
        /// X.500 name of the holding identity
        #[arg(long)]
        holding_identity: String,
        /// Group id of the holding identity
        #[arg(long)]
        group: String,
        /// Transaction ids whose recorded results to print
        #[arg(long = "transaction")]
        transactions: Vec<String>,
        /// State refs, as `SHA-256:<hex>:<index>`
        state_refs: Vec<String>,
    },

    /// Generate an Ed25519 result-signing keypair
    Keygen {
        /// Output file prefix (writes <prefix>.secret and <prefix>.pub)
        #[arg(long)]
        prefix: String,
        /// Signing algorithm
        #[arg(long, default_value = "ed25519")]
        algorithm: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Check {
            config,
            requests,
            key,
        } => {
            check::cmd_check(&config, &requests, key.as_deref());
        }
        Commands::Inspect {
            config,
            holding_identity,
            group,
            transactions,
            state_refs,
        } => {
            inspect::cmd_inspect(&config, &holding_identity, &group, &transactions, &state_refs);
        }
        Commands::Keygen { prefix, algorithm } => {
            keygen::cmd_keygen(&algorithm, &prefix);
        }
    }
}

/// Logs go to stderr so stdout carries only JSON.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Print `msg` to stderr and exit with status 1.
fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("error: {}", msg);
    process::exit(1);
}

fn load_config(path: &Path) -> CheckerConfig {
    CheckerConfig::load(path).unwrap_or_else(|e| fail(format!("{}: {}", path.display(), e)))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new()
        .unwrap_or_else(|e| fail(format!("failed to create tokio runtime: {}", e)))
}

async fn open_journal(config: &CheckerConfig) -> JournalBackingStore {
    let Some(path) = config.store.journal_path.as_deref() else {
        fail("store.journal_path is required when store.kind = \"journal\"");
    };
    JournalBackingStore::open(path, config.store.sync)
        .await
        .unwrap_or_else(|e| fail(format!("opening journal '{}': {}", path.display(), e)))
}

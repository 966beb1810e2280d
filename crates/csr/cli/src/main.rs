//! csrctl - operator CLI for the configuration ledger
//!
//! Every command opens the ledger named by the configuration file, runs,
//! and exits. Staged artifacts live only inside one process, so `propose`
//! runs the whole pipeline (propose, attest with the given keys, commit)
//! in a single invocation.

use clap::{Parser, Subcommand};
use csr_governance::LedgerConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod keys;

/// csrctl CLI
#[derive(Parser)]
#[command(name = "csrctl")]
#[command(about = "Attested configuration ledger", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CSR_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level, overrides [logging].level
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an Ed25519 signer key file
    Keygen {
        /// Signer id
        #[arg(long)]
        id: String,

        /// Where to write the key file
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Write a configuration file
    Init {
        /// Directory for the file storage backend
        #[arg(long)]
        storage: PathBuf,

        /// Key files of the authorized signers
        #[arg(long = "key", required = true)]
        keys: Vec<PathBuf>,

        /// Distinct authorized signatures required to commit
        #[arg(long, default_value_t = 1)]
        threshold: usize,

        /// Manifest name
        #[arg(long, default_value = "governance")]
        name: String,

        /// Hash algorithm (sha256, sha512, blake3)
        #[arg(long, default_value = "sha256")]
        hash_algorithm: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Propose, attest and commit a new state
    Propose {
        /// JSON file with the full new payload
        #[arg(long, conflicts_with = "patch", required_unless_present = "patch")]
        payload: Option<PathBuf>,

        /// JSON patch file applied to the head state
        #[arg(long)]
        patch: Option<PathBuf>,

        /// Expected parent hash; the commit fails with a stale parent if
        /// the head has moved past it
        #[arg(long, conflicts_with = "patch")]
        parent: Option<String>,

        /// Proposer identity
        #[arg(long, default_value = "operator")]
        proposer: String,

        /// Key files used to attest
        #[arg(long = "key")]
        keys: Vec<PathBuf>,
    },

    /// Print the head hash
    Head,

    /// Print one entry
    Show {
        /// Version hash, or `head`
        hash: String,
    },

    /// List committed entries, newest first
    Log {
        /// Show at most this many entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Audit the whole chain
    Verify,

    /// Print an entry's forward and inverse diffs
    Diff {
        /// Version hash, or `head`
        hash: String,
    },

    /// Print the configuration state
    State {
        /// Rebuild the state as of this entry instead of the head
        #[arg(long)]
        at: Option<String>,
    },
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_env("CSR_LOG").unwrap_or_else(|_| level.into());
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::Keygen { .. } | Commands::Init { .. } => None,
        _ => Some(LedgerConfig::load(cli.config.as_deref())?),
    };
    let logging = config.as_ref().map(|c| c.logging.clone()).unwrap_or_default();
    init_tracing(
        cli.log_level.as_deref().unwrap_or(&logging.level),
        cli.json || logging.json,
    );

    match (cli.command, config) {
        (Commands::Keygen { id, out }, _) => commands::keygen(&id, &out),
        (
            Commands::Init {
                storage,
                keys,
                threshold,
                name,
                hash_algorithm,
                force,
            },
            _,
        ) => commands::init(
            cli.config.as_deref(),
            commands::InitOptions {
                storage,
                keys,
                threshold,
                name,
                hash_algorithm,
                force,
            },
        ),
        (
            Commands::Propose {
                payload,
                patch,
                parent,
                proposer,
                keys,
            },
            Some(config),
        ) => commands::propose(
            config,
            commands::ProposeOptions {
                payload,
                patch,
                parent,
                proposer,
                keys,
            },
        ),
        (Commands::Head, Some(config)) => commands::head(config),
        (Commands::Show { hash }, Some(config)) => commands::show(config, &hash),
        (Commands::Log { limit }, Some(config)) => commands::log(config, limit),
        (Commands::Verify, Some(config)) => commands::verify(config),
        (Commands::Diff { hash }, Some(config)) => commands::diff(config, &hash),
        (Commands::State { at }, Some(config)) => commands::state(config, at.as_deref()),
        (_, None) => anyhow::bail!("no configuration loaded"),
    }
}

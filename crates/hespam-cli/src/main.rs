//! hespam CLI - drive an encrypted spam-filtering inbox
//!
//! Usage:
//!   hespam run        - Fetch the key, then send ham and spam samples
//!   hespam fetch-key  - Download the recipient's public key
//!   hespam send       - Encrypt and send one sample
//!   hespam register   - Upload pk / rek / rok key files
//!   hespam inbox      - Inspect or download inbox results
//!   hespam classify   - Decrypt a result and print the verdict

mod commands;

use clap::{Parser, Subcommand};
use hespam_core::{DemoConfig, Label};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hespam")]
#[command(author = "HeyBattle1")]
#[command(version)]
#[command(about = "Send encrypted ham/spam samples to an inbox service", long_about = None)]
struct Cli {
    /// JSON config file (default: ~/.hespam/config.json if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Inbox service, host:port or base URL
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Recipient inbox id
    #[arg(long, global = true)]
    recipient: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the public key, then encrypt and send random ham and spam samples
    Run {
        /// Samples per label
        #[arg(long)]
        count: Option<usize>,

        /// Number of entries in the ham corpus
        #[arg(long)]
        ham_size: Option<u32>,

        /// Number of entries in the spam corpus
        #[arg(long)]
        spam_size: Option<u32>,

        /// Seed for reproducible sample selection
        #[arg(long)]
        seed: Option<u64>,

        /// Stop at the first sample that fails
        #[arg(long)]
        fail_fast: bool,
    },

    /// Download the recipient's public key
    FetchKey {
        /// Where to store it (default: the configured key path)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Encrypt and send a single sample
    Send {
        /// ham or spam
        label: Label,

        /// Corpus index, starting at 1
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        index: u32,
    },

    /// Upload key files for the recipient
    Register {
        /// Public key
        #[arg(long)]
        pk: Option<PathBuf>,

        /// Relinearization key
        #[arg(long)]
        rek: Option<PathBuf>,

        /// Rotation key set
        #[arg(long)]
        rok: Option<PathBuf>,
    },

    /// Check that the server is up
    Ping,

    /// Clear every inbox on the server
    Flush,

    /// Inspect the recipient's inbox
    Inbox {
        #[command(subcommand)]
        action: InboxAction,
    },

    /// Decrypt a downloaded result and classify it
    Classify {
        /// Result file from `hespam inbox fetch`
        result: PathBuf,

        /// Spam probability threshold, strictly between 0 and 1
        #[arg(long)]
        threshold: Option<f64>,
    },
}

#[derive(Subcommand)]
enum InboxAction {
    /// Number of messages in the inbox
    Len,

    /// Download a processed result
    Fetch {
        /// Inbox position; 0 is the first message received
        index: usize,

        /// Output file (default: {recipient}_{index}.ctr, same 0-based index)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

impl Cli {
    /// Config file values with command-line overrides applied
    fn load_config(&self) -> anyhow::Result<DemoConfig> {
        let mut config = DemoConfig::load(self.config.as_deref())?;
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(recipient) = self.recipient {
            config.recipient = recipient;
        }

        match &self.command {
            Commands::Run {
                count,
                ham_size,
                spam_size,
                seed,
                fail_fast,
            } => {
                if let Some(count) = count {
                    config.count = *count;
                }
                if let Some(size) = ham_size {
                    config.ham_corpus_size = *size;
                }
                if let Some(size) = spam_size {
                    config.spam_corpus_size = *size;
                }
                if seed.is_some() {
                    config.seed = *seed;
                }
                config.fail_fast |= *fail_fast;
            }
            Commands::Classify {
                threshold: Some(t), ..
            } => config.threshold = *t,
            _ => {}
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;

    match cli.command {
        Commands::Run { .. } => commands::run(&config).await,
        Commands::FetchKey { out } => commands::fetch_key(&config, out).await,
        Commands::Send { label, index } => commands::send(&config, label, index).await,
        Commands::Register { pk, rek, rok } => commands::register(&config, pk, rek, rok).await,
        Commands::Ping => commands::ping(&config).await,
        Commands::Flush => commands::flush(&config).await,
        Commands::Inbox { action } => match action {
            InboxAction::Len => commands::inbox_len(&config).await,
            InboxAction::Fetch { index, out } => commands::inbox_fetch(&config, index, out).await,
        },
        Commands::Classify { result, .. } => commands::classify(&config, &result).await,
    }
}

//! Command-line and environment configuration.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use mailsort_store::FirestoreConfig;
use mailsort_store::firestore::DEFAULT_DATABASE;
use tracing_subscriber::EnvFilter;

/// Deployment limits for the trigger service. Declared for the deployment
/// manifest; nothing in-process enforces them.
pub const MAX_INSTANCES: u32 = 10;
pub const MEMORY_MIB: u32 = 1024;
pub const TIMEOUT_SECS: u64 = 300;

#[derive(Parser, Debug)]
#[command(
    name = "mailsort",
    version,
    about = "Classify newly stored emails and tag them with a category"
)]
pub struct Cli {
    /// Log output format.
    #[arg(
        long,
        env = "MAILSORT_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Text,
        global = true
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Receive Firestore "document created" events over HTTP and classify each email.
    Serve {
        #[command(flatten)]
        model: ModelArgs,
        #[command(flatten)]
        firestore: FirestoreArgs,
        /// Listen port.
        #[arg(long, env = "PORT", default_value_t = 8080)]
        port: u16,
    },
    /// Classify a single subject/snippet pair and print the result.
    Classify {
        #[command(flatten)]
        model: ModelArgs,
        #[arg(long, default_value = "")]
        subject: String,
        #[arg(long, default_value = "")]
        snippet: String,
    },
    /// Classify a stored email and write its category back.
    Reclassify {
        #[command(flatten)]
        model: ModelArgs,
        #[command(flatten)]
        firestore: FirestoreArgs,
        /// User id (`users/{userId}`).
        #[arg(long)]
        user: String,
        /// Email id (`emails/{emailId}`).
        #[arg(long)]
        email: String,
    },
    /// Print the deployment limits for the trigger service.
    DeployConfig,
}

#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Directory holding tokenizer.json, model.onnx, and label_encoder.json.
    #[arg(long, env = "MAILSORT_MODEL_DIR", default_value = "./model_assets")]
    pub model_dir: PathBuf,
    /// Maximum token count; longer input is truncated.
    #[arg(long, env = "MAILSORT_MAX_LENGTH", default_value_t = 512)]
    pub max_length: usize,
}

#[derive(Args, Debug, Clone)]
pub struct FirestoreArgs {
    /// Google Cloud project that owns the database.
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    pub project: Option<String>,
    #[arg(long, env = "FIRESTORE_DATABASE", default_value = DEFAULT_DATABASE)]
    pub database: String,
    /// Firestore emulator `host:port`.
    #[arg(long, env = "FIRESTORE_EMULATOR_HOST")]
    pub emulator_host: Option<String>,
    /// Fixed OAuth access token (default: runtime metadata server).
    #[arg(long, env = "FIRESTORE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,
}

impl FirestoreArgs {
    pub fn config(&self) -> anyhow::Result<FirestoreConfig> {
        let project = self
            .project
            .clone()
            .context("--project (or GOOGLE_CLOUD_PROJECT) is required")?;
        Ok(FirestoreConfig {
            database_id: self.database.clone(),
            emulator_host: self.emulator_host.clone(),
            access_token: self.access_token.clone(),
            ..FirestoreConfig::new(project)
        })
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

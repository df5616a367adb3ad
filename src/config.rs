use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub keys_file: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Scoped bucket storage API")]
pub struct Args {
    /// Host to bind to (overrides BUCKET_API_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides BUCKET_API_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where object blobs are stored (overrides BUCKET_API_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Catalog database URL (overrides BUCKET_API_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// JSON file holding API key records (overrides BUCKET_API_KEYS_FILE)
    #[arg(long)]
    pub keys_file: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("BUCKET_API_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("BUCKET_API_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing BUCKET_API_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 4000,
            Err(err) => return Err(err).context("reading BUCKET_API_PORT"),
        };
        let env_storage =
            env::var("BUCKET_API_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_db = env::var("BUCKET_API_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/bucket_api.db".into());
        let env_keys = env::var("BUCKET_API_KEYS_FILE").unwrap_or_else(|_| "./data/keys.json".into());

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            keys_file: args.keys_file.unwrap_or(env_keys),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

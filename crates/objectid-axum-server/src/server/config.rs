use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use core::time::Duration;
use objectid::{TypeDeclaration, validate_declarations};
use std::path::PathBuf;

/// Console log layout.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human readable.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Runtime configuration for the `objectid-axum-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first if present).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "objectid-axum-server",
    version,
    about = "An HTTP service leasing blocks of object IDs"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Identity of this allocation authority. Embedded in every ID and in
    /// every counter file name, so it must never be shared by two servers
    /// writing to the same data directory.
    ///
    /// Environment variable: `SOURCE_ID`
    #[arg(long, env = "SOURCE_ID")]
    pub source_id: u64,

    /// Directory holding one counter file per type.
    ///
    /// Environment variable: `DATA_DIR`
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// JSON file with the declared types, e.g.
    /// `[{"name": "user", "id": 1, "description": "Registered users"}]`.
    ///
    /// Environment variable: `TYPES_FILE`
    #[arg(long, env = "TYPES_FILE")]
    pub types_file: PathBuf,

    /// Seconds clients may cache type listings.
    ///
    /// Environment variable: `MAX_CACHE_AGE`
    #[arg(long, env = "MAX_CACHE_AGE", default_value_t = 86_400)]
    pub max_cache_age: u64,

    /// Largest block a single request may reserve.
    ///
    /// Environment variable: `MAX_BLOCK_SIZE`
    #[arg(long, env = "MAX_BLOCK_SIZE", default_value_t = 1_000_000)]
    pub max_block_size: u64,

    /// Provision missing counters before serving.
    ///
    /// Environment variable: `SETUP_ON_START`
    #[arg(long, env = "SETUP_ON_START", default_value_t = false)]
    pub setup_on_start: bool,

    /// Environment variable: `LOG_FORMAT`
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub source_id: u64,
    pub data_dir: PathBuf,
    pub types: Vec<TypeDeclaration>,
    pub max_cache_age: Duration,
    pub max_block_size: u64,
    pub setup_on_start: bool,
    pub log_format: LogFormat,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.source_id == 0 {
            bail!("SOURCE_ID must be greater than 0");
        }
        if args.max_block_size == 0 {
            bail!("MAX_BLOCK_SIZE must be greater than 0");
        }

        let raw = std::fs::read_to_string(&args.types_file).with_context(|| {
            format!("cannot read TYPES_FILE '{}'", args.types_file.display())
        })?;
        let types: Vec<TypeDeclaration> = serde_json::from_str(&raw).with_context(|| {
            format!("TYPES_FILE '{}' is not a JSON type list", args.types_file.display())
        })?;
        validate_declarations(&types)?;

        Ok(Self {
            server_addr: args.server_addr,
            source_id: args.source_id,
            data_dir: args.data_dir,
            types,
            max_cache_age: Duration::from_secs(args.max_cache_age),
            max_block_size: args.max_block_size,
            setup_on_start: args.setup_on_start,
            log_format: args.log_format,
        })
    }
}

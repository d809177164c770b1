use crate::models::event::EventConfig;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::{env, fmt, path::PathBuf, str::FromStr};

const ENV_PREFIX: &str = "WEDDING_";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    /// Origin used to build public file URLs, without a trailing slash.
    pub public_base_url: String,
    pub event: EventConfig,
    pub admin_password: String,
    pub max_upload_bytes: usize,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Wedding photo, video and message sharing service")]
pub struct Cli {
    #[command(flatten)]
    pub server: ServerArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Apply the database schema and exit
    Migrate,
    /// Send files and/or a message to a running server, as a guest would
    Upload(UploadArgs),
}

/// Server settings. Each flag overrides its `WEDDING_*` environment variable.
#[derive(Args, Debug, Default, Clone)]
pub struct ServerArgs {
    /// Host to bind to (overrides WEDDING_HOST)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Port to bind to (overrides WEDDING_PORT)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Directory where uploaded files are stored (overrides WEDDING_STORAGE_DIR)
    #[arg(long, global = true)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides WEDDING_DATABASE_URL)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Public origin for file links (overrides WEDDING_PUBLIC_BASE_URL)
    #[arg(long, global = true)]
    pub public_base_url: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    /// Server to upload to
    #[arg(long, default_value = "http://localhost:3000")]
    pub server: String,

    /// Your name, shown to the couple
    #[arg(long)]
    pub name: Option<String>,

    /// A wish or memory to go with the upload
    #[arg(long)]
    pub message: Option<String>,

    /// Files to upload; with none, only the message is sent
    pub files: Vec<PathBuf>,
}

impl AppConfig {
    /// Merge CLI args over process environment over defaults.
    pub fn from_env_and_args(args: &ServerArgs) -> Result<Self> {
        Self::from_lookup(args, |key| env::var(key).ok())
    }

    /// Merge CLI args over `lookup` (keyed by full variable name) over defaults.
    pub fn from_lookup(args: &ServerArgs, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        // --- Environment fallback ---
        let env_host = var("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = parse_var(&var, "PORT")?.unwrap_or(3000);
        let env_storage = var("STORAGE_DIR").unwrap_or_else(|| "./data/media".into());
        let env_db =
            var("DATABASE_URL").unwrap_or_else(|| "sqlite://./data/meta/wedding.db".into());

        let port = args.port.unwrap_or(env_port);
        let public_base_url = args
            .public_base_url
            .clone()
            .or_else(|| var("PUBLIC_BASE_URL"))
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let date = match var("EVENT_DATE") {
            Some(value) => NaiveDate::parse_from_str(&value, "%Y-%m-%d")
                .with_context(|| format!("parsing {ENV_PREFIX}EVENT_DATE value `{value}`"))?,
            None => NaiveDate::from_ymd_opt(2025, 6, 21).context("default event date")?,
        };

        let event = EventConfig {
            id: var("EVENT_ID").unwrap_or_else(|| "roberta-michael-wedding".into()),
            name: var("EVENT_NAME").unwrap_or_else(|| "Roberta & Michael's Wedding".into()),
            date,
            access_code: var("ACCESS_CODE").unwrap_or_else(|| "GUESTS".into()),
            admin_code: var("ADMIN_CODE").unwrap_or_else(|| "COUPLE".into()),
        };

        // --- Merge ---
        Ok(Self {
            host: args.host.clone().unwrap_or(env_host),
            port,
            storage_dir: args.storage_dir.clone().unwrap_or(env_storage),
            database_url: args.database_url.clone().unwrap_or(env_db),
            public_base_url,
            event,
            admin_password: var("ADMIN_PASSWORD").unwrap_or_else(|| "change-me".into()),
            max_upload_bytes: parse_var(&var, "MAX_UPLOAD_BYTES")?.unwrap_or(50 * 1024 * 1024),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(name)
        .map(|value| {
            value
                .parse::<T>()
                .with_context(|| format!("parsing {ENV_PREFIX}{name} value `{value}`"))
        })
        .transpose()
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("storage_dir", &self.storage_dir)
            .field("database_url", &self.database_url)
            .field("public_base_url", &self.public_base_url)
            .field("event", &self.event)
            .field("admin_password", &"<redacted>")
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

use anyhow::{Context, Result};
use clap::Parser;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use wedding_memories::{
    client::{
        http::HttpUploadClient,
        submission::{AttachmentFile, UploadForm},
    },
    config::{AppConfig, Cli, Command, UploadArgs},
    db, routes,
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Upload(args) => upload(args).await,
        command => {
            let cfg = AppConfig::from_env_and_args(&cli.server)?;
            tracing::info!("Starting wedding-memories with config: {:?}", cfg);

            let pool = db::connect(&cfg.database_url).await?;
            db::run_migrations(&pool).await?;
            if matches!(command, Command::Migrate) {
                tracing::info!("Database migration complete.");
                return Ok(());
            }
            serve(cfg, Arc::new(pool)).await
        }
    }
}

async fn serve(cfg: AppConfig, db: Arc<sqlx::SqlitePool>) -> Result<()> {
    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    let app = routes::routes::app(AppState::new(db, &cfg));

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Guest-side upload from the command line.
async fn upload(args: UploadArgs) -> Result<()> {
    let mut form = UploadForm::new();
    form.guest_name = args.name.unwrap_or_default();
    form.message = args.message.unwrap_or_default();

    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = mime_guess::from_path(path).first().map(|m| m.to_string());
        files.push(AttachmentFile {
            name,
            content_type,
            bytes: bytes.into(),
        });
    }
    form.add_files(files);

    let transport = HttpUploadClient::new(&args.server);
    let report = form.submit(&transport).await;

    if report.message_only {
        match &report.message_error {
            None => println!("Message sent. Thank you!"),
            Some(err) => anyhow::bail!("failed to send message: {}", err),
        }
        return Ok(());
    }

    for attachment in form.attachments() {
        match (&attachment.error, attachment.uploaded) {
            (_, true) => println!("uploaded  {}", attachment.file.name),
            (Some(err), false) => println!("failed    {} ({})", attachment.file.name, err),
            (None, false) => println!("pending   {}", attachment.file.name),
        }
    }
    if report.failed > 0 {
        anyhow::bail!("{} of {} uploads failed", report.failed, form.attachments().len());
    }
    Ok(())
}

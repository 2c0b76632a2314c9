//! opdshelf server entry point.

use clap::Parser;
use opdshelf::{
    config::{Cli, Command, Config},
    formats::{self, InspectMode, Inspection},
    server,
};
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opdshelf=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::build(&cli)?;

    match cli.command {
        Some(Command::Init { force }) => cmd_init(force),
        Some(Command::Inspect { file, info }) => cmd_inspect(&file, info),
        Some(Command::Serve) | None => cmd_serve(config).await,
    }
}

/// Write a default config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());
    println!("\nEdit config.toml to configure your server, then run: opdshelf serve");

    Ok(())
}

/// Run the inspector on one file and print the result as JSON.
fn cmd_inspect(file: &Path, info: bool) -> anyhow::Result<()> {
    if !file.is_file() {
        anyhow::bail!("Not a file: {}", file.display());
    }

    let mode = if info {
        InspectMode::Info
    } else {
        InspectMode::Cover
    };

    let output = match formats::inspect(file, mode) {
        Some(Inspection::Cover(cover)) => serde_json::json!({
            "file": file.display().to_string(),
            "cover": {
                "mime_type": cover.mime_type,
                "size": cover.bytes.len(),
            },
        }),
        Some(Inspection::Info(metadata)) => serde_json::json!({
            "file": file.display().to_string(),
            "cover": metadata.cover.as_ref().map(|c| serde_json::json!({
                "mime_type": c.mime_type,
                "size": c.bytes.len(),
            })),
            "metadata": metadata,
        }),
        None => serde_json::json!({
            "file": file.display().to_string(),
            "cover": null,
        }),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Start the server.
async fn cmd_serve(config: Config) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.library.books_dir)?;

    tracing::info!(
        bind = %config.bind_addr(),
        books = %config.library.books_dir.display(),
        auth = config.auth.enabled(),
        reverse_proxy = config.proxy.enabled,
        "Starting opdshelf server"
    );

    if !config.auth.enabled() {
        tracing::warn!("No admin credentials configured, the admin UI is open to everyone");
    }

    let bind_addr = config.bind_addr();
    let state = server::AppState::new(config);
    let app = server::create_router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!(address = %bind_addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

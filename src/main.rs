use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use linkpage::config::Config;
use linkpage::{build_app, cli, db, leaderboard};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Link-in-bio page server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Create a user with an empty, unpublished page.
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        /// Defaults to a slug derived from the username.
        #[arg(long)]
        slug: Option<String>,
    },
    /// Replace a page's content from a JSON file.
    ImportPage {
        #[arg(long)]
        slug: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Publish (or unpublish) a page.
    Publish {
        #[arg(long)]
        slug: String,
        #[arg(long)]
        unpublish: bool,
    },
    /// Recount every page and prune stale leaderboard rows.
    RebuildLeaderboard,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;

    let pool = db::init_pool(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let app = build_app(pool, &config);
            let addr = config.socket_addr();
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;

            tracing::info!("listening on {}", addr);
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        Command::CreateUser { email, username, slug } => {
            let user = cli::create_user(&pool, &email, &username, slug.as_deref()).await?;
            println!("Created user:");
            println!("  ID: {}", user.id);
            println!("  Username: {}", user.username);
            println!("  Slug: {}", user.slug);
        }
        Command::ImportPage { slug, file } => {
            let summary = cli::import_page_file(&pool, &slug, &file).await?;
            println!("Imported {} blocks and {} badges", summary.blocks, summary.badges);
        }
        Command::Publish { slug, unpublish } => {
            cli::set_published(&pool, &slug, !unpublish).await?;
            println!("{} /{}", if unpublish { "Unpublished" } else { "Published" }, slug);
        }
        Command::RebuildLeaderboard => {
            let report = leaderboard::rebuild_all(&pool).await?;
            println!(
                "Leaderboard rebuilt: {} refreshed, {} skipped, {} failed, {} pruned",
                report.refreshed, report.skipped, report.failed, report.pruned
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

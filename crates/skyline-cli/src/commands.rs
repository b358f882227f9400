use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use skyline_index::{IndexWriter, PostIndex, SqlitePostIndex, StorageConfig};
use skyline_ingest::{IngestReport, Ingestor, WebSocketConnector};
use skyline_server::FeedServer;
use tokio::sync::{oneshot, watch};
use tracing::{info, warn};

use crate::cli::{Cli, Command, IngestArgs, LatestArgs};
use crate::config::SkylineConfig;
use crate::session;

pub async fn run_command(cli: Cli, config: SkylineConfig) -> anyhow::Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(config, args).await,
        Command::Ingest(args) => cmd_ingest(config, args).await,
        Command::Serve => cmd_serve(config).await,
        Command::Migrate => cmd_migrate(&config.storage),
        Command::Latest(args) => cmd_latest(&config.storage, args),
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

/// Open the database and bring its schema up to date.
fn open_index(storage: &StorageConfig) -> anyhow::Result<Arc<SqlitePostIndex>> {
    let index = SqlitePostIndex::open(&storage.path, storage.busy_timeout())
        .with_context(|| format!("opening post index at {}", storage.path.display()))?;
    index.migrate().context("migrating post index")?;
    Ok(Arc::new(index))
}

/// Flips to `true` on Ctrl-C.
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested");
                tx.send_replace(true);
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for Ctrl-C");
                // dropping the sender would read as a shutdown request
                tx.closed().await;
            }
        }
    });
    rx
}

async fn requested(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

fn ingestor(config: &SkylineConfig, args: &IngestArgs) -> Ingestor<WebSocketConnector> {
    let mut firehose = config.firehose.clone();
    if args.cursor.is_some() {
        firehose.cursor = args.cursor;
    }
    Ingestor::new(WebSocketConnector::new(firehose.relay_url.clone()), &firehose)
}

fn print_report(report: &IngestReport) {
    println!("{} Ingestion stopped", "✓".green().bold());
    println!(
        "  Commits: {} ({} replayed, {} skipped)",
        report.stats.commits.to_string().bold(),
        report.stats.replays,
        report.stats.skipped_commits
    );
    println!(
        "  Posts: {} new, {} already indexed",
        report.written.inserted.to_string().green(),
        report.written.already_indexed
    );
    match report.cursor {
        Some(cursor) => println!("  Resume with: {}", format!("--cursor {cursor}").cyan()),
        None => println!("  No events processed."),
    }
}

async fn cmd_run(config: SkylineConfig, args: IngestArgs) -> anyhow::Result<()> {
    let index = open_index(&config.storage)?;
    let server = FeedServer::new(config.server.clone(), index.clone())
        .bind()
        .await
        .with_context(|| format!("binding feed server to {}", config.server.bind_addr))?;
    let auth = session::bootstrap(&config.session).await?;
    info!(auth = auth.display_name(), "starting feed generator");

    let shutdown = shutdown_signal();
    let (stop_server, server_stopped) = oneshot::channel::<()>();
    let server_shutdown = {
        let shutdown = shutdown.clone();
        async move {
            tokio::select! {
                _ = requested(shutdown) => {}
                _ = server_stopped => {}
            }
        }
    };
    let server = tokio::spawn(server.serve(server_shutdown));

    let writer = IndexWriter::new(index, config.storage.retry.clone());
    let ingested = ingestor(&config, &args).run(writer, shutdown).await;

    // ingestion ended on its own (storage failure) or by Ctrl-C: stop serving too
    let _ = stop_server.send(());
    server.await.context("server task failed")??;
    let report = ingested?;
    print_report(&report);
    Ok(())
}

async fn cmd_ingest(config: SkylineConfig, args: IngestArgs) -> anyhow::Result<()> {
    let index = open_index(&config.storage)?;
    let auth = session::bootstrap(&config.session).await?;
    info!(auth = auth.display_name(), relay = %config.firehose.relay_url, "starting ingestion");

    let writer = IndexWriter::new(index, config.storage.retry.clone());
    let report = ingestor(&config, &args).run(writer, shutdown_signal()).await?;
    print_report(&report);
    Ok(())
}

async fn cmd_serve(config: SkylineConfig) -> anyhow::Result<()> {
    let index = open_index(&config.storage)?;
    FeedServer::new(config.server, index)
        .serve(requested(shutdown_signal()))
        .await?;
    Ok(())
}

fn cmd_migrate(storage: &StorageConfig) -> anyhow::Result<()> {
    let index = open_index(storage)?;
    println!(
        "{} Schema ready at {} ({} posts)",
        "✓".green().bold(),
        storage.path.display().to_string().bold(),
        index.count()?
    );
    Ok(())
}

fn cmd_latest(storage: &StorageConfig, args: LatestArgs) -> anyhow::Result<()> {
    let index = open_index(storage)?;
    let rows = index.latest(args.limit, None)?;
    if rows.is_empty() {
        println!("No posts indexed yet.");
        return Ok(());
    }
    for row in rows {
        println!("{}  {}", row.indexed_at.dimmed(), row.uri.cyan());
        if let Some(parent) = &row.reply_parent {
            println!("  {} {}", "reply to".yellow(), parent);
        }
        println!("  {}", row.text.replace('\n', " "));
    }
    Ok(())
}

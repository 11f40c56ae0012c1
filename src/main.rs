//! foliocache - command line front end for the portfolio caching core.
//!
//! Runs page loads against the local caches and drives the service worker
//! registration from the terminal.

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

use foliocache::models::Language;
use foliocache::page::{BLOG_GRID, LANDING_TARGETS};
use foliocache::worker::registration::UPDATE_CHECK_INTERVAL;
use foliocache::worker::{
    Destination, FetchRequest, HttpNetwork, Registration, UpdateOutcome, WorkerMessage,
};
use foliocache::{App, Config};

/// Log file written inside the cache directory when `--log-file` is set
const LOG_FILE: &str = "foliocache.log";

#[derive(Parser, Debug)]
#[command(name = "foliocache", version, about = "Offline-first caches for the portfolio site")]
struct Cli {
    /// Also write logs to a file in the cache directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load metrics and blog posts and print every page target
    Page,
    /// Print the GitHub metrics
    Metrics,
    /// Print the rendered blog grid
    Blog {
        /// Language to load instead of the saved preference
        #[arg(long)]
        lang: Option<Language>,
    },
    /// Blog language preference
    Lang {
        #[command(subcommand)]
        action: Toggle,
    },
    /// Colour theme preference
    Theme {
        #[command(subcommand)]
        action: Toggle,
    },
    /// Show cached data and service worker buckets
    Status,
    /// Service worker registration
    Sw {
        #[command(subcommand)]
        action: SwCommand,
    },
}

#[derive(Subcommand, Debug)]
enum Toggle {
    Toggle,
}

#[derive(Subcommand, Debug)]
enum SwCommand {
    /// Install and activate the configured version
    Install,
    /// Route one request through the controlling worker
    Fetch {
        url: String,
        /// Treat the request as a page navigation
        #[arg(long)]
        navigate: bool,
    },
    /// Install the configured version as waiting and post a message to it
    Message {
        /// Raw JSON message, e.g. {"action":"skipWaiting"}
        raw: String,
    },
    /// Check for new versions until interrupted
    Watch,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, LOG_FILE));
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_dir = if cli.log_file {
        let dir = Config::load()?.cache_dir()?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Some(dir)
    } else {
        None
    };
    let _guard = init_tracing(log_dir.as_deref());
    info!(command = ?cli.command, "foliocache starting");

    let mut app = App::new()?;

    match cli.command {
        Command::Page => {
            app.load_page().await;
            print_targets(&app);
        }
        Command::Metrics => {
            let metrics = app.load_metrics().await;
            println!("commits: {}", metrics.commits);
            println!("repos:   {}", metrics.repos);
            println!("stars:   {}", metrics.stars);
        }
        Command::Blog { lang } => {
            let feed = app.load_blog(lang).await;
            eprintln!("{} posts ({})", feed.posts.len(), feed.language);
            println!("{}", app.document.get(BLOG_GRID).unwrap_or_default());
        }
        Command::Lang { action: Toggle::Toggle } => {
            let feed = app.toggle_blog_language().await?;
            println!("Blog language: {} {}", feed.language.flag(), feed.language.label());
        }
        Command::Theme { action: Toggle::Toggle } => {
            let theme = app.toggle_theme()?;
            println!("Theme: {} {}", theme.icon(), theme.as_str());
        }
        Command::Status => print_status(&app)?,
        Command::Sw { action } => run_worker_command(&mut app, action).await?,
    }

    info!("foliocache done");
    Ok(())
}

fn print_targets(app: &App) {
    for id in LANDING_TARGETS {
        if let Some(content) = app.document.get(id) {
            println!("#{}: {}", id, content);
        }
    }
}

fn print_status(app: &App) -> Result<()> {
    println!("Cache directory: {}", app.cache_dir().display());

    println!("Local store:");
    for key in app.local_store().keys()? {
        println!("  {}", key);
    }

    match app.metrics_cache().load_cached() {
        Ok(Some(entry)) => match entry.stored_at() {
            Some(at) => println!(
                "Metrics cached {} ({})",
                entry.age_display(Utc::now()),
                at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
            ),
            None => println!("Metrics cached with an invalid timestamp"),
        },
        Ok(None) => println!("Metrics not cached"),
        Err(e) => println!("Metrics cache unreadable: {}", e),
    }

    let registration = app.load_registration()?;
    match registration.active() {
        Some(worker) => println!("Active worker: {}", worker.version()),
        None => println!("No active worker"),
    }

    let storage = app.cache_storage()?;
    println!("Buckets:");
    for name in storage.keys()? {
        let entries = storage.bucket(&name).keys()?.len();
        println!("  {} ({} entries)", name, entries);
    }
    Ok(())
}

async fn run_worker_command(app: &mut App, action: SwCommand) -> Result<()> {
    if !app.should_register_worker() {
        println!("Local development host; service worker not registered");
        return Ok(());
    }

    let mut registration = app.load_registration()?;

    match action {
        SwCommand::Install => {
            let outcome = registration.update(app.new_worker()?).await?;
            print_outcome(app, outcome);
        }
        SwCommand::Fetch { url, navigate } => {
            let request = if navigate {
                FetchRequest::navigate(Url::parse(&url).with_context(|| format!("Invalid URL {}", url))?)
            } else {
                FetchRequest::parse(&url, Destination::Other)?
            };
            let outcome = registration.fetch(&request).await;
            match outcome.response() {
                Some(response) => println!("{} {} from {}", response.status, url, outcome.source()),
                None => println!("{} {}", outcome.source(), url),
            }
        }
        SwCommand::Message { raw } => {
            let Some(message) = WorkerMessage::parse(&raw) else {
                println!("Ignored unrecognised message");
                return Ok(());
            };
            let outcome = registration
                .update_with_message(app.new_waiting_worker()?, message)
                .await?;
            print_outcome(app, outcome);
        }
        SwCommand::Watch => watch(app, &mut registration).await,
    }

    registration.settle().await;
    app.save_registration(&registration)
}

fn print_outcome(app: &App, outcome: UpdateOutcome) {
    match outcome {
        UpdateOutcome::UpToDate => println!("Up to date"),
        UpdateOutcome::Activated { deleted } => {
            println!("Activated {}", app.config.cache_version);
            for name in deleted {
                println!("  deleted {}", name);
            }
        }
        UpdateOutcome::Waiting => println!("Installed, waiting"),
    }
}

/// Poll for new versions and reload the page whenever control changes.
async fn watch(app: &mut App, registration: &mut Registration<HttpNetwork>) {
    let (stop_tx, stop_rx) = oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
        }
        let _ = stop_tx.send(());
    });

    let mut controller = registration.subscribe();
    let reloads = async {
        while controller.changed().await.is_ok() {
            let version = controller.borrow_and_update().clone();
            info!(version = ?version, "Controller changed, reloading page");
            app.load_page().await;
            print_targets(app);
        }
    };

    // Re-read the configuration each time so a bumped cache version is seen.
    let candidate = || match App::new().and_then(|app| app.new_worker()) {
        Ok(worker) => Some(worker),
        Err(e) => {
            warn!(error = %e, "Skipping update check");
            None
        }
    };

    println!("Watching for updates, Ctrl-C to stop");
    tokio::select! {
        _ = registration.poll_updates(UPDATE_CHECK_INTERVAL, candidate, stop_rx) => {}
        _ = reloads => {}
    }
}

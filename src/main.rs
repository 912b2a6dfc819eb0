//! photoroll - roll random photos from the Mars and Picsum photo APIs.
//!
//! Each roll fetches both photo lists concurrently and picks one photo from
//! each. The Picsum photo can be shown with grayscale/blur filters, and the
//! displayed pair can be saved to (and reloaded from) a Firebase Realtime
//! Database together with a running roll counter.

#![warn(clippy::all)]

mod cli;
mod config;
mod fetch;
mod photos;
mod shutdown;
mod store;
#[cfg(test)]
mod test_server;
mod types;
mod view;

use std::io::Write as _;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use cli::Command;
use config::Config;
use photos::{HttpPhotoSource, MarsPhoto, PhotoRecord, PhotoSource};
use store::{FirebaseDatastore, RemoteStore, ROLLS_KEY};
use view::{Flow, RollCounter, UserCommand, View, ViewComposer, HELP};

type Sources = (
    Arc<dyn PhotoSource<MarsPhoto>>,
    Arc<dyn PhotoSource<PhotoRecord>>,
);

fn build_store(config: &Config, client: &reqwest::Client) -> anyhow::Result<Arc<RemoteStore>> {
    let datastore = FirebaseDatastore::new(
        client.clone(),
        config.require_database_url()?,
        config.auth_token.clone(),
    );
    tracing::debug!(?datastore, "Using Firebase datastore");
    Ok(Arc::new(RemoteStore::new(Arc::new(datastore))))
}

fn build_sources(config: &Config, client: &reqwest::Client) -> Sources {
    let mars: Arc<dyn PhotoSource<MarsPhoto>> = Arc::new(HttpPhotoSource::<MarsPhoto>::new(
        "Mars",
        client.clone(),
        config.mars_endpoint.as_str(),
    ));
    let picsum: Arc<dyn PhotoSource<PhotoRecord>> = Arc::new(
        HttpPhotoSource::<PhotoRecord>::new("Picsum", client.clone(), config.picsum_endpoint.as_str()),
    );
    (mars, picsum)
}

/// Store, sources, and the persisted roll count wired into a composer.
async fn build_composer(
    config: &Config,
) -> anyhow::Result<(
    ViewComposer,
    tokio::sync::mpsc::UnboundedReceiver<view::FetchOutcome>,
)> {
    let client = config.http_client()?;
    let store = build_store(config, &client)?;
    let rolls = RollCounter::load(&store).await;
    tracing::debug!(rolls = rolls.value(), "Loaded roll counter");
    let (mars, picsum) = build_sources(config, &client);
    Ok(ViewComposer::new(mars, picsum, store, rolls))
}

fn prompt() -> anyhow::Result<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}

fn render(composer: &ViewComposer) -> anyhow::Result<()> {
    println!("{}", composer.view());
    prompt()
}

/// One line of interactive input, classified.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Command(UserCommand),
    Blank,
    Rejected(String),
    Closed,
}

fn read_input(line: std::io::Result<Option<String>>) -> Input {
    match line {
        Ok(Some(line)) if line.trim().is_empty() => Input::Blank,
        Ok(Some(line)) => match line.parse::<UserCommand>() {
            Ok(command) => Input::Command(command),
            Err(e) => Input::Rejected(e.to_string()),
        },
        Ok(None) => Input::Closed,
        Err(e) => {
            tracing::warn!("Ignoring unreadable input: {}", e);
            Input::Rejected("Could not read that line; input must be UTF-8 text.".to_string())
        }
    }
}

/// Run the interactive session.
async fn run_interactive(config: Config) -> anyhow::Result<()> {
    let (mut composer, mut outcomes) = build_composer(&config).await?;
    let shutdown_token = shutdown::install_signal_handler()?;

    println!("{}", HELP);
    composer.refresh();
    render(&composer)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = shutdown_token.cancelled() => {
                tracing::info!("Shutdown requested, exiting...");
                break;
            }
            Some(outcome) = outcomes.recv() => {
                // Redraw once the view leaves Loading; stale results change nothing.
                if composer.apply(outcome) && !composer.is_loading() {
                    println!();
                    render(&composer)?;
                }
            }
            line = lines.next_line() => match read_input(line) {
                Input::Closed => break,
                Input::Blank => render(&composer)?,
                Input::Rejected(reason) => {
                    println!("{}", reason);
                    prompt()?;
                }
                Input::Command(command) => {
                    tracing::debug!(?command, "Handling command");
                    if composer.handle(command).await == Flow::Quit {
                        break;
                    }
                    render(&composer)?;
                }
            },
        }
    }

    println!();
    Ok(())
}

/// Run the roll command.
async fn run_roll(config: Config, args: cli::RollArgs) -> anyhow::Result<()> {
    let (mut composer, mut outcomes) = build_composer(&config).await?;

    composer.handle(UserCommand::Roll).await;
    composer.settle(&mut outcomes).await;

    if args.grayscale {
        composer.handle(UserCommand::ToggleGrayscale).await;
    }
    if args.blur {
        composer.handle(UserCommand::ToggleBlur).await;
    }
    if args.save {
        composer.handle(UserCommand::Save).await;
    }

    let view = composer.view();
    println!("{}", view);
    if matches!(view, View::Error { .. }) {
        anyhow::bail!("Failed to fetch photos");
    }
    if args.save && composer.message() != Some(view::MSG_SAVED) {
        anyhow::bail!("Failed to save photos");
    }
    Ok(())
}

/// Run the last command.
async fn run_last(config: Config) -> anyhow::Result<()> {
    let client = config.http_client()?;
    let store = build_store(&config, &client)?;
    let (mars, picsum) = store.load_last_pair().await;

    if mars.is_none() && picsum.is_none() {
        println!("No saved photos found.");
        return Ok(());
    }

    println!("Last saved photos:");
    match &mars {
        Some(m) => println!("  Mars:   {} {}", m.id, m.img_src),
        None => println!("  Mars:   not found"),
    }
    match &picsum {
        Some(p) => println!("  Picsum: {} by {} {}", p.id, p.author, p.download_url),
        None => println!("  Picsum: not found"),
    }
    if let Some(saved_at) = mars
        .as_ref()
        .and_then(|m| m.saved_at)
        .or_else(|| picsum.as_ref().and_then(|p| p.saved_at))
    {
        if let Some(dt) = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(saved_at) {
            println!("  Saved:  {}", dt.format("%Y-%m-%d %H:%M:%S UTC"));
        }
    }
    Ok(())
}

/// Run the rolls command.
async fn run_rolls(config: Config) -> anyhow::Result<()> {
    let client = config.http_client()?;
    let store = build_store(&config, &client)?;
    println!("Rolls: {}", store.get_count(ROLLS_KEY).await);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Logs go to stderr so the session output on stdout stays readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let command = cli.effective_command();
    let config = Config::from_cli(cli.remote)?;
    tracing::debug!(?config, "Starting photoroll");

    match command {
        Command::Interactive => run_interactive(config).await,
        Command::Roll(args) => run_roll(config, args).await,
        Command::Last => run_last(config).await,
        Command::Rolls => run_rolls(config).await,
    }
}

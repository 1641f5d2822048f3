use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use std::thread;

use clap::Parser;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

// Error tracing
use anyhow::{Context, Result};

use client::backend::RestBackend;
use client::{Board, Tab};
use shared::config::{read_config, validate_config};
use shared::types::LogConfig;

mod app;
mod ui;

use app::{Action, App};

#[derive(Parser, Debug)]
#[command(name = "joke-board", about = "Read and share jokes from the 1RXM board")]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "joke-board.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = read_config(&args.config)
        .with_context(|| format!("Failed to read config from {}", args.config))?;
    init_logging(&config.log)?;
    info!("Starting joke board with config {}", args.config);
    validate_config(&config).with_context(|| format!("Invalid config in {}", args.config))?;

    let backend = RestBackend::new(&config.backend).context("Failed to build backend client")?;
    let board = Board::mount(Arc::new(backend), config.feed.clone()).await;

    let mut terminal = ratatui::init();
    let result = run(&mut terminal, &board).await;
    ratatui::restore();

    board.unmount().await;
    info!("Joke board closed");
    result
}

/// The terminal belongs to the UI, so logs go to a file.
fn init_logging(config: &LogConfig) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file)
        .with_context(|| format!("Failed to open log file {}", config.file))?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

/// Terminal input is blocking, so it is read on its own thread.
fn spawn_input_reader(tx: mpsc::UnboundedSender<Event>) {
    thread::spawn(move || {
        loop {
            match event::read() {
                Ok(event) => {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Terminal input failed: {}", e);
                    break;
                }
            }
        }
    });
}

async fn run(terminal: &mut DefaultTerminal, board: &Board) -> Result<()> {
    let (tx, mut input) = mpsc::unbounded_channel();
    spawn_input_reader(tx);

    let mut changes = board.subscribe_changes();
    let mut app = App::new();

    while !app.should_quit {
        let state = board.snapshot().await;
        terminal
            .draw(|frame| ui::draw(frame, &state, &app))
            .context("Failed to draw frame")?;

        tokio::select! {
            event = input.recv() => {
                let Some(event) = event else {
                    break;
                };
                if let Event::Key(key) = event {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if let Some(action) = app.on_key(key, &state) {
                        dispatch(board, &mut app, action).await;
                    }
                }
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}

async fn dispatch(board: &Board, app: &mut App, action: Action) {
    debug!("Action {:?}", action);
    match action {
        Action::Quit => app.should_quit = true,
        Action::SelectTab(tab) => {
            board.clear_notice().await;
            board.select_tab(tab).await;
        }
        Action::Input(_) | Action::Backspace => {
            let app = &*app;
            board
                .update(|s| {
                    let focus = app.focus_in(s.tab);
                    app::edit_field(s, focus, &action);
                })
                .await;
        }
        Action::Submit => {
            let tab = board.with_state(|s| s.tab).await;
            let board = board.clone();
            tokio::spawn(async move {
                // Failures are already shown as notices.
                let _ = match tab {
                    Tab::Publish => board.publish().await.map(|_| ()),
                    Tab::Login => board.submit_login().await,
                    Tab::Register => board.submit_registration().await,
                    Tab::Month | Tab::Community => Ok(()),
                };
            });
        }
        Action::RequestLink => {
            board
                .update(|s| s.otp_form.email = s.login_form.email.clone())
                .await;
            let board = board.clone();
            tokio::spawn(async move {
                let _ = board.submit_otp().await;
            });
        }
        Action::SignOut => {
            let board = board.clone();
            tokio::spawn(async move {
                let _ = board.sign_out().await;
            });
        }
        Action::Refresh => {
            let board = board.clone();
            tokio::spawn(async move {
                let _ = board.refresh_feed().await;
            });
        }
    }
}

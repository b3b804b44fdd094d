use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use taskboard::cli::{self, Cli};
use taskboard::config::Config;
use taskboard::logging::init_tracing;
use taskboard::storage::{FileStorage, SharedStorage};
use taskboard::ui::{run_app, App};
use taskboard::{BoardStore, SessionStore};

/// Ask a yes/no question on stdin. Anything but "y"/"yes" is a no.
fn prompt_confirm(question: &str) -> bool {
    print!("{} [y/N] ", question);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut input = String::new();
    match io::stdin().read_line(&mut input) {
        Ok(_) => matches!(input.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

fn run_tui(config: &Config, storage: SharedStorage) -> Result<()> {
    let session = SessionStore::open(storage.clone());
    let board = BoardStore::open(storage);
    let mut app = App::new(session, board, config.login_delay);

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result.context("Terminal UI failed")
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::new(cli.data_dir, cli.no_login_delay, cli.debug);
    if let Err(err) = init_tracing(config.debug, &config.log_path()) {
        eprintln!("Logging disabled: {:#}", err);
    }
    tracing::debug!("Using data directory {:?}", config.data_dir);

    let storage: SharedStorage = Arc::new(FileStorage::new(&config.data_dir));
    match cli.command {
        Some(command) => {
            let mut stdout = io::stdout();
            cli::dispatch(command, storage, &mut stdout, prompt_confirm)
        }
        None => run_tui(&config, storage),
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            eprintln!("Error: {:#}", err);
            ExitCode::from(1)
        }
    }
}

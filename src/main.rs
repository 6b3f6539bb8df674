use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use simple_banking::{AccountStore, Console, SessionController};

#[derive(Parser, Debug)]
#[command(name = "banking", about = "Simple Banking System", version)]
struct Cli {
    /// SQLite database file (created if missing, kept on exit)
    #[arg(
        short = 'f',
        long = "fileName",
        visible_alias = "file-name",
        env = "BANKING_DB_FILE",
        default_value = "card.s3db"
    )]
    file_name: PathBuf,

    /// Log engine activity to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse_from(normalize_args(env::args()));
    init_logging(cli.verbose);

    let mut store = AccountStore::open(&cli.file_name)
        .with_context(|| format!("Failed to open database {}", cli.file_name.display()))?;
    info!(path = %cli.file_name.display(), "database ready");

    let session = run_session(&mut store);

    // Release the database before reporting how the session ended
    let closed = store.close().context("Failed to close database");
    session?;
    closed?;

    Ok(())
}

fn run_session(store: &mut AccountStore) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();

    let mut controller = SessionController::new(store);
    let mut console = Console::new(stdin.lock(), stdout.lock());
    console.run(&mut controller).context("Session aborted")?;

    Ok(())
}

/// stdout carries the menus, so logs go to stderr and stay quiet by default
fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "simple_banking=debug,banking=debug"
    } else {
        "error"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Accept the single-dash `-fileName` spelling by rewriting it to the long form
fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .map(|arg| {
            if let Some(rest) = arg.strip_prefix("-fileName") {
                return format!("--fileName{}", rest);
            }
            arg
        })
        .collect()
}

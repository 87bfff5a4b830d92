//! Logger Daemon - interactive front-end
//!
//! Usage:
//!   logger-daemon                      Log stdin lines to ./Logs/
//!   logger-daemon --config app.toml    Use settings from a TOML file
//!   logger-daemon --console -v         Echo records and trace the logger
//!
//! Type `exit` (or close stdin) to stop; pending records are flushed first.

mod cli;

use clap::Parser;
use cli::Cli;
use logger_daemon::{logging, Logger, Settings};
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> logger_daemon::Result<()> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(root) = cli.log_root {
        settings.log_root = root;
    }
    if let Some(level) = cli.level {
        settings.minimum_level = level;
    }
    settings.echo_to_console |= cli.console;
    settings.self_diagnostics |= cli.verbose;

    let logger = Logger::new(settings)?;
    let file = logger.register(&cli.name)?;

    logger.start()?;
    logger.detach()?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("Write something: ");
        let _ = io::stdout().flush();

        let msg = match lines.next() {
            Some(Ok(line)) => line,
            _ => break,
        };
        if msg.trim() == "exit" {
            break;
        }
        if let Err(e) = logger.info_to(file, &msg) {
            // Detached: only join guarantees the queue reaches disk
            let _ = logger.join();
            return Err(e);
        }
        println!("Enqueued: {}", msg);
    }

    logger.join()
}

use std::fs::OpenOptions;
use std::path::Path;

use clap::Parser;
use today::cli::commands::Cli;
use today::cli::handlers;

fn main() {
    let cli = Cli::parse();

    let data_dir = match handlers::resolve_data_dir(cli.data_dir.as_deref()) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    // No subcommand → TUI, which owns the terminal, so logs go to a file
    setup_tracing(cli.command.is_none(), &data_dir);

    if let Err(e) = handlers::dispatch(cli, data_dir) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn setup_tracing(tui: bool, data_dir: &Path) {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    if tui {
        let file = std::fs::create_dir_all(data_dir).and_then(|()| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(data_dir.join("today.log"))
        });
        if let Ok(file) = file {
            let filter = EnvFilter::try_from_env("TODAY_LOG")
                .unwrap_or_else(|_| EnvFilter::new("today=info"));
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true);
            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .init();
        }
        // Without a log file the TUI runs silent rather than draw over itself
        return;
    }

    let filter = EnvFilter::try_from_env("TODAY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

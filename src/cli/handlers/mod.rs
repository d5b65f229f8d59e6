use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use chrono::Local;
use tracing::warn;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::editor::open_in_editor;
use crate::io::recovery::read_recovery_entries;
use crate::io::store::{Store, StoreError, default_data_dir};
use crate::io::watcher::{ChangeNotifier, NotifierEvent, RESTART_DELAY};
use crate::model::Document;

/// How often `today watch` drains the notifier.
const WATCH_TICK: Duration = Duration::from_millis(100);

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// The `--data-dir` flag if given, otherwise $TODAY_DIR or ~/.today.
pub fn resolve_data_dir(flag: Option<&Path>) -> Result<PathBuf, StoreError> {
    match flag {
        Some(dir) => Ok(dir.to_path_buf()),
        None => default_data_dir(),
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli, data_dir: PathBuf) -> CmdResult {
    let json = cli.json;
    let store = Store::new(data_dir);

    match cli.command {
        None => {
            let config = config_io::read_config(store.dir())?;
            crate::tui::run(store, config)
        }
        Some(cmd) => match cmd {
            Commands::Show => cmd_show(&store, json),
            Commands::Path => cmd_path(&store),
            Commands::Add(args) => cmd_add(&store, args),
            Commands::Edit => cmd_edit(&store),
            Commands::Watch => cmd_watch(&store, json),
            Commands::Config(args) => cmd_config(&store, args),
            Commands::Recovery => cmd_recovery(&store, json),
        },
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_show(store: &Store, json: bool) -> CmdResult {
    let content = store.read()?;
    if json {
        let out = DocumentJson::new(store.path(), &content);
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print!("{}", content);
    }
    Ok(())
}

fn cmd_path(store: &Store) -> CmdResult {
    store.ensure_exists()?;
    println!("{}", store.path().display());
    Ok(())
}

fn cmd_add(store: &Store, args: AddArgs) -> CmdResult {
    let config = config_io::read_config(store.dir())?;
    let section = args.section.unwrap_or(config.ui.capture_section);
    let text = args.text.join(" ");

    let mut doc = Document::parse(&store.read()?);
    doc.add_task(&section, &text)?;
    store.write(&doc.serialize())?;
    println!("added to {}", section);
    Ok(())
}

fn cmd_edit(store: &Store) -> CmdResult {
    store.ensure_exists()?;
    let config = config_io::read_config(store.dir())?;
    let command = config.editor.resolve();
    let status = open_in_editor(&command, store.path())
        .map_err(|e| format!("could not run '{}': {}", command, e))?;
    if !status.success() {
        return Err(format!("'{}' exited with {}", command, status).into());
    }
    Ok(())
}

/// Follow the task file until interrupted. A watch that cannot attach, or
/// that drops, is retried.
fn cmd_watch(store: &Store, json: bool) -> CmdResult {
    store.ensure_exists()?;
    let config = config_io::read_config(store.dir())?;
    let mut notifier =
        ChangeNotifier::with_window(store.clone(), config.watch.suppression_window());

    eprintln!("watching {} (Ctrl-C to stop)", store.path().display());
    loop {
        if !notifier.is_watching()
            && let Err(e) = notifier.start()
        {
            warn!(error = %e, "retrying file watch");
            thread::sleep(RESTART_DELAY);
            continue;
        }

        for NotifierEvent::Changed(content) in notifier.poll()? {
            let now = Local::now();
            if json {
                let out = ChangeJson {
                    changed_at: now.to_rfc3339(),
                    content: &content,
                };
                println!("{}", serde_json::to_string(&out)?);
            } else {
                println!("{}", format_change_header(now));
                print!("{}", content);
                if !content.ends_with('\n') {
                    println!();
                }
            }
        }
        thread::sleep(WATCH_TICK);
    }
}

fn cmd_config(store: &Store, args: ConfigCmd) -> CmdResult {
    match args.action {
        None => {
            let config = config_io::read_config(store.dir())?;
            print!("{}", config_io::render_config(&config)?);
        }
        Some(ConfigAction::Set { key, value }) => {
            config_io::set_config_value(store.dir(), &key, &value)?;
            println!("{} = {}", key, value);
        }
    }
    Ok(())
}

fn cmd_recovery(store: &Store, json: bool) -> CmdResult {
    let entries = read_recovery_entries(store.dir());
    if json {
        let out: Vec<RecoveryEntryJson> = entries.iter().map(RecoveryEntryJson::from).collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("recovery log is empty");
        return Ok(());
    }
    for entry in &entries {
        println!("{}", format_recovery_entry(entry));
    }
    Ok(())
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "today", about = concat!("today v", env!("CARGO_PKG_VERSION"), " - one markdown file for what matters now"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory holding today.md (default: $TODAY_DIR or ~/.today)
    #[arg(short = 'D', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the task file
    Show,
    /// Print the path of the task file
    Path,
    /// Capture a task into a section (default: Today)
    Add(AddArgs),
    /// Open the task file in your editor
    Edit,
    /// Follow external edits to the task file and print each change
    Watch,
    /// Show or change settings
    Config(ConfigCmd),
    /// Show content that could not be saved
    Recovery,
}

#[derive(Args)]
pub struct AddArgs {
    /// Task text
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,
    /// Section to add to (default: ui.capture_section from config)
    #[arg(long, short)]
    pub section: Option<String>,
}

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Set a value, e.g. `today config set watch.suppression_window_ms 1500`
    Set {
        /// Dotted key
        key: String,
        /// New value
        value: String,
    },
}

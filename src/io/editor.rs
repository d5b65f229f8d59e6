use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus};

/// Open `path` with an editor command line such as `nvim` or `code --wait`,
/// blocking until the editor exits.
pub fn open_in_editor(command: &str, path: &Path) -> io::Result<ExitStatus> {
    let mut parts = command.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty editor command"))?;
    Command::new(program).args(parts).arg(path).status()
}

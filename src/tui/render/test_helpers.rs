use ratatui::Terminal;
use ratatui::backend::TestBackend;
use ratatui::layout::Rect;
use tempfile::TempDir;

use crate::io::store::Store;
use crate::model::{Config, Document};
use crate::tui::app::App;

pub const TERM_W: u16 = 80;
pub const TERM_H: u16 = 24;

/// Render into an in-memory buffer and return plain text (no styles).
pub fn render_to_string<F>(w: u16, h: u16, f: F) -> String
where
    F: FnOnce(&mut ratatui::Frame, Rect),
{
    let backend = TestBackend::new(w, h);
    let mut terminal = Terminal::new(backend).unwrap();
    terminal
        .draw(|frame| {
            let area = frame.area();
            f(frame, area);
        })
        .unwrap();

    let buf = terminal.backend().buffer().clone();
    let w = buf.area.width as usize;
    let lines: Vec<String> = buf
        .content
        .chunks(w)
        .map(|row| {
            let s: String = row.iter().map(|cell| cell.symbol()).collect();
            s.trim_end().to_string()
        })
        .collect();

    // Trim trailing blank lines
    let end = lines
        .iter()
        .rposition(|l| !l.is_empty())
        .map_or(0, |i| i + 1);
    lines[..end].join("\n")
}

/// Build an App over a throwaway data directory, showing `md`.
/// Keep the returned directory alive for as long as the app is used.
pub fn app_with_document(md: &str) -> (App, TempDir) {
    let dir = TempDir::new().unwrap();
    let mut app = App::new(Store::new(dir.path().join(".today")), Config::default()).unwrap();
    app.document = Document::parse(md);
    (app, dir)
}

/// A document with tasks in three sections, one of them with a sub-item.
pub const SAMPLE_MD: &str = "\
# Monthly Goals
- ship v1

# This Week
- [ ] write docs
  - api section
- [x] fix watcher

# Today
- buy milk

# Done
";

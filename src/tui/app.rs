use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing::{error, info};

use crate::io::editor::open_in_editor;
use crate::io::store::{Store, StoreError};
use crate::io::watcher::{ChangeNotifier, NotifierEvent, RESTART_DELAY};
use crate::model::{Config, Document, DocumentError, TaskRef};

use super::capture::CaptureState;
use super::input;
use super::render;
use super::theme::Theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Error,
}

/// One-line message shown in the status row until the next key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

/// Main application state
///
/// Owns the only document view and at most one capture overlay.
pub struct App {
    pub store: Store,
    pub notifier: ChangeNotifier,
    /// Earliest time to reattach a lost watch; `None` until watching is wanted
    pub watch_retry_at: Option<Instant>,
    pub config: Config,
    pub theme: Theme,
    pub document: Document,
    /// Index into `document.task_refs()`
    pub cursor: usize,
    /// First visible row of the document view
    pub scroll_offset: usize,
    pub capture: Option<CaptureState>,
    pub status: Option<StatusMessage>,
    /// The in-memory document has edits that failed to save
    pub dirty: bool,
    /// Set by the `o` key; the event loop owns the terminal and opens the editor
    pub editor_requested: bool,
    pub should_quit: bool,
}

impl App {
    pub fn new(store: Store, config: Config) -> Result<Self, StoreError> {
        let content = store.read()?;
        let notifier =
            ChangeNotifier::with_window(store.clone(), config.watch.suppression_window());
        let theme = Theme::from_config(&config.ui);
        Ok(App {
            store,
            notifier,
            watch_retry_at: None,
            config,
            theme,
            document: Document::parse(&content),
            cursor: 0,
            scroll_offset: 0,
            capture: None,
            status: None,
            dirty: false,
            editor_requested: false,
            should_quit: false,
        })
    }

    /// Attach the file watch. A failure only leaves a status message; the
    /// event loop keeps retrying.
    pub fn start_watching(&mut self) {
        self.watch_retry_at = Some(Instant::now() + RESTART_DELAY);
        if let Err(e) = self.notifier.start() {
            self.set_error(format!("not following external edits: {}", e));
        }
    }

    /// Reattach a watch that failed or dropped, at most once per
    /// `RESTART_DELAY`.
    fn restart_watch_if_due(&mut self) {
        let Some(due) = self.watch_retry_at else {
            return;
        };
        let now = Instant::now();
        if self.notifier.is_watching() || now < due {
            return;
        }
        self.watch_retry_at = Some(now + RESTART_DELAY);
        if self.notifier.start().is_ok() {
            self.set_info("following external edits again");
        }
    }

    pub fn set_info(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            kind: StatusKind::Info,
            text: text.into(),
        });
    }

    pub fn set_error(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            kind: StatusKind::Error,
            text: text.into(),
        });
    }

    pub fn task_refs(&self) -> Vec<TaskRef> {
        self.document.task_refs()
    }

    pub fn selected(&self) -> Option<TaskRef> {
        self.task_refs().get(self.cursor).copied()
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let count = self.task_refs().len();
        if count == 0 {
            self.cursor = 0;
            return;
        }
        self.cursor = self.cursor.saturating_add_signed(delta).min(count - 1);
    }

    fn select(&mut self, at: TaskRef) {
        if let Some(pos) = self.task_refs().iter().position(|r| *r == at) {
            self.cursor = pos;
        }
    }

    fn clamp_cursor(&mut self) {
        let count = self.task_refs().len();
        self.cursor = self.cursor.min(count.saturating_sub(1));
    }

    /// Write the document. On failure the edit stays in memory and the
    /// app is marked dirty.
    pub fn save(&mut self) {
        let content = self.document.serialize();
        match self.store.write(&content) {
            Ok(()) => self.dirty = false,
            Err(e) => {
                error!(error = %e, "save failed");
                self.dirty = true;
                self.set_error(format!("save failed: {}", e));
            }
        }
    }

    /// Replace the document with content written by another process.
    pub fn apply_external_change(&mut self, content: &str) {
        self.document = Document::parse(content);
        self.dirty = false;
        self.clamp_cursor();
        self.set_info("reloaded external change");
    }

    /// Drain the notifier and apply any external change.
    pub fn poll_changes(&mut self) {
        self.restart_watch_if_due();
        match self.notifier.poll() {
            Ok(events) => {
                for NotifierEvent::Changed(content) in events {
                    self.apply_external_change(&content);
                }
            }
            Err(e) => self.set_error(format!("could not reload: {}", e)),
        }
    }

    /// Re-read the document from disk, discarding unsaved edits.
    pub fn reload(&mut self) {
        match self.store.read() {
            Ok(content) => {
                self.document = Document::parse(&content);
                self.dirty = false;
                self.clamp_cursor();
                self.set_info("reloaded");
            }
            Err(e) => self.set_error(format!("could not reload: {}", e)),
        }
    }

    /// Show the capture overlay. An overlay that is already open keeps its input.
    pub fn open_capture(&mut self) {
        if self.capture.is_none() {
            self.capture = Some(CaptureState::default());
        }
    }

    pub fn cancel_capture(&mut self) {
        self.capture = None;
    }

    /// Append the captured text to the capture section and save.
    pub fn submit_capture(&mut self) {
        let Some(capture) = self.capture.take() else {
            return;
        };
        let section = self.config.ui.capture_section.clone();
        match self.document.add_task(&section, &capture.input) {
            Ok(at) => {
                self.select(at);
                self.save();
                if !self.dirty {
                    self.set_info(format!("added to {}", section));
                }
            }
            Err(DocumentError::EmptyTask) => {}
            Err(e) => self.set_error(e.to_string()),
        }
    }

    pub fn complete_selected(&mut self) {
        let Some(at) = self.selected() else {
            return;
        };
        let done = self.config.ui.done_section.clone();
        match self.document.complete_task(at, &done) {
            Ok(Some(_)) => {
                self.clamp_cursor();
                self.save();
            }
            Ok(None) => self.set_info(format!("already in {}", done)),
            Err(e) => self.set_error(e.to_string()),
        }
    }

    pub fn delete_selected(&mut self) {
        let Some(at) = self.selected() else {
            return;
        };
        match self.document.remove_task(at) {
            Ok(_) => {
                self.clamp_cursor();
                self.save();
            }
            Err(e) => self.set_error(e.to_string()),
        }
    }
}

/// Run the TUI application
pub fn run(store: Store, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut app = App::new(store, config)?;
    app.start_watching();
    info!(path = %app.store.path().display(), "tui started");

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // Install panic hook to restore terminal on panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableBracketedPaste, LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let result = run_event_loop(&mut terminal, &mut app);

    app.notifier.stop();

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        terminal.draw(|frame| render::render(frame, app))?;

        if event::poll(Duration::from_millis(250))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    input::handle_key(app, key);
                }
                Event::Paste(text) => input::handle_paste(app, &text),
                _ => {}
            }
        }

        if app.editor_requested {
            app.editor_requested = false;
            run_external_editor(terminal, app)?;
        }

        app.poll_changes();

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Hand the terminal to the external editor and take it back afterwards.
/// The edit itself reaches the app through the notifier.
fn run_external_editor(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    let command = app.config.editor.resolve();

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;

    let status = open_in_editor(&command, app.store.path());

    enable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        EnterAlternateScreen,
        EnableBracketedPaste
    )?;
    terminal.clear()?;

    match status {
        Ok(s) if s.success() => {}
        Ok(s) => app.set_error(format!("{} exited with {}", command, s)),
        Err(e) => app.set_error(format!("could not run {}: {}", command, e)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::DEFAULT_TEMPLATE;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn app_in(tmp: &TempDir) -> App {
        App::new(Store::new(tmp.path().join(".today")), Config::default()).unwrap()
    }

    fn capture(app: &mut App, text: &str) {
        app.open_capture();
        app.capture.as_mut().unwrap().insert_str(text);
        app.submit_capture();
    }

    #[test]
    fn startup_reads_template() {
        let tmp = TempDir::new().unwrap();
        let app = app_in(&tmp);
        assert_eq!(app.document.serialize(), DEFAULT_TEMPLATE);
        assert!(app.selected().is_none());
        assert!(app.capture.is_none());
    }

    #[test]
    fn capture_appends_to_today_and_saves() {
        let tmp = TempDir::new().unwrap();
        let mut app = app_in(&tmp);
        capture(&mut app, "buy milk");

        assert!(app.capture.is_none());
        assert!(!app.dirty);
        assert_eq!(
            app.store.read().unwrap(),
            "# Monthly Goals\n\n# This Week\n\n# Today\n- buy milk\n\n# Done\n"
        );
        assert_eq!(app.selected(), Some(TaskRef { section: 2, index: 0 }));
        assert!(app.store.last_write().is_some());
    }

    #[test]
    fn blank_capture_closes_without_writing() {
        let tmp = TempDir::new().unwrap();
        let mut app = app_in(&tmp);
        capture(&mut app, "   ");
        assert!(app.capture.is_none());
        assert!(app.store.last_write().is_none());
    }

    #[test]
    fn reopening_capture_keeps_input() {
        let tmp = TempDir::new().unwrap();
        let mut app = app_in(&tmp);
        app.open_capture();
        app.capture.as_mut().unwrap().insert_str("half typed");
        app.open_capture();
        assert_eq!(app.capture.as_ref().unwrap().input, "half typed");
        app.cancel_capture();
        assert!(app.capture.is_none());
    }

    #[test]
    fn complete_and_delete_selected() {
        let tmp = TempDir::new().unwrap();
        let mut app = app_in(&tmp);
        capture(&mut app, "one");
        capture(&mut app, "two");

        app.cursor = 0;
        app.complete_selected();
        let saved = app.store.read().unwrap();
        assert!(saved.contains("# Today\n- two\n"));
        assert!(saved.ends_with("# Done\n- one\n"));

        app.cursor = 0;
        app.delete_selected();
        assert!(!app.store.read().unwrap().contains("- two"));
        assert_eq!(app.cursor, 0);
    }

    #[test]
    fn external_change_replaces_document() {
        let tmp = TempDir::new().unwrap();
        let mut app = app_in(&tmp);
        capture(&mut app, "a");
        capture(&mut app, "b");
        app.cursor = 1;

        app.apply_external_change("# Today\n- only one\n");
        assert_eq!(app.document.serialize(), "# Today\n- only one\n");
        assert_eq!(app.cursor, 0);
        assert_eq!(
            app.status.as_ref().map(|s| s.kind),
            Some(StatusKind::Info)
        );
    }

    #[test]
    fn reload_picks_up_disk_state() {
        let tmp = TempDir::new().unwrap();
        let mut app = app_in(&tmp);
        fs::write(app.store.path(), "# Today\n- edited elsewhere\n").unwrap();
        app.reload();
        assert_eq!(app.task_refs().len(), 1);
    }

    #[test]
    fn failed_save_keeps_edit_in_memory() {
        let tmp = TempDir::new().unwrap();
        let mut app = app_in(&tmp);
        // swap the task file for a non-empty directory so the save cannot land
        fs::remove_file(app.store.path()).unwrap();
        fs::create_dir_all(app.store.path().join("occupied")).unwrap();

        capture(&mut app, "survives");

        assert!(app.dirty);
        assert_eq!(
            app.status.as_ref().map(|s| s.kind),
            Some(StatusKind::Error)
        );
        assert!(app.document.serialize().contains("- survives"));
        let entries = crate::io::recovery::read_recovery_entries(app.store.dir());
        assert!(entries[0].body.contains("- survives"));
    }

    #[test]
    fn lost_watch_is_restarted_after_delay() {
        let tmp = TempDir::new().unwrap();
        let mut app = app_in(&tmp);
        app.start_watching();
        assert!(app.notifier.is_watching());

        app.notifier.stop();
        app.poll_changes();
        assert!(!app.notifier.is_watching(), "restarted before the delay");

        app.watch_retry_at = Some(Instant::now());
        app.poll_changes();
        assert!(app.notifier.is_watching());
        assert_eq!(
            app.status.as_ref().map(|s| s.kind),
            Some(StatusKind::Info)
        );
    }

    #[test]
    fn watch_is_not_started_unless_asked() {
        let tmp = TempDir::new().unwrap();
        let mut app = app_in(&tmp);
        app.poll_changes();
        assert!(!app.notifier.is_watching());
    }

    #[test]
    fn move_cursor_is_clamped() {
        let tmp = TempDir::new().unwrap();
        let mut app = app_in(&tmp);
        app.move_cursor(5);
        assert_eq!(app.cursor, 0);
        capture(&mut app, "a");
        capture(&mut app, "b");
        app.move_cursor(10);
        assert_eq!(app.cursor, 1);
        app.move_cursor(-10);
        assert_eq!(app.cursor, 0);
    }
}

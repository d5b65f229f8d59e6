use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::app::App;

/// Handle a key event. The capture overlay, when open, takes all input.
pub fn handle_key(app: &mut App, key: KeyEvent) {
    // Ignore bare modifier key presses (Shift, Ctrl, Alt, etc.)
    if matches!(key.code, KeyCode::Modifier(_)) {
        return;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return;
    }
    app.status = None;

    if app.capture.is_some() {
        handle_capture(app, key);
    } else {
        handle_navigate(app, key);
    }
}

/// Handle a bracketed paste. Only the capture overlay accepts text.
pub fn handle_paste(app: &mut App, text: &str) {
    if let Some(capture) = &mut app.capture {
        capture.insert_str(text);
    }
}

fn handle_navigate(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('j') | KeyCode::Down => app.move_cursor(1),
        KeyCode::Char('k') | KeyCode::Up => app.move_cursor(-1),
        KeyCode::Char('g') | KeyCode::Home => app.cursor = 0,
        KeyCode::Char('G') | KeyCode::End => app.move_cursor(isize::MAX),
        KeyCode::Char('a') | KeyCode::Char('n') => app.open_capture(),
        KeyCode::Char('x') | KeyCode::Enter => app.complete_selected(),
        KeyCode::Char('d') | KeyCode::Delete => app.delete_selected(),
        KeyCode::Char('o') => app.editor_requested = true,
        KeyCode::Char('r') => app.reload(),
        _ => {}
    }
}

fn handle_capture(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Enter => {
            app.submit_capture();
            return;
        }
        KeyCode::Esc => {
            app.cancel_capture();
            return;
        }
        _ => {}
    }

    let Some(capture) = &mut app.capture else {
        return;
    };
    match key.code {
        KeyCode::Char('w') if ctrl => capture.delete_word_back(),
        KeyCode::Char('a') if ctrl => capture.home(),
        KeyCode::Char('e') if ctrl => capture.end(),
        KeyCode::Char(c) if !ctrl => capture.insert_char(c),
        KeyCode::Backspace => capture.backspace(),
        KeyCode::Delete => capture.delete(),
        KeyCode::Left => capture.move_left(),
        KeyCode::Right => capture.move_right(),
        KeyCode::Home => capture.home(),
        KeyCode::End => capture.end(),
        _ => {}
    }
}

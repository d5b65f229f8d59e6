use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::tui::app::{App, StatusKind};
use crate::util::unicode::{display_width, truncate_to_width};

const NAVIGATE_HINTS: &str = "a add  x done  d delete  o editor  r reload  q quit";
const CAPTURE_HINTS: &str = "Enter add  Esc cancel";

/// Render the status row (bottom of screen)
pub fn render_status_row(frame: &mut Frame, app: &App, area: Rect) {
    let bg = app.theme.background;
    let width = area.width as usize;

    let mut spans = Vec::new();
    match &app.status {
        Some(msg) => {
            let fg = match msg.kind {
                StatusKind::Info => app.theme.text_bright,
                StatusKind::Error => app.theme.red,
            };
            spans.push(Span::styled(
                truncate_to_width(&format!(" {}", msg.text), width),
                Style::default().fg(fg).bg(bg),
            ));
        }
        None => {
            let hints = if app.capture.is_some() {
                CAPTURE_HINTS
            } else {
                NAVIGATE_HINTS
            };
            spans.push(Span::styled(
                truncate_to_width(&format!(" {}", hints), width),
                Style::default().fg(app.theme.dim).bg(bg),
            ));
        }
    }

    if app.dirty {
        let flag = "unsaved ";
        let used: usize = spans.iter().map(|s| display_width(&s.content)).sum();
        if used + flag.len() < width {
            spans.push(Span::styled(
                " ".repeat(width - used - flag.len()),
                Style::default().bg(bg),
            ));
            spans.push(Span::styled(flag, Style::default().fg(app.theme.red).bg(bg)));
        }
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(bg));
    frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::render::test_helpers::*;

    #[test]
    fn hints_by_mode() {
        let (mut app, _dir) = app_with_document(SAMPLE_MD);
        let output = render_to_string(TERM_W, 1, |frame, area| {
            render_status_row(frame, &app, area);
        });
        assert_eq!(output, format!(" {}", NAVIGATE_HINTS));

        app.open_capture();
        let output = render_to_string(TERM_W, 1, |frame, area| {
            render_status_row(frame, &app, area);
        });
        assert_eq!(output, format!(" {}", CAPTURE_HINTS));
    }

    #[test]
    fn error_message_and_unsaved_flag() {
        let (mut app, _dir) = app_with_document(SAMPLE_MD);
        app.set_error("save failed: disk full");
        app.dirty = true;
        let output = render_to_string(TERM_W, 1, |frame, area| {
            render_status_row(frame, &app, area);
        });
        assert!(output.starts_with(" save failed: disk full"));
        assert!(output.ends_with("unsaved"));
    }
}

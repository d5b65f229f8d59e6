pub mod capture_overlay;
pub mod document_view;
pub mod status_row;
#[cfg(test)]
pub mod test_helpers;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};

use super::app::App;
use crate::util::unicode::truncate_to_width;

/// Draw the whole screen: title, document, overlay and status row
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    // Background fill
    let bg_style = Style::default().bg(app.theme.background);
    frame.render_widget(Block::default().style(bg_style), area);

    // Layout: title (1 row) | document | status row (1 row)
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    render_title(frame, app, chunks[0]);
    document_view::render_document_view(frame, app, chunks[1]);

    // Capture overlay (rendered on top of the document)
    if app.capture.is_some() {
        capture_overlay::render_capture_overlay(frame, app, area);
    }

    status_row::render_status_row(frame, app, chunks[2]);
}

fn render_title(frame: &mut Frame, app: &App, area: ratatui::layout::Rect) {
    let bg = app.theme.background;
    let name = " today ";
    let path = app.store.path().display().to_string();
    let room = (area.width as usize).saturating_sub(name.len() + 1);
    let line = Line::from(vec![
        Span::styled(
            name,
            Style::default()
                .fg(app.theme.highlight)
                .bg(bg)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(" ", Style::default().bg(bg)),
        Span::styled(
            truncate_to_width(&path, room),
            Style::default().fg(app.theme.dim).bg(bg),
        ),
    ]);
    frame.render_widget(Paragraph::new(line).style(Style::default().bg(bg)), area);
}

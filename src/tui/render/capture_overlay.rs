use ratatui::Frame;
use ratatui::layout::{Position, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::tui::app::App;
use crate::util::unicode::{display_width, next_grapheme_boundary, truncate_to_width};

/// Render the floating quick-capture input
pub fn render_capture_overlay(frame: &mut Frame, app: &App, area: Rect) {
    let Some(capture) = &app.capture else {
        return;
    };

    let popup_w: u16 = 60.min(area.width.saturating_sub(4));
    let popup_h: u16 = 3.min(area.height);
    // a third of the way down, but never past the bottom edge
    let top = (area.height / 3).min(area.height - popup_h);
    let overlay_area = Rect::new(
        area.x + area.width.saturating_sub(popup_w) / 2,
        area.y + top,
        popup_w,
        popup_h,
    );
    let inner_w = popup_w.saturating_sub(2) as usize;

    // Scroll horizontally so the cursor stays inside the box
    let mut start = 0;
    while inner_w > 0 && display_width(&capture.input[start..capture.cursor]) >= inner_w {
        match next_grapheme_boundary(&capture.input, start) {
            Some(next) => start = next,
            None => break,
        }
    }
    let visible = truncate_to_width(&capture.input[start..], inner_w);
    let cursor_col = display_width(&capture.input[start..capture.cursor]) as u16;

    let bg = app.theme.background;
    let highlight = app.theme.highlight;
    let title = format!(" Add to {} ", app.config.ui.capture_section);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            title,
            Style::default()
                .fg(highlight)
                .bg(bg)
                .add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(highlight).bg(bg))
        .style(Style::default().bg(bg));

    let paragraph = Paragraph::new(Line::from(Span::styled(
        visible,
        Style::default().fg(app.theme.text_bright).bg(bg),
    )))
    .block(block);

    frame.render_widget(Clear, overlay_area);
    frame.render_widget(paragraph, overlay_area);
    if inner_w > 0 && popup_h >= 3 {
        frame.set_cursor_position(Position::new(
            overlay_area.x + 1 + cursor_col,
            overlay_area.y + 1,
        ));
    }
}

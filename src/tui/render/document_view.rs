use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::tui::app::App;
use crate::util::unicode::truncate_to_width;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowKind {
    Text,
    Heading,
    Task { done: bool, selected: bool },
    /// Indented line belonging to a task
    Continuation { selected: bool },
}

/// Flatten the document into display rows. Also returns the row of the
/// selected task's first line.
fn document_rows(app: &App) -> (Vec<(&str, RowKind)>, Option<usize>) {
    let selected = app.selected();
    let mut rows: Vec<(&str, RowKind)> = Vec::new();
    let mut selected_row = None;

    for line in &app.document.preamble {
        rows.push((line.as_str(), RowKind::Text));
    }
    for (s_idx, section) in app.document.sections.iter().enumerate() {
        rows.push((section.heading.as_str(), RowKind::Heading));
        let tasks = app.document.tasks(s_idx);
        let mut kinds = vec![RowKind::Text; section.body.len()];
        for (t_idx, task) in tasks.iter().enumerate() {
            let is_selected = selected.is_some_and(|r| r.section == s_idx && r.index == t_idx);
            kinds[task.line] = RowKind::Task {
                done: task.done,
                selected: is_selected,
            };
            for kind in &mut kinds[task.line + 1..task.line + task.span] {
                *kind = RowKind::Continuation {
                    selected: is_selected,
                };
            }
            if is_selected {
                selected_row = Some(rows.len() + task.line);
            }
        }
        rows.extend(section.body.iter().map(String::as_str).zip(kinds));
    }

    // The final empty line after a trailing newline is not a row
    if rows.len() > 1 && rows.last().is_some_and(|(l, _)| l.is_empty()) {
        rows.pop();
    }
    (rows, selected_row)
}

/// Render the task document with the selected task highlighted
pub fn render_document_view(frame: &mut Frame, app: &mut App, area: Rect) {
    let height = area.height as usize;
    let width = area.width as usize;
    let (rows, selected_row) = document_rows(app);

    // Keep the selected task visible
    let mut scroll = app.scroll_offset.min(rows.len().saturating_sub(1));
    if let Some(row) = selected_row {
        if row < scroll {
            scroll = row;
        } else if height > 0 && row >= scroll + height {
            scroll = row + 1 - height;
        }
    }

    let theme = &app.theme;
    let bg = theme.background;
    let lines: Vec<Line> = rows
        .iter()
        .skip(scroll)
        .take(height)
        .map(|(text, kind)| {
            let text = truncate_to_width(&text.replace('\r', ""), width.saturating_sub(1));
            let (style, selected) = match *kind {
                RowKind::Text => (Style::default().fg(theme.text).bg(bg), false),
                RowKind::Heading => (
                    Style::default()
                        .fg(theme.heading)
                        .bg(bg)
                        .add_modifier(Modifier::BOLD),
                    false,
                ),
                RowKind::Task { done, selected } => {
                    let fg = if done { theme.done } else { theme.text_bright };
                    (Style::default().fg(fg).bg(bg), selected)
                }
                RowKind::Continuation { selected } => {
                    (Style::default().fg(theme.dim).bg(bg), selected)
                }
            };
            if selected {
                let style = style.bg(theme.selection_bg);
                Line::from(vec![
                    Span::styled("\u{258C}", Style::default().fg(theme.highlight).bg(theme.selection_bg)),
                    Span::styled(text, style),
                ])
                .style(Style::default().bg(theme.selection_bg))
            } else {
                Line::from(vec![Span::styled(" ", style), Span::styled(text, style)])
            }
        })
        .collect();

    let paragraph = Paragraph::new(lines).style(Style::default().bg(bg));
    frame.render_widget(paragraph, area);
    app.scroll_offset = scroll;
}

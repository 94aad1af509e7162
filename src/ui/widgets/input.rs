// src/ui/widgets/input.rs
use ratatui::{prelude::*, widgets::{Block, Borders, Paragraph}};
use crate::app::{App, AppState};

/// Renders the input box. A pending error replaces the title.
pub fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let input_block = match &app.error {
        Some(error) => Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(Span::styled(format!("Error: {error}"), Style::default().fg(Color::Red).bold())),
        None => Block::default().borders(Borders::ALL).title("Target [ports]  e.g. example.com 22,80-443"),
    };
    let input_paragraph = Paragraph::new(app.input.as_str())
        .block(input_block)
        .style(Style::default().fg(Color::Yellow));
    frame.render_widget(input_paragraph, area);

    // Show the cursor only while typing.
    if app.state == AppState::Idle && !app.show_disclaimer {
        frame.set_cursor_position(Position::new(
            area.x + app.input.chars().count() as u16 + 1,
            area.y + 1,
        ));
    }
}

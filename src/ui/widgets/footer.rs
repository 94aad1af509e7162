// src/ui/widgets/footer.rs

use crate::app::{App, AppState};
use ratatui::{
    prelude::*,
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::Paragraph,
};

fn key(label: &'static str) -> Span<'static> {
    Span::styled(label, Style::new().bold().fg(Color::Yellow))
}

/// Renders the footer widget, which displays available actions.
pub fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let spans = match app.state {
        AppState::Idle => Line::from(vec![
            Span::raw("Press "),
            key("Enter"),
            Span::raw(" to scan, "),
            key("Q"),
            Span::raw(" on an empty line to quit."),
        ]),
        AppState::Finished => Line::from(vec![
            key("[N]"),
            Span::raw("ew Scan, "),
            key("↑ ↓"),
            Span::raw(" Scroll, "),
            key("[Q]"),
            Span::raw("uit"),
        ]),
        AppState::Scanning if app.is_cancelling() => Line::from("Cancelling... collecting finished probes."),
        AppState::Scanning => Line::from(vec![
            Span::raw("Scanning... "),
            key("Esc"),
            Span::raw(" to stop and keep partial results, "),
            key("Q"),
            Span::raw(" to quit."),
        ]),
    };

    let footer = Paragraph::new(spans).alignment(Alignment::Center);
    frame.render_widget(footer, area);
}

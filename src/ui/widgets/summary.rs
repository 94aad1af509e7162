// src/ui/widgets/summary.rs

use crate::app::{App, AppState};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
    text::Line,
};

fn count(label: &'static str, value: usize, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::raw(format!("{label}: ")),
        Span::styled(value.to_string(), Style::default().fg(color)),
    ])
}

/// Renders the summary pane: counts of what the finished scan found.
pub fn render_summary(frame: &mut Frame, app: &App, area: Rect) {
    let summary_container = Block::default().borders(Borders::ALL).title("Summary");
    frame.render_widget(summary_container, area);

    let summary_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(2), // Target
            Constraint::Length(1), // Spacer
            Constraint::Length(4), // Ports
            Constraint::Length(1), // Spacer
            Constraint::Min(0),    // Subdomains
        ])
        .split(area);

    if app.state != AppState::Finished {
        return;
    }
    let Some(report) = &app.scan_report else { return };
    let summary = &app.summary;

    let elapsed = (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0;
    let target_text = Text::from(vec![
        Line::from(Span::styled(report.target.clone(), Style::default().bold())),
        Line::from(format!("{elapsed:.1}s{}", if report.cancelled { " (cancelled)" } else { "" })),
    ]);
    frame.render_widget(Paragraph::new(target_text).alignment(Alignment::Center), summary_chunks[0]);

    let ports_block = Block::default().title("PORTS".bold());
    let ports_lines = vec![
        count("Open", summary.open_ports, Color::Green),
        count("Identified", summary.fingerprinted, Color::Cyan),
        count("Probe errors", summary.probes_failed, Color::Red),
    ];
    frame.render_widget(Paragraph::new(ports_lines).block(ports_block), summary_chunks[2]);

    let subdomain_block = Block::default().title("SUBDOMAINS".bold());
    let subdomain_lines = if report.subdomains.is_some() {
        vec![
            count("Total", summary.subdomains, Color::Green),
            count("Zone transfer", summary.from_zone_transfer, Color::Red),
            count("CT logs", summary.from_cert_transparency, Color::Cyan),
            count("Brute force", summary.from_brute_force, Color::Cyan),
            count("Not resolving", summary.not_resolving, Color::DarkGray),
        ]
    } else {
        vec![Line::from("Not scanned (IP target).")]
    };
    frame.render_widget(Paragraph::new(subdomain_lines).block(subdomain_block), summary_chunks[4]);
}

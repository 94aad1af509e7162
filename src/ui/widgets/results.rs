// src/ui/widgets/results.rs

use crate::app::{App, AppState, SPINNER_CHARS};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, Wrap},
};
use vanguard_recon::core::models::{DnsRecordKind, PortScanReport, ScanReport, SubdomainRecord, SubdomainReport};

/// Renders the main report pane based on the application state.
pub fn render_results(frame: &mut Frame, app: &mut App, area: Rect) {
    let results_block = Block::default()
        .borders(Borders::ALL)
        .title("Scan Results (Navigate with ↑ ↓)");

    let report = match (app.state, &app.scan_report) {
        (AppState::Finished, Some(report)) => report,
        (AppState::Scanning, _) => {
            let message = if app.is_cancelling() { "Stopping scan..." } else { "Scanning... Please wait." };
            let content = Paragraph::new(Line::from(vec![
                Span::styled(format!("{} ", SPINNER_CHARS[app.spinner_frame]), Style::default().fg(Color::Cyan)),
                Span::raw(message),
            ]))
            .alignment(Alignment::Center)
            .block(results_block);
            frame.render_widget(content, area);
            return;
        }
        _ => {
            let instructions = Paragraph::new(
                "Enter a host, IP or URL, optionally followed by ports (22,80,8000-8100), and press Enter.",
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(results_block);
            frame.render_widget(instructions, area);
            return;
        }
    };

    let lines = build_report_lines(report);
    let max_offset = lines.len().saturating_sub(1);
    if app.scroll_offset > max_offset {
        app.scroll_offset = max_offset;
    }
    app.report_scroll_state = app.report_scroll_state.content_length(lines.len()).position(app.scroll_offset);

    let paragraph = Paragraph::new(lines)
        .block(results_block)
        .scroll((u16::try_from(app.scroll_offset).unwrap_or(u16::MAX), 0));
    frame.render_widget(paragraph, area);

    let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight);
    frame.render_stateful_widget(
        scrollbar,
        area.inner(Margin { vertical: 1, horizontal: 0 }),
        &mut app.report_scroll_state,
    );
}

fn heading(text: String) -> Line<'static> {
    Line::from(Span::styled(text, Style::default().bold().underlined()))
}

fn build_report_lines(report: &ScanReport) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if report.cancelled {
        lines.push(Line::from(Span::styled(
            "Scan cancelled: showing partial results.",
            Style::default().fg(Color::Yellow).bold(),
        )));
        lines.push(Line::from(""));
    }

    match &report.ports {
        Ok(ports) => port_lines(ports, &mut lines),
        Err(e) => {
            lines.push(heading(format!("Port Scan: {}", report.target)));
            lines.push(Line::from(Span::styled(format!("  Scan failed: {e}"), Style::default().fg(Color::Red))));
        }
    }

    if let Some(subdomains) = &report.subdomains {
        lines.push(Line::from(""));
        subdomain_lines(subdomains, &mut lines);
    }
    lines
}

fn port_lines(report: &PortScanReport, lines: &mut Vec<Line<'static>>) {
    lines.push(heading(format!("Port Scan: {} ({})", report.target, report.ip)));
    if report.open_ports.is_empty() {
        lines.push(Line::from(Span::styled("  No open ports found.", Style::default().fg(Color::DarkGray))));
    }
    for open in &report.open_ports {
        lines.push(Line::from(vec![
            Span::styled(format!("  {:>5}/tcp ", open.port), Style::default().fg(Color::Green)),
            Span::styled(open.service_name.clone(), Style::default().fg(Color::Cyan)),
        ]));
        if let Some(banner) = &open.banner {
            let first_line = banner.lines().next().unwrap_or_default().to_string();
            lines.push(Line::from(Span::styled(format!("            {first_line}"), Style::default().fg(Color::DarkGray))));
        }
    }

    if !report.fingerprints.is_empty() {
        lines.push(Line::from(""));
        lines.push(heading("Service Fingerprints".to_string()));
        for fingerprint in &report.fingerprints {
            lines.push(Line::from(vec![
                Span::raw(format!("  {:>5}  ", fingerprint.port)),
                Span::styled(fingerprint.service.clone(), Style::default().fg(Color::Cyan)),
                Span::raw("  "),
                Span::styled(fingerprint.version.clone(), Style::default().fg(Color::Yellow)),
            ]));
        }
    }
}

fn subdomain_lines(report: &SubdomainReport, lines: &mut Vec<Line<'static>>) {
    lines.push(heading(format!("Subdomains of {} ({} found)", report.domain, report.total_found)));
    let sections: [(&str, &[SubdomainRecord]); 3] = [
        ("Zone Transfer", report.zone_transfer.as_slice()),
        ("Certificate Transparency", report.cert_transparency.as_slice()),
        ("Brute Force", report.brute_force.as_slice()),
    ];
    for (title, records) in sections {
        lines.push(Line::from(Span::styled(format!("  {title} ({})", records.len()), Style::default().bold())));
        for record in records {
            lines.push(subdomain_line(record));
        }
    }
}

fn subdomain_line(record: &SubdomainRecord) -> Line<'static> {
    let status = if !record.resolving {
        Span::styled("not resolving", Style::default().fg(Color::DarkGray))
    } else {
        let arrow = match record.record_type {
            DnsRecordKind::A => "",
            DnsRecordKind::Cname => "CNAME ",
        };
        Span::raw(format!("{arrow}{}", record.resolved_ips.join(", ")))
    };
    let mut spans = vec![
        Span::styled(format!("    {} ", record.name), Style::default().fg(Color::Green)),
        status,
    ];
    if !record.nameservers.is_empty() {
        spans.push(Span::styled(
            format!("  via {}", record.nameservers.join(", ")),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

// src/app.rs

use ratatui::widgets::ScrollbarState;
use vanguard_recon::config::AppConfig;
use vanguard_recon::core::dispatcher::{CancelHandle, CancelToken, cancel_pair};
use vanguard_recon::core::errors::ConfigError;
use vanguard_recon::core::models::ScanReport;
use vanguard_recon::core::scanner::ScanRequest;

pub const SPINNER_CHARS: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Idle,
    Scanning,
    Finished,
}

/// Counts shown in the summary pane.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub open_ports: usize,
    pub fingerprinted: usize,
    pub probes_failed: usize,
    pub subdomains: usize,
    pub from_zone_transfer: usize,
    pub from_cert_transparency: usize,
    pub from_brute_force: usize,
    pub not_resolving: usize,
}

impl ScanSummary {
    pub fn from_report(report: &ScanReport) -> Self {
        let mut summary = Self::default();
        if let Ok(ports) = &report.ports {
            summary.open_ports = ports.open_ports.len();
            summary.fingerprinted = ports.fingerprints.iter().filter(|fp| fp.service != "unknown").count();
            summary.probes_failed = ports.stats.failed + ports.stats.timed_out;
        }
        if let Some(subdomains) = &report.subdomains {
            summary.subdomains = subdomains.total_found;
            summary.from_zone_transfer = subdomains.zone_transfer.len();
            summary.from_cert_transparency = subdomains.cert_transparency.len();
            summary.from_brute_force = subdomains.brute_force.len();
            summary.not_resolving = subdomains.all().filter(|r| !r.resolving).count();
        }
        summary
    }
}

pub struct App {
    pub should_quit: bool,
    pub show_disclaimer: bool,
    pub state: AppState,
    pub input: String,
    /// Last configuration or input error, shown in the input box.
    pub error: Option<String>,
    pub config: AppConfig,
    /// Why `config.json` could not be loaded. Scans stay blocked while set.
    config_error: Option<ConfigError>,
    pub scan_report: Option<ScanReport>,
    pub summary: ScanSummary,
    pub scroll_offset: usize,
    pub report_scroll_state: ScrollbarState,
    pub spinner_frame: usize,
    /// Set while a scan runs and until it is cancelled.
    cancel: Option<CancelHandle>,
}

impl App {
    pub fn new(config: Result<AppConfig, ConfigError>) -> Self {
        let (config, config_error) = match config {
            Ok(config) => (config, None),
            Err(e) => (AppConfig::default(), Some(e)),
        };
        let error = config_error.as_ref().map(ToString::to_string);
        Self {
            should_quit: false,
            show_disclaimer: true,
            state: AppState::Idle,
            input: String::new(),
            error,
            config,
            config_error,
            scan_report: None,
            summary: ScanSummary::default(),
            scroll_offset: 0,
            report_scroll_state: ScrollbarState::default(),
            spinner_frame: 0,
            cancel: None,
        }
    }

    /// Validates the input and switches to `Scanning`.
    ///
    /// Returns the parsed request and the token the scan must observe, or
    /// `None` when the input or the configuration is invalid.
    pub fn start_scan(&mut self) -> Option<(ScanRequest, CancelToken)> {
        if let Some(e) = &self.config_error {
            self.error = Some(e.to_string());
            return None;
        }
        if self.input.trim().is_empty() {
            return None;
        }
        let request = self
            .config
            .validate()
            .and_then(|_| ScanRequest::parse(&self.input, &self.config.ports.default_ports));
        match request {
            Ok(request) => {
                let (handle, token) = cancel_pair();
                self.cancel = Some(handle);
                self.error = None;
                self.state = AppState::Scanning;
                Some((request, token))
            }
            Err(e) => {
                self.error = Some(e.to_string());
                None
            }
        }
    }

    /// Stops the running scan. Its partial report still arrives.
    pub fn cancel_scan(&mut self) {
        if let Some(handle) = self.cancel.take() {
            handle.cancel();
        }
    }

    pub fn finish_scan(&mut self, report: ScanReport) {
        self.summary = ScanSummary::from_report(&report);
        self.scan_report = Some(report);
        self.cancel = None;
        self.state = AppState::Finished;
        self.scroll_offset = 0;
        self.report_scroll_state = ScrollbarState::default();
    }

    pub fn is_cancelling(&self) -> bool {
        self.state == AppState::Scanning && self.cancel.is_none()
    }

    pub fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(1);
        self.report_scroll_state = self.report_scroll_state.position(self.scroll_offset);
    }

    pub fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(1);
        self.report_scroll_state = self.report_scroll_state.position(self.scroll_offset);
    }

    pub fn on_tick(&mut self) {
        if self.state == AppState::Scanning {
            self.spinner_frame = (self.spinner_frame + 1) % SPINNER_CHARS.len();
        }
    }

    pub fn quit(&mut self) {
        self.cancel_scan();
        self.should_quit = true;
    }

    pub fn reset(&mut self) {
        self.state = AppState::Idle;
        self.input = String::new();
        self.error = self.config_error.as_ref().map(ToString::to_string);
        self.scan_report = None;
        self.summary = ScanSummary::default();
        self.scroll_offset = 0;
        self.report_scroll_state = ScrollbarState::default();
        self.spinner_frame = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn invalid_port_spec_keeps_app_idle() {
        let mut app = App::new(Ok(AppConfig::default()));
        app.input = "example.com 80-22".to_string();
        assert!(app.start_scan().is_none());
        assert_eq!(app.state, AppState::Idle);
        assert!(app.error.as_deref().is_some_and(|e| e.contains("inverted")));
    }

    #[test]
    fn config_load_error_blocks_scans() {
        let load_error = ConfigError::Load { path: "config.json".into(), reason: "expected value at line 1".into() };
        let mut app = App::new(Err(load_error.clone()));
        assert_eq!(app.error, Some(load_error.to_string()));

        app.input = "example.com".to_string();
        assert!(app.start_scan().is_none());
        assert_eq!(app.state, AppState::Idle);
        assert_eq!(app.error, Some(load_error.to_string()));

        app.reset();
        assert_eq!(app.error, Some(load_error.to_string()));
    }

    #[test]
    fn invalid_settings_block_scans() {
        let mut app = App::new(Ok(AppConfig::default()));
        app.config.ports.concurrency = 0;
        app.input = "example.com".to_string();
        assert!(app.start_scan().is_none());
        assert!(app.error.is_some());
    }

    #[test]
    fn cancel_then_finish() {
        let mut app = App::new(Ok(AppConfig::default()));
        app.input = "192.0.2.1 22".to_string();
        let (request, token) = app.start_scan().unwrap();
        assert_eq!(request.ports, vec![22]);
        assert_eq!(app.state, AppState::Scanning);

        app.cancel_scan();
        assert!(token.is_cancelled());
        assert!(app.is_cancelling());

        app.finish_scan(ScanReport {
            target: request.target,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            ports: Err("cancelled".to_string()),
            subdomains: None,
            cancelled: true,
        });
        assert_eq!(app.state, AppState::Finished);
        assert_eq!(app.summary, ScanSummary::default());
    }
}

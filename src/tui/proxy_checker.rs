//! TUI for the proxy checker: sortable result table with run controls

use crate::proxy::{
    save_addresses, HttpProbe, ProbeStatus, ProxyRecord, RunConfig, RunController, RunHandle,
    RunState, SortColumn, SortDirective, Tally,
};
use crate::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io;
use std::path::PathBuf;
use tokio::time::Duration;
use tracing::{error, info};

const HELP: &str = "s start | x stop | 1-4 sort | y proxy URL | g/b save good/bad | q quit";

/// Which partition a save key writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Partition {
    Reachable,
    Unreachable,
}

/// Proxy checker TUI application state
pub struct ProxyCheckerApp {
    controller: RunController<HttpProbe>,
    /// Configuration captured for every run started from this screen
    config: RunConfig,
    /// Output file for good proxies
    good_output: Option<PathBuf>,
    /// Output file for bad proxies
    bad_output: Option<PathBuf>,
    /// Active run, if any
    handle: Option<RunHandle>,
    /// Rows in display order as of the last refresh
    rows: Vec<ProxyRecord>,
    directive: SortDirective,
    tally: Tally,
    state: RunState,
    table_state: TableState,
    /// Status message
    status_message: String,
    /// Whether the user wants to quit
    should_quit: bool,
}

impl ProxyCheckerApp {
    /// Create a new proxy checker TUI application over an already loaded controller
    pub fn new(
        controller: RunController<HttpProbe>,
        config: RunConfig,
        good_output: Option<PathBuf>,
        bad_output: Option<PathBuf>,
    ) -> Self {
        let mut table_state = TableState::default();
        table_state.select(Some(0));

        Self {
            controller,
            config,
            good_output,
            bad_output,
            handle: None,
            rows: Vec::new(),
            directive: SortDirective::default(),
            tally: Tally::default(),
            state: RunState::Idle,
            table_state,
            status_message: format!("Ready. {}", HELP),
            should_quit: false,
        }
    }

    /// Run the TUI application
    pub async fn run(&mut self) -> Result<()> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.run_app(&mut terminal).await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    async fn run_app<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        loop {
            self.settle_finished_run().await;
            self.refresh().await;

            terminal.draw(|f| self.ui(f))?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_input(key.code).await;
                        if self.should_quit {
                            break;
                        }
                    }
                }
            }
        }

        // Let admitted probes finish so their connections are released
        if let Some(handle) = self.handle.take() {
            self.status_message = "Stopping... waiting for in-flight probes".to_string();
            terminal.draw(|f| self.ui(f))?;
            handle.stop();
            if let Err(e) = handle.wait().await {
                error!(error = %e, "run ended abnormally");
            }
        }

        Ok(())
    }

    async fn refresh(&mut self) {
        let aggregator = self.controller.aggregator();
        self.rows = aggregator.rows().await;
        self.directive = aggregator.read(|store| store.directive()).await;
        self.tally = aggregator.tally().await;
        self.state = self.controller.state().await;

        if self.rows.is_empty() {
            self.table_state.select(None);
        } else if self.table_state.selected().is_none() {
            self.table_state.select(Some(0));
        }
    }

    async fn settle_finished_run(&mut self) {
        if !self.handle.as_ref().is_some_and(RunHandle::is_finished) {
            return;
        }
        let Some(handle) = self.handle.take() else {
            return;
        };

        self.status_message = match handle.wait().await {
            Ok(report) => format!(
                "{}! Checked: {} | Good: {} | Bad: {} | Pending: {} | {}ms",
                report.state,
                report.reachable + report.unreachable,
                report.reachable,
                report.unreachable,
                report.pending,
                report.elapsed_ms
            ),
            Err(e) => format!("Run failed: {}", e),
        };
    }

    async fn handle_input(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char('s') => self.start_run().await,
            KeyCode::Char('x') => {
                self.status_message = if self.controller.stop().await {
                    "Stop requested, waiting for in-flight probes...".to_string()
                } else {
                    "No run in progress".to_string()
                };
            }
            KeyCode::Char(c @ '1'..='4') => {
                let column = SortColumn::ALL[(c as u8 - b'1') as usize];
                let directive = self.controller.aggregator().toggle_sort(column).await;
                self.status_message = format!(
                    "Sorted by {} ({})",
                    directive.column,
                    if directive.ascending { "ascending" } else { "descending" }
                );
            }
            KeyCode::Char('y') => {
                if let Some(record) = self.table_state.selected().and_then(|i| self.rows.get(i)) {
                    self.status_message = format!("Proxy URL: {}", record.proxy_url());
                }
            }
            KeyCode::Char('g') => self.save(Partition::Reachable).await,
            KeyCode::Char('b') => self.save(Partition::Unreachable).await,
            KeyCode::Down => {
                let i = match self.table_state.selected() {
                    Some(i) if i + 1 < self.rows.len() => i + 1,
                    _ => 0,
                };
                self.table_state.select(Some(i));
            }
            KeyCode::Up => {
                let i = match self.table_state.selected() {
                    Some(0) | None => self.rows.len().saturating_sub(1),
                    Some(i) => i - 1,
                };
                self.table_state.select(Some(i));
            }
            _ => {}
        }
    }

    async fn start_run(&mut self) {
        match self.controller.start(self.config.clone()).await {
            Ok(handle) => {
                info!(run_id = %handle.run_id(), "run started from TUI");
                self.handle = Some(handle);
                self.status_message = format!(
                    "Checking with {} threads, timeout {}s...",
                    self.config.max_concurrent,
                    self.config.timeout.as_secs()
                );
            }
            Err(e) => self.status_message = format!("Cannot start: {}", e),
        }
    }

    async fn save(&mut self, partition: Partition) {
        let (path, label) = match partition {
            Partition::Reachable => (self.good_output.clone(), "good"),
            Partition::Unreachable => (self.bad_output.clone(), "bad"),
        };
        let Some(path) = path else {
            self.status_message = format!("No output file for {} proxies (see --{})", label, label);
            return;
        };

        let exports = match self.controller.exports().await {
            Ok(exports) => exports,
            Err(e) => {
                self.status_message = format!("Cannot save yet: {}", e);
                return;
            }
        };
        let addresses = match partition {
            Partition::Reachable => exports.reachable_addresses(),
            Partition::Unreachable => exports.unreachable_addresses(),
        };

        self.status_message = match save_addresses(&addresses, &path) {
            Ok(()) => format!("Saved {} {} proxies to {:?}", addresses.len(), label, path),
            Err(e) => {
                error!(error = %e, "export failed");
                format!("Save failed: {:#}", e)
            }
        };
    }

    fn ui(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Title
                Constraint::Length(3), // Progress bar
                Constraint::Min(0),    // Result table
                Constraint::Length(3), // Status bar
            ])
            .split(f.size());

        let title = Paragraph::new(format!(
            "Proxy Checker | {} | {} threads | {}s timeout | {}",
            self.config.scheme,
            self.config.max_concurrent,
            self.config.timeout.as_secs(),
            self.state
        ))
        .style(Style::default().fg(Color::Cyan))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
        f.render_widget(title, chunks[0]);

        let checked = self.tally.checked();
        let progress = if self.tally.total > 0 {
            (checked as f64 / self.tally.total as f64 * 100.0) as u16
        } else {
            0
        };
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Progress"))
            .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
            .percent(progress)
            .label(format!(
                "{}/{} ({}%) | Good: {} | Bad: {}",
                checked, self.tally.total, progress, self.tally.reachable, self.tally.unreachable
            ));
        f.render_widget(gauge, chunks[1]);

        let header = Row::new(SortColumn::ALL.iter().enumerate().map(|(i, column)| {
            let marker = match self.directive {
                SortDirective { column: c, ascending: true } if c == *column => " ▲",
                SortDirective { column: c, ascending: false } if c == *column => " ▼",
                _ => "",
            };
            Cell::from(format!("[{}] {}{}", i + 1, column.title(), marker))
        }))
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));

        let rows = self.rows.iter().map(|record| {
            let color = match record.status {
                ProbeStatus::Success => Color::Green,
                ProbeStatus::Failed | ProbeStatus::InvalidAddress => Color::Red,
                ProbeStatus::Pending => Color::Yellow,
            };
            Row::new(vec![
                Cell::from(record.scheme.label()),
                Cell::from(record.address.clone()),
                Cell::from(record.latency_display()),
                Cell::from(record.status.label()).style(Style::default().fg(color)),
            ])
        });

        let widths = [
            Constraint::Length(16),
            Constraint::Min(24),
            Constraint::Length(14),
            Constraint::Length(18),
        ];
        let table = Table::new(rows)
            .header(header)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Proxies ({})", self.rows.len())),
            )
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol(">> ")
            .widths(&widths);
        f.render_stateful_widget(table, chunks[2], &mut self.table_state);

        let status = Paragraph::new(self.status_message.clone())
            .style(match self.state {
                RunState::Running => Style::default().fg(Color::Yellow),
                _ => Style::default().fg(Color::Green),
            })
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Status"));
        f.render_widget(status, chunks[3]);
    }
}

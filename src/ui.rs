use anyhow::Result;
use chrono::Utc;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use networth_tracker::{DashboardSummary, FinancialSource, Period, TimeRange};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Sparkline, Table, TableState},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overview,
    Sources,
    History,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Overview => Page::Sources,
            Page::Sources => Page::History,
            Page::History => Page::Overview,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Overview => Page::History,
            Page::Sources => Page::Overview,
            Page::History => Page::Sources,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Overview => "Overview",
            Page::Sources => "Sources",
            Page::History => "History",
        }
    }
}

pub struct App {
    pub sources: Vec<FinancialSource>,
    pub summary: DashboardSummary,
    pub period: Period,
    pub range: TimeRange,
    pub current_page: Page,
    pub sources_state: TableState,
    pub history_state: TableState,
    pub show_detail: bool,
}

impl App {
    pub fn new(sources: Vec<FinancialSource>, period: Period, range: TimeRange) -> Self {
        let summary = DashboardSummary::build(&sources, period, range, Utc::now());

        let mut sources_state = TableState::default();
        if !sources.is_empty() {
            sources_state.select(Some(0));
        }

        Self {
            sources,
            summary,
            period,
            range,
            current_page: Page::Overview,
            sources_state,
            history_state: TableState::default(),
            show_detail: false,
        }
    }

    /// Rebuild every derived number from the sources
    pub fn recompute(&mut self) {
        self.summary = DashboardSummary::build(&self.sources, self.period, self.range, Utc::now());
        self.history_state.select(None);
    }

    pub fn cycle_period(&mut self) {
        self.period = self.period.next();
        self.recompute();
    }

    pub fn cycle_range(&mut self) {
        self.range = self.range.next();
        self.recompute();
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    pub fn selected_source(&self) -> Option<&FinancialSource> {
        self.sources_state.selected().and_then(|i| self.sources.get(i))
    }

    fn active_table(&mut self) -> (&mut TableState, usize) {
        match self.current_page {
            Page::History => (&mut self.history_state, self.summary.history.len()),
            _ => (&mut self.sources_state, self.sources.len()),
        }
    }

    pub fn next(&mut self) {
        let (state, len) = self.active_table();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let (state, len) = self.active_table();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        state.select(Some(i));
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        log::error!("UI error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::Char('p') => app.cycle_period(),
                KeyCode::Char('r') => app.cycle_range(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Overview => render_overview(f, chunks[1], app),
        Page::Sources if app.show_detail => {
            let content_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(chunks[1]);
            render_sources(f, content_chunks[0], app);
            render_source_detail(f, content_chunks[1], app);
        }
        Page::Sources => render_sources(f, chunks[1], app),
        Page::History => render_history(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn change_color(positive: bool) -> Color {
    if positive {
        Color::Green
    } else {
        Color::Red
    }
}

fn header_cells(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    Row::new(cells).style(Style::default().bg(Color::DarkGray)).height(1)
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in [Page::Overview, Page::Sources, Page::History].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Net worth: {:.2}", app.summary.net_worth),
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("period {} · range {}", app.period, app.range),
        Style::default().fg(Color::Cyan),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_overview(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);

    let summary = &app.summary;
    let color = change_color(summary.change.is_positive);
    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);

    let content = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  Net worth: ", label),
            Span::styled(
                format!("{:.2}", summary.net_worth),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Change: ", label),
            Span::styled(
                format!(
                    "{}{:.2} ({:+.2}%)",
                    if summary.change.is_positive { "+" } else { "" },
                    summary.change.amount,
                    summary.change.percentage * 100.0
                ),
                Style::default().fg(color),
            ),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Growth rate: ", label),
            Span::styled(
                format!("{:+.2}% / yr", summary.growth_rate * 100.0),
                Style::default().fg(change_color(summary.growth_rate >= 0.0)),
            ),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Sources: ", label),
            Span::raw(format!(
                "{} active / {} total",
                summary.active_sources, summary.total_sources
            )),
        ]),
    ];

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Summary "),
    );
    f.render_widget(paragraph, chunks[0]);

    let rows = summary.distribution_by_type.iter().map(|a| {
        Row::new(vec![
            Cell::from(a.label.clone()),
            Cell::from(format!("{:.2}", a.balance)),
            Cell::from(format!("{:.1}%", a.share * 100.0)),
        ])
    });

    let table = Table::new(
        rows,
        [Constraint::Length(22), Constraint::Length(16), Constraint::Length(8)],
    )
    .header(header_cells(&["Type", "Balance", "Share"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Distribution "),
    );
    f.render_widget(table, chunks[1]);
}

fn render_sources(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = app.sources.iter().map(|s| {
        let balance = s.current_balance();
        let style = if s.is_active {
            Style::default()
        } else {
            Style::default().fg(Color::DarkGray)
        };

        Row::new(vec![
            Cell::from(truncate(&s.name, 26)),
            Cell::from(s.source_type.label()),
            Cell::from(format!("{:.2}", balance)).style(Style::default().fg(change_color(balance >= 0.0))),
            Cell::from(if s.is_active { "yes" } else { "no" }),
            Cell::from(
                s.last_updated()
                    .map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ])
        .style(style)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(28),
            Constraint::Length(20),
            Constraint::Length(16),
            Constraint::Length(8),
            Constraint::Length(12),
        ],
    )
    .header(header_cells(&["Name", "Type", "Balance", "Active", "Updated"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Financial Sources "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.sources_state);
}

fn render_source_detail(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Source Details ");

    let Some(source) = app.selected_source() else {
        f.render_widget(Paragraph::new("No source selected").block(block), area);
        return;
    };

    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let mut content = vec![
        Line::from(""),
        Line::from(vec![Span::styled("  Name: ", label), Span::raw(source.name.clone())]),
        Line::from(vec![Span::styled("  Type: ", label), Span::raw(source.source_type.label())]),
        Line::from(vec![
            Span::styled("  Institution: ", label),
            Span::raw(source.institution.clone().unwrap_or_else(|| "-".to_string())),
        ]),
        Line::from(vec![
            Span::styled("  Change since first update: ", label),
            Span::styled(
                format!("{:.2}", source.balance_change()),
                Style::default().fg(change_color(source.balance_change() >= 0.0)),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "  RECENT UPDATES",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )),
        Line::from(""),
    ];

    for update in source.updates.iter().rev().take(10) {
        content.push(Line::from(vec![
            Span::raw(format!("  {}  ", update.created_at.format("%Y-%m-%d"))),
            Span::styled(format!("{:>14.2}", update.balance), Style::default().fg(Color::White)),
            Span::styled(
                format!("  {}", update.notes.clone().unwrap_or_default()),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            ),
        ]));
    }

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn render_history(f: &mut Frame, area: Rect, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(0)])
        .split(area);

    let data = sparkline_data(&app.summary.history.iter().map(|s| s.total).collect::<Vec<_>>());
    let sparkline = Sparkline::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Net worth, last {} ", app.period)),
        )
        .data(&data)
        .style(Style::default().fg(Color::Green));
    f.render_widget(sparkline, chunks[0]);

    let rows = app.summary.history.iter().map(|sample| {
        let names: Vec<&str> = sample.sources.iter().map(|c| c.name.as_str()).collect();
        Row::new(vec![
            Cell::from(sample.date.format("%Y-%m-%d").to_string()),
            Cell::from(format!("{:.2}", sample.total)),
            Cell::from(truncate(&names.join(", "), 60)),
        ])
    });

    let table = Table::new(
        rows,
        [Constraint::Length(12), Constraint::Length(16), Constraint::Min(20)],
    )
    .header(header_cells(&["Date", "Total", "Sources updated"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Daily totals "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, chunks[1], &mut app.history_state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let key = Style::default().fg(Color::Yellow);
    let mut spans = vec![Span::styled(
        format!(" {} ", app.current_page.title()),
        Style::default().fg(Color::Cyan),
    )];
    spans.push(Span::raw(" | "));
    spans.push(Span::styled("Tab", key));
    spans.push(Span::raw(" Page | "));
    spans.push(Span::styled("p", key));
    spans.push(Span::raw(" Period | "));
    spans.push(Span::styled("r", key));
    spans.push(Span::raw(" Range | "));
    spans.push(Span::styled("↑/↓", key));
    spans.push(Span::raw(" Nav | "));
    spans.push(Span::styled("Enter", key));
    spans.push(Span::raw(" Details | "));
    spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

/// Shift totals so the minimum sits at zero; sparklines only take u64
fn sparkline_data(totals: &[f64]) -> Vec<u64> {
    let min = totals.iter().copied().fold(f64::INFINITY, f64::min);
    if !min.is_finite() {
        return Vec::new();
    }
    totals.iter().map(|t| (t - min).round() as u64 + 1).collect()
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

// 🖥️ Terminal page - cards, controls, dropdown overlay and dashboard
//
// Key events are routed into the same PageSession entry points a browser
// page would call: typing, select changes, range steps and clicks.

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, Cell, Clear, Gauge, Paragraph, Row, Sparkline, Table, TableState},
    Frame, Terminal,
};
use rental_filter::chart::{AVAILABLE_SLOT, IN_SERVICE_SLOT};
use rental_filter::{
    Card, ControlSlot, Dashboard, FilterError, FleetUpdate, PageConfig, PageSession, RangeSelector,
};
use std::io;
use std::sync::mpsc::Receiver;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Cards,
    Dashboard,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Cards => Page::Dashboard,
            Page::Dashboard => Page::Cards,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Cards => "Cards",
            Page::Dashboard => "Dashboard",
        }
    }
}

pub struct App {
    pub session: Option<PageSession>,
    pub title: String,
    pub columns: Vec<String>,
    pub state: TableState,
    pub focus: usize,
    pub current_page: Page,
    pub show_detail: bool,
    pub dashboard: Dashboard,
    pub status: String,
    pub status_is_error: bool,
    fleet_rx: Option<Receiver<FleetUpdate>>,
}

impl App {
    /// Runs the initial filter pass; an integration error becomes the status
    /// line and the page still opens.
    pub fn new(mut session: PageSession, page: &PageConfig, dashboard: Dashboard) -> Self {
        let outcome = session.refilter().map(|r| r.summary());

        let mut app = Self {
            session: Some(session),
            title: page.title.clone(),
            columns: page.columns.clone(),
            state: TableState::default(),
            focus: 0,
            current_page: Page::Cards,
            show_detail: false,
            dashboard,
            status: String::new(),
            status_is_error: false,
            fleet_rx: None,
        };
        app.finish(outcome);
        app
    }

    /// Dashboard without a card page behind it
    pub fn dashboard_only(dashboard: Dashboard) -> Self {
        Self {
            session: None,
            title: "Manager dashboard".to_string(),
            columns: Vec::new(),
            state: TableState::default(),
            focus: 0,
            current_page: Page::Dashboard,
            show_detail: false,
            dashboard,
            status: "Waiting for fleet counts...".to_string(),
            status_is_error: false,
            fleet_rx: None,
        }
    }

    pub fn with_fleet_updates(mut self, rx: Receiver<FleetUpdate>) -> Self {
        self.fleet_rx = Some(rx);
        self
    }

    /// Drain finished fleet fetches into the chart
    pub fn poll_fleet(&mut self) {
        if let Some(rx) = &self.fleet_rx {
            for update in rx.try_iter() {
                self.dashboard.apply_update(update);
            }
        }
    }

    pub fn next_page(&mut self) {
        if self.session.is_some() {
            self.current_page = self.current_page.next();
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    fn visible(&self) -> Vec<&Card> {
        self.session
            .as_ref()
            .map(|s| s.visible_cards().collect())
            .unwrap_or_default()
    }

    pub fn selected_card(&self) -> Option<&Card> {
        let index = self.state.selected()?;
        self.session.as_ref()?.visible_cards().nth(index)
    }

    fn slots(&self) -> Vec<ControlSlot> {
        self.session
            .as_ref()
            .map(|s| s.panel().slots())
            .unwrap_or_default()
    }

    pub fn focused(&self) -> Option<ControlSlot> {
        self.slots().into_iter().nth(self.focus)
    }

    /// Move focus; focusing a control is a click on it
    pub fn focus_next(&mut self, direction: isize) {
        let len = self.slots().len() as isize;
        if len == 0 {
            return;
        }
        self.focus = (self.focus as isize + direction).rem_euclid(len) as usize;
        if let (Some(slot), Some(session)) = (self.focused(), self.session.as_mut()) {
            session.click(slot.id());
        }
    }

    fn finish(&mut self, outcome: std::result::Result<String, FilterError>) {
        match outcome {
            Ok(summary) => {
                self.status = summary;
                self.status_is_error = false;
            }
            Err(e) => {
                log::warn!("{}", e);
                self.status = e.to_string();
                self.status_is_error = true;
            }
        }

        // Keep the selection inside the visible rows
        let len = self.visible().len();
        match self.state.selected() {
            _ if len == 0 => self.state.select(None),
            Some(i) if i >= len => self.state.select(Some(len - 1)),
            None => self.state.select(Some(0)),
            _ => {}
        }
    }

    pub fn type_char(&mut self, c: char) {
        let Some(ControlSlot::Text(id)) = self.focused() else { return };
        let Some(session) = self.session.as_mut() else { return };

        let mut value = session.panel().text_value(&id).unwrap_or_default().to_string();
        value.push(c);
        let outcome = session.input_text(&id, value).map(|r| r.summary());
        self.finish(outcome);
    }

    pub fn backspace(&mut self) {
        let Some(ControlSlot::Text(id)) = self.focused() else { return };
        let Some(session) = self.session.as_mut() else { return };

        let mut value = session.panel().text_value(&id).unwrap_or_default().to_string();
        if value.pop().is_none() {
            return;
        }
        let outcome = session.input_text(&id, value).map(|r| r.summary());
        self.finish(outcome);
    }

    /// Left/Right on the focused select or range min (`max` moves the range max)
    pub fn step(&mut self, direction: isize, max: bool) {
        let Some(slot) = self.focused() else { return };
        let Some(session) = self.session.as_mut() else { return };

        let outcome = match &slot {
            ControlSlot::Select(id) => session.cycle_select(id, direction).map(|r| r.summary()),
            ControlSlot::Range(id) if max => session.step_range_max(id, direction).map(|r| r.summary()),
            ControlSlot::Range(id) => session.step_range_min(id, direction).map(|r| r.summary()),
            ControlSlot::Text(_) => return,
        };
        self.finish(outcome);
    }

    /// Enter: open/close the focused range's dropdown, else toggle the detail panel
    pub fn activate(&mut self) {
        if let (Some(ControlSlot::Range(id)), Some(session)) = (self.focused(), self.session.as_mut()) {
            let trigger = session.panel().dropdowns().trigger_for_range(&id).map(str::to_string);
            if let Some(trigger) = trigger {
                session.click(&trigger);
                return;
            }
        }
        self.toggle_detail();
    }

    pub fn reset(&mut self) {
        let Some(session) = self.session.as_mut() else { return };
        let outcome = session.reset().map(|r| r.summary());
        self.finish(outcome);
    }

    /// Click on the page background
    pub fn click_page(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.click("page");
        }
    }

    fn has_open_dropdown(&self) -> bool {
        self.session
            .as_ref()
            .map_or(false, |s| s.panel().dropdowns().open().next().is_some())
    }

    pub fn next(&mut self) {
        let len = self.visible().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.visible().len();
        if len == 0 {
            return;
        }
        let i = self.state.selected().map_or(0, |i| (i + 20).min(len - 1));
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = self.state.selected().map_or(0, |i| i.saturating_sub(20));
        self.state.select(Some(i));
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        app.poll_fleet();
        terminal.draw(|f| ui(f, app))?;

        if !event::poll(TICK)? {
            continue;
        }
        let Event::Key(key) = event::read()? else { continue };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc if app.has_open_dropdown() => app.click_page(),
            KeyCode::Esc => return Ok(()),
            KeyCode::Char('c') if ctrl => return Ok(()),
            KeyCode::F(2) => app.next_page(),
            _ if app.current_page == Page::Dashboard => {
                if key.code == KeyCode::Char('q') {
                    return Ok(());
                }
            }
            KeyCode::Char('r') if ctrl => app.reset(),
            KeyCode::Tab => app.focus_next(1),
            KeyCode::BackTab => app.focus_next(-1),
            KeyCode::Enter => app.activate(),
            KeyCode::Left => app.step(-1, shift),
            KeyCode::Right => app.step(1, shift),
            KeyCode::Backspace => app.backspace(),
            KeyCode::Char(c) => app.type_char(c),
            KeyCode::Down => app.next(),
            KeyCode::Up => app.previous(),
            KeyCode::PageDown => app.page_down(),
            KeyCode::PageUp => app.page_up(),
            KeyCode::Home => app.state.select(Some(0)),
            KeyCode::End => {
                let len = app.visible().len();
                if len > 0 {
                    app.state.select(Some(len - 1));
                }
            }
            _ => {}
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Length(3), // Control strip
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Cards => {
            render_controls(f, chunks[1], app);
            if app.show_detail {
                let content_chunks = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                    .split(chunks[2]);

                render_table(f, content_chunks[0], app);
                render_detail_panel(f, content_chunks[1], app);
            } else {
                render_table(f, chunks[2], app);
            }
            render_dropdown(f, chunks[2], app);
        }
        Page::Dashboard => {
            let area = Rect {
                y: chunks[1].y,
                height: chunks[1].height + chunks[2].height,
                ..chunks[1]
            };
            render_dashboard(f, area, app);
        }
    }

    render_status_bar(f, chunks[3], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![Span::styled(
        format!(" {} ", app.title),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];

    if app.session.is_some() {
        for page in [Page::Cards, Page::Dashboard] {
            spans.push(Span::raw(" │ "));
            let style = if page == app.current_page {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            spans.push(Span::styled(page.title().to_string(), style));
        }
    }

    if let Some(session) = &app.session {
        let visible = session.visible_cards().count();
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            format!("Showing {} of {}", visible, session.cards().len()),
            Style::default().fg(Color::White),
        ));
    }

    let header = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_controls(f: &mut Frame, area: Rect, app: &App) {
    let Some(session) = &app.session else { return };
    let panel = session.panel();

    let mut spans = Vec::new();
    for (i, slot) in panel.slots().iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw("  "));
        }
        let label = panel.label(slot).unwrap_or(slot.id());
        let value = match slot {
            ControlSlot::Text(id) => format!("[{}]", panel.text_value(id).unwrap_or_default()),
            ControlSlot::Select(id) => format!("‹{}›", panel.select_value(id).unwrap_or_default()),
            ControlSlot::Range(id) => match panel.range(id) {
                Some(pair) => format!("{}–{}", pair.min().label(), pair.max().label()),
                None => String::new(),
            },
        };

        let style = if i == app.focus {
            Style::default().fg(Color::Black).bg(Color::Yellow)
        } else {
            Style::default().fg(Color::White)
        };
        spans.push(Span::styled(format!("{}: {}", label, value), style));
    }

    let controls = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Filters "),
    );

    f.render_widget(controls, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = app.columns.iter().map(|h| {
        Cell::from(h.clone()).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows: Vec<Row> = app
        .visible()
        .into_iter()
        .map(|card| {
            let cells = app
                .columns
                .iter()
                .map(|col| Cell::from(truncate(card.field(col).unwrap_or("-"), 28)));
            Row::new(cells).height(1)
        })
        .collect();

    let widths: Vec<Constraint> = app
        .columns
        .iter()
        .map(|_| Constraint::Ratio(1, app.columns.len().max(1) as u32))
        .collect();

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Cards "),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

/// Open range dropdowns drawn over the card table
fn render_dropdown(f: &mut Frame, area: Rect, app: &App) {
    let Some(session) = &app.session else { return };
    let panel = session.panel();

    for dropdown in panel.dropdowns().open() {
        let Some(pair) = dropdown.range.as_deref().and_then(|r| panel.range(r)) else {
            continue;
        };

        let rows = pair.min().options().len().max(1) as u16;
        let popup = Rect {
            x: area.x + area.width.saturating_sub(36),
            y: area.y + 1,
            width: 34.min(area.width),
            height: (rows + 3).min(area.height),
        };

        let mut lines = vec![Line::from(vec![
            Span::styled(" min          ", Style::default().fg(Color::Cyan)),
            Span::styled(" max", Style::default().fg(Color::Cyan)),
        ])];
        for i in 0..pair.min().options().len() {
            lines.push(Line::from(vec![
                option_span(pair.min(), i),
                Span::raw("  "),
                option_span(pair.max(), i),
            ]));
        }

        f.render_widget(Clear, popup);
        f.render_widget(
            Paragraph::new(lines).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow))
                    .title(format!(" {} ", pair.label())),
            ),
            popup,
        );
    }
}

fn option_span(selector: &RangeSelector, index: usize) -> Span<'static> {
    let option = &selector.options()[index];
    let marker = if option.value == selector.selected_value() { "●" } else { " " };
    let style = if option.disabled {
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT)
    } else {
        Style::default().fg(Color::White)
    };
    Span::styled(format!("{} {:<10}", marker, option.value), style)
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Card Details ");

    let Some(card) = app.selected_card() else {
        f.render_widget(Paragraph::new("No card selected").block(block), area);
        return;
    };

    let mut content = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  {}", card.title()),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )),
        Line::from(""),
    ];
    for (name, value) in card.fields() {
        content.push(Line::from(vec![
            Span::styled(format!("  {}: ", name), Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            Span::raw(value.clone()),
        ]));
    }
    content.push(Line::from(""));
    content.push(Line::from(Span::styled(
        "  Press Enter to close",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )));

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn render_dashboard(f: &mut Frame, area: Rect, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(rows[0]);

    // Weekly new customers
    let weekly = &app.dashboard.weekly_customers;
    let bars: Vec<(&str, u64)> = weekly
        .labels
        .iter()
        .enumerate()
        .map(|(i, label)| (label.as_str(), weekly.point(i).unwrap_or(0.0) as u64))
        .collect();
    let bar_chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(" New customers "))
        .data(bars.as_slice())
        .bar_width(9)
        .bar_gap(2)
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));
    f.render_widget(bar_chart, top[0]);

    // Fleet doughnut as a gauge: in service vs whole fleet
    let fleet = &app.dashboard.fleet;
    let in_service = fleet.point(IN_SERVICE_SLOT).unwrap_or(0.0);
    let available = fleet.point(AVAILABLE_SLOT).unwrap_or(0.0);
    let total = in_service + available;
    let ratio = if total > 0.0 { (in_service / total).clamp(0.0, 1.0) } else { 0.0 };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" Fleet "))
        .gauge_style(Style::default().fg(Color::Red).bg(Color::Green))
        .ratio(ratio)
        .label(format!(
            "{} {} / {} {}",
            fleet.labels[0], in_service as u64, fleet.labels[1], available as u64
        ));
    f.render_widget(gauge, top[1]);

    // Month revenue
    let revenue: Vec<u64> = app.dashboard.revenue.datasets[0]
        .data
        .iter()
        .map(|v| v.max(0.0).round() as u64)
        .collect();
    let sparkline = Sparkline::default()
        .block(Block::default().borders(Borders::ALL).title(" Revenue this month "))
        .data(&revenue)
        .style(Style::default().fg(Color::Green));
    f.render_widget(sparkline, rows[1]);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![Span::styled(
        format!(" {} ", app.status),
        Style::default().fg(if app.status_is_error { Color::Red } else { Color::Green }),
    )];

    let keys: &[(&str, &str)] = match app.current_page {
        Page::Cards => &[
            ("Tab", " Focus"),
            ("←/→", " Change"),
            ("⇧←/→", " Max"),
            ("Enter", " Open"),
            ("^R", " Reset"),
            ("F2", " Dashboard"),
            ("Esc", " Quit"),
        ],
        Page::Dashboard => &[("F2", " Cards"), ("q", " Quit")],
    };
    for (key, what) in keys {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(key.to_string(), Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(what.to_string()));
    }

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len - 3).collect();
        format!("{}...", cut)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rental_filter::{
        builtin_pages, find_page, CardKind, CompatOptions, ControlPanel, DashboardSeed, IntegrationMode,
    };

    fn open(cards: Vec<Card>) -> App {
        let pages = builtin_pages(&CompatOptions::default());
        let page = find_page(&pages, "cars").unwrap();
        let panel = ControlPanel::new(page, IntegrationMode::Development).unwrap();
        App::new(PageSession::new(panel, cards), page, Dashboard::new(&DashboardSeed::default()))
    }

    #[test]
    fn test_new_shows_initial_summary() {
        let app = open(Vec::new());

        assert!(!app.status_is_error);
        assert!(app.status.starts_with("0 of 0 visible"), "{}", app.status);
        assert_eq!(app.state.selected(), None);
    }

    #[test]
    fn test_new_shows_initial_integration_error() {
        let cards = vec![Card::new(CardKind::Car).with_field("rego", "ZZZ999").with_field("make", "Kia")];
        let app = open(cards);

        assert!(app.status_is_error);
        assert!(app.status.contains("integration issue"), "{}", app.status);
        assert!(app.session.is_some());
    }
}

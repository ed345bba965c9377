use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::widgets::{
    Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Clear, Dataset, GraphType, Paragraph,
    Row, Table, Tabs,
};

use fatigue_terminal::config::{self, AppConfig};
use fatigue_terminal::dashboard::{
    DashboardData, DashboardState, LivePrediction, PREDICTION_PREVIEW_ROWS, TOP_FEATURES_CHART,
    TOP_FEATURES_LISTED, TOP_PLAYERS, Tab, shap_importance, strip_shap_prefix,
};
use fatigue_terminal::dataset::load_table_or_empty;
use fatigue_terminal::model::{LinearModel, Predictor};

struct App {
    state: DashboardState,
    predictor: Option<LinearModel>,
    should_quit: bool,
}

impl App {
    fn new(cfg: &AppConfig) -> Result<Self> {
        let data = DashboardData::load(&cfg.data_path).with_context(|| {
            format!(
                "{} missing or unreadable; generate it with build_fatigue_index",
                cfg.data_path.display()
            )
        })?;
        let predictions = load_table_or_empty(&cfg.predictions_path);
        let shap = load_table_or_empty(&cfg.shap_path);
        let mut state = DashboardState::new(data, predictions, shap, cfg.fatigue_threshold)
            .with_date_range(cfg.date_from, cfg.date_to);
        state.push_log(format!("[INFO] Loaded dataset: {}", cfg.data_path.display()));

        let predictor = match &cfg.model_path {
            Some(path) => match LinearModel::load(path) {
                Ok(model) => {
                    state.push_log(format!("[INFO] Loaded trained model from {}", path.display()));
                    Some(model)
                }
                Err(err) => {
                    state.push_log(format!("[WARN] {err:#}"));
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            state,
            predictor,
            should_quit: false,
        })
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char(c @ '1'..='5') => {
                let idx = (c as usize) - ('1' as usize);
                self.state.tab = Tab::ALL[idx];
            }
            KeyCode::Tab | KeyCode::Right => self.state.tab = self.state.tab.next(),
            KeyCode::BackTab | KeyCode::Left => self.state.tab = self.state.tab.prev(),
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Char('+') | KeyCode::Char(']') => self.state.adjust_threshold(0.05),
            KeyCode::Char('-') | KeyCode::Char('[') => self.state.adjust_threshold(-0.05),
            KeyCode::Char('p') | KeyCode::Enter => {
                let predictor = self.predictor.as_ref().map(|m| m as &dyn Predictor);
                self.state.run_live_prediction(predictor);
                self.state.tab = Tab::Live;
            }
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            KeyCode::Esc => self.state.help_overlay = false,
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    config::load_env_files();
    config::init_logging("warn");
    let cfg = AppConfig::from_env();
    let mut app = App::new(&cfg)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    loop {
        terminal.draw(|f| ui(f, app))?;

        if event::poll(tick_rate)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            app.on_key(key);
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(4),
            Constraint::Length(1),
        ])
        .split(frame.size());

    render_header(frame, chunks[0], &app.state);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(28), Constraint::Min(1)])
        .split(chunks[1]);
    render_players(frame, body[0], &app.state);
    match app.state.tab {
        Tab::Fatigue => render_fatigue(frame, body[1], &app.state),
        Tab::Predictions => render_predictions(frame, body[1], &app.state),
        Tab::Importance => render_importance(frame, body[1], &app.state),
        Tab::TopFatigued => render_top_fatigued(frame, body[1], &app.state),
        Tab::Live => render_live(frame, body[1], app),
    }

    let console = Paragraph::new(console_text(&app.state))
        .block(Block::default().title("Console").borders(Borders::TOP));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(
        "1-5/Tab Views | j/k/↑/↓ Player | +/- Threshold | p Predict | ? Help | q Quit",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[3]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn render_header(frame: &mut Frame, area: Rect, state: &DashboardState) {
    let titles: Vec<Line> = Tab::ALL
        .iter()
        .enumerate()
        .map(|(idx, tab)| Line::from(format!("{} {}", idx + 1, tab.title())))
        .collect();
    let range = match (state.date_from, state.date_to) {
        (Some(from), Some(to)) => format!("{from} .. {to}"),
        _ => "no dates".to_string(),
    };
    let title = format!(
        "PLAYER FATIGUE | {} | {} | FI threshold {:.2}",
        state.selected_player().unwrap_or("-"),
        range,
        state.threshold
    );
    let tabs = Tabs::new(titles)
        .block(Block::default().title(title).borders(Borders::BOTTOM))
        .select(state.tab.index())
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, area);
}

fn render_players(frame: &mut Frame, area: Rect, state: &DashboardState) {
    let block = Block::default().title("Players").borders(Borders::RIGHT);
    if state.players.is_empty() {
        frame.render_widget(Paragraph::new("No players").block(block), area);
        return;
    }
    let visible = area.height.saturating_sub(1).max(1) as usize;
    let (start, end) = visible_range(state.selected, state.players.len(), visible);
    let lines: Vec<Line> = (start..end)
        .map(|idx| {
            let style = if idx == state.selected {
                Style::default().fg(Color::White).bg(Color::DarkGray)
            } else {
                Style::default()
            };
            Line::styled(state.players[idx].clone(), style)
        })
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_fatigue(frame: &mut Frame, area: Rect, state: &DashboardState) {
    let block = Block::default()
        .title("Fatigue Index Over Time")
        .borders(Borders::ALL);
    if !state.data.has_column("fatigue_index") {
        frame.render_widget(
            Paragraph::new("No fatigue index data available in this dataset.").block(block),
            area,
        );
        return;
    }
    let trend = state.trend();
    if trend.is_empty() {
        frame.render_widget(
            Paragraph::new("No data for selected player/date range.").block(block),
            area,
        );
        return;
    }

    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(area);

    let first = trend[0].match_date;
    let points: Vec<(f64, f64)> = trend
        .iter()
        .map(|p| ((p.match_date - first).num_days() as f64, p.fatigue_index))
        .collect();
    let threshold_line: Vec<(f64, f64)> = points.iter().map(|(x, _)| (*x, state.threshold)).collect();
    let x_max = points.last().map(|p| p.0).unwrap_or(0.0).max(1.0);
    let last = trend[trend.len() - 1].match_date;

    let datasets = vec![
        Dataset::default()
            .name("fatigue_index")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&points),
        Dataset::default()
            .name("threshold")
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Red))
            .data(&threshold_line),
    ];
    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .bounds([0.0, x_max])
                .labels(vec![Span::raw(first.to_string()), Span::raw(last.to_string())]),
        )
        .y_axis(
            Axis::default()
                .bounds([0.0, 1.0])
                .labels(vec![Span::raw("0.0"), Span::raw("0.5"), Span::raw("1.0")]),
        );
    frame.render_widget(chart, sections[0]);

    let caption = format!(
        "{} matches exceeded FI threshold ({:.2})",
        state.threshold_exceeded(),
        state.threshold
    );
    frame.render_widget(
        Paragraph::new(caption).style(Style::default().fg(Color::Yellow)),
        sections[1],
    );
}

fn render_predictions(frame: &mut Frame, area: Rect, state: &DashboardState) {
    let block = Block::default()
        .title("Model Predictions")
        .borders(Borders::ALL);
    if state.predictions.is_empty() {
        frame.render_widget(Paragraph::new("No predictions.csv found.").block(block), area);
        return;
    }
    let headers = &state.predictions.headers;
    let widths: Vec<Constraint> = headers
        .iter()
        .map(|_| Constraint::Ratio(1, headers.len().max(1) as u32))
        .collect();
    let rows: Vec<Row> = state
        .predictions
        .rows
        .iter()
        .take(PREDICTION_PREVIEW_ROWS)
        .map(|r| Row::new(r.clone()))
        .collect();
    let table = Table::new(rows, widths)
        .header(Row::new(headers.clone()).style(Style::default().add_modifier(Modifier::BOLD)))
        .block(block);
    frame.render_widget(table, area);
}

fn render_importance(frame: &mut Frame, area: Rect, state: &DashboardState) {
    let block = Block::default()
        .title("SHAP Feature Importance")
        .borders(Borders::ALL);
    if state.shap.is_empty() {
        frame.render_widget(Paragraph::new("No SHAP data found.").block(block), area);
        return;
    }
    let ranked = shap_importance(&state.shap);
    if ranked.is_empty() {
        frame.render_widget(
            Paragraph::new("SHAP columns not recognized in CSV.").block(block),
            area,
        );
        return;
    }

    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(TOP_FEATURES_LISTED as u16 + 2)])
        .split(area);

    let bars: Vec<Bar> = ranked
        .iter()
        .take(TOP_FEATURES_CHART)
        .map(|(name, value)| {
            Bar::default()
                .label(Line::from(strip_shap_prefix(name).to_string()))
                .value((value * 10_000.0).round() as u64)
                .text_value(format!("{value:.4}"))
        })
        .collect();
    let chart = BarChart::default()
        .block(block)
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .data(BarGroup::default().bars(&bars));
    frame.render_widget(chart, sections[0]);

    let mut lines = vec![Line::from("Top Influential Features:")];
    for (name, value) in ranked.iter().take(TOP_FEATURES_LISTED) {
        lines.push(Line::from(format!("  • {}: {value:.4}", strip_shap_prefix(name))));
    }
    frame.render_widget(Paragraph::new(lines), sections[1]);
}

fn render_top_fatigued(frame: &mut Frame, area: Rect, state: &DashboardState) {
    let block = Block::default()
        .title("Top 10 Most Fatigued Players (mean FI)")
        .borders(Borders::ALL);
    if !state.data.has_column("fatigue_index") {
        frame.render_widget(
            Paragraph::new("Fatigue Index not found in dataset.").block(block),
            area,
        );
        return;
    }
    let top = state.data.top_fatigued(TOP_PLAYERS);
    let bars: Vec<Bar> = top
        .iter()
        .map(|(name, value)| {
            Bar::default()
                .label(Line::from(name.clone()))
                .value((value * 1000.0).round() as u64)
                .text_value(format!("{value:.3}"))
        })
        .collect();
    let chart = BarChart::default()
        .block(block)
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .data(BarGroup::default().bars(&bars));
    frame.render_widget(chart, area);
}

fn render_live(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title("Run Live Prediction")
        .borders(Borders::ALL);
    let model = match &app.predictor {
        Some(m) => {
            let artifact = m.artifact();
            format!(
                "Model: {} | {} features | generated {}",
                m.label(),
                artifact.feature_names.len(),
                if artifact.generated_at.is_empty() { "-" } else { artifact.generated_at.as_str() }
            )
        }
        None => "Model: none (set FATIGUE_MODEL_PATH)".to_string(),
    };
    let status = match &app.state.live {
        None => "Press p to predict for the selected player.".to_string(),
        Some(result) => result.message(),
    };
    let style = match &app.state.live {
        Some(LivePrediction::Predicted { .. }) => Style::default().fg(Color::Green),
        Some(_) => Style::default().fg(Color::Red),
        None => Style::default(),
    };
    let text = vec![
        Line::from(model),
        Line::from(""),
        Line::styled(status, style),
    ];
    frame.render_widget(Paragraph::new(text).block(block), area);
}

fn console_text(state: &DashboardState) -> String {
    if state.logs.is_empty() {
        return "No alerts yet".to_string();
    }
    let skip = state.logs.len().saturating_sub(3);
    state
        .logs
        .iter()
        .skip(skip)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total <= visible {
        return (0, total);
    }
    let half = visible / 2;
    let start = selected.saturating_sub(half).min(total - visible);
    (start, start + visible)
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Player Fatigue Dashboard - Help",
        "",
        "  1-5 / Tab    Switch view",
        "  j/k or ↑/↓   Select player",
        "  + / -        Raise/lower fatigue threshold",
        "  p / Enter    Run live prediction",
        "  ?            Toggle help",
        "  q            Quit",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

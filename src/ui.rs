use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use typemaster::session::{Status, WpmPoint};

use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

/// Axis bounds for the results chart: overall duration on x, a little
/// headroom above the fastest sample on y.
fn chart_bounds(series: &[WpmPoint]) -> (f64, f64) {
    let overall = series.last().map(|p| p.t).unwrap_or(1.0).max(1.0);
    let highest = series
        .iter()
        .map(|p| p.wpm)
        .fold(0.0_f64, f64::max)
        .max(10.0)
        .ceil()
        + 5.0;
    (overall, highest)
}

fn format_label(value: f64) -> String {
    format!("{:.0}", value.ceil())
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::Leaderboard => render_leaderboard(self, area, buf),
            _ => match self.session.status() {
                Status::Finished => render_results(self, area, buf),
                _ => render_typing(self, area, buf),
            },
        }
    }
}

fn render_typing(app: &App, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let green_bold_style = Style::default().patch(bold_style).fg(Color::Green);
    let red_bold_style = Style::default().patch(bold_style).fg(Color::Red);
    let dim_bold_style = Style::default()
        .patch(bold_style)
        .add_modifier(Modifier::DIM);
    let underlined_dim_bold_style = Style::default()
        .patch(dim_bold_style)
        .add_modifier(Modifier::UNDERLINED);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let Some(reference) = app.session.reference() else {
        let waiting = Paragraph::new(Span::styled(
            "fetching a passage...",
            italic_style,
        ))
        .alignment(Alignment::Center);
        waiting.render(area, buf);
        return;
    };

    let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    let mut prompt_occupied_lines =
        ((reference.content.width() as f64 / max_chars_per_line as f64).ceil() + 1.0) as u16;
    if reference.content.width() <= max_chars_per_line as usize {
        prompt_occupied_lines = 1;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints(
            [
                Constraint::Length(
                    ((area.height as f64 - prompt_occupied_lines as f64) / 2.0) as u16,
                ),
                Constraint::Length(1),
                Constraint::Length(prompt_occupied_lines),
                Constraint::Length(
                    ((area.height as f64 - prompt_occupied_lines as f64) / 2.0) as u16,
                ),
            ]
            .as_ref(),
        )
        .split(area);

    let reference_chars: Vec<char> = reference.content.chars().collect();
    let typed_chars: Vec<char> = app.typed.chars().collect();

    let mut spans = typed_chars
        .iter()
        .enumerate()
        .map(|(idx, typed)| match reference_chars.get(idx) {
            Some(expected) if expected == typed => {
                Span::styled(expected.to_string(), green_bold_style)
            }
            _ => Span::styled(
                match typed {
                    ' ' => "·".to_owned(),
                    c => c.to_string(),
                },
                red_bold_style,
            ),
        })
        .collect::<Vec<Span>>();

    if let Some(cursor) = reference_chars.get(typed_chars.len()) {
        spans.push(Span::styled(
            cursor.to_string(),
            underlined_dim_bold_style,
        ));
    }
    if typed_chars.len() + 1 < reference_chars.len() {
        let rest: String = reference_chars[typed_chars.len() + 1..].iter().collect();
        spans.push(Span::styled(rest, dim_bold_style));
    }

    let prompt = Paragraph::new(Line::from(spans))
        .alignment(if prompt_occupied_lines == 1 {
            // short passages sit centered, long ones wrap left-aligned
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: true });
    prompt.render(chunks[2], buf);

    let live = Paragraph::new(Span::styled(
        format!(
            "{} · {:.0} wpm · {:.0}% acc · enter submits",
            reference.difficulty,
            app.session.live_wpm(),
            app.session.live_accuracy()
        ),
        Style::default()
            .patch(italic_style)
            .add_modifier(Modifier::DIM),
    ))
    .alignment(Alignment::Center);
    live.render(chunks[1], buf);
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let magenta_style = Style::default().fg(Color::Magenta);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),    // chart
            Constraint::Length(1), // stats
            Constraint::Length(1), // submission notice
            Constraint::Length(1), // padding
            Constraint::Length(1), // legend
        ])
        .split(area);

    let (overall_duration, highest_wpm) = chart_bounds(app.session.wpm_series());

    let tuples: Vec<(f64, f64)> = app
        .session
        .wpm_series()
        .iter()
        .map(|p| (p.t, p.wpm))
        .collect();
    let datasets = vec![Dataset::default()
        .marker(ratatui::symbols::Marker::Braille)
        .style(magenta_style)
        .graph_type(GraphType::Line)
        .data(&tuples)];

    let chart = Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title("seconds")
                .bounds([0.0, overall_duration])
                .labels(vec![
                    Span::styled("0", bold_style),
                    Span::styled(format_label(overall_duration), bold_style),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("wpm")
                .bounds([0.0, highest_wpm])
                .labels(vec![
                    Span::styled("0", bold_style),
                    Span::styled(format_label(highest_wpm), bold_style),
                ]),
        );
    chart.render(chunks[0], buf);

    let summary = match app.session.final_metrics() {
        Some(m) => format!(
            "{:.2} wpm   {:.2}% acc   {} mistakes   {:.2}s   {:.2} sd",
            m.wpm,
            m.accuracy,
            m.mistakes,
            m.duration,
            app.session.consistency()
        ),
        None => String::from("no results"),
    };
    let stats = Paragraph::new(Span::styled(summary, bold_style)).alignment(Alignment::Center);
    stats.render(chunks[1], buf);

    if let Some(notice) = &app.notice {
        let notice_widget = Paragraph::new(Span::styled(
            notice.clone(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center);
        notice_widget.render(chunks[2], buf);
    }

    let legend = Paragraph::new(Span::styled(
        "(r)etry / (n)ew passage / (l)eaderboard / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center);
    legend.render(chunks[4], buf);
}

fn render_leaderboard(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Min(0),    // table
            Constraint::Length(3), // instructions
        ])
        .split(area);

    let title = Paragraph::new(format!("Top {} by words per minute", app.leaderboard_size))
        .block(Block::default().borders(Borders::ALL).title("Leaderboard"))
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center);
    title.render(chunks[0], buf);

    if app.leaderboard.is_empty() {
        let empty = Paragraph::new("No results yet. Finish a test to get on the board!")
            .block(Block::default().borders(Borders::ALL).title("No Data"))
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center);
        empty.render(chunks[1], buf);
    } else {
        let header = Row::new(vec![
            Cell::from("#"),
            Cell::from("User"),
            Cell::from("WPM"),
            Cell::from("Accuracy (%)"),
        ])
        .style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

        let rows: Vec<Row> = app
            .leaderboard
            .iter()
            .enumerate()
            .map(|(rank, entry)| {
                Row::new(vec![
                    Cell::from((rank + 1).to_string()),
                    Cell::from(entry.username.clone()),
                    Cell::from(format!("{:.2}", entry.wpm)),
                    Cell::from(format!("{:.2}", entry.accuracy)),
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            &[
                Constraint::Length(4),
                Constraint::Length(24),
                Constraint::Length(10),
                Constraint::Length(14),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Best results"));
        table.render(chunks[1], buf);
    }

    let instructions = Paragraph::new("(b)ack / (esc)ape")
        .block(Block::default().borders(Borders::ALL))
        .style(
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::ITALIC),
        )
        .alignment(Alignment::Center);
    instructions.render(chunks[2], buf);
}

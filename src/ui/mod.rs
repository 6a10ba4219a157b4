//! Frame rendering: header, the two panes (or the logs view), the
//! transfer bar, and the status line.

pub mod helpers;
pub mod panes;
pub mod widgets;

use crate::core::transfer::controller::PaneSide;
use crate::ui::helpers::formatters::{format_eta, format_file_size, format_rate};
use crate::ui::widgets::progress_bar::ProgressBar;
use crate::utils::log_buffer::LogBuffer;
use crate::workers::app::{App, Mode};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};

pub fn render(f: &mut Frame, app: &App, log_buffer: &LogBuffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // header
            Constraint::Min(1),    // panes / logs
            Constraint::Length(3), // transfer bar
            Constraint::Length(1), // status / help
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);

    match app.mode {
        Mode::Browse => {
            let halves = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(chunks[1]);
            panes::render_pane(
                f,
                &app.local,
                "Local",
                app.focus == PaneSide::Local,
                halves[0],
            );
            panes::render_pane(
                f,
                &app.remote,
                "Remote",
                app.focus == PaneSide::Remote,
                halves[1],
            );
        }
        Mode::Logs => render_logs(f, app, log_buffer, chunks[1]),
    }

    render_transfer_bar(f, app, chunks[2]);
    render_status(f, app, chunks[3]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let mode = match app.mode {
        Mode::Browse => "Browse",
        Mode::Logs => "Logs",
    };
    let header = Paragraph::new(format!(" Skiff - {mode} "))
        .style(
            Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center);
    f.render_widget(header, area);
}

fn render_transfer_bar(f: &mut Frame, app: &App, area: Rect) {
    let line = match app.controller.view() {
        None => Line::from(Span::styled(
            " no transfer",
            Style::default().fg(Color::DarkGray),
        )),
        Some(view) => {
            let (arrow, color) = if view.active {
                ("->", Color::Cyan)
            } else if view.terminal_error.is_some() {
                ("!!", Color::Red)
            } else {
                ("ok", Color::Green)
            };

            let bar = ProgressBar::new(24).render(view.percent, color);
            let mut spans = vec![
                Span::styled(
                    format!(" {arrow} "),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
                Span::styled(view.filename.clone(), Style::default().fg(Color::White)),
                Span::raw(" "),
            ];
            spans.extend(bar.spans);
            spans.push(Span::styled(
                format!(
                    " {}/{}  {}  ETA {}",
                    format_file_size(view.transferred),
                    format_file_size(view.total),
                    format_rate(view.rate),
                    format_eta(view.eta),
                ),
                Style::default().fg(Color::DarkGray),
            ));
            if let Some(err) = &view.terminal_error {
                spans.push(Span::styled(
                    format!("  {err}"),
                    Style::default().fg(Color::Red),
                ));
            }
            Line::from(spans)
        }
    };

    let title = match app.controller.view() {
        Some(view) if view.active => format!(" {} ", view.direction),
        _ => " Transfer ".to_string(),
    };
    let widget = Paragraph::new(line).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(widget, area);
}

fn render_status(f: &mut Frame, app: &App, area: Rect) {
    let help = match app.mode {
        Mode::Browse => {
            "Tab: pane | Up/Down: move | Enter: open | Backspace: up | p: upload | g: download | L: logs | q: quit"
        }
        Mode::Logs => "Up/Down: scroll | d: clear | L/Esc: back | q: quit",
    };
    let line = if app.status.is_empty() {
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray))
    } else {
        Paragraph::new(app.status.as_str()).style(Style::default().fg(Color::Yellow))
    };
    f.render_widget(line, area);
}

fn render_logs(f: &mut Frame, app: &App, log_buffer: &LogBuffer, area: Rect) {
    let entries = log_buffer.entries();
    let total = entries.len();

    let visible_height = area.height.saturating_sub(2) as usize; // subtract borders

    // Clamp scroll offset
    let max_scroll = total.saturating_sub(visible_height);
    let scroll = app.log_scroll.min(max_scroll);

    let items: Vec<ListItem> = entries
        .iter()
        .skip(scroll)
        .take(visible_height)
        .map(|entry| {
            let level_color = match entry.level {
                tracing::Level::ERROR => Color::Red,
                tracing::Level::WARN => Color::Yellow,
                tracing::Level::INFO => Color::Green,
                tracing::Level::DEBUG => Color::DarkGray,
                tracing::Level::TRACE => Color::Indexed(240),
            };
            let level_str = match entry.level {
                tracing::Level::ERROR => "ERROR",
                tracing::Level::WARN => " WARN",
                tracing::Level::INFO => " INFO",
                tracing::Level::DEBUG => "DEBUG",
                tracing::Level::TRACE => "TRACE",
            };

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!(" {} ", entry.timestamp),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("{} ", level_str),
                    Style::default().fg(level_color).add_modifier(Modifier::BOLD),
                ),
                Span::raw(entry.message.clone()),
            ]))
        })
        .collect();

    let title = format!(" Logs ({}) ", total);
    let log_list = List::new(items).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)),
    );
    f.render_widget(log_list, area);
}

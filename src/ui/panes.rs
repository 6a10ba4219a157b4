//! Rendering for the two directory panes.

use crate::ui::helpers::formatters::{format_file_size, truncate_filename};
use crate::workers::app::DirPane;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState};

pub fn render_pane(f: &mut Frame, pane: &DirPane, title: &str, focused: bool, area: Rect) {
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let name_width = area.width.saturating_sub(16).max(12) as usize;
    let items: Vec<ListItem> = pane
        .entries
        .iter()
        .map(|entry| {
            let (marker, name_style) = if entry.is_dir {
                ("/", Style::default().fg(Color::Cyan))
            } else {
                (" ", Style::default().fg(Color::White))
            };
            let size = if entry.is_dir {
                String::new()
            } else {
                format!("  {}", format_file_size(entry.size))
            };
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!(" {}", truncate_filename(&entry.name, name_width)),
                    name_style,
                ),
                Span::styled(marker, Style::default().fg(Color::Cyan)),
                Span::styled(size, Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();

    let block_title = format!(" {} - {} ", title, pane.path);
    let list = List::new(items)
        .block(
            Block::default()
                .title(block_title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border_color)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Indexed(236))
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    if !pane.entries.is_empty() {
        state.select(Some(pane.selected));
    }
    f.render_stateful_widget(list, area, &mut state);
}

use ratatui::style::Color;
use ratatui::text::{Line, Span};

/// Reusable progress bar widget
pub struct ProgressBar {
    width: usize,
}

impl ProgressBar {
    pub fn new(width: usize) -> Self {
        Self { width }
    }

    /// Renders a progress bar as a Line. An unknown fraction (zero-byte
    /// file, no estimate yet) renders as an empty bar with `--%`.
    pub fn render(&self, fraction: Option<f64>, color: Color) -> Line<'static> {
        let Some(fraction) = fraction else {
            return Line::from(vec![
                Span::raw("["),
                Span::raw("-".repeat(self.width)),
                Span::raw("] --%"),
            ]);
        };

        let pct = (fraction * 100.0).clamp(0.0, 100.0) as u16;
        let filled = ((self.width as f64 * pct as f64) / 100.0).round() as usize;
        let empty = self.width.saturating_sub(filled);

        Line::from(vec![
            Span::raw("["),
            Span::styled("#".repeat(filled), color),
            Span::raw("-".repeat(empty)),
            Span::raw(format!("] {}%", pct)),
        ])
    }
}

use crate::recorder::Statistics;
use ratatui::backend::TestBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Terminal;

/// Renders the summary into a plain-text frame of the configured size.
/// The caller decides where the frame goes; rendering itself never
/// touches the real terminal.
pub fn render_summary(stats: &Statistics, width: u16, height: u16) -> String {
    let backend = TestBackend::new(width, height);
    let mut terminal = Terminal::new(backend).expect("terminal");
    terminal
        .draw(|frame| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(3),
                    Constraint::Length(3),
                    Constraint::Min(3),
                ])
                .split(frame.area());

            let counts = Paragraph::new(format!(
                "yes={} no={}",
                stats.yes_count, stats.no_count
            ))
            .block(Block::default().borders(Borders::ALL).title("Tally"));
            frame.render_widget(counts, chunks[0]);

            let derived = Paragraph::new(format!(
                "ratio={} elapsed={}",
                format_ratio(stats.ratio),
                format_elapsed(stats.elapsed_secs)
            ))
            .block(Block::default().borders(Borders::ALL).title("Derived"));
            frame.render_widget(derived, chunks[1]);

            let rates = Paragraph::new(format!(
                "yes/min={} no/min={}",
                format_rate(stats.yes_per_minute),
                format_rate(stats.no_per_minute)
            ))
            .block(Block::default().borders(Borders::ALL).title("Per minute"));
            frame.render_widget(rates, chunks[2]);
        })
        .expect("draw");

    let mut out = String::new();
    let buffer = terminal.backend().buffer().clone();
    for y in 0..height {
        for x in 0..width {
            if let Some(cell) = buffer.cell((x, y)) {
                out.push_str(cell.symbol());
            }
        }
        out.push('\n');
    }
    out
}

/// Single-line summary for piped output and logs.
pub fn summary_line(stats: &Statistics) -> String {
    format!(
        "yes={} no={} ratio={} elapsed={} yes/min={} no/min={}",
        stats.yes_count,
        stats.no_count,
        format_ratio(stats.ratio),
        format_elapsed(stats.elapsed_secs),
        format_rate(stats.yes_per_minute),
        format_rate(stats.no_per_minute)
    )
}

pub fn format_ratio(ratio: Option<f64>) -> String {
    match ratio {
        Some(value) => format!("{value:.2}"),
        None => "NaN".to_string(),
    }
}

pub fn format_rate(rate: Option<f64>) -> String {
    match rate {
        Some(value) => format!("{value:.1}"),
        None => "n/a".to_string(),
    }
}

pub fn format_elapsed(elapsed_secs: u64) -> String {
    format!("{:02}:{:02}", elapsed_secs / 60, elapsed_secs % 60)
}

pub fn help_text() -> String {
    [
        "tally records one yes/no count per keystroke:",
        "  y  record a yes",
        "  n  record a no",
        "  z  undo the most recent yes/no",
        "  s  show the running summary",
        "  h  show this help",
        "  q  show the final summary and quit",
    ]
    .join("\n")
}

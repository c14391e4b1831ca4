//! Console reporter.
//!
//! Renders every message as `<prefix>: <message> <suffix>` with the prefixes,
//! colors and suffix configured in the manifest's `Customize.*` sections.
//! Download progress redraws a single line when stdout is a terminal.

use std::io::{self, IsTerminal, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossterm::QueueableCommand;
use crossterm::cursor::MoveToColumn;
use crossterm::style::{self, Stylize};
use crossterm::terminal::{Clear, ClearType};
use ship_core::Reporter;
use ship_core::config::{Color, LogStyle, Prefix};
use ship_schema::{PackageName, Version};

use super::progress::format_download_progress;

/// Minimum time between two redraws of the progress line.
const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

fn to_crossterm(color: Color) -> style::Color {
    match color {
        Color::Default | Color::Reset => style::Color::Reset,
        Color::Black => style::Color::Black,
        Color::Red => style::Color::Red,
        Color::Green => style::Color::Green,
        Color::Yellow => style::Color::Yellow,
        Color::Blue => style::Color::Blue,
        Color::Purple => style::Color::Magenta,
        Color::Cyan => style::Color::Cyan,
        Color::White => style::Color::White,
    }
}

fn paint(text: &str, color: Option<Color>) -> String {
    match color {
        Some(c) => text.with(to_crossterm(c)).to_string(),
        None => text.to_string(),
    }
}

#[derive(Debug, Default)]
struct ProgressLine {
    /// A progress line is drawn and not yet terminated.
    open: bool,
    last_draw: Option<Instant>,
}

#[derive(Debug)]
pub struct ConsoleReporter {
    style: LogStyle,
    interactive: bool,
    progress: Mutex<ProgressLine>,
}

impl ConsoleReporter {
    pub fn new(style: LogStyle) -> Self {
        Self {
            style,
            interactive: io::stdout().is_terminal(),
            progress: Mutex::default(),
        }
    }

    /// One formatted message line, without the trailing newline.
    pub fn render(&self, prefix: &Prefix, msg: &str) -> String {
        let mut line = format!("{}: {msg}", paint(&prefix.text, prefix.color));
        if !self.style.suffix.is_empty() {
            line.push(' ');
            line.push_str(&paint(&self.style.suffix, self.style.suffix_color));
        }
        line
    }

    fn emit(&self, prefix: &Prefix, msg: &str, to_stderr: bool) {
        self.close_progress();
        let line = self.render(prefix, msg);
        if to_stderr {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }

    /// Finish a pending progress line so the next message starts clean.
    fn close_progress(&self) {
        let Ok(mut progress) = self.progress.lock() else {
            return;
        };
        if progress.open {
            println!();
            progress.open = false;
            progress.last_draw = None;
        }
    }

    fn draw_progress(&self, line: &str, force: bool) -> io::Result<()> {
        let Ok(mut progress) = self.progress.lock() else {
            return Ok(());
        };
        let now = Instant::now();
        if !force
            && progress
                .last_draw
                .is_some_and(|t| now.duration_since(t) < REDRAW_INTERVAL)
        {
            return Ok(());
        }

        let mut stdout = io::stdout().lock();
        stdout.queue(MoveToColumn(0))?;
        stdout.queue(Clear(ClearType::UntilNewLine))?;
        write!(stdout, "{line}")?;
        stdout.flush()?;

        progress.open = true;
        progress.last_draw = Some(now);
        Ok(())
    }
}

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        self.close_progress();
        println!();
        println!("{}", title.bold());
    }

    fn downloading(&self, name: &PackageName, version: &Version, current: u64, total: Option<u64>) {
        let finished = total.is_some_and(|t| current >= t);

        if !self.interactive {
            // Logs and pipes get one line per download.
            if current == 0 {
                self.emit(&self.style.info, &format!("Downloading {name} {version}"), false);
            }
            return;
        }

        let status = format_download_progress(current, total);
        let line = self.render(&self.style.info, &format!("Downloading {name} {version} {status}"));
        // Terminal output is best effort.
        let _ = self.draw_progress(&line, current == 0 || finished);
    }

    fn installing(&self, name: &PackageName, version: &Version) {
        self.emit(&self.style.info, &format!("Building {name} {version}"), false);
    }

    fn removing(&self, name: &PackageName, version: &Version) {
        self.emit(&self.style.info, &format!("Removing {name} {version}"), false);
    }

    fn done(&self, name: &PackageName, version: &Version, detail: &str) {
        self.emit(&self.style.success, &format!("{name} {version} {detail}"), false);
    }

    fn failed(&self, name: &PackageName, version: &Version, reason: &str) {
        self.emit(&self.style.error, &format!("{name} {version}: {reason}"), true);
    }

    fn info(&self, msg: &str) {
        self.emit(&self.style.info, msg, false);
    }

    fn success(&self, msg: &str) {
        self.emit(&self.style.success, msg, false);
    }

    fn warning(&self, msg: &str) {
        self.emit(&self.style.warning, msg, true);
    }

    fn error(&self, msg: &str) {
        self.emit(&self.style.error, msg, true);
    }

    fn summary(&self, count: usize, action: &str, elapsed_secs: f64) {
        let noun = if count == 1 { "package" } else { "packages" };
        self.emit(
            &self.style.success,
            &format!("{count} {noun} {action} in {elapsed_secs:.1}s"),
            false,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_style() -> LogStyle {
        LogStyle {
            info: Prefix {
                text: "info".to_string(),
                color: None,
            },
            ..LogStyle::default()
        }
    }

    #[test]
    fn test_render_plain_prefix() {
        let reporter = ConsoleReporter::new(plain_style());
        assert_eq!(reporter.render(&reporter.style.info, "hello"), "info: hello");
    }

    #[test]
    fn test_render_appends_suffix() {
        let mut style = plain_style();
        style.suffix = "<".to_string();
        let reporter = ConsoleReporter::new(style);
        assert_eq!(reporter.render(&reporter.style.info, "hello"), "info: hello <");
    }

    #[test]
    fn test_render_colored_prefix_keeps_text() {
        let reporter = ConsoleReporter::new(LogStyle::default());
        let line = reporter.render(&reporter.style.error, "boom");
        assert!(line.contains('E'));
        assert!(line.ends_with(": boom"));
    }
}

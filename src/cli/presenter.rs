//! CLI presenter for output formatting

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::amplitude::Amplitude;

/// Width of the level meter in cells
const METER_WIDTH: usize = 24;

/// Presenter for CLI output formatting
pub struct Presenter {
    spinner: Option<ProgressBar>,
    is_spinner_active: Arc<AtomicBool>,
}

impl Presenter {
    /// Create a new presenter
    pub fn new() -> Self {
        Self {
            spinner: None,
            is_spinner_active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start a spinner with message
    pub fn start_spinner(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
        self.spinner = Some(spinner);
        self.is_spinner_active.store(true, Ordering::SeqCst);
    }

    /// Update spinner message
    pub fn update_spinner(&self, message: &str) {
        if let Some(ref spinner) = self.spinner {
            spinner.set_message(message.to_string());
        }
    }

    /// Whether a spinner is currently drawn
    pub fn is_spinner_active(&self) -> bool {
        self.is_spinner_active.load(Ordering::SeqCst)
    }

    /// Mark spinner as success and finish
    pub fn spinner_success(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✓".green(), message));
        }
        self.is_spinner_active.store(false, Ordering::SeqCst);
    }

    /// Mark spinner as failed and finish
    pub fn spinner_fail(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✗".red(), message));
        }
        self.is_spinner_active.store(false, Ordering::SeqCst);
    }

    /// Stop spinner without status
    pub fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        self.is_spinner_active.store(false, Ordering::SeqCst);
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        self.eprint(format!("{} {}", "ℹ".cyan(), message));
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        self.eprint(format!("{} {}", "✓".green(), message));
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        self.eprint(format!("{} {}", "⚠".yellow(), message));
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        self.eprint(format!("{} {}", "✗".red(), message));
    }

    /// Print above a running spinner instead of through it
    fn eprint(&self, line: String) {
        match &self.spinner {
            Some(spinner) => spinner.suspend(|| eprintln!("{}", line)),
            None => eprintln!("{}", line),
        }
    }

    /// Output text to stdout (paths, config values, raw replies)
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// Output text to stdout without newline
    pub fn output_inline(&self, text: &str) {
        print!("{}", text);
        let _ = io::stdout().flush();
    }

    /// Format an amplitude as a bar plus its dBFS reading
    pub fn format_level(&self, level: Amplitude) -> String {
        let filled = ((level.value() as f64) * METER_WIDTH as f64).round() as usize;
        let filled = filled.min(METER_WIDTH);
        let bar = "█".repeat(filled);
        let bar = if level.value() >= 0.9 {
            bar.red()
        } else if level.value() >= 0.5 {
            bar.yellow()
        } else {
            bar.green()
        };
        format!(
            "[{}{}] {:>6.1} dB",
            bar,
            "░".repeat(METER_WIDTH - filled),
            level.dbfs()
        )
    }

    /// Format elapsed recording time, with the limit when one is set
    pub fn format_elapsed(&self, elapsed_ms: u64, limit_ms: Option<u64>) -> String {
        let elapsed = format_clock(elapsed_ms);
        match limit_ms {
            Some(limit) => format!("{} / {}", elapsed, format_clock(limit)),
            None => elapsed,
        }
    }

    /// Show the recording spinner
    pub fn show_recording_progress(&mut self, message: &str) {
        self.start_spinner(message);
    }

    /// Update recording line with time and level
    pub fn update_recording_progress(
        &self,
        paused: bool,
        elapsed_ms: u64,
        limit_ms: Option<u64>,
        level: Option<Amplitude>,
    ) {
        let label = if paused {
            "Paused".yellow().to_string()
        } else {
            "Recording".to_string()
        };
        let mut line = format!("{} {}", label, self.format_elapsed(elapsed_ms, limit_ms));
        if let Some(level) = level {
            line.push(' ');
            line.push_str(&self.format_level(level));
        }
        self.update_spinner(&line);
    }

    /// Print daemon status
    pub fn daemon_status(&self, state: &str) {
        self.eprint(format!("{} Daemon: {}", "●".cyan(), state));
    }

    /// Print a key-value pair (for config list)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}

fn format_clock(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

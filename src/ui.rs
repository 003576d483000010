//! Display sinks for generation progress.
//!
//! The controller only talks to the [`DisplaySink`] trait. [`TerminalSink`]
//! renders it with an `indicatif` spinner/bar and `console` colours.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::state_machine::{GenerationReport, JobOutcome};

/// Progress indicator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Busy, with no idea how far along.
    Indeterminate,
    /// Percentage in `0..=100`. 100 means finished, not necessarily successful.
    Percent(u8),
}

/// Receives status text and progress updates for one job.
pub trait DisplaySink {
    fn set_message(&mut self, text: &str);
    fn set_progress(&mut self, progress: Progress);
}

/// Terminal rendering of a job's progress.
pub struct TerminalSink {
    pb: ProgressBar,
    green: Style,
    red: Style,
}

impl TerminalSink {
    pub fn new(label: &str) -> Self {
        let pb = ProgressBar::new(100);
        pb.set_prefix(label.to_string());

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
        }
    }

    /// Clear the bar and print the final result of the job.
    pub fn complete(&self, outcome: &JobOutcome) {
        self.pb.finish_and_clear();
        match outcome {
            JobOutcome::Success(link) => {
                println!("  {} Part ready: {link}", self.green.apply_to("✓"));
            }
            JobOutcome::Failure(kind) => {
                println!("  {} Generation failed: {kind}", self.red.apply_to("✗"));
            }
        }
    }

    /// Print a generation report as JSON.
    pub fn print_report(&self, report: &GenerationReport) {
        let style = if report.succeeded { &self.green } else { &self.red };
        println!();
        println!("{}", style.apply_to("─── Generation Report ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(report).unwrap_or_default()
        );
    }
}

impl DisplaySink for TerminalSink {
    fn set_message(&mut self, text: &str) {
        self.pb.set_message(text.to_string());
    }

    fn set_progress(&mut self, progress: Progress) {
        match progress {
            Progress::Indeterminate => {
                self.pb.set_style(
                    ProgressStyle::with_template("{spinner:.cyan} {prefix} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                self.pb.enable_steady_tick(std::time::Duration::from_millis(100));
            }
            Progress::Percent(pct) => {
                self.pb.disable_steady_tick();
                self.pb.set_style(
                    ProgressStyle::with_template("{prefix} [{bar:30.cyan/blue}] {pos}% {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                self.pb.set_position(u64::from(pct.min(100)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_sink_tracks_position() {
        let mut sink = TerminalSink::new("test");
        sink.pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        sink.set_progress(Progress::Indeterminate);
        sink.set_message("Working...");
        sink.set_progress(Progress::Percent(100));
        assert_eq!(sink.pb.position(), 100);
        assert_eq!(sink.pb.message(), "Working...");
    }

    #[test]
    fn percent_is_clamped() {
        let mut sink = TerminalSink::new("test");
        sink.pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        sink.set_progress(Progress::Percent(250));
        assert_eq!(sink.pb.position(), 100);
    }
}

//! Progress bar and logging utilities.
//!
//! Provides helpers for creating progress bars and spinners, with support
//! for log-only mode where progress bars are hidden for tail-friendly output.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::pipeline::{Phase, Progress};

/// Global flag for log-only mode (set from args in main)
pub static LOG_ONLY: AtomicBool = AtomicBool::new(false);

/// Set log-only mode globally
pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

/// Check if log-only mode is enabled
pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// Format duration in human-readable format
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = secs / 60.0;
        format!("{:.1}m", mins)
    }
}

/// Create a progress bar with consistent styling.
/// In log-only mode, the progress bar is hidden.
pub fn create_progress_bar(len: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
    }
    pb.set_message(msg.to_string());
    pb
}

/// Create a spinner for indeterminate progress.
/// In log-only mode, the spinner is hidden.
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{msg} {spinner} [{elapsed_precise}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb.set_message(msg.to_string());
    pb
}

/// One tail-friendly progress line.
pub fn progress_line(p: &Progress) -> String {
    let pct = if p.total == 0 {
        100.0
    } else {
        100.0 * p.processed as f64 / p.total as f64
    };
    format!(
        "[{}] {}/{} ({:.1}%) | Exact: {} | Identity: {} | Mismatches: {} | Rate: {:.1}/sec | ETA: {}",
        p.phase.label(),
        p.processed,
        p.total,
        pct,
        p.exact,
        p.identity,
        p.mismatches,
        p.rate(),
        format_duration(p.eta()),
    )
}

/// Drive a progress bar from pipeline progress reports.
/// In log-only mode, prints a line per report instead.
pub fn report(pb: &ProgressBar, p: &Progress) {
    match p.phase {
        Phase::ProcessRecords => {
            pb.set_position(p.processed as u64);
            if is_log_only() {
                eprintln!("{}", progress_line(p));
            }
        }
        Phase::BuildIndex | Phase::Aggregate => {
            pb.set_message(format!("Phase: {}", p.phase.label()));
            if is_log_only() {
                eprintln!("[{}] started", p.phase.label());
            }
        }
        Phase::Done => {
            pb.finish_with_message(format!(
                "Matched {} records in {}",
                p.processed,
                format_duration(p.elapsed)
            ));
            if is_log_only() {
                eprintln!("{}", progress_line(p));
            }
        }
    }
}

//! Progress reporting for long-running operations
//!
//! Bars are drawn on stderr through indicatif and hidden entirely when
//! progress is disabled, so callers can update them unconditionally.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Style for bars with a known length
pub const DEFAULT_MAIN_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({per_sec}) {msg}";

/// Style for row counters without a known length
pub const DEFAULT_COUNTER_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {human_pos} rows ({per_sec}) {msg}";

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// Create a bar for `length` steps, hidden when `visible` is false
#[must_use]
pub fn create_main_progress_bar(length: u64, description: Option<&str>, visible: bool) -> ProgressBar {
    let pb = if visible {
        ProgressBar::new(length)
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(style(DEFAULT_MAIN_TEMPLATE));

    if let Some(desc) = description {
        pb.set_message(desc.to_string());
    }

    pb
}

/// Create an open-ended row counter, hidden when `visible` is false
#[must_use]
pub fn create_row_counter(description: &str, visible: bool) -> ProgressBar {
    let pb = if visible {
        ProgressBar::new_spinner()
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(style(DEFAULT_COUNTER_TEMPLATE));
    pb.set_message(description.to_string());
    pb
}

/// Multi-bar container for concurrent workers
#[must_use]
pub fn create_multi_progress(visible: bool) -> MultiProgress {
    if visible {
        MultiProgress::new()
    } else {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }
}

/// Finish a progress bar with an optional completion message
pub fn finish_progress_bar(pb: &ProgressBar, message: Option<&str>) {
    if let Some(msg) = message {
        pb.finish_with_message(msg.to_string());
    } else {
        pb.finish();
    }
}

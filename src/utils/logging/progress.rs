//! Progress reporting for the pipeline stages, using the indicatif crate.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Default style for the stage progress bar
pub const DEFAULT_STAGE_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Create the progress bar that tracks pipeline stages
///
/// Draws to stderr; indicatif hides it automatically when stderr is not a terminal.
#[must_use]
pub fn create_stage_progress_bar(stages: u64) -> ProgressBar {
    let pb = ProgressBar::with_draw_target(Some(stages), ProgressDrawTarget::stderr());
    let style = ProgressStyle::default_bar()
        .template(DEFAULT_STAGE_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Create a progress bar that never draws, for library callers and tests
#[must_use]
pub fn create_hidden_progress_bar(stages: u64) -> ProgressBar {
    ProgressBar::with_draw_target(Some(stages), ProgressDrawTarget::hidden())
}

/// Advance to the next stage with a message
pub fn advance_stage(pb: &ProgressBar, message: &str) {
    pb.set_message(message.to_string());
    pb.inc(1);
}

/// Finish a progress bar with an optional completion message
pub fn finish_progress_bar(pb: &ProgressBar, message: Option<&str>) {
    if let Some(msg) = message {
        pb.finish_with_message(msg.to_string());
    } else {
        pb.finish();
    }
}

//! Logging utilities for output and progress tracking

pub mod log;
pub mod progress;

pub use self::log::{log_operation_complete, log_operation_start, log_stage, log_warning};
pub use progress::{
    advance_stage, create_hidden_progress_bar, create_stage_progress_bar, finish_progress_bar,
};

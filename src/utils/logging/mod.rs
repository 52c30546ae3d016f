//! Logging utilities for stage boundaries and progress tracking

pub mod log;
pub mod progress;

pub use log::{log_operation_complete, log_operation_start, log_skip, log_timing, log_warning};
pub use progress::{
    create_main_progress_bar, create_multi_progress, create_row_counter, finish_progress_bar,
};

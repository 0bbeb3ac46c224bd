//! Output module for reporting on the robot's database
//!
//! This module handles:
//! - Frontier statistics (tasks by status, failing tasks)
//! - Document statistics (body sizes per source)

pub mod stats;

pub use stats::{human_bytes, load_statistics, print_statistics, CrawlStatistics, SizeSummary};

//! Crawler module for fetching and rescheduling frontier tasks
//!
//! This module contains the core robot logic, including:
//! - Conditional HTTP fetching and outcome persistence
//! - The single-worker Idle/Active scheduler loop
//! - An injectable clock for time and sleeps
//! - Plain-text extraction of changed documents
//! - Wiring a full run together

mod clock;
mod coordinator;
mod fetcher;
mod scheduler;
mod text;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{build_fetcher, open_store, run_crawl, seed_store};
pub use fetcher::{build_http_client, FetchOutcome, Fetcher};
pub use scheduler::{RunSummary, Scheduler, SchedulerSettings, StepResult};
pub use text::{extract_text, TextSink};

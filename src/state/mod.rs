//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `TaskStatus`: the persisted status of a frontier task (pending or in progress)
//! - `LoopState`: the scheduler loop's two states (idle or working on a claimed task)

mod loop_state;
mod task_status;

// Re-export main types
pub use loop_state::LoopState;
pub use task_status::TaskStatus;

//! URL handling module for Recrawl-Robot
//!
//! This module provides URL normalization: the canonical string form of a URL
//! that the frontier and the document store use as their deduplication key.

mod normalize;

// Re-export main functions
pub use normalize::{is_tracking_param, normalize_url};

//! Statistics generation from the robot database
//!
//! This module provides functionality for extracting and displaying
//! frontier and document statistics from the storage layer.

use crate::state::TaskStatus;
use crate::storage::Storage;
use crate::RobotError;
use std::collections::BTreeMap;

/// Size distribution of a set of stored bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeSummary {
    pub documents: u64,
    pub total_bytes: u64,
    pub min: u64,
    pub median: u64,
    pub mean: u64,
    pub max: u64,
}

impl SizeSummary {
    /// Summarizes `sizes`; `None` when there are no sizes
    pub fn from_sizes(sizes: &[u64]) -> Option<Self> {
        if sizes.is_empty() {
            return None;
        }

        let mut sorted = sizes.to_vec();
        sorted.sort_unstable();

        let count = sorted.len();
        let total: u64 = sorted.iter().sum();
        let median = if count % 2 == 1 {
            sorted[count / 2]
        } else {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2
        };

        Some(Self {
            documents: count as u64,
            total_bytes: total,
            min: sorted[0],
            median,
            mean: total / count as u64,
            max: sorted[count - 1],
        })
    }
}

/// Robot statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Total number of frontier tasks
    pub total_tasks: u64,

    /// Count of tasks by status
    pub tasks_by_status: BTreeMap<TaskStatus, u64>,

    /// Tasks whose most recent attempt failed
    pub failing_tasks: u64,

    /// Total number of stored documents
    pub total_documents: u64,

    /// Body sizes per source
    pub sizes_by_source: BTreeMap<String, SizeSummary>,

    /// Body sizes across all sources
    pub overall_sizes: Option<SizeSummary>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(RobotError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<CrawlStatistics, RobotError> {
    let total_tasks = storage.count_tasks()?;

    let mut tasks_by_status = BTreeMap::new();
    for status in TaskStatus::all_statuses() {
        tasks_by_status.insert(status, storage.count_tasks_by_status(status)?);
    }

    let failing_tasks = storage.count_failing_tasks()?;
    let total_documents = storage.count_documents()?;

    let raw_sizes = storage.document_sizes_by_source()?;
    let all_sizes: Vec<u64> = raw_sizes.values().flatten().copied().collect();
    let sizes_by_source = raw_sizes
        .iter()
        .filter_map(|(source, sizes)| {
            SizeSummary::from_sizes(sizes).map(|summary| (source.clone(), summary))
        })
        .collect();

    Ok(CrawlStatistics {
        total_tasks,
        tasks_by_status,
        failing_tasks,
        total_documents,
        sizes_by_source,
        overall_sizes: SizeSummary::from_sizes(&all_sizes),
    })
}

/// Formats a byte count, adding a scaled unit for counts of 1 KB and more
///
/// `512` gives `"512 B"`, `2048` gives `"2048 B (2.00 KB)"`.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{} B ({:.2} {})", bytes, value, UNITS[unit])
    }
}

fn print_sizes(title: &str, sizes: &SizeSummary) {
    println!("{}:", title);
    println!("  documents: {}", sizes.documents);
    println!("  total:     {}", human_bytes(sizes.total_bytes));
    println!("  min:       {}", human_bytes(sizes.min));
    println!("  median:    {}", human_bytes(sizes.median));
    println!("  mean:      {}", human_bytes(sizes.mean));
    println!("  max:       {}", human_bytes(sizes.max));
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Robot Statistics ===\n");

    println!("Frontier:");
    println!("  Total tasks: {}", stats.total_tasks);
    for (status, count) in &stats.tasks_by_status {
        println!("  {}: {}", status, count);
    }
    println!("  Failing (tries > 0): {}", stats.failing_tasks);
    println!();

    println!("Documents:");
    println!("  Stored documents: {}", stats.total_documents);
    println!();

    for (source, sizes) in &stats.sizes_by_source {
        print_sizes(&format!("Source '{}'", source), sizes);
        println!();
    }

    match &stats.overall_sizes {
        Some(sizes) => print_sizes("All sources", sizes),
        None => println!("All sources: no documents stored yet"),
    }
}

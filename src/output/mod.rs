//! Output module for reporting on crawl results
//!
//! This module handles:
//! - Reading partition statistics for the `--stats` mode
//! - Printing them in a human-readable form

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics, PartitionStatistics};

//! Statistics over the partition directory
//!
//! This module reads every worker partition and summarizes what the fleet has
//! captured so far. It never rewrites or merges partitions.

use crate::storage::{read_records, StorageError};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Statistics for one partition file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionStatistics {
    /// Worker ordinal parsed from the file name
    pub ordinal: usize,

    pub path: PathBuf,

    /// Records in the file
    pub records: usize,

    /// Records without a certificate number
    pub missing_ids: usize,

    /// Set when the file could not be read or parsed
    pub error: Option<String>,
}

/// Statistics for a whole partition directory
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Primary partitions, ordered by ordinal
    pub partitions: Vec<PartitionStatistics>,

    /// Backup partitions, ordered by ordinal
    pub backups: Vec<PartitionStatistics>,

    /// Records across all primary partitions
    pub total_records: usize,

    /// Distinct certificate numbers across all primary partitions
    pub unique_ids: usize,
}

impl CrawlStatistics {
    /// Records that appear in more than one partition
    pub fn cross_partition_duplicates(&self) -> usize {
        let identified: usize = self
            .partitions
            .iter()
            .map(|p| p.records - p.missing_ids)
            .sum();
        identified.saturating_sub(self.unique_ids)
    }
}

/// Classification of a file in the partition directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartitionKind {
    Primary(usize),
    Backup(usize),
}

fn classify_file_name(name: &str) -> Option<PartitionKind> {
    let stem = name.strip_suffix(".json")?;
    match stem.strip_prefix("backup_") {
        Some(ordinal) => ordinal.parse().ok().map(PartitionKind::Backup),
        None => stem.parse().ok().map(PartitionKind::Primary),
    }
}

/// Loads statistics from a partition directory
///
/// # Arguments
///
/// * `dir` - The output directory holding `<ordinal>.json` partitions
/// * `id_label` - Certification label holding the certificate number
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Statistics; an absent directory yields none
/// * `Err(StorageError)` - The directory could not be listed
pub fn load_statistics(dir: &Path, id_label: &str) -> Result<CrawlStatistics, StorageError> {
    let mut stats = CrawlStatistics::default();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(stats),
        Err(e) => return Err(e.into()),
    };

    let mut unique = HashSet::new();

    for entry in entries {
        let path = entry?.path();
        let Some(kind) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(classify_file_name)
        else {
            continue;
        };

        let ordinal = match kind {
            PartitionKind::Primary(ordinal) | PartitionKind::Backup(ordinal) => ordinal,
        };
        let mut partition = PartitionStatistics {
            ordinal,
            path: path.clone(),
            records: 0,
            missing_ids: 0,
            error: None,
        };

        match read_records(&path) {
            Ok(records) => {
                for record in records.unwrap_or_default() {
                    partition.records += 1;
                    match record.certificate_number(id_label) {
                        Some(id) => {
                            if matches!(kind, PartitionKind::Primary(_)) {
                                unique.insert(id);
                            }
                        }
                        None => partition.missing_ids += 1,
                    }
                }
            }
            Err(e) => partition.error = Some(e.to_string()),
        }

        match kind {
            PartitionKind::Primary(_) => {
                stats.total_records += partition.records;
                stats.partitions.push(partition);
            }
            PartitionKind::Backup(_) => stats.backups.push(partition),
        }
    }

    stats.partitions.sort_by_key(|p| p.ordinal);
    stats.backups.sort_by_key(|p| p.ordinal);
    stats.unique_ids = unique.len();

    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Partition Statistics ===\n");

    println!("Overview:");
    println!("  Partitions: {}", stats.partitions.len());
    println!("  Total records: {}", stats.total_records);
    println!("  Unique certificate numbers: {}", stats.unique_ids);
    println!(
        "  Records shared between partitions: {}",
        stats.cross_partition_duplicates()
    );
    println!();

    println!("Partitions:");
    for partition in &stats.partitions {
        print_partition(partition);
    }
    println!();

    if !stats.backups.is_empty() {
        println!("Backup Files ({}):", stats.backups.len());
        for partition in &stats.backups {
            print_partition(partition);
        }
        println!();
    }
}

fn print_partition(partition: &PartitionStatistics) {
    match &partition.error {
        Some(error) => println!(
            "  {:>3}  {}  unreadable: {}",
            partition.ordinal,
            partition.path.display(),
            error
        ),
        None => println!(
            "  {:>3}  {}  {} records ({} without id)",
            partition.ordinal,
            partition.path.display(),
            partition.records,
            partition.missing_ids
        ),
    }
}

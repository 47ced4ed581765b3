//! Integration tests for the crawler
//!
//! These tests drive real workers and fleets against a scripted in-memory
//! site (`mock`), checking traversal, resume positioning, persistence and
//! failure handling end-to-end.

mod fleet_tests;
mod mock;
mod worker_tests;

use kc_certcrawl::config::Config;
use kc_certcrawl::storage::{new_persist_lock, Record, RecordStore};
use std::path::Path;

/// Creates a test configuration writing under `dir` with no politeness delay
pub fn create_test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.crawler.politeness_delay_ms = 0;
    config.crawler.wait_timeout_secs = 1;
    config.crawler.shutdown_grace_secs = 1;
    config.output.directory = dir.join("output");
    config.output.log_directory = dir.join("logs");
    config
}

/// Builds a record carrying only a certificate number
pub fn record_with_id(id: &str) -> Record {
    let mut record = Record::default();
    record
        .certification_info
        .insert("인증번호".to_string(), id.to_string());
    record
}

/// Writes `ids` into the partition of worker `ordinal`
pub fn seed_partition(config: &Config, ordinal: usize, ids: &[String]) {
    let mut store = open_store(config, ordinal);
    for id in ids {
        store.append_and_persist(record_with_id(id));
    }
}

/// Opens and loads the partition of worker `ordinal`
pub fn load_partition(config: &Config, ordinal: usize) -> RecordStore {
    let mut store = open_store(config, ordinal);
    store.load().unwrap();
    store
}

fn open_store(config: &Config, ordinal: usize) -> RecordStore {
    RecordStore::new(
        config.output.partition_path(ordinal),
        config.schema.id_label.clone(),
        new_persist_lock(),
    )
}

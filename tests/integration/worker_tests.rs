use crate::mock::{listing, Control, MockNavigator, SharedSite, SiteState};
use crate::{create_test_config, load_partition, seed_partition};
use kc_certcrawl::config::Config;
use kc_certcrawl::crawler::{Worker, WorkerReport, WorkerSettings};
use kc_certcrawl::state::{Direction, ExitReason, WorkerState};
use kc_certcrawl::storage::{new_persist_lock, RecordStore};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn shared_site(pages: Vec<Vec<String>>) -> SharedSite {
    Arc::new(Mutex::new(SiteState::new(pages)))
}

fn build_worker(
    config: &Config,
    ordinal: usize,
    direction: Direction,
    site: &SharedSite,
    cancel: CancellationToken,
) -> Worker<MockNavigator> {
    let settings = WorkerSettings::from_config(config, ordinal, direction);
    let store = RecordStore::new(
        config.output.partition_path(ordinal),
        config.schema.id_label.clone(),
        new_persist_lock(),
    );
    Worker::new(settings, MockNavigator::new(site.clone()), store, cancel)
}

async fn run_worker(
    config: &Config,
    ordinal: usize,
    direction: Direction,
    site: &SharedSite,
) -> WorkerReport {
    build_worker(config, ordinal, direction, site, CancellationToken::new())
        .run()
        .await
}

fn sweep_config(dir: &TempDir, page_size: usize) -> Config {
    let mut config = create_test_config(dir.path());
    config.crawler.page_size = page_size;
    config.crawler.sweep = true;
    config
}

#[tokio::test]
async fn test_end_to_end_skips_known_row() {
    let dir = TempDir::new().unwrap();
    let config = sweep_config(&dir, 3);

    // One page of three rows; the middle one is already captured
    let site = shared_site(listing(1, 3));
    seed_partition(&config, 0, &["P0-R1".to_string()]);

    let report = run_worker(&config, 0, Direction::Forward, &site).await;

    assert_eq!(report.final_state, WorkerState::Terminated);
    assert_eq!(report.exit, ExitReason::EndOfListing);
    assert_eq!(report.loaded, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.accepted, 2);
    assert_eq!(report.pages_advanced, 0);

    let site = site.lock().unwrap();
    assert_eq!(site.row_clicks(), vec!["P0-R0", "P0-R2"]);
    assert!(site.shut_down);

    // The known row is a seeded record, so the run itself added exactly two
    let store = load_partition(&config, 0);
    assert_eq!(store.len() - report.loaded, 2);
    assert_eq!(store.len(), 3);
    assert!(store.contains("p0-r0"));
    assert!(store.contains("p0-r2"));
    assert_eq!(store.records()[1].factories[0].factory_name, "PLANT P0-R0");
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let config = sweep_config(&dir, 3);

    let first = run_worker(&config, 0, Direction::Forward, &shared_site(listing(2, 3))).await;
    assert_eq!(first.accepted, 6);
    assert_eq!(first.pages_advanced, 1);

    let site = shared_site(listing(2, 3));
    let second = run_worker(&config, 0, Direction::Forward, &site).await;
    assert_eq!(second.loaded, 6);
    assert_eq!(second.accepted, 0);
    assert_eq!(second.skipped, 6);
    assert!(site.lock().unwrap().row_clicks().is_empty());

    assert_eq!(load_partition(&config, 0).len(), 6);
}

#[tokio::test]
async fn test_single_slot_worker_walks_forward() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let site = shared_site(listing(3, 10));

    // Ordinal 13 maps onto slot 3
    let report = run_worker(&config, 13, Direction::Forward, &site).await;

    assert_eq!(report.exit, ExitReason::EndOfListing);
    assert_eq!(report.accepted, 3);
    assert_eq!(report.pages_advanced, 2);

    let site = site.lock().unwrap();
    assert_eq!(site.row_clicks(), vec!["P0-R3", "P1-R3", "P2-R3"]);
    assert_eq!(site.control_clicks(Control::Next), 2);
    assert_eq!(site.control_clicks(Control::Last), 0);
}

#[tokio::test]
async fn test_backward_worker_starts_on_last_page() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let site = shared_site(listing(3, 10));

    let report = run_worker(&config, 2, Direction::Backward, &site).await;

    assert_eq!(report.exit, ExitReason::EndOfListing);
    assert_eq!(report.accepted, 3);

    let site = site.lock().unwrap();
    assert_eq!(site.control_clicks(Control::Last), 1);
    assert_eq!(site.control_clicks(Control::Previous), 2);
    assert_eq!(site.row_clicks(), vec!["P2-R2", "P1-R2", "P0-R2"]);
}

#[tokio::test]
async fn test_resume_replays_jump_cycles() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let site = shared_site(listing(25, 10));

    // 12 saved records with page size 10: one jump cycle
    let saved: Vec<String> = (0..12).map(|i| format!("OLD-{}", i)).collect();
    seed_partition(&config, 0, &saved);

    let report = run_worker(&config, 0, Direction::Forward, &site).await;

    assert_eq!(report.exit, ExitReason::EndOfListing);
    assert_eq!(report.loaded, 12);

    let site = site.lock().unwrap();
    assert_eq!(site.control_clicks(Control::NextBlock), 1);

    // Block jump to page 10, one step to page 11, then iterate to the end
    let clicked = site.row_clicks();
    assert_eq!(clicked.first().map(String::as_str), Some("P11-R0"));
    assert_eq!(clicked.len(), 14);
    assert_eq!(report.accepted, 14);
}

#[tokio::test]
async fn test_resume_below_page_size_is_noop() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let site = shared_site(listing(2, 10));

    let saved: Vec<String> = (0..9).map(|i| format!("OLD-{}", i)).collect();
    seed_partition(&config, 0, &saved);

    run_worker(&config, 0, Direction::Forward, &site).await;

    let site = site.lock().unwrap();
    assert_eq!(site.control_clicks(Control::NextBlock), 0);
    assert_eq!(site.row_clicks().first().map(String::as_str), Some("P0-R0"));
}

#[tokio::test]
async fn test_backward_resume_uses_block_first_page() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let site = shared_site(listing(25, 10));

    let saved: Vec<String> = (0..20).map(|i| format!("OLD-{}", i)).collect();
    seed_partition(&config, 4, &saved);

    let report = run_worker(&config, 4, Direction::Backward, &site).await;
    assert_eq!(report.exit, ExitReason::EndOfListing);

    let site = site.lock().unwrap();
    assert_eq!(site.control_clicks(Control::BlockFirst), 2);
    // Last page 24 -> block start 20 -> 19 -> block start 10 -> 9
    assert_eq!(site.row_clicks().first().map(String::as_str), Some("P9-R4"));
}

#[tokio::test]
async fn test_positioning_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let site = shared_site(listing(25, 10));
    site.lock()
        .unwrap()
        .missing_controls
        .insert(Control::NextBlock);

    let saved: Vec<String> = (0..10).map(|i| format!("OLD-{}", i)).collect();
    seed_partition(&config, 0, &saved);

    let report = run_worker(&config, 0, Direction::Forward, &site).await;

    assert!(matches!(report.exit, ExitReason::PositioningFailed(_)));
    assert_eq!(report.final_state, WorkerState::Terminated);
    assert_eq!(report.accepted, 0);

    let site = site.lock().unwrap();
    assert!(site.row_clicks().is_empty());
    assert!(site.shut_down);
}

#[tokio::test]
async fn test_window_closed_terminates_worker() {
    let dir = TempDir::new().unwrap();
    let config = sweep_config(&dir, 3);
    let site = shared_site(listing(3, 3));
    site.lock()
        .unwrap()
        .closing_rows
        .insert("P0-R1".to_string());

    let report = run_worker(&config, 0, Direction::Forward, &site).await;

    assert!(matches!(report.exit, ExitReason::SessionClosed(_)));
    assert_eq!(report.final_state, WorkerState::Terminated);
    assert_eq!(report.accepted, 1);
    assert_eq!(report.pages_advanced, 0);

    // The record captured before the window closed is on disk
    assert_eq!(load_partition(&config, 0).len(), 1);
}

#[tokio::test]
async fn test_element_not_found_is_recoverable() {
    let dir = TempDir::new().unwrap();
    let config = sweep_config(&dir, 3);
    let site = shared_site(listing(2, 3));
    site.lock()
        .unwrap()
        .unreadable_rows
        .insert("P0-R1".to_string());

    let report = run_worker(&config, 0, Direction::Forward, &site).await;

    assert_eq!(report.exit, ExitReason::EndOfListing);
    assert_eq!(report.accepted, 5);
    assert_eq!(report.pages_advanced, 1);
    assert!(!load_partition(&config, 0).contains("p0-r1"));
}

#[tokio::test]
async fn test_failed_return_to_listing_is_retried() {
    let dir = TempDir::new().unwrap();
    let config = sweep_config(&dir, 3);
    let site = shared_site(listing(5, 3));
    site.lock().unwrap().failing_back = 1;

    let report = run_worker(&config, 0, Direction::Forward, &site).await;

    assert_eq!(report.exit, ExitReason::EndOfListing);
    assert_eq!(report.accepted, 15);
    assert_eq!(report.pages_advanced, 4);
    assert_eq!(site.lock().unwrap().row_clicks().len(), 15);
    assert_eq!(load_partition(&config, 0).len(), 15);
}

#[tokio::test]
async fn test_record_counted_when_return_trip_fails() {
    let dir = TempDir::new().unwrap();
    let config = sweep_config(&dir, 3);
    let site = shared_site(listing(5, 3));
    site.lock().unwrap().failing_back = 2;

    let report = run_worker(&config, 0, Direction::Forward, &site).await;

    // Stranded on the detail page: the rest of the page and the step fail
    assert_eq!(report.exit, ExitReason::EndOfListing);
    assert_eq!(report.pages_advanced, 0);

    let on_disk = load_partition(&config, 0).len();
    assert_eq!(on_disk, 1);
    assert_eq!(report.accepted, on_disk);
    assert_eq!(report.total_records(), on_disk);
}

#[tokio::test]
async fn test_detail_without_id_is_not_persisted() {
    let dir = TempDir::new().unwrap();
    let config = sweep_config(&dir, 3);
    let site = shared_site(listing(1, 3));
    site.lock()
        .unwrap()
        .blank_details
        .insert("P0-R0".to_string());

    let report = run_worker(&config, 0, Direction::Forward, &site).await;

    assert_eq!(report.accepted, 2);
    assert_eq!(site.lock().unwrap().row_clicks().len(), 3);
    assert_eq!(load_partition(&config, 0).len(), 2);
}

#[tokio::test]
async fn test_slot_beyond_row_count() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let site = shared_site(listing(2, 3));

    let report = run_worker(&config, 5, Direction::Forward, &site).await;

    assert_eq!(report.exit, ExitReason::EndOfListing);
    assert_eq!(report.accepted, 0);
    assert_eq!(report.pages_advanced, 1);
}

#[tokio::test]
async fn test_cancellation_interrupts_worker() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let site = shared_site(listing(2, 10));
    site.lock().unwrap().hang_on_rows = true;

    let cancel = CancellationToken::new();
    let worker = build_worker(&config, 0, Direction::Forward, &site, cancel.clone());
    let handle = tokio::spawn(worker.run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let report = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.exit, ExitReason::Interrupted);
    assert_eq!(report.final_state, WorkerState::Terminated);
    assert!(site.lock().unwrap().shut_down);
}

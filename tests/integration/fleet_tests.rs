use crate::mock::{listing, MockFactory, SharedSite, SiteState};
use crate::{create_test_config, load_partition};
use kc_certcrawl::crawler::Fleet;
use kc_certcrawl::state::{Direction, ExitReason, WorkerState};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn sites(count: usize, pages: usize, per_page: usize) -> Vec<SharedSite> {
    (0..count)
        .map(|_| Arc::new(Mutex::new(SiteState::new(listing(pages, per_page)))))
        .collect()
}

#[tokio::test]
async fn test_fleet_runs_both_directions() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path());
    config.crawler.direction_split = 1;
    config.crawler.below_split = Direction::Forward;

    let factory = MockFactory::new(sites(2, 2, 10));
    let fleet = Fleet::new(config.clone(), factory).with_ctrl_c(false);
    let summary = fleet.run(2).await;

    assert!(!summary.interrupted);
    assert_eq!(summary.reports.len(), 2);
    assert_eq!(summary.reports[0].direction, Direction::Forward);
    assert_eq!(summary.reports[1].direction, Direction::Backward);
    for report in &summary.reports {
        assert_eq!(report.final_state, WorkerState::Terminated);
        assert_eq!(report.exit, ExitReason::EndOfListing);
        assert_eq!(report.accepted, 2);
    }
    assert_eq!(summary.total_accepted(), 4);

    // Each worker wrote only its own partition
    let first = load_partition(&config, 0);
    assert!(first.contains("p0-r0"));
    assert!(first.contains("p1-r0"));
    let second = load_partition(&config, 1);
    assert!(second.contains("p1-r1"));
    assert!(second.contains("p0-r1"));
    assert!(!second.contains("p0-r0"));

    // Each worker has its own log folder
    let log_dir = config.output.worker_log_dir(1);
    assert!(std::fs::read_dir(log_dir).unwrap().next().is_some());
}

#[tokio::test]
async fn test_fleet_session_failure_is_isolated() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());

    let mut factory = MockFactory::new(sites(2, 1, 10));
    factory.refused.insert(1);
    let summary = Fleet::new(config, factory).with_ctrl_c(false).run(2).await;

    assert_eq!(summary.reports.len(), 2);
    assert_eq!(summary.reports[0].exit, ExitReason::EndOfListing);
    assert_eq!(summary.reports[0].accepted, 1);
    assert!(matches!(summary.reports[1].exit, ExitReason::StartFailed(_)));
    assert_eq!(summary.reports[1].final_state, WorkerState::Terminated);
}

#[tokio::test]
async fn test_fleet_shutdown_interrupts_every_worker() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());

    let sites = sites(3, 2, 10);
    for site in &sites {
        site.lock().unwrap().hang_on_rows = true;
    }
    let fleet = Fleet::new(config, MockFactory::new(sites.clone())).with_ctrl_c(false);

    let shutdown = fleet.shutdown_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
    });

    let summary = tokio::time::timeout(Duration::from_secs(5), fleet.run(3))
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.reports.len(), 3);
    for report in &summary.reports {
        assert_eq!(report.exit, ExitReason::Interrupted);
        assert_eq!(report.final_state, WorkerState::Terminated);
    }
    for site in &sites {
        assert!(site.lock().unwrap().shut_down);
    }
}

#[tokio::test]
async fn test_fleet_clamps_worker_count() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());

    let summary = Fleet::new(config, MockFactory::new(sites(20, 1, 10)))
        .with_ctrl_c(false)
        .run(50)
        .await;

    assert_eq!(summary.reports.len(), 20);
    let ordinals: Vec<usize> = summary.reports.iter().map(|r| r.ordinal).collect();
    assert_eq!(ordinals, (0..20).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_fleet_leaves_slow_workers_running_after_grace() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path());
    config.crawler.wait_timeout_secs = 5;

    let sites = sites(1, 2, 10);
    {
        let mut site = sites[0].lock().unwrap();
        site.hang_on_rows = true;
        site.shutdown_delay = Some(Duration::from_secs(2));
    }
    let fleet = Fleet::new(config, MockFactory::new(sites.clone())).with_ctrl_c(false);

    let shutdown = fleet.shutdown_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
    });

    // The fleet stops waiting after the 1s grace period
    let summary = tokio::time::timeout(Duration::from_secs(5), fleet.run(1))
        .await
        .unwrap();
    assert!(summary.interrupted);
    assert!(summary.reports.is_empty());
    assert!(!sites[0].lock().unwrap().shut_down);

    // The worker was not aborted and still releases its session
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(sites[0].lock().unwrap().shut_down);
}

mod harness;

use std::sync::Arc;

use harness::config::ConfigBuilder;
use harness::mock_provider::MockProvider;
use switchyard_core::{CompletionRequest, ErrorKind};
use switchyard_ledger::CostFilter;
use switchyard_routing::RoutingOptions;
use tokio_util::sync::CancellationToken;

fn options() -> RoutingOptions {
    RoutingOptions {
        bypass_cache: true,
        ..RoutingOptions::default()
    }
}

fn providers(flaky_fails: bool) -> Vec<Arc<MockProvider>> {
    let flaky = MockProvider::new("flaky");
    let flaky = if flaky_fails { flaky.failing(ErrorKind::Server) } else { flaky };
    vec![flaky.into_arc(), MockProvider::new("steady").into_arc()]
}

fn builder() -> ConfigBuilder {
    ConfigBuilder::new()
        .with_provider("flaky", 0.5, 0.7)
        .with_provider("steady", 1.0, 0.7)
}

#[tokio::test]
async fn statistics_carry_over_to_a_new_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("stats.json");
    let config = builder().build("strategy = \"cost_optimized\"");

    let engine = harness::engine(&config, &providers(true));
    for _ in 0..3 {
        let report = engine
            .route_and_execute(&CompletionRequest::from_prompt("Summarize the release notes"), &options())
            .await
            .unwrap();
        assert_eq!(report.feedback.provider, "steady");
    }
    engine.save_snapshot(&path).await.unwrap();

    let restarted = harness::engine(&config, &providers(false));
    assert!(restarted.load_snapshot(&path).await.unwrap());

    let failures = engine.health(Some("flaky"))[0].failed_requests;
    assert!(failures > 0);
    assert_eq!(restarted.health(Some("flaky"))[0].failed_requests, failures);
    assert_eq!(restarted.health(Some("steady"))[0].successful_requests, 3);
    assert_eq!(restarted.learning(), engine.learning());
    assert_eq!(restarted.recent_attempts(100).len(), engine.recent_attempts(100).len());

    let filter = CostFilter::default();
    assert!((restarted.total_cost(&filter) - engine.total_cost(&filter)).abs() < 1e-12);
}

#[tokio::test]
async fn missing_snapshot_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let engine = harness::engine(&builder().build(""), &providers(false));

    assert!(!engine.load_snapshot(&dir.path().join("absent.json")).await.unwrap());
    assert_eq!(engine.recent_attempts(10).len(), 0);
}

#[tokio::test]
async fn maintenance_persists_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stats.json");
    let config = builder()
        .with_persistence(&path)
        .build("strategy = \"cost_optimized\"");

    let engine = Arc::new(harness::engine(&config, &providers(false)));
    let shutdown = CancellationToken::new();
    let maintenance = engine.spawn_maintenance(shutdown.clone());

    engine
        .route_and_execute(&CompletionRequest::from_prompt("Draft a changelog entry"), &options())
        .await
        .unwrap();

    shutdown.cancel();
    maintenance.await.unwrap();
    assert!(path.exists());

    let restarted = harness::engine(&config, &providers(false));
    assert!(restarted.load_snapshot(&path).await.unwrap());
    assert_eq!(restarted.health(Some("flaky"))[0].successful_requests, 1);
    assert_eq!(restarted.cost_report(&CostFilter::default()).successful_requests, 1);
}

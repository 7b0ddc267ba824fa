mod harness;

use std::time::Duration;

use harness::config::ConfigBuilder;
use harness::mock_provider::MockProvider;
use switchyard_core::{CompletionRequest, ErrorKind};
use switchyard_engine::EngineError;
use switchyard_ledger::CostFilter;
use switchyard_resilience::ExecutionError;
use switchyard_routing::RoutingOptions;

fn options() -> RoutingOptions {
    RoutingOptions {
        bypass_cache: true,
        ..RoutingOptions::default()
    }
}

fn two_providers() -> ConfigBuilder {
    ConfigBuilder::new()
        .with_provider("primary", 0.5, 0.7)
        .with_provider("backup", 5.0, 0.7)
}

fn request() -> CompletionRequest {
    CompletionRequest::from_prompt("Write unit tests for the tokenizer")
}

#[tokio::test(start_paused = true)]
async fn retries_recover_on_the_same_provider() {
    let config = two_providers()
        .with_retry("max_attempts = 3\ninitial_delay_ms = 100\njitter = false")
        .build("strategy = \"cost_optimized\"");

    let primary = MockProvider::new("primary")
        .script([Some(ErrorKind::Server), Some(ErrorKind::Server)])
        .into_arc();
    let backup = MockProvider::new("backup").into_arc();
    let engine = harness::engine(&config, &[primary.clone(), backup.clone()]);

    let started = tokio::time::Instant::now();
    let report = engine.route_and_execute(&request(), &options()).await.unwrap();

    assert_eq!(report.feedback.provider, "primary");
    assert_eq!(report.feedback.attempts.len(), 1);
    assert_eq!(report.feedback.attempts[0].tries, 3);
    assert_eq!(primary.calls(), 3);
    assert_eq!(backup.calls(), 0);
    // 100ms then 200ms of backoff
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn auth_failures_move_to_the_next_provider() {
    let config = two_providers()
        .with_retry("max_attempts = 3\ninitial_delay_ms = 1")
        .build("strategy = \"cost_optimized\"");

    let primary = MockProvider::new("primary").failing(ErrorKind::Auth).into_arc();
    let engine = harness::engine(&config, &[primary.clone(), MockProvider::new("backup").into_arc()]);

    let report = engine.route_and_execute(&request(), &options()).await.unwrap();

    assert_eq!(report.feedback.provider, "backup");
    // Not retryable, so one call only
    assert_eq!(primary.calls(), 1);
    assert_eq!(report.feedback.attempts[0].error_kind, Some(ErrorKind::Auth));
}

#[tokio::test]
async fn validation_failures_end_the_chain() {
    let config = two_providers().build("strategy = \"cost_optimized\"");

    let backup = MockProvider::new("backup").into_arc();
    let engine = harness::engine(
        &config,
        &[
            MockProvider::new("primary").failing(ErrorKind::Validation).into_arc(),
            backup.clone(),
        ],
    );

    let err = engine.route_and_execute(&request(), &options()).await.unwrap_err();

    let EngineError::Execution(ExecutionError::Rejected { provider, source, .. }) = err else {
        panic!("expected rejection");
    };
    assert_eq!(provider, "primary");
    assert_eq!(source.kind, ErrorKind::Validation);
    assert_eq!(backup.calls(), 0);
}

#[tokio::test]
async fn exhaustion_reports_every_attempt() {
    let config = ConfigBuilder::new()
        .with_provider("a", 0.5, 0.7)
        .with_provider("b", 1.0, 0.7)
        .with_provider("c", 2.0, 0.7)
        .with_section("fallback", "strategy = \"sequential\"")
        .build("strategy = \"cost_optimized\"");

    let engine = harness::engine(
        &config,
        &[
            MockProvider::new("a").failing(ErrorKind::Server).into_arc(),
            MockProvider::new("b").failing(ErrorKind::Network).into_arc(),
            MockProvider::new("c").failing(ErrorKind::Timeout).into_arc(),
        ],
    );

    let err = engine.route_and_execute(&request(), &options()).await.unwrap_err();
    assert!(err.to_string().contains("all providers failed after 3 attempts"));

    let EngineError::Execution(ExecutionError::Exhausted { attempts, last_error }) = err else {
        panic!("expected exhaustion");
    };
    let kinds: Vec<_> = attempts.iter().map(|a| a.error_kind).collect();
    assert_eq!(
        kinds,
        [Some(ErrorKind::Server), Some(ErrorKind::Network), Some(ErrorKind::Timeout)]
    );
    let positions: Vec<u32> = attempts.iter().map(|a| a.position).collect();
    assert_eq!(positions, [1, 2, 3]);
    assert_eq!(last_error.unwrap().kind, ErrorKind::Timeout);

    let stats = engine.attempt_stats();
    assert_eq!(stats["a"].attempts, 1);
    assert!(stats["a"].success_rate.abs() < f64::EPSILON);

    let costs = engine.cost_report(&CostFilter::default());
    assert_eq!(costs.successful_requests, 0);
    assert!(costs.total.cost.abs() < f64::EPSILON);
}

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use switchyard_config::{FallbackStrategy, RoutingStrategy};
use switchyard_core::{Pricing, Provider, ProviderCapabilities};
use switchyard_ledger::AlertKind;
use switchyard_routing::Selector;
use tokio_util::sync::CancellationToken;

use super::*;

struct Mock {
    name: &'static str,
    fail_with: Option<ErrorKind>,
    calls: AtomicU32,
}

impl Mock {
    fn ok(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail_with: None,
            calls: AtomicU32::new(0),
        })
    }

    fn failing(name: &'static str, kind: ErrorKind) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail_with: Some(kind),
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for Mock {
    fn name(&self) -> &str {
        self.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::default()
    }

    fn pricing(&self) -> Pricing {
        Pricing::default()
    }

    async fn execute(&self, _request: &CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(kind) = self.fail_with {
            return Err(ProviderError::new(kind, format!("{} failed", self.name)));
        }
        Ok(CompletionResponse {
            provider: self.name.to_owned(),
            model: "mock-1".to_owned(),
            content: "done".to_owned(),
            usage: Usage {
                input_tokens: 1_000,
                output_tokens: 1_000,
            },
            quality: Some(0.9),
        })
    }
}

const BASE: &str = r#"
[providers.cheap]
input_per_mtok = 0.5
output_per_mtok = 0.5
quality = 0.6

[providers.premium]
input_per_mtok = 10.0
output_per_mtok = 10.0
quality = 0.95

[routing]
strategy = "cost_optimized"
exploration_rate = 0.0

[retry]
max_attempts = 1
jitter = false
"#;

fn engine_with(extra: &str, providers: &[Arc<Mock>]) -> Engine {
    engine_from(&Config::from_toml(&format!("{BASE}\n{extra}")).unwrap(), providers)
}

fn engine_from(config: &Config, providers: &[Arc<Mock>]) -> Engine {
    let registry = Arc::new(ProviderRegistry::new());
    for provider in providers {
        registry.register(Arc::clone(provider) as Arc<dyn Provider>).unwrap();
    }

    let router = Router::new(&config.routing, &config.classifier).with_selector(Selector::with_seed(
        0.0,
        config.routing.fallback_depth,
        7,
    ));
    Engine::new(config, registry).unwrap().with_router(router)
}

fn request() -> CompletionRequest {
    CompletionRequest::from_prompt("Summarize the release notes for the team")
}

fn uncached() -> RoutingOptions {
    RoutingOptions {
        bypass_cache: true,
        ..RoutingOptions::default()
    }
}

#[test]
fn pricing_comes_from_configuration() {
    let engine = engine_with("", &[Mock::ok("cheap"), Mock::ok("premium")]);
    let profile = engine.registry().profile("premium").unwrap();
    assert!((profile.pricing.input_per_mtok - 10.0).abs() < f64::EPSILON);
    assert!((profile.capabilities.quality - 0.95).abs() < f64::EPSILON);
}

#[test]
fn strategy_override_changes_the_winner() {
    let engine = engine_with("", &[Mock::ok("cheap"), Mock::ok("premium")]);

    let decision = engine.route(&request(), &RoutingOptions::default()).unwrap();
    assert_eq!(decision.provider, "cheap");

    let decision = engine
        .route(
            &request(),
            &RoutingOptions {
                strategy: Some(RoutingStrategy::QualityFirst),
                ..RoutingOptions::default()
            },
        )
        .unwrap();
    assert_eq!(decision.provider, "premium");
}

#[test]
fn disabled_providers_are_never_routed() {
    let engine = engine_with(
        "[providers.extra]\ninput_per_mtok = 0.01\noutput_per_mtok = 0.01\nenabled = false\n",
        &[Mock::ok("cheap"), Mock::ok("premium"), Mock::ok("extra")],
    );

    let decision = engine.route(&request(), &RoutingOptions::default()).unwrap();
    assert_eq!(decision.provider, "cheap");
    assert!(!decision.chain().contains(&"extra".to_owned()));
}

#[tokio::test]
async fn executes_and_records_outcome() {
    let cheap = Mock::ok("cheap");
    let engine = engine_with("", &[Arc::clone(&cheap), Mock::ok("premium")]);

    let report = engine.route_and_execute(&request(), &uncached()).await.unwrap();

    assert_eq!(report.response.provider, "cheap");
    assert!(!report.feedback.cache_hit);
    assert_eq!(report.feedback.strategy, Some(FallbackStrategy::Cascade));
    assert!((report.feedback.cost - 0.001).abs() < 1e-12);
    assert_eq!(report.feedback.attempts.len(), 1);
    assert_eq!(cheap.calls(), 1);

    let costs = engine.cost_report(&CostFilter::default());
    assert_eq!(costs.successful_requests, 1);
    assert!((costs.total.cost - 0.001).abs() < 1e-12);

    let learned = engine.learning();
    assert_eq!(learned.provider("cheap").unwrap().successes, 1);

    let health = engine.health(Some("cheap"));
    assert_eq!(health[0].successful_requests, 1);
    assert!(engine.health(Some("premium")).is_empty());
}

#[tokio::test]
async fn falls_back_when_primary_fails() {
    let cheap = Mock::failing("cheap", ErrorKind::Server);
    let premium = Mock::ok("premium");
    let engine = engine_with("", &[Arc::clone(&cheap), Arc::clone(&premium)]);

    let report = engine.route_and_execute(&request(), &uncached()).await.unwrap();

    assert_eq!(report.feedback.provider, "premium");
    assert_eq!(report.feedback.metrics.failed, 1);
    assert_eq!(report.decision.unwrap().provider, "cheap");

    let learned = engine.learning();
    let cheap_stats = learned.provider("cheap").unwrap();
    assert_eq!((cheap_stats.samples, cheap_stats.successes), (1, 0));
    assert_eq!(learned.provider("premium").unwrap().successes, 1);

    assert_eq!(engine.cost_report(&CostFilter::provider("premium")).total.requests, 1);
}

#[tokio::test]
async fn validation_errors_end_the_chain() {
    let premium = Mock::ok("premium");
    let engine = engine_with("", &[Mock::failing("cheap", ErrorKind::Validation), Arc::clone(&premium)]);

    let err = engine.route_and_execute(&request(), &uncached()).await.unwrap_err();

    assert!(matches!(err, EngineError::Execution(ExecutionError::Rejected { .. })));
    assert_eq!(premium.calls(), 0);
}

#[tokio::test]
async fn exhaustion_is_recorded() {
    let engine = engine_with(
        "",
        &[
            Mock::failing("cheap", ErrorKind::Server),
            Mock::failing("premium", ErrorKind::Timeout),
        ],
    );

    let options = RoutingOptions {
        fallback_strategy: Some(FallbackStrategy::Sequential),
        ..uncached()
    };
    let err = engine.route_and_execute(&request(), &options).await.unwrap_err();

    let EngineError::Execution(ExecutionError::Exhausted { attempts, last_error }) = err else {
        panic!("expected exhaustion");
    };
    assert_eq!(attempts.len(), 2);
    assert_eq!(last_error.unwrap().kind, ErrorKind::Timeout);

    let costs = engine.cost_report(&CostFilter::default());
    assert_eq!((costs.total.requests, costs.successful_requests), (1, 0));
    assert_eq!(engine.recent_attempts(10).len(), 2);
}

#[tokio::test]
async fn cache_hit_skips_routing_and_providers() {
    let cheap = Mock::ok("cheap");
    let engine = engine_with("", &[Arc::clone(&cheap), Mock::ok("premium")]);
    let options = RoutingOptions::default();

    engine.route_and_execute(&request(), &options).await.unwrap();
    let hit = engine.route_and_execute(&request(), &options).await.unwrap();

    assert!(hit.feedback.cache_hit);
    assert!(hit.decision.is_none());
    assert_eq!(hit.response.provider, "cheap");
    assert_eq!(cheap.calls(), 1);

    let stats = engine.cache_stats();
    assert_eq!((stats.hits, stats.misses, stats.insertions), (1, 1, 1));
    // Hits are not charged
    assert_eq!(engine.cost_report(&CostFilter::default()).total.requests, 1);

    engine.route_and_execute(&request(), &uncached()).await.unwrap();
    assert_eq!(cheap.calls(), 2);

    assert!(engine.invalidate_cached(&request()).unwrap());
    engine.route_and_execute(&request(), &options).await.unwrap();
    assert_eq!(cheap.calls(), 3);
}

#[tokio::test]
async fn budgets_alert_and_can_be_enforced() {
    let engine = engine_with(
        "[[ledger.budgets]]\nid = \"total\"\nlimit = 0.0015\nwarning_threshold = 50.0\n",
        &[Mock::ok("cheap"), Mock::ok("premium")],
    );
    let mut alerts = engine.subscribe_alerts();

    let first = engine.route_and_execute(&request(), &uncached()).await.unwrap();
    assert_eq!(first.feedback.budget_alerts.len(), 1);
    assert_eq!(first.feedback.budget_alerts[0].kind, AlertKind::Warning);

    let second = engine.route_and_execute(&request(), &uncached()).await.unwrap();
    assert_eq!(second.feedback.budget_alerts[0].kind, AlertKind::Exceeded);
    assert_eq!(alerts.recv().await.unwrap().kind, AlertKind::Warning);
    assert_eq!(alerts.recv().await.unwrap().kind, AlertKind::Exceeded);

    // Exceeding alone never blocks
    engine.route(&request(), &RoutingOptions::default()).unwrap();

    let err = engine.route_and_execute(&request(), &enforced()).await.unwrap_err();
    assert!(matches!(err, EngineError::BudgetExceeded { ref budgets } if budgets == &["total"]));

    let alert = engine.acknowledge_alert(second.feedback.budget_alerts[0].id).unwrap();
    assert!(alert.acknowledged);
    assert!(!engine.check_budget("total").unwrap().within_limit);
}

fn enforced() -> RoutingOptions {
    RoutingOptions {
        enforce_budgets: true,
        ..uncached()
    }
}

#[tokio::test]
async fn enforced_provider_budget_only_excludes_its_provider() {
    let engine = engine_with(
        "[[ledger.budgets]]\nid = \"cheap-cap\"\nlimit = 0.0005\nscope = { provider = \"cheap\" }\n",
        &[Mock::ok("cheap"), Mock::ok("premium")],
    );
    engine.route_and_execute(&request(), &uncached()).await.unwrap();
    assert!(!engine.check_budget("cheap-cap").unwrap().within_limit);

    assert_eq!(engine.route(&request(), &uncached()).unwrap().provider, "cheap");
    let decision = engine.route(&request(), &enforced()).unwrap();
    assert_eq!(decision.provider, "premium");
    assert!(!decision.fallbacks.iter().any(|p| p == "cheap"));

    let premium_excluded = RoutingOptions {
        excluded: vec!["premium".to_owned()],
        ..enforced()
    };
    let err = engine.route(&request(), &premium_excluded).unwrap_err();
    assert!(matches!(err, EngineError::BudgetExceeded { ref budgets } if budgets == &["cheap-cap"]));
}

#[tokio::test]
async fn enforced_category_budget_only_refuses_its_category() {
    let engine = engine_with(
        "[[ledger.budgets]]\nid = \"general\"\nlimit = 0.0005\nscope = { category = \"general\" }\n",
        &[Mock::ok("cheap"), Mock::ok("premium")],
    );
    engine.route_and_execute(&request(), &uncached()).await.unwrap();

    let err = engine.route(&request(), &enforced()).unwrap_err();
    assert!(matches!(err, EngineError::BudgetExceeded { ref budgets } if budgets == &["general"]));

    let debugging = CompletionRequest::from_prompt(
        "I get a panic with this stack trace when the parser reads an empty file, please help me debug it",
    );
    let decision = engine.route(&debugging, &enforced()).unwrap();
    assert_eq!(decision.classification.category, TaskCategory::Debugging);
    assert_eq!(decision.provider, "cheap");
}

#[tokio::test]
async fn statistics_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stats.json");

    let engine = engine_with("", &[Mock::failing("cheap", ErrorKind::Server), Mock::ok("premium")]);
    engine.route_and_execute(&request(), &uncached()).await.unwrap();
    engine.save_snapshot(&path).await.unwrap();

    let restored = engine_with("", &[Mock::ok("cheap"), Mock::ok("premium")]);
    assert!(restored.load_snapshot(&path).await.unwrap());

    let before = engine.export_statistics();
    let after = restored.export_statistics();
    assert_eq!(after.learning, before.learning);
    assert_eq!(after.cost_records, before.cost_records);
    assert_eq!(after.recent_attempts, before.recent_attempts);
    assert_eq!(restored.health(Some("cheap"))[0].failed_requests, 1);

    assert!(!restored.load_snapshot(&dir.path().join("missing.json")).await.unwrap());
}

#[tokio::test]
async fn maintenance_writes_a_final_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stats.json");
    let engine = Arc::new(engine_with(
        &format!("[persistence]\npath = {:?}\ninterval_seconds = 3600\n", path.display().to_string()),
        &[Mock::ok("cheap"), Mock::ok("premium")],
    ));

    assert_eq!(engine.run_maintenance(), MaintenanceReport::default());

    let shutdown = CancellationToken::new();
    let handle = engine.spawn_maintenance(shutdown.clone());
    shutdown.cancel();
    handle.await.unwrap();

    assert!(path.exists());
    let snapshot = snapshot::read(&path).await.unwrap().unwrap();
    assert_eq!(snapshot.version, SNAPSHOT_VERSION);
}

#[test]
fn reset_clears_learning_and_health() {
    let engine = engine_with("", &[Mock::ok("cheap"), Mock::ok("premium")]);
    engine.learning.learn(
        &LearningSample {
            provider: "cheap".to_owned(),
            category: TaskCategory::General,
            latency: Duration::from_millis(10),
            cost: 0.0,
            quality: None,
        },
        Outcome::Success,
    );
    engine.health.record_success("cheap", Duration::from_millis(10));

    engine.reset_learning();
    engine.reset_health(None);

    assert!(engine.learning().providers.is_empty());
    assert!(engine.health(None).is_empty());
}

#[tokio::test]
async fn decisions_are_reused_until_the_primary_trips() {
    let mut config = Config::from_toml(&format!("{BASE}\n[health]\nfailure_threshold = 1\n")).unwrap();
    config.routing.decision_cache_ms = 60_000;
    let engine = engine_from(&config, &[Mock::failing("cheap", ErrorKind::Server), Mock::ok("premium")]);

    let first = engine.route(&request(), &uncached()).unwrap();
    assert_eq!(first.provider, "cheap");
    assert_eq!(engine.route(&request(), &uncached()).unwrap(), first);

    // Other options make another decision
    let quality = RoutingOptions {
        strategy: Some(RoutingStrategy::QualityFirst),
        ..uncached()
    };
    assert_eq!(engine.route(&request(), &quality).unwrap().provider, "premium");

    let report = engine.route_and_execute(&request(), &uncached()).await.unwrap();
    assert_eq!(report.feedback.provider, "premium");
    assert_eq!(engine.route(&request(), &uncached()).unwrap().provider, "premium");
}

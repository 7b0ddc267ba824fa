//! Switchyard routing and resilience engine
//!
//! Wires the components together behind one object:
//! - **Routing API**: `route` and `route_and_execute`
//! - **Management API**: health, costs, budgets, alerts, cache, learning
//! - **Maintenance**: periodic sweeps and snapshot persistence
//!
//! A request flows through the response cache, the classifier and scoring
//! engine, the selector, and the fallback orchestrator; the outcome then
//! feeds the cost ledger, the learning module, and the cache.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod error;
pub mod load;
pub mod maintenance;
pub mod report;
pub mod snapshot;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use switchyard_cache::{CacheStats, ResponseCache, compute_cache_key, is_cacheable};
use switchyard_config::{
    BudgetScope, Config, EvictionPolicy, MaintenanceConfig, PersistenceConfig, ResponseCacheConfig,
};
use switchyard_core::{
    CompletionRequest, CompletionResponse, ErrorKind, ProviderError, ProviderRegistry, TaskCategory, Usage,
    now_millis,
};
use switchyard_health::{CircuitState, HealthTracker, ProviderHealthStatus};
use switchyard_ledger::{BudgetAlert, BudgetStatus, CostEntry, CostFilter, CostLedger, CostReport};
use switchyard_resilience::{AttemptStats, ExecutionAttempt, ExecutionError, FallbackOrchestrator};
use switchyard_routing::{
    LearningModule, LearningSample, LearningSnapshot, Outcome, Router, RoutingDecision, RoutingError,
    RoutingOptions, ScoringContext, TaskClassification,
};
use switchyard_telemetry::EngineMetrics;
use tokio::sync::broadcast;
use uuid::Uuid;

pub use error::EngineError;
pub use load::{LoadGuard, LoadTracker};
pub use maintenance::MaintenanceReport;
pub use report::{ExecutionFeedback, ExecutionReport};
pub use snapshot::{SNAPSHOT_VERSION, StatisticsSnapshot};

/// Recent attempts exported when persistence does not say otherwise
const DEFAULT_EXPORTED_ATTEMPTS: usize = 200;

/// Memoized routing decisions kept at once
const DECISION_CACHE_CAPACITY: usize = 1_024;

/// Everything a routing decision depends on besides live statistics
#[derive(Serialize)]
struct DecisionKey<'a> {
    request: String,
    tools: &'a [String],
    max_tokens: Option<u32>,
    options: &'a RoutingOptions,
}

/// Routing and resilience engine
pub struct Engine {
    registry: Arc<ProviderRegistry>,
    router: Router,
    health: Arc<HealthTracker>,
    learning: LearningModule,
    orchestrator: FallbackOrchestrator,
    cache: ResponseCache<CompletionResponse>,
    /// Recent routing decisions, enabled by `routing.decision_cache_ms`
    decisions: ResponseCache<RoutingDecision>,
    decision_ttl: Duration,
    ledger: CostLedger,
    load: LoadTracker,
    metrics: EngineMetrics,
    /// Configured but disabled providers, never routed to
    disabled: Vec<String>,
    maintenance: MaintenanceConfig,
    persistence: Option<PersistenceConfig>,
}

impl Engine {
    /// Build an engine over an already populated registry
    ///
    /// Registered providers with a `[providers.<name>]` entry take their
    /// capabilities and pricing from configuration.
    pub fn new(config: &Config, registry: Arc<ProviderRegistry>) -> Result<Self, EngineError> {
        let mut disabled = Vec::new();
        for (name, provider) in &config.providers {
            if !provider.enabled {
                disabled.push(name.clone());
            }
            if registry.get(name).is_some() {
                registry.reconfigure(name, provider.capabilities(), provider.pricing())?;
            } else {
                tracing::debug!(provider = %name, "configured provider has no registered adapter");
            }
        }

        let health = Arc::new(HealthTracker::new(config.health.clone()));
        let orchestrator =
            FallbackOrchestrator::new(Arc::clone(&health), config.retry.clone(), config.fallback.clone());

        tracing::info!(
            providers = registry.len(),
            disabled = disabled.len(),
            strategy = %config.routing.strategy,
            fallback = %config.fallback.strategy,
            cache = config.cache.enabled,
            budgets = config.ledger.budgets.len(),
            "engine initialized"
        );

        let decisions = ResponseCache::new(ResponseCacheConfig {
            enabled: config.routing.decision_cache_ms > 0,
            policy: EvictionPolicy::Ttl,
            capacity: DECISION_CACHE_CAPACITY,
            ttl_seconds: 0,
        })?;

        Ok(Self {
            registry,
            router: Router::new(&config.routing, &config.classifier),
            health,
            learning: LearningModule::new(config.learning.clone()),
            orchestrator,
            cache: ResponseCache::new(config.cache.clone())?,
            decisions,
            decision_ttl: Duration::from_millis(config.routing.decision_cache_ms),
            ledger: CostLedger::new(&config.ledger)?,
            load: LoadTracker::new(),
            metrics: EngineMetrics::new(),
            disabled,
            maintenance: config.maintenance.clone(),
            persistence: config.persistence.clone(),
        })
    }

    /// Replace the router, e.g. one with a seeded selector
    #[must_use]
    pub fn with_router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    pub const fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub const fn persistence(&self) -> Option<&PersistenceConfig> {
        self.persistence.as_ref()
    }

    /// Apply exceeded budgets to a routing request
    ///
    /// Excludes providers whose own budget is spent and returns those
    /// budget ids. Fails when a global budget, or the budget of the
    /// request's category, is spent.
    fn apply_budgets(
        &self,
        classification: &TaskClassification,
        options: &mut RoutingOptions,
    ) -> Result<Vec<String>, EngineError> {
        let mut refused = Vec::new();
        let mut capped = Vec::new();

        for budget in self.ledger.exceeded_budgets() {
            match &budget.scope {
                BudgetScope::Global => refused.push(budget.id),
                BudgetScope::Category(category) if *category == classification.category => refused.push(budget.id),
                BudgetScope::Category(_) => {}
                BudgetScope::Provider(provider) => {
                    if !options.is_excluded(provider) {
                        options.excluded.push(provider.clone());
                    }
                    capped.push(budget.id);
                }
            }
        }

        if !refused.is_empty() {
            tracing::warn!(budgets = ?refused, "routing refused, budget exceeded");
            return Err(EngineError::BudgetExceeded { budgets: refused });
        }
        if !capped.is_empty() {
            tracing::debug!(budgets = ?capped, "providers over budget excluded from routing");
        }
        Ok(capped)
    }

    /// Choose a provider chain without executing it
    ///
    /// With `enforce_budgets` set, an exceeded provider budget removes that
    /// provider from consideration, an exceeded category budget refuses
    /// requests in its category, and an exceeded global budget refuses
    /// everything.
    ///
    /// With a decision cache configured, an identical request with identical
    /// options reuses the previous decision until it expires or its primary
    /// provider's circuit opens.
    pub fn route(&self, request: &CompletionRequest, options: &RoutingOptions) -> Result<RoutingDecision, EngineError> {
        let mut options = options.clone();
        for name in &self.disabled {
            if !options.is_excluded(name) {
                options.excluded.push(name.clone());
            }
        }

        let classification = self.router.classify(request, &options);
        let capped = if options.enforce_budgets {
            self.apply_budgets(&classification, &mut options)?
        } else {
            Vec::new()
        };

        let memo_key = self.decision_key(request, &options)?;
        if let Some(ref key) = memo_key
            && let Some(decision) = self.decisions.get(key)
            && self
                .health
                .status(&decision.provider)
                .is_none_or(|status| status.circuit_state != CircuitState::Open)
        {
            tracing::debug!(provider = %decision.provider, "routing decision reused");
            return Ok(decision);
        }

        let context = ScoringContext::new(options)
            .with_health(self.health.snapshot())
            .with_learning(self.learning.snapshot())
            .with_load(self.load.snapshot());

        let decision = match self
            .router
            .route_classified(classification, &self.registry.profiles(), &context)
        {
            Err(RoutingError::NoEligibleProvider { .. }) if !capped.is_empty() => {
                tracing::warn!(budgets = ?capped, "routing refused, every eligible provider is over budget");
                return Err(EngineError::BudgetExceeded { budgets: capped });
            }
            result => result?,
        };
        self.metrics
            .record_decision(&decision.provider, decision.strategy.as_ref(), decision.explored);
        if let Some(key) = memo_key {
            self.decisions
                .put_with_ttl(key, decision.clone(), 0.0, Some(self.decision_ttl));
        }
        Ok(decision)
    }

    /// Route a request and execute it with retries and fallback
    ///
    /// Cacheable requests are answered from the response cache when
    /// possible, skipping routing entirely.
    pub async fn route_and_execute(
        &self,
        request: &CompletionRequest,
        options: &RoutingOptions,
    ) -> Result<ExecutionReport, EngineError> {
        let started = Instant::now();

        let cache_key = self.cache_key(request, options)?;
        if let Some(ref key) = cache_key {
            let cached = self.cache.get(key);
            self.metrics.record_cache_lookup(cached.is_some());
            if let Some(response) = cached {
                tracing::info!(provider = %response.provider, "response served from cache");
                return Ok(ExecutionReport::cached(response, elapsed_ms(started)));
            }
        }

        let decision = self.route(request, options)?;
        let mut chain = self.orchestrator.chain(decision.chain());
        if let Some(strategy) = options.fallback_strategy {
            chain = chain.with_strategy(strategy);
        }

        let result = self
            .orchestrator
            .execute(&chain, move |provider| self.invoke(provider, request))
            .await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.learn_from(e.attempts(), decision.classification.category, None);
                if matches!(e, ExecutionError::Exhausted { .. }) {
                    self.metrics.record_exhausted(chain.strategy.as_ref());
                }
                if let Some(last) = e.attempts().iter().rev().find(|a| !a.is_skipped()) {
                    self.ledger.record(CostEntry {
                        category: Some(decision.classification.category),
                        success: false,
                        ..CostEntry::new(last.provider.clone(), 0.0)
                    });
                }
                return Err(e.into());
            }
        };

        let cost = self.actual_cost(&outcome.provider, outcome.value.usage, &decision.classification);
        self.learn_from(
            &outcome.attempts,
            decision.classification.category,
            Some((&outcome.value, cost)),
        );

        let (_, budget_alerts) = self.ledger.record(CostEntry {
            category: Some(decision.classification.category),
            input_tokens: outcome.value.usage.input_tokens,
            output_tokens: outcome.value.usage.output_tokens,
            ..CostEntry::new(outcome.provider.clone(), cost)
        });
        self.health.record_cost(&outcome.provider, cost);
        self.metrics.record_cost(&outcome.provider, cost);
        for alert in &budget_alerts {
            self.metrics.record_budget_alert(&alert.budget_id, &alert.kind.to_string());
        }

        if let Some(key) = cache_key {
            self.cache.put(key, outcome.value.clone(), cost);
        }

        Ok(ExecutionReport {
            feedback: ExecutionFeedback {
                provider: outcome.provider,
                cache_hit: false,
                cost,
                latency_ms: elapsed_ms(started),
                attempts: outcome.attempts,
                metrics: outcome.metrics,
                strategy: Some(outcome.strategy),
                budget_alerts,
            },
            response: outcome.value,
            decision: Some(decision),
        })
    }

    /// One try against one provider
    async fn invoke(&self, provider: String, request: &CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let adapter = self.registry.get(&provider).ok_or_else(|| {
            ProviderError::new(ErrorKind::Unknown, format!("provider not registered: {provider}"))
        })?;

        let _load = self.load.begin(&provider);
        adapter.execute(request).await
    }

    fn cache_key(&self, request: &CompletionRequest, options: &RoutingOptions) -> Result<Option<String>, EngineError> {
        if !self.cache.is_enabled() || options.bypass_cache || !is_cacheable(request) {
            return Ok(None);
        }
        Ok(Some(compute_cache_key(request)?))
    }

    fn decision_key(&self, request: &CompletionRequest, options: &RoutingOptions) -> Result<Option<String>, EngineError> {
        if !self.decisions.is_enabled() {
            return Ok(None);
        }

        let key = DecisionKey {
            request: compute_cache_key(request)?,
            tools: &request.tools,
            max_tokens: request.max_tokens,
            options,
        };
        Ok(serde_json::to_string(&key).ok())
    }

    /// Cost from reported usage, or from the classifier's estimate when the
    /// provider reported none
    fn actual_cost(&self, provider: &str, usage: Usage, classification: &TaskClassification) -> f64 {
        let Some(profile) = self.registry.profile(provider) else {
            return 0.0;
        };

        if usage.total() == 0 {
            profile.estimate_cost(
                classification.estimated_tokens.input,
                classification.estimated_tokens.output,
            )
        } else {
            profile.estimate_cost(u64::from(usage.input_tokens), u64::from(usage.output_tokens))
        }
    }

    /// Feed every invoked attempt to learning and metrics
    fn learn_from(
        &self,
        attempts: &[ExecutionAttempt],
        category: TaskCategory,
        success: Option<(&CompletionResponse, f64)>,
    ) {
        for attempt in attempts.iter().filter(|a| !a.is_skipped()) {
            let latency = Duration::from_millis(attempt.duration_ms);
            let label = attempt.error_kind.map_or_else(|| "success".to_owned(), |kind| kind.to_string());
            self.metrics.record_attempt(&attempt.provider, &label, latency);

            let (outcome, cost, quality) = match success {
                Some((response, cost)) if attempt.success => (Outcome::Success, cost, response.quality),
                _ => (Outcome::Failure, 0.0, None),
            };

            self.learning.learn(
                &LearningSample {
                    provider: attempt.provider.clone(),
                    category,
                    latency,
                    cost,
                    quality,
                },
                outcome,
            );
        }
    }

    /// Health of one provider, or of every tracked provider
    pub fn health(&self, provider: Option<&str>) -> Vec<ProviderHealthStatus> {
        match provider {
            Some(name) => self.health.status(name).into_iter().collect(),
            None => self.health.snapshot(),
        }
    }

    /// Clear health for one provider, or for all when `None`
    pub fn reset_health(&self, provider: Option<&str>) {
        self.health.reset(provider);
        self.decisions.clear();
    }

    pub fn cost_report(&self, filter: &CostFilter) -> CostReport {
        self.ledger.cost_report(filter)
    }

    pub fn total_cost(&self, filter: &CostFilter) -> f64 {
        self.ledger.total_cost(filter)
    }

    pub fn check_budget(&self, id: &str) -> Result<BudgetStatus, EngineError> {
        Ok(self.ledger.check_budget(id)?)
    }

    pub fn budgets(&self) -> Vec<BudgetStatus> {
        self.ledger.budget_statuses()
    }

    pub fn alerts(&self) -> Vec<BudgetAlert> {
        self.ledger.alerts()
    }

    pub fn acknowledge_alert(&self, id: Uuid) -> Result<BudgetAlert, EngineError> {
        Ok(self.ledger.acknowledge(id)?)
    }

    /// Receive budget alerts as they are raised
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<BudgetAlert> {
        self.ledger.subscribe()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn invalidate_cached(&self, request: &CompletionRequest) -> Result<bool, EngineError> {
        Ok(self.cache.invalidate(&compute_cache_key(request)?))
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn learning(&self) -> LearningSnapshot {
        self.learning.snapshot()
    }

    pub fn reset_learning(&self) {
        self.learning.reset();
        self.decisions.clear();
    }

    /// Most recent attempts across all requests, oldest first
    pub fn recent_attempts(&self, limit: usize) -> Vec<ExecutionAttempt> {
        self.orchestrator.history().recent(limit)
    }

    pub fn attempt_stats(&self) -> HashMap<String, AttemptStats> {
        self.orchestrator.history().stats()
    }

    /// Copy of everything worth carrying across a restart
    pub fn export_statistics(&self) -> StatisticsSnapshot {
        let recent = self
            .persistence
            .as_ref()
            .map_or(DEFAULT_EXPORTED_ATTEMPTS, |p| p.recent_attempts);

        StatisticsSnapshot {
            version: SNAPSHOT_VERSION,
            exported_at_ms: now_millis(),
            health: self.health.snapshot(),
            learning: self.learning.snapshot(),
            recent_attempts: self.orchestrator.history().recent(recent),
            cost_records: self.ledger.records(),
        }
    }

    /// Seed statistics from a snapshot
    ///
    /// Circuits start closed; counters, learned performance, attempt
    /// history, and cost records are restored.
    pub fn import_statistics(&self, snapshot: StatisticsSnapshot) -> Result<(), EngineError> {
        snapshot.check_version()?;

        self.health.restore(&snapshot.health);
        self.learning.import(&snapshot.learning);

        let history = self.orchestrator.history();
        history.clear();
        history.extend(snapshot.recent_attempts);

        self.decisions.clear();

        let records = snapshot.cost_records.len();
        self.ledger.import(snapshot.cost_records);

        tracing::info!(
            providers = snapshot.health.len(),
            cost_records = records,
            exported_at_ms = snapshot.exported_at_ms,
            "statistics imported"
        );
        Ok(())
    }

    /// Write exported statistics to `path` atomically
    pub async fn save_snapshot(&self, path: &Path) -> Result<(), EngineError> {
        snapshot::write(path, &self.export_statistics()).await
    }

    /// Import statistics from `path`
    ///
    /// Returns `false` when no snapshot exists yet.
    pub async fn load_snapshot(&self, path: &Path) -> Result<bool, EngineError> {
        match snapshot::read(path).await? {
            Some(snapshot) => {
                self.import_statistics(snapshot)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests;

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use switchyard_config::LedgerConfig;
use switchyard_core::now_millis;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::budget::{AlertKind, Budget, BudgetAlert, BudgetStatus};
use crate::error::LedgerError;
use crate::record::{CostEntry, CostFilter, CostRecord, CostReport};

/// Buffered alerts per subscriber before the slowest starts lagging
const ALERT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct LedgerState {
    records: VecDeque<CostRecord>,
    /// Lifetime spend per budget without a period; survives record trimming
    lifetime_spent: HashMap<String, f64>,
    alerts: Vec<BudgetAlert>,
}

impl LedgerState {
    fn spent(&self, budget: &Budget, now_ms: u64) -> f64 {
        match budget.window_start(now_ms) {
            None => self.lifetime_spent.get(&budget.id).copied().unwrap_or(0.0),
            Some(start) => self
                .records
                .iter()
                .filter(|r| r.timestamp_ms >= start && budget.covers(r))
                .map(|r| r.cost)
                .sum(),
        }
    }

    /// Unacknowledged alert of this kind raised within the window
    fn has_active_alert(&self, budget_id: &str, kind: AlertKind, now_ms: u64, window_ms: u64) -> bool {
        self.alerts.iter().any(|a| {
            a.budget_id == budget_id
                && a.kind == kind
                && !a.acknowledged
                && now_ms.saturating_sub(a.raised_at_ms) < window_ms
        })
    }
}

/// Append-only spend log with budget evaluation
///
/// Every record is checked against the budgets covering it. An alert is
/// raised only when a record moves a budget into a more severe level, so
/// spend sitting at a level stays quiet even after acknowledgement. A new
/// crossing is still suppressed while an unacknowledged alert of the same
/// budget and kind, raised within the alert window, exists. Exceeding a
/// budget never blocks anything by itself.
pub struct CostLedger {
    state: Mutex<LedgerState>,
    budgets: Vec<Budget>,
    alert_window_ms: u64,
    max_records: usize,
    alerts_tx: broadcast::Sender<BudgetAlert>,
}

impl CostLedger {
    pub fn new(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let budgets = config
            .budgets
            .iter()
            .map(Budget::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        let (alerts_tx, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);

        Ok(Self {
            state: Mutex::new(LedgerState::default()),
            budgets,
            alert_window_ms: u64::try_from(config.alert_window().as_millis()).unwrap_or(u64::MAX),
            max_records: config.max_records.max(1),
            alerts_tx,
        })
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn budgets(&self) -> &[Budget] {
        &self.budgets
    }

    /// Receive every alert raised from now on
    pub fn subscribe(&self) -> broadcast::Receiver<BudgetAlert> {
        self.alerts_tx.subscribe()
    }

    /// Append spend and evaluate the budgets it falls under
    ///
    /// Returns the stored record and any alerts it raised.
    pub fn record(&self, entry: CostEntry) -> (CostRecord, Vec<BudgetAlert>) {
        let record = CostRecord::from_entry(entry);
        let now_ms = record.timestamp_ms;
        let mut raised = Vec::new();

        {
            let mut state = self.lock();
            state.records.push_back(record.clone());
            while state.records.len() > self.max_records {
                state.records.pop_front();
            }

            for budget in self.budgets.iter().filter(|b| b.covers(&record)) {
                if budget.period.is_none() {
                    *state.lifetime_spent.entry(budget.id.clone()).or_default() += record.cost;
                }

                let spent = state.spent(budget, now_ms);
                let status = budget.status(spent);
                // Only a record that moves spend into a more severe level alerts
                if status.level <= budget.status(spent - record.cost).level {
                    continue;
                }
                let Some(kind) = AlertKind::for_level(status.level) else {
                    continue;
                };
                if state.has_active_alert(&budget.id, kind, now_ms, self.alert_window_ms) {
                    continue;
                }

                let alert = BudgetAlert {
                    id: Uuid::new_v4(),
                    budget_id: budget.id.clone(),
                    kind,
                    spent: status.spent,
                    limit: status.limit,
                    percent_used: status.percent_used,
                    raised_at_ms: now_ms,
                    acknowledged: false,
                };
                state.alerts.push(alert.clone());
                raised.push(alert);
            }
        }

        tracing::debug!(
            provider = %record.provider,
            cost = record.cost,
            input_tokens = record.input_tokens,
            output_tokens = record.output_tokens,
            "cost recorded"
        );

        for alert in &raised {
            tracing::warn!(
                budget = %alert.budget_id,
                kind = %alert.kind,
                spent = alert.spent,
                limit = alert.limit,
                percent_used = alert.percent_used,
                "budget alert raised"
            );
            // No subscribers is fine
            let _ = self.alerts_tx.send(alert.clone());
        }

        (record, raised)
    }

    pub fn total_cost(&self, filter: &CostFilter) -> f64 {
        self.lock()
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .map(|r| r.cost)
            .sum()
    }

    pub fn cost_report(&self, filter: &CostFilter) -> CostReport {
        let state = self.lock();
        CostReport::build(state.records.iter().filter(|r| filter.matches(r)))
    }

    /// Current standing of one budget
    pub fn check_budget(&self, id: &str) -> Result<BudgetStatus, LedgerError> {
        let budget = self
            .budgets
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| LedgerError::UnknownBudget(id.to_owned()))?;
        Ok(budget.status(self.lock().spent(budget, now_millis())))
    }

    /// Standing of every budget, in configuration order
    pub fn budget_statuses(&self) -> Vec<BudgetStatus> {
        let now_ms = now_millis();
        let state = self.lock();
        self.budgets.iter().map(|b| b.status(state.spent(b, now_ms))).collect()
    }

    /// Budgets currently over their limit
    pub fn exceeded_budgets(&self) -> Vec<Budget> {
        let now_ms = now_millis();
        let state = self.lock();
        self.budgets
            .iter()
            .filter(|b| !b.status(state.spent(b, now_ms)).within_limit)
            .cloned()
            .collect()
    }

    /// Whether any budget is currently over its limit
    pub fn any_exceeded(&self) -> bool {
        !self.exceeded_budgets().is_empty()
    }

    /// Every retained alert, oldest first
    pub fn alerts(&self) -> Vec<BudgetAlert> {
        self.lock().alerts.clone()
    }

    /// Mark an alert handled so the same condition may alert again
    pub fn acknowledge(&self, alert_id: Uuid) -> Result<BudgetAlert, LedgerError> {
        let mut state = self.lock();
        let alert = state
            .alerts
            .iter_mut()
            .find(|a| a.id == alert_id)
            .ok_or(LedgerError::UnknownAlert(alert_id))?;
        alert.acknowledged = true;
        tracing::info!(budget = %alert.budget_id, kind = %alert.kind, "budget alert acknowledged");
        Ok(alert.clone())
    }

    /// Drop alerts that are acknowledged or older than the alert window
    pub fn trim(&self) -> usize {
        let now_ms = now_millis();
        let mut state = self.lock();
        let before = state.alerts.len();
        state
            .alerts
            .retain(|a| !a.acknowledged && now_ms.saturating_sub(a.raised_at_ms) < self.alert_window_ms);
        before - state.alerts.len()
    }

    /// Retained records, oldest first
    pub fn records(&self) -> Vec<CostRecord> {
        self.lock().records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Replace the log with previously exported records
    ///
    /// Lifetime budget spend is rebuilt from the imported records; no alerts
    /// are raised.
    pub fn import(&self, records: Vec<CostRecord>) {
        let mut state = self.lock();
        state.records = records.into_iter().collect();
        while state.records.len() > self.max_records {
            state.records.pop_front();
        }

        let mut lifetime_spent = HashMap::new();
        for budget in self.budgets.iter().filter(|b| b.period.is_none()) {
            let spent: f64 = state.records.iter().filter(|r| budget.covers(r)).map(|r| r.cost).sum();
            lifetime_spent.insert(budget.id.clone(), spent);
        }
        state.lifetime_spent = lifetime_spent;
    }
}

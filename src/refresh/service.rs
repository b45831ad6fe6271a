use crate::aggregation::aggregator::{CancellationToken, SkippedGroup, TransactionAggregator};
use crate::aggregation::pending::PendingAggregate;
use crate::aggregation::receivable::ReceivableAggregate;
use crate::alerting::alerts::{AlertEngine, AlertSink, AlertSubject, Observation};
use crate::config::EngineConfig;
use crate::core::dates::FinancialYear;
use crate::core::ids::MerchantId;
use crate::core::obligation::BrokerageObligation;
use crate::core::status::PaymentStatus;
use crate::dashboard::summary::{build_dashboard, DashboardSummary};
use crate::dashboard::trend::{build_trend, TrendSeries};
use crate::error::{EntityKind, LedgerError};
use crate::ledger::payments::ObligationSummary;
use crate::ledger::store::Repository;
use crate::refresh::snapshot::AggregateSnapshot;
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// What one successful refresh pass produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub generation: u64,
    pub obligations: usize,
    pub transactions: usize,
    pub pending_groups: usize,
    pub receivable_groups: usize,
    pub skipped: Vec<SkippedGroup>,
    pub alerts_raised: usize,
}

/// Recomputes every derived view and publishes it as a new snapshot.
///
/// Readers clone the current `Arc` and never wait on a refresh. Rows are
/// copied out of the repository one at a time, so payments keep flowing
/// while a pass runs; whatever lands after the copy is picked up by the
/// next pass.
pub struct RefreshService {
    repo: Arc<dyn Repository>,
    config: EngineConfig,
    current: RwLock<Arc<AggregateSnapshot>>,
    /// Held for a whole pass; one refresh at a time.
    alerts: Mutex<AlertEngine>,
    sink: Arc<dyn AlertSink>,
}

impl RefreshService {
    pub fn new(repo: Arc<dyn Repository>, config: EngineConfig, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            repo,
            config,
            current: RwLock::new(Arc::new(AggregateSnapshot::empty())),
            alerts: Mutex::new(AlertEngine::new()),
            sink,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Rebuild everything for `financial_year` (or all time) as of `today`.
    ///
    /// Safe to call repeatedly: aggregates are rebuilt from scratch and
    /// alerts already raised for unchanged state are not raised again.
    /// On cancellation nothing is published, no alerts are raised and
    /// the previous snapshot stays current.
    pub fn refresh_all(
        &self,
        today: NaiveDate,
        financial_year: Option<&FinancialYear>,
        cancel: &CancellationToken,
    ) -> Result<RefreshReport, LedgerError> {
        let mut engine = self.alerts.lock().unwrap_or_else(PoisonError::into_inner);

        let obligations: Vec<BrokerageObligation> = self
            .repo
            .obligations()
            .into_iter()
            .filter(|ob| financial_year.map_or(true, |fy| ob.financial_year().id() == fy.id()))
            .collect();
        let transactions = self.repo.transactions();
        debug!(
            "refresh: copied {} obligations and {} transactions",
            obligations.len(),
            transactions.len()
        );

        let aggregator = TransactionAggregator::new(self.config.priority.clone());
        let pending = aggregator
            .pending_by_buyer(&transactions, financial_year, today, cancel)
            .map_err(|e| {
                warn!("refresh aborted while building pending aggregates: {e}");
                e
            })?;
        let receivable = aggregator
            .receivable_by_seller(&transactions, financial_year, today, cancel)
            .map_err(|e| {
                warn!("refresh aborted while building receivable aggregates: {e}");
                e
            })?;

        let dashboard = build_dashboard(
            &obligations,
            &pending.aggregates,
            &receivable.aggregates,
            financial_year,
            today,
            &self.config.priority,
            &self.config.health,
        );

        let arena: HashMap<_, _> = transactions
            .into_iter()
            .filter(|t| financial_year.map_or(true, |fy| t.in_financial_year(fy)))
            .map(|t| (t.id(), t))
            .collect();
        let payments = obligations
            .iter()
            .flat_map(|ob| ob.payments())
            .chain(arena.values().flat_map(|t| t.payments()))
            .map(|p| (p.payment_date(), p.amount()));
        let trend = build_trend(payments, today, &self.config.trend);

        let observations =
            self.observe(&obligations, &pending.aggregates, &receivable.aggregates, today);
        let alerts = engine.evaluate(&observations, today);

        let mut skipped = pending.skipped;
        skipped.extend(receivable.skipped);
        let pending_groups = pending.aggregates.len();
        let receivable_groups = receivable.aggregates.len();
        let transaction_count = arena.len();

        let generation = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            let generation = current.generation + 1;
            *current = Arc::new(AggregateSnapshot {
                generation,
                built_on: Some(today),
                financial_year: financial_year.map(|fy| fy.id().to_string()),
                transactions: arena,
                pending: pending
                    .aggregates
                    .into_iter()
                    .map(|a| (a.buyer.clone(), a))
                    .collect(),
                receivable: receivable
                    .aggregates
                    .into_iter()
                    .map(|a| (a.seller.clone(), a))
                    .collect(),
                dashboard: Some(dashboard),
                trend: Some(trend),
                skipped: skipped.clone(),
            });
            generation
        };

        engine.commit(observations);
        let alerts_raised = alerts.len();
        for alert in alerts {
            self.sink.deliver(alert);
        }

        info!(
            "published snapshot {generation}: {pending_groups} pending, {receivable_groups} receivable, {} skipped, {alerts_raised} alerts",
            skipped.len()
        );
        Ok(RefreshReport {
            generation,
            obligations: obligations.len(),
            transactions: transaction_count,
            pending_groups,
            receivable_groups,
            skipped,
            alerts_raised,
        })
    }

    fn observe(
        &self,
        obligations: &[BrokerageObligation],
        pending: &[PendingAggregate],
        receivable: &[ReceivableAggregate],
        today: NaiveDate,
    ) -> HashMap<AlertSubject, Observation> {
        let mut observations = HashMap::new();
        for ob in obligations {
            observations.insert(
                AlertSubject::Obligation(ob.id()),
                Observation {
                    priority: ob.priority_on(today, &self.config.priority),
                    status: ob.status_on(today),
                    outstanding: ob.pending_amount(),
                },
            );
        }
        for agg in pending {
            observations.insert(
                AlertSubject::Pending(agg.buyer.clone()),
                Observation {
                    priority: agg.priority,
                    status: agg.status,
                    outstanding: agg.total_pending_amount,
                },
            );
        }
        for agg in receivable {
            observations.insert(
                AlertSubject::Receivable(agg.seller.clone()),
                Observation {
                    priority: agg.priority,
                    status: agg.status,
                    outstanding: agg.total_receivable_amount,
                },
            );
        }
        observations
    }

    fn current(&self) -> Arc<AggregateSnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    // --- Queries ---

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<AggregateSnapshot> {
        self.current()
    }

    pub fn pending_for(&self, buyer: &MerchantId) -> Result<PendingAggregate, LedgerError> {
        self.current()
            .pending_for(buyer)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(EntityKind::PendingAggregate, buyer))
    }

    pub fn receivable_for(&self, seller: &MerchantId) -> Result<ReceivableAggregate, LedgerError> {
        self.current()
            .receivable_for(seller)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(EntityKind::ReceivableAggregate, seller))
    }

    pub fn dashboard(&self) -> Option<DashboardSummary> {
        self.current().dashboard.clone()
    }

    pub fn trend(&self) -> Option<TrendSeries> {
        self.current().trend.clone()
    }

    /// Overdue and due-soon obligations read live from the repository,
    /// most urgent first.
    pub fn attention_list(&self, today: NaiveDate) -> Vec<ObligationSummary> {
        let mut flagged: Vec<_> = self
            .repo
            .obligations_with_status(&[PaymentStatus::Overdue, PaymentStatus::DueSoon], today)
            .into_iter()
            .map(|ob| (ob.priority_on(today, &self.config.priority), ObligationSummary::of(&ob, today)))
            .collect();
        flagged.sort_by(|(pa, a), (pb, b)| {
            pb.cmp(pa)
                .then_with(|| b.days_overdue.cmp(&a.days_overdue))
                .then_with(|| b.pending_amount.cmp(&a.pending_amount))
                .then_with(|| a.id.cmp(&b.id))
        });
        flagged.into_iter().map(|(_, summary)| summary).collect()
    }

    /// A buyer's pending aggregate computed straight from the repository,
    /// bypassing the published snapshot. Trades are selected by trade date.
    pub fn live_pending_for(
        &self,
        buyer: &MerchantId,
        financial_year: &FinancialYear,
        today: NaiveDate,
    ) -> Result<PendingAggregate, LedgerError> {
        let transactions = self.repo.transactions_for_buyer(buyer, financial_year.range());
        let aggregator = TransactionAggregator::new(self.config.priority.clone());
        let outcome = aggregator.pending_by_buyer(&transactions, None, today, &CancellationToken::new())?;
        if let Some(skipped) = outcome.skipped.into_iter().next() {
            return Err(LedgerError::Consistency(skipped.reason));
        }
        outcome
            .aggregates
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::not_found(EntityKind::PendingAggregate, buyer))
    }

    /// Seller-side counterpart of [`RefreshService::live_pending_for`].
    pub fn live_receivable_for(
        &self,
        seller: &MerchantId,
        financial_year: &FinancialYear,
        today: NaiveDate,
    ) -> Result<ReceivableAggregate, LedgerError> {
        let transactions = self.repo.transactions_for_seller(seller, financial_year.range());
        let aggregator = TransactionAggregator::new(self.config.priority.clone());
        let outcome =
            aggregator.receivable_by_seller(&transactions, None, today, &CancellationToken::new())?;
        if let Some(skipped) = outcome.skipped.into_iter().next() {
            return Err(LedgerError::Consistency(skipped.reason));
        }
        outcome
            .aggregates
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::not_found(EntityKind::ReceivableAggregate, seller))
    }
}

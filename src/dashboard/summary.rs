use crate::aggregation::pending::PendingAggregate;
use crate::aggregation::receivable::ReceivableAggregate;
use crate::alerting::priority::PriorityLevel;
use crate::config::{HealthConfig, PriorityConfig};
use crate::core::dates::FinancialYear;
use crate::core::money::{percentage, Money};
use crate::core::obligation::BrokerageObligation;
use crate::core::status::PaymentStatus;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Totals and status counts for one category of debt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub count: usize,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub pending_amount: Money,
    pub status_counts: BTreeMap<PaymentStatus, usize>,
    pub completion_percentage: Decimal,
}

impl CategorySummary {
    /// Roll-up sums saturate rather than fail; each input is already a
    /// checked total.
    fn add(&mut self, total: Money, paid: Money, pending: Money, status: PaymentStatus) {
        self.count += 1;
        self.total_amount = self.total_amount.saturating_add(total);
        self.paid_amount = self.paid_amount.saturating_add(paid);
        self.pending_amount = self.pending_amount.saturating_add(pending);
        *self.status_counts.entry(status).or_insert(0) += 1;
        self.completion_percentage = percentage(self.paid_amount, self.total_amount);
    }

    pub fn status_count(&self, status: PaymentStatus) -> usize {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }
}

/// Broker-wide view over obligations and trade debts.
///
/// Penalty counts and priority counts cover brokerage obligations and the
/// buyer-side pending aggregates. Receivables are the same trades seen
/// from the seller, so they appear in their own category but are not
/// counted a second time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub built_on: NaiveDate,
    pub financial_year: Option<String>,
    pub brokerage: CategorySummary,
    pub pending: CategorySummary,
    pub receivable: CategorySummary,
    pub priority_counts: BTreeMap<PriorityLevel, usize>,
    pub overdue_count: usize,
    pub overall_completion_percentage: Decimal,
    /// 0 to 100; 100 means nothing is overdue or urgent.
    pub health_score: Decimal,
}

impl DashboardSummary {
    pub fn priority_count(&self, level: PriorityLevel) -> usize {
        self.priority_counts.get(&level).copied().unwrap_or(0)
    }
}

/// Build the dashboard for `today`.
///
/// Obligations outside `window` are ignored; the aggregates are expected
/// to have been built for the same window already.
pub fn build_dashboard(
    obligations: &[BrokerageObligation],
    pending: &[PendingAggregate],
    receivable: &[ReceivableAggregate],
    window: Option<&FinancialYear>,
    today: NaiveDate,
    priority: &PriorityConfig,
    health: &HealthConfig,
) -> DashboardSummary {
    let mut brokerage = CategorySummary::default();
    let mut pending_summary = CategorySummary::default();
    let mut receivable_summary = CategorySummary::default();
    let mut priority_counts: BTreeMap<PriorityLevel, usize> =
        PriorityLevel::ALL.iter().map(|&l| (l, 0)).collect();
    let mut overdue_count = 0;

    let in_window = |ob: &&BrokerageObligation| window.map_or(true, |fy| ob.financial_year().id() == fy.id());
    for ob in obligations.iter().filter(in_window) {
        let status = ob.status_on(today);
        brokerage.add(ob.net_brokerage(), ob.paid_amount(), ob.pending_amount(), status);
        let level = ob.priority_on(today, priority);
        *priority_counts.entry(level).or_insert(0) += 1;
        if status == PaymentStatus::Overdue {
            overdue_count += 1;
        }
    }

    for agg in pending {
        pending_summary.add(agg.total_amount, agg.paid_amount, agg.total_pending_amount, agg.status);
        *priority_counts.entry(agg.priority).or_insert(0) += 1;
        if agg.status == PaymentStatus::Overdue {
            overdue_count += 1;
        }
    }

    for agg in receivable {
        receivable_summary.add(
            agg.total_amount,
            agg.paid_amount,
            agg.total_receivable_amount,
            agg.status,
        );
    }

    let overall_completion_percentage = percentage(
        brokerage.paid_amount.saturating_add(pending_summary.paid_amount),
        brokerage.total_amount.saturating_add(pending_summary.total_amount),
    );
    let health_score = health_score(
        overdue_count,
        priority_counts[&PriorityLevel::Critical],
        priority_counts[&PriorityLevel::High],
        health,
    );

    DashboardSummary {
        built_on: today,
        financial_year: window.map(|fy| fy.id().to_string()),
        brokerage,
        pending: pending_summary,
        receivable: receivable_summary,
        priority_counts,
        overdue_count,
        overall_completion_percentage,
        health_score,
    }
}

/// `100 - penalties`, each penalty capped, floored at zero.
pub fn health_score(overdue: usize, critical: usize, high: usize, config: &HealthConfig) -> Decimal {
    let penalty = config
        .overdue
        .apply(overdue)
        .saturating_add(config.critical.apply(critical))
        .saturating_add(config.high.apply(high));
    Decimal::ONE_HUNDRED.saturating_sub(penalty).max(Decimal::ZERO)
}

impl fmt::Display for DashboardSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Dashboard ({}) ===", self.built_on)?;
        if let Some(fy) = &self.financial_year {
            writeln!(f, "Financial year: {fy}")?;
        }
        for (name, c) in [
            ("Brokerage", &self.brokerage),
            ("Pending", &self.pending),
            ("Receivable", &self.receivable),
        ] {
            writeln!(
                f,
                "{name:<11} count {:>4}  total {:>14}  paid {:>14}  pending {:>14}  ({}%)",
                c.count, c.total_amount, c.paid_amount, c.pending_amount, c.completion_percentage
            )?;
        }
        writeln!(f, "\nPriorities:")?;
        for (level, count) in &self.priority_counts {
            writeln!(f, "  {level:<8} {count}")?;
        }
        writeln!(f, "\nOverdue:            {}", self.overdue_count)?;
        writeln!(f, "Overall completion: {}%", self.overall_completion_percentage)?;
        write!(f, "Health score:       {}", self.health_score)
    }
}

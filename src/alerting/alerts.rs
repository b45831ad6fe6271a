use crate::alerting::priority::PriorityLevel;
use crate::core::ids::{MerchantId, ObligationId};
use crate::core::money::Money;
use crate::core::status::PaymentStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// The entity an alert is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AlertSubject {
    Obligation(ObligationId),
    /// Buyer-side pending aggregate.
    Pending(MerchantId),
    /// Seller-side receivable aggregate.
    Receivable(MerchantId),
}

impl fmt::Display for AlertSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSubject::Obligation(id) => write!(f, "obligation {id}"),
            AlertSubject::Pending(buyer) => write!(f, "pending dues of {buyer}"),
            AlertSubject::Receivable(seller) => write!(f, "receivables of {seller}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTrigger {
    PriorityEscalated(PriorityLevel),
    BecameOverdue,
}

/// Deduplication key: one alert per subject and trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertKey {
    pub subject: AlertSubject,
    pub trigger: AlertTrigger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub key: AlertKey,
    /// Mirrors the subject's priority at the time of the alert.
    pub severity: PriorityLevel,
    pub message: String,
    pub raised_on: NaiveDate,
}

/// What the engine last saw for one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub priority: PriorityLevel,
    pub status: PaymentStatus,
    pub outstanding: Money,
}

/// Triggers fired by moving from `previous` to `current`.
///
/// Rising into `High` or `Critical` fires once per level reached;
/// entering `Overdue` fires once. Falling back to a lower level, or an
/// unchanged observation, fires nothing.
pub fn triggers(previous: Option<&Observation>, current: &Observation) -> Vec<AlertTrigger> {
    let mut fired = Vec::new();
    let rose = previous.map_or(true, |p| current.priority > p.priority);
    if current.priority.is_alerting() && rose {
        fired.push(AlertTrigger::PriorityEscalated(current.priority));
    }
    let was_overdue = previous.is_some_and(|p| p.status == PaymentStatus::Overdue);
    if current.status == PaymentStatus::Overdue && !was_overdue {
        fired.push(AlertTrigger::BecameOverdue);
    }
    fired
}

/// Computes which alerts a new round of observations should raise.
///
/// The engine only decides; storage of delivered alerts belongs to the
/// [`AlertSink`]. Observations are committed separately so that a round
/// that is abandoned leaves the engine's memory untouched.
#[derive(Debug, Default)]
pub struct AlertEngine {
    last: HashMap<AlertSubject, Observation>,
}

impl AlertEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evaluate(
        &self,
        current: &HashMap<AlertSubject, Observation>,
        today: NaiveDate,
    ) -> Vec<Alert> {
        let mut subjects: Vec<&AlertSubject> = current.keys().collect();
        subjects.sort();

        let mut alerts = Vec::new();
        for subject in subjects {
            let observation = &current[subject];
            for trigger in triggers(self.last.get(subject), observation) {
                alerts.push(Alert {
                    key: AlertKey {
                        subject: subject.clone(),
                        trigger,
                    },
                    severity: observation.priority,
                    message: describe(subject, trigger, observation),
                    raised_on: today,
                });
            }
        }
        alerts
    }

    /// Remember `current` on top of what was already known.
    ///
    /// Subjects missing from `current` (skipped groups, other financial
    /// years) keep their last observation, so their unchanged state is not
    /// mistaken for first sight on a later round.
    pub fn commit(&mut self, current: HashMap<AlertSubject, Observation>) {
        self.last.extend(current);
    }

    pub fn last_observation(&self, subject: &AlertSubject) -> Option<&Observation> {
        self.last.get(subject)
    }
}

fn describe(subject: &AlertSubject, trigger: AlertTrigger, observation: &Observation) -> String {
    match trigger {
        AlertTrigger::PriorityEscalated(level) => format!(
            "{subject} escalated to {level} priority, outstanding {}",
            observation.outstanding
        ),
        AlertTrigger::BecameOverdue => {
            format!("{subject} is overdue, outstanding {}", observation.outstanding)
        }
    }
}

/// Receives alerts; delivery is up to the implementation.
pub trait AlertSink: Send + Sync {
    fn deliver(&self, alert: Alert);
}

/// Collects alerts in memory.
#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertSink for MemoryAlertSink {
    fn deliver(&self, alert: Alert) {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(alert);
    }
}

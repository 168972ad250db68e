//! System Task Engine: business events -> advisory tasks.
//!
//! Each event kind has one rule that drafts a task. The engine assigns a role,
//! scores the draft, and keeps at most one open task per (kind, entity).
//! Rule failures are guarded: they are logged and reported in the outcome,
//! and the remaining events are still processed.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::events::{EventKind, SystemEvent};
use crate::roles::RoleDirectory;
use crate::scoring::ScoringPolicy;
use crate::task::{AdvisoryTask, Priority, TaskStatus};

/// What a rule contributes; the engine fills in the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub detail: String,
    pub due_on: Option<NaiveDate>,
}

pub trait TaskRule: Send + Sync {
    fn kind(&self) -> EventKind;
    fn draft(&self, event: &SystemEvent) -> Result<TaskDraft>;
}

fn occurred_plus(event: &SystemEvent, days: i64) -> NaiveDate {
    event.occurred_at.date_naive() + Duration::days(days)
}

fn amount_text(event: &SystemEvent) -> String {
    event
        .amount
        .map(|a| format!(" ({})", a.normalize()))
        .unwrap_or_default()
}

/// Default rule set, one per kind.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinRule(pub EventKind);

impl TaskRule for BuiltinRule {
    fn kind(&self) -> EventKind {
        self.0
    }

    fn draft(&self, event: &SystemEvent) -> Result<TaskDraft> {
        let entity = &event.entity_ref;
        let note = event.note.clone().unwrap_or_default();
        let draft = match self.0 {
            EventKind::StatementUploaded => TaskDraft {
                title: format!("Review uploaded bank statement {entity}"),
                detail: if note.is_empty() {
                    "Check the parsed lines against the printed statement.".to_string()
                } else {
                    note
                },
                due_on: Some(occurred_plus(event, 3)),
            },
            EventKind::UnreconciledLines => TaskDraft {
                title: format!("Reconcile statement lines for {entity}{}", amount_text(event)),
                detail: "Match each unmatched bank line to a receipt, payment or expense.".to_string(),
                due_on: Some(occurred_plus(event, 7)),
            },
            EventKind::LowStock => TaskDraft {
                title: format!("Restock {entity}"),
                detail: if note.is_empty() {
                    "Available quantity fell below the reorder level.".to_string()
                } else {
                    note
                },
                due_on: Some(event.due_on.unwrap_or_else(|| occurred_plus(event, 2))),
            },
            EventKind::BatchExpiring => {
                let expiry = event
                    .due_on
                    .ok_or_else(|| anyhow!("batch_expiring event {} has no expiry date", event.id))?;
                TaskDraft {
                    title: format!("Batch {entity} expires on {expiry}"),
                    detail: "Prioritise dispatch or arrange return to principal.".to_string(),
                    due_on: Some(expiry - Duration::days(30)),
                }
            }
            EventKind::InvoiceOverdue => {
                let due = event
                    .due_on
                    .ok_or_else(|| anyhow!("invoice_overdue event {} has no due date", event.id))?;
                TaskDraft {
                    title: format!("Follow up overdue invoice {entity}{}", amount_text(event)),
                    detail: format!("Invoice was due on {due}."),
                    due_on: Some(due),
                }
            }
            EventKind::AdvancePaymentUnallocated => TaskDraft {
                title: format!("Allocate advance payment {entity}{}", amount_text(event)),
                detail: "Apply the advance to open invoices or record a refund.".to_string(),
                due_on: Some(occurred_plus(event, 5)),
            },
            EventKind::LandedCostPending => TaskDraft {
                title: format!("Capitalise landed cost for {entity}{}", amount_text(event)),
                detail: "Import duties and freight are not yet allocated to batches.".to_string(),
                due_on: Some(event.due_on.unwrap_or_else(|| occurred_plus(event, 7))),
            },
            EventKind::PurchaseOrderReceived => TaskDraft {
                title: format!("Check goods receipt for {entity}"),
                detail: "Verify quantities, batch numbers and expiry dates.".to_string(),
                due_on: Some(occurred_plus(event, 2)),
            },
        };
        Ok(draft)
    }
}

#[derive(Debug, Default)]
pub struct EngineOutcome {
    pub created: Vec<AdvisoryTask>,
    /// Events skipped because an open task already covers the entity.
    pub suppressed: usize,
    /// Events with no registered rule.
    pub unhandled: usize,
    /// Guarded rule failures, one message per event.
    pub failures: Vec<String>,
}

pub struct TaskEngine {
    rules: HashMap<EventKind, Box<dyn TaskRule>>,
    roles: RoleDirectory,
    scoring: ScoringPolicy,
}

impl Default for TaskEngine {
    fn default() -> Self {
        Self::new(RoleDirectory::default(), ScoringPolicy::default())
    }
}

impl TaskEngine {
    /// Engine with the built-in rule for every kind.
    pub fn new(roles: RoleDirectory, scoring: ScoringPolicy) -> Self {
        let mut engine = Self {
            rules: HashMap::new(),
            roles,
            scoring,
        };
        for kind in EventKind::ALL {
            engine.register(Box::new(BuiltinRule(kind)));
        }
        engine
    }

    /// Replace the rule for its kind.
    pub fn register(&mut self, rule: Box<dyn TaskRule>) {
        self.rules.insert(rule.kind(), rule);
    }

    pub fn unregister(&mut self, kind: EventKind) {
        self.rules.remove(&kind);
    }

    pub fn roles(&self) -> &RoleDirectory {
        &self.roles
    }

    fn build_task(
        &self,
        event: &SystemEvent,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Option<AdvisoryTask>> {
        let Some(rule) = self.rules.get(&event.kind) else {
            return Ok(None);
        };
        let draft = rule
            .draft(event)
            .with_context(|| format!("rule {} failed", event.kind.as_str()))?;
        let score = self.scoring.score(event, draft.due_on, today);
        Ok(Some(AdvisoryTask {
            id: format!("task-{}", event.id),
            event_id: event.id.clone(),
            kind: event.kind,
            entity_ref: event.entity_ref.clone(),
            title: draft.title,
            detail: draft.detail,
            assigned_role: self.roles.assign(event.kind),
            score,
            priority: Priority::from_score(score),
            status: TaskStatus::Open,
            due_on: draft.due_on,
            created_at: now,
        }))
    }

    /// Process events in order against the currently open tasks.
    ///
    /// `today` is the business-local date used for due-date urgency.
    pub fn process(
        &self,
        events: &[SystemEvent],
        open_tasks: &[AdvisoryTask],
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> EngineOutcome {
        let mut covered: HashSet<(EventKind, String)> = open_tasks
            .iter()
            .filter(|t| t.status.is_open())
            .map(|t| {
                let (kind, entity) = t.dedupe_key();
                (kind, entity.to_string())
            })
            .collect();
        let mut outcome = EngineOutcome::default();

        for event in events {
            let key = (event.kind, event.entity_ref.clone());
            if covered.contains(&key) {
                debug!(event_id = %event.id, kind = event.kind.as_str(), "open task already covers entity");
                outcome.suppressed += 1;
                continue;
            }

            match self.build_task(event, today, now) {
                Ok(Some(task)) => {
                    info!(
                        task_id = %task.id,
                        role = task.assigned_role.as_str(),
                        priority = task.priority.as_str(),
                        score = task.score,
                        "raised advisory task"
                    );
                    covered.insert(key);
                    outcome.created.push(task);
                }
                Ok(None) => {
                    debug!(event_id = %event.id, kind = event.kind.as_str(), "no rule registered");
                    outcome.unhandled += 1;
                }
                Err(e) => {
                    warn!(event_id = %event.id, error = %format!("{e:#}"), "task rule failed; event skipped");
                    outcome.failures.push(format!("{}: {e:#}", event.id));
                }
            }
        }

        outcome
    }
}

//! Business events that may raise advisory tasks.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StatementUploaded,
    UnreconciledLines,
    LowStock,
    BatchExpiring,
    InvoiceOverdue,
    AdvancePaymentUnallocated,
    LandedCostPending,
    PurchaseOrderReceived,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::StatementUploaded,
        EventKind::UnreconciledLines,
        EventKind::LowStock,
        EventKind::BatchExpiring,
        EventKind::InvoiceOverdue,
        EventKind::AdvancePaymentUnallocated,
        EventKind::LandedCostPending,
        EventKind::PurchaseOrderReceived,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::StatementUploaded => "statement_uploaded",
            EventKind::UnreconciledLines => "unreconciled_lines",
            EventKind::LowStock => "low_stock",
            EventKind::BatchExpiring => "batch_expiring",
            EventKind::InvoiceOverdue => "invoice_overdue",
            EventKind::AdvancePaymentUnallocated => "advance_payment_unallocated",
            EventKind::LandedCostPending => "landed_cost_pending",
            EventKind::PurchaseOrderReceived => "purchase_order_received",
        }
    }

    /// Accepts snake_case or kebab-case names.
    pub fn parse(s: &str) -> Option<Self> {
        let norm = s.trim().to_ascii_lowercase().replace('-', "_");
        EventKind::ALL.into_iter().find(|k| k.as_str() == norm)
    }

    /// Starting point of the priority score before urgency and amount boosts.
    pub fn base_score(self) -> u8 {
        match self {
            EventKind::InvoiceOverdue => 60,
            EventKind::BatchExpiring => 55,
            EventKind::LowStock => 50,
            EventKind::AdvancePaymentUnallocated => 45,
            EventKind::UnreconciledLines => 40,
            EventKind::LandedCostPending => 35,
            EventKind::StatementUploaded => 30,
            EventKind::PurchaseOrderReceived => 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEvent {
    pub id: String,
    pub kind: EventKind,
    pub entity_ref: String,
    pub occurred_at: DateTime<Utc>,
    pub amount: Option<Decimal>,
    pub due_on: Option<NaiveDate>,
    pub note: Option<String>,
}

impl SystemEvent {
    pub fn new(
        id: impl Into<String>,
        kind: EventKind,
        entity_ref: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            entity_ref: entity_ref.into(),
            occurred_at,
            amount: None,
            due_on: None,
            note: None,
        }
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_due_on(mut self, due_on: NaiveDate) -> Self {
        self.due_on = Some(due_on);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

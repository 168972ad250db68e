//! Role-based task assignment.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::events::EventKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Accounts,
    Sales,
    Warehouse,
    Purchasing,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Accounts => "accounts",
            Role::Sales => "sales",
            Role::Warehouse => "warehouse",
            Role::Purchasing => "purchasing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "accounts" | "finance" => Some(Role::Accounts),
            "sales" => Some(Role::Sales),
            "warehouse" => Some(Role::Warehouse),
            "purchasing" | "purchase" => Some(Role::Purchasing),
            _ => None,
        }
    }
}

fn default_role(kind: EventKind) -> Role {
    match kind {
        EventKind::StatementUploaded
        | EventKind::UnreconciledLines
        | EventKind::AdvancePaymentUnallocated
        | EventKind::LandedCostPending => Role::Accounts,
        EventKind::LowStock | EventKind::BatchExpiring => Role::Warehouse,
        EventKind::InvoiceOverdue => Role::Sales,
        EventKind::PurchaseOrderReceived => Role::Purchasing,
    }
}

/// Event kind -> responsible role, with per-deployment overrides.
#[derive(Debug, Clone, Default)]
pub struct RoleDirectory {
    overrides: HashMap<EventKind, Role>,
}

impl RoleDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from config-style string pairs; unknown names are returned as errors
    /// so the caller can report them.
    pub fn from_pairs<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> (Self, Vec<String>) {
        let mut dir = Self::new();
        let mut rejected = Vec::new();
        for (kind, role) in pairs {
            match (EventKind::parse(kind), Role::parse(role)) {
                (Some(k), Some(r)) => {
                    dir.overrides.insert(k, r);
                }
                _ => rejected.push(format!("{kind} = {role}")),
            }
        }
        (dir, rejected)
    }

    pub fn with_override(mut self, kind: EventKind, role: Role) -> Self {
        self.overrides.insert(kind, role);
        self
    }

    pub fn assign(&self, kind: EventKind) -> Role {
        self.overrides
            .get(&kind)
            .copied()
            .unwrap_or_else(|| default_role(kind))
    }
}

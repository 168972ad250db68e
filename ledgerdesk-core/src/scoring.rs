//! Priority scoring: base(kind) + due-date urgency + amount tier, clamped to 0..=100.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::events::SystemEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountTier {
    /// Minimum absolute amount for this boost.
    pub at_least: Decimal,
    pub boost: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub overdue_boost: u8,
    pub within_3_days_boost: u8,
    pub within_7_days_boost: u8,
    /// Highest matching tier wins.
    pub amount_tiers: Vec<AmountTier>,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            overdue_boost: 30,
            within_3_days_boost: 20,
            within_7_days_boost: 10,
            amount_tiers: vec![
                AmountTier { at_least: Decimal::from(1_000_000u64), boost: 5 },
                AmountTier { at_least: Decimal::from(10_000_000u64), boost: 10 },
                AmountTier { at_least: Decimal::from(100_000_000u64), boost: 15 },
            ],
        }
    }
}

impl ScoringPolicy {
    pub fn urgency_boost(&self, due_on: Option<NaiveDate>, today: NaiveDate) -> u8 {
        let Some(due) = due_on else { return 0 };
        let days_left = (due - today).num_days();
        match days_left {
            d if d < 0 => self.overdue_boost,
            0..=3 => self.within_3_days_boost,
            4..=7 => self.within_7_days_boost,
            _ => 0,
        }
    }

    pub fn amount_boost(&self, amount: Option<Decimal>) -> u8 {
        let Some(amount) = amount else { return 0 };
        let amount = amount.abs();
        self.amount_tiers
            .iter()
            .filter(|t| amount >= t.at_least)
            .map(|t| t.boost)
            .max()
            .unwrap_or(0)
    }

    /// Score an event against the due date its task will carry.
    pub fn score(&self, event: &SystemEvent, due_on: Option<NaiveDate>, today: NaiveDate) -> u8 {
        let total = u32::from(event.kind.base_score())
            + u32::from(self.urgency_boost(due_on, today))
            + u32::from(self.amount_boost(event.amount));
        total.min(100) as u8
    }
}

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::period::StatementPeriod;

/// One parsed statement document. Built once per parse and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementMetadata {
    pub period: StatementPeriod,
    /// Masked or raw account number as printed, when found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    pub currency: String,
}

/// Normalized line item. Exactly one of `debit_amount`/`credit_amount` is non-zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementTransaction {
    pub date: NaiveDate,
    pub description: String,
    /// Four-digit originating branch code; empty when not printed.
    pub branch_code: String,
    pub debit_amount: Decimal,
    pub credit_amount: Decimal,
    /// Balance as printed after this line, if any.
    pub running_balance: Option<Decimal>,
}

impl StatementTransaction {
    pub fn is_debit(&self) -> bool {
        !self.debit_amount.is_zero()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub total_debits: Decimal,
    pub total_credits: Decimal,
}

impl Totals {
    /// Add one line to the running totals. Returns false and leaves the
    /// totals untouched when either sum would overflow.
    pub fn try_add(&mut self, txn: &StatementTransaction) -> bool {
        let (Some(debits), Some(credits)) = (
            self.total_debits.checked_add(txn.debit_amount),
            self.total_credits.checked_add(txn.credit_amount),
        ) else {
            return false;
        };
        self.total_debits = debits;
        self.total_credits = credits;
        true
    }
}

/// Printed closing balance versus what the parsed lines imply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceCheck {
    pub expected_closing: Decimal,
    pub printed_closing: Decimal,
    pub difference: Decimal,
}

impl BalanceCheck {
    pub fn is_balanced(&self) -> bool {
        self.difference.is_zero()
    }
}

/// Parser output. `transactions` is in document order; callers may rely on it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub metadata: StatementMetadata,
    pub transactions: Vec<StatementTransaction>,
    pub totals: Totals,
    /// Non-empty lines looked at.
    pub lines_scanned: usize,
    /// Lines that started with `DD/MM` but produced no transaction.
    pub lines_skipped: usize,
}

impl ParseResult {
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Saturates instead of panicking on balances near `Decimal::MAX`; a
    /// saturated figure never balances against a printed one by accident.
    pub fn balance_check(&self) -> BalanceCheck {
        let expected_closing = self
            .metadata
            .opening_balance
            .saturating_sub(self.totals.total_debits)
            .saturating_add(self.totals.total_credits);
        BalanceCheck {
            expected_closing,
            printed_closing: self.metadata.closing_balance,
            difference: self.metadata.closing_balance.saturating_sub(expected_closing),
        }
    }

    pub fn report(&self) -> ParseReport {
        ParseReport {
            metadata: ReportMetadata {
                period: self.metadata.period.label.clone(),
                start_date: self.metadata.period.start_date,
                end_date: self.metadata.period.end_date,
                account_number: self.metadata.account_number.clone(),
                currency: self.metadata.currency.clone(),
                opening_balance: self.metadata.opening_balance,
                closing_balance: self.metadata.closing_balance,
                total_debits: self.totals.total_debits,
                total_credits: self.totals.total_credits,
                transaction_count: self.transactions.len(),
                lines_skipped: self.lines_skipped,
            },
            transactions: self.transactions.clone(),
        }
    }
}

/// Wire form: one metadata record plus N rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseReport {
    pub metadata: ReportMetadata,
    pub transactions: Vec<StatementTransaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub period: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    pub currency: String,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    pub total_debits: Decimal,
    pub total_credits: Decimal,
    pub transaction_count: usize,
    pub lines_skipped: usize,
}

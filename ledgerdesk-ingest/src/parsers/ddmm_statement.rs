//! Tabular bank statement with one transaction per text line.
//!
//! Expected extracted text (field order is fixed, whitespace separated):
//!   PERIODE : NOVEMBER 2025
//!   SALDO AWAL : 1,000,000.00
//!   TANGGAL  KETERANGAN            CBG   MUTASI          SALDO
//!   05/11    TRSF E-BANKING DB     0123  250,000.00 DB   750,000.00
//!   07/11    SETORAN TUNAI               50,000.00       800,000.00
//!   SALDO AKHIR : 750,000.00
//!
//! Rows are `DD/MM`, description tokens, optional 4-digit branch code, amount,
//! optional debit marker, running balance. Every other line is ignored;
//! wrapped description continuations are dropped, not reassembled.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::amount::{is_branch_code, is_numeric_token, parse_amount};
use crate::error::IngestError;
use crate::period::{StatementPeriod, resolve_period};
use crate::types::{ParseResult, StatementMetadata, StatementTransaction, Totals};

/// Literal vocabulary of the statement layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementLayout {
    pub debit_marker: String,
    pub credit_marker: String,
    pub opening_phrases: Vec<String>,
    pub closing_phrases: Vec<String>,
    pub period_keywords: Vec<String>,
    pub account_labels: Vec<String>,
    pub currency_labels: Vec<String>,
    pub default_currency: String,
}

impl Default for StatementLayout {
    fn default() -> Self {
        Self {
            debit_marker: "DB".to_string(),
            credit_marker: "CR".to_string(),
            opening_phrases: vec!["SALDO AWAL".to_string(), "OPENING BALANCE".to_string()],
            closing_phrases: vec!["SALDO AKHIR".to_string(), "CLOSING BALANCE".to_string()],
            period_keywords: vec!["PERIODE".to_string(), "PERIOD".to_string()],
            account_labels: vec![
                "NO. REKENING".to_string(),
                "NO REKENING".to_string(),
                "ACCOUNT NUMBER".to_string(),
                "ACCOUNT NO".to_string(),
            ],
            currency_labels: vec!["MATA UANG".to_string(), "CURRENCY".to_string()],
            default_currency: "IDR".to_string(),
        }
    }
}

/// `DD/MM` token -> (day, month).
fn date_token(token: &str) -> Option<(u32, u32)> {
    let bytes = token.as_bytes();
    if bytes.len() != 5 || bytes[2] != b'/' {
        return None;
    }
    if !token[..2].chars().all(|c| c.is_ascii_digit()) || !token[3..].chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let day = token[..2].parse().ok()?;
    let month = token[3..].parse().ok()?;
    Some((day, month))
}

fn starts_with_date(line: &str) -> bool {
    line.split_whitespace().next().and_then(date_token).is_some()
}

/// True when any line of `text` begins with a `DD/MM` token.
pub fn has_date_prefixed_line(text: &str) -> bool {
    text.lines().any(starts_with_date)
}

/// Text following the first of `phrases` on `line` (ASCII case-insensitive).
fn after_phrase<'a>(line: &'a str, phrases: &[String]) -> Option<&'a str> {
    let upper = line.to_ascii_uppercase();
    phrases.iter().find_map(|p| {
        let p = p.to_ascii_uppercase();
        if p.is_empty() {
            return None;
        }
        upper.find(&p).map(|idx| &line[idx + p.len()..])
    })
}

fn first_amount(rest: &str) -> Option<Decimal> {
    rest.split_whitespace().find_map(parse_amount)
}

fn label_value(rest: &str) -> Option<&str> {
    rest.trim_start_matches(|c: char| c == ':' || c == '.' || c.is_whitespace())
        .split_whitespace()
        .next()
}

#[derive(Debug, Default)]
struct MetadataScan {
    period: Option<StatementPeriod>,
    fallback_period: Option<StatementPeriod>,
    account_number: Option<String>,
    currency: Option<String>,
    opening_balance: Option<Decimal>,
    closing_balance: Option<Decimal>,
}

impl MetadataScan {
    /// Inspect one line. Returns true when the line is a balance line, which is
    /// never a transaction candidate.
    fn observe(&mut self, line: &str, layout: &StatementLayout) -> bool {
        if self.period.is_none() {
            let upper = line.to_ascii_uppercase();
            let keyword = layout
                .period_keywords
                .iter()
                .any(|k| !k.is_empty() && upper.contains(&k.to_ascii_uppercase()));
            if keyword {
                self.period = resolve_period(line);
            } else if self.fallback_period.is_none() && !starts_with_date(line) {
                self.fallback_period = resolve_period(line);
            }
        }

        if self.account_number.is_none() {
            if let Some(value) = after_phrase(line, &layout.account_labels).and_then(label_value) {
                if value.chars().any(|c| c.is_ascii_digit()) {
                    self.account_number = Some(value.to_string());
                }
            }
        }

        if self.currency.is_none() {
            if let Some(value) = after_phrase(line, &layout.currency_labels).and_then(label_value) {
                if value.len() == 3 && value.chars().all(|c| c.is_ascii_alphabetic()) {
                    self.currency = Some(value.to_ascii_uppercase());
                }
            }
        }

        if let Some(rest) = after_phrase(line, &layout.opening_phrases) {
            if self.opening_balance.is_none() {
                self.opening_balance = first_amount(rest);
            }
            return true;
        }
        if let Some(rest) = after_phrase(line, &layout.closing_phrases) {
            if self.closing_balance.is_none() {
                self.closing_balance = first_amount(rest);
            }
            return true;
        }
        false
    }
}

fn parse_transaction_line(
    line: &str,
    year: i32,
    layout: &StatementLayout,
) -> Option<StatementTransaction> {
    let mut tokens = line.split_whitespace();
    let (day, month) = date_token(tokens.next()?)?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let tokens: Vec<&str> = tokens.collect();

    let mut idx = 0;
    let mut description: Vec<&str> = Vec::new();
    let mut branch_code = "";
    while idx < tokens.len() {
        let token = tokens[idx];
        if is_branch_code(token) {
            branch_code = token;
            idx += 1;
            break;
        }
        if is_numeric_token(token) {
            break;
        }
        description.push(token);
        idx += 1;
    }

    let amount_pos = idx + tokens[idx..].iter().position(|t| is_numeric_token(t))?;
    let amount = parse_amount(tokens[amount_pos])?;
    idx = amount_pos + 1;

    let is_debit = match tokens.get(idx) {
        Some(t) if t.eq_ignore_ascii_case(&layout.debit_marker) => {
            idx += 1;
            true
        }
        Some(t) if t.eq_ignore_ascii_case(&layout.credit_marker) => {
            idx += 1;
            false
        }
        _ => false,
    };

    let running_balance = tokens[idx..].iter().copied().find_map(parse_amount);

    if amount <= Decimal::ZERO {
        return None;
    }

    let (debit_amount, credit_amount) = if is_debit {
        (amount, Decimal::ZERO)
    } else {
        (Decimal::ZERO, amount)
    };

    Some(StatementTransaction {
        date,
        description: description.join(" "),
        branch_code: branch_code.to_string(),
        debit_amount,
        credit_amount,
        running_balance,
    })
}

/// Parse extracted statement text.
///
/// Single pass, no I/O, deterministic. Malformed lines are skipped and counted;
/// the only failures are a missing period and an empty result.
/// `currency` is the caller's account currency, used when the statement does
/// not print one.
pub fn parse_statement_text(
    text: &str,
    layout: &StatementLayout,
    currency: Option<&str>,
) -> Result<ParseResult, IngestError> {
    let mut scan = MetadataScan::default();
    let mut candidates: Vec<(usize, &str)> = Vec::new();
    let mut lines_scanned = 0usize;

    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        lines_scanned += 1;
        let is_balance_line = scan.observe(line, layout);
        if !is_balance_line && starts_with_date(line) {
            candidates.push((line_no + 1, line));
        }
    }

    let Some(period) = scan.period.take().or(scan.fallback_period.take()) else {
        if candidates.is_empty() {
            return Err(IngestError::NoTransactions {
                lines_scanned,
                lines_skipped: 0,
            });
        }
        return Err(IngestError::PeriodNotFound);
    };

    let year = period.year();
    let mut transactions = Vec::with_capacity(candidates.len());
    let mut totals = Totals::default();
    let mut lines_skipped = 0usize;
    for (line_no, line) in candidates {
        match parse_transaction_line(line, year, layout) {
            Some(txn) => {
                if totals.try_add(&txn) {
                    transactions.push(txn);
                } else {
                    lines_skipped += 1;
                    warn!(line_no, line, "skipped dated line whose amount overflows the statement totals");
                }
            }
            None => {
                lines_skipped += 1;
                debug!(line_no, line, "skipped dated line without a usable amount");
            }
        }
    }

    if transactions.is_empty() {
        return Err(IngestError::NoTransactions {
            lines_scanned,
            lines_skipped,
        });
    }

    let currency = scan
        .currency
        .or_else(|| currency.map(|c| c.trim().to_ascii_uppercase()).filter(|c| !c.is_empty()))
        .unwrap_or_else(|| layout.default_currency.clone());

    debug!(
        period = %period.label,
        count = transactions.len(),
        lines_skipped,
        "parsed statement"
    );

    Ok(ParseResult {
        metadata: StatementMetadata {
            period,
            account_number: scan.account_number,
            opening_balance: scan.opening_balance.unwrap_or(Decimal::ZERO),
            closing_balance: scan.closing_balance.unwrap_or(Decimal::ZERO),
            currency,
        },
        transactions,
        totals,
        lines_scanned,
        lines_skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn parse(text: &str) -> Result<ParseResult, IngestError> {
        parse_statement_text(text, &StatementLayout::default(), None)
    }

    const NOVEMBER: &str = r#"
PT BANK CENTRAL
NO. REKENING : 0123XXXX89
PERIODE : NOVEMBER 2025
MATA UANG : IDR
SALDO AWAL : 1,000,000
TANGGAL KETERANGAN CBG MUTASI SALDO
05/11 TRSF E-BANKING PT MEDIKA 0123 250,000 DB 750,000
SALDO AKHIR : 750,000
"#;

    #[test]
    fn november_statement_end_to_end() {
        let res = parse(NOVEMBER).unwrap();
        assert_eq!(res.metadata.period.label, "NOVEMBER 2025");
        assert_eq!(res.metadata.period.start_date, NaiveDate::from_ymd_opt(2025, 11, 1).unwrap());
        assert_eq!(res.metadata.period.end_date, NaiveDate::from_ymd_opt(2025, 11, 30).unwrap());
        assert_eq!(res.metadata.opening_balance, dec("1000000"));
        assert_eq!(res.metadata.closing_balance, dec("750000"));
        assert_eq!(res.metadata.account_number.as_deref(), Some("0123XXXX89"));
        assert_eq!(res.metadata.currency, "IDR");

        assert_eq!(res.transaction_count(), 1);
        let t = &res.transactions[0];
        assert_eq!(t.date, NaiveDate::from_ymd_opt(2025, 11, 5).unwrap());
        assert_eq!(t.description, "TRSF E-BANKING PT MEDIKA");
        assert_eq!(t.branch_code, "0123");
        assert_eq!(t.debit_amount, dec("250000"));
        assert_eq!(t.credit_amount, Decimal::ZERO);
        assert_eq!(t.running_balance, Some(dec("750000")));

        assert_eq!(res.totals.total_debits, dec("250000"));
        assert_eq!(res.totals.total_credits, Decimal::ZERO);
        assert!(res.balance_check().is_balanced());
    }

    #[test]
    fn missing_debit_marker_means_credit() {
        let text = "PERIODE : NOVEMBER 2025\n06/11 SETORAN 0123 250,000 1,000,000\n";
        let res = parse(text).unwrap();
        let t = &res.transactions[0];
        assert_eq!(t.credit_amount, dec("250000"));
        assert_eq!(t.debit_amount, Decimal::ZERO);
        assert_eq!(t.branch_code, "0123");
        assert_eq!(t.running_balance, Some(dec("1000000")));
    }

    #[test]
    fn explicit_credit_marker_is_consumed() {
        let text = "PERIODE : NOVEMBER 2025\n06/11 BUNGA 1,250.50 CR 1,001,250.50\n";
        let t = &parse(text).unwrap().transactions[0];
        assert_eq!(t.credit_amount, dec("1250.50"));
        assert_eq!(t.branch_code, "");
        assert_eq!(t.running_balance, Some(dec("1001250.50")));
    }

    #[test]
    fn balance_is_optional() {
        let text = "PERIODE : NOVEMBER 2025\n06/11 BIAYA ADM 15,000 DB\n";
        let t = &parse(text).unwrap().transactions[0];
        assert!(t.is_debit());
        assert_eq!(t.running_balance, None);
    }

    #[test]
    fn no_dated_lines_is_an_extraction_failure() {
        let err = parse("PERIODE : NOVEMBER 2025\nSALDO AWAL : 10\nnothing here\n").unwrap_err();
        assert!(matches!(err, IngestError::NoTransactions { lines_skipped: 0, .. }));
        assert!(matches!(parse("").unwrap_err(), IngestError::NoTransactions { .. }));
    }

    #[test]
    fn dated_lines_without_period_are_rejected() {
        let err = parse("05/11 TRANSFER 100 DB 200\n").unwrap_err();
        assert!(matches!(err, IngestError::PeriodNotFound));
    }

    #[test]
    fn zero_and_unparseable_amounts_are_skipped_and_counted() {
        let text = "PERIODE : NOVEMBER 2025\n\
                    01/11 BIAYA 0 DB 100\n\
                    02/11 NO AMOUNT HERE\n\
                    31/11 IMPOSSIBLE DATE 10 DB\n\
                    03/11 OK 10 DB 90\n";
        let res = parse(text).unwrap();
        assert_eq!(res.transaction_count(), 1);
        assert_eq!(res.lines_skipped, 3);
        assert_eq!(res.lines_scanned, 5);
    }

    #[test]
    fn dated_balance_lines_are_metadata_not_transactions() {
        let text = "PERIODE : NOVEMBER 2025\n\
                    01/11 SALDO AWAL 1,000,000.00\n\
                    05/11 TARIKAN ATM 0456 100,000.00 DB 900,000.00\n";
        let res = parse(text).unwrap();
        assert_eq!(res.transaction_count(), 1);
        assert_eq!(res.metadata.opening_balance, dec("1000000.00"));
        assert_eq!(res.totals.total_credits, Decimal::ZERO);
    }

    #[test]
    fn totals_match_line_sums_and_order_is_preserved() {
        let text = "PERIODE : MARET 2025\n\
                    03/03 C 300 900\n\
                    01/03 A 100 DB 800\n\
                    02/03 B 1.250 DB 600\n\
                    04/03 D 40,5 940,5\n";
        let res = parse(text).unwrap();
        let descs: Vec<_> = res.transactions.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(descs, vec!["C", "A", "B", "D"]);

        let debits: Decimal = res.transactions.iter().map(|t| t.debit_amount).sum();
        let credits: Decimal = res.transactions.iter().map(|t| t.credit_amount).sum();
        assert_eq!(res.totals.total_debits, debits);
        assert_eq!(res.totals.total_credits, credits);
        assert_eq!(debits, dec("1350"));
        assert_eq!(credits, dec("340.5"));
    }

    #[test]
    fn line_that_would_overflow_totals_is_skipped() {
        let huge = "79,228,162,514,264,337,593,543,950,335";
        let text = format!(
            "PERIODE : NOVEMBER 2025\n\
             SALDO AWAL : {huge}\n\
             01/11 A {huge} 1\n\
             02/11 B {huge} 1\n\
             03/11 C 10 DB 5\n"
        );
        let res = parse(&text).unwrap();
        let descs: Vec<_> = res.transactions.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(descs, vec!["A", "C"]);
        assert_eq!(res.lines_skipped, 1);
        assert_eq!(res.totals.total_credits, Decimal::MAX);
        assert_eq!(res.totals.total_debits, dec("10"));

        let check = res.balance_check();
        assert_eq!(check.expected_closing, Decimal::MAX);
        assert!(!check.is_balanced());
    }

    #[test]
    fn exactly_one_side_is_non_zero() {
        let res = parse(NOVEMBER).unwrap();
        for t in &res.transactions {
            assert!(t.debit_amount.is_zero() ^ t.credit_amount.is_zero());
        }
    }

    #[test]
    fn parsing_is_idempotent() {
        let a = parse(NOVEMBER).unwrap();
        let b = parse(NOVEMBER).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a.report()).unwrap(),
            serde_json::to_string(&b.report()).unwrap()
        );
    }

    #[test]
    fn caller_currency_used_when_statement_has_none() {
        let text = "PERIOD : JANUARY 2026\n02/01 WIRE IN 5,000.00 5,000.00\n";
        let res = parse_statement_text(text, &StatementLayout::default(), Some("usd")).unwrap();
        assert_eq!(res.metadata.currency, "USD");
        let res = parse_statement_text(text, &StatementLayout::default(), None).unwrap();
        assert_eq!(res.metadata.currency, "IDR");
    }

    #[test]
    fn report_uses_wire_names() {
        let report = parse(NOVEMBER).unwrap().report();
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["metadata"]["startDate"], "2025-11-01");
        assert_eq!(v["metadata"]["endDate"], "2025-11-30");
        assert_eq!(v["metadata"]["transactionCount"], 1);
        assert_eq!(v["transactions"][0]["branchCode"], "0123");
        assert_eq!(v["transactions"][0]["debitAmount"], "250000");
        assert!(v["transactions"][0].get("runningBalance").is_some());
    }
}

use anyhow::{Context, Result};
use chrono::Utc;
use ledgerdesk_finance::UploadRequest;
use ledgerdesk_ingest::{
    Extractor, ParseResult, StatementTransaction, parse_statement_pdf, parse_statement_text,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::open_service;
use crate::config::Config;

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    date: String,
    description: &'a str,
    branch_code: &'a str,
    debit_amount: String,
    credit_amount: String,
    running_balance: String,
}

impl<'a> From<&'a StatementTransaction> for CsvRow<'a> {
    fn from(t: &'a StatementTransaction) -> Self {
        Self {
            date: t.date.to_string(),
            description: &t.description,
            branch_code: &t.branch_code,
            debit_amount: t.debit_amount.to_string(),
            credit_amount: t.credit_amount.to_string(),
            running_balance: t.running_balance.map(|b| b.to_string()).unwrap_or_default(),
        }
    }
}

/// One row per transaction, document order.
pub fn write_csv(path: &Path, transactions: &[StatementTransaction]) -> Result<()> {
    let mut w = csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    for t in transactions {
        w.serialize(CsvRow::from(t))?;
    }
    w.flush()?;
    Ok(())
}

fn print_summary(res: &ParseResult) {
    let m = &res.metadata;
    println!("Period:        {} ({} .. {})", m.period.label, m.period.start_date, m.period.end_date);
    if let Some(acct) = &m.account_number {
        println!("Account:       {acct}");
    }
    println!("Currency:      {}", m.currency);
    println!("Opening:       {}", m.opening_balance);
    println!("Closing:       {}", m.closing_balance);
    println!("Total debits:  {}", res.totals.total_debits);
    println!("Total credits: {}", res.totals.total_credits);
    println!(
        "Transactions:  {} ({} dated lines skipped)",
        res.transaction_count(),
        res.lines_skipped
    );
    let check = res.balance_check();
    if !check.is_balanced() {
        println!(
            "Balance check: expected closing {} but statement prints {} (difference {})",
            check.expected_closing, check.printed_closing, check.difference
        );
    }
    println!();
    for t in &res.transactions {
        let (side, amount) = if t.is_debit() {
            ("DB", t.debit_amount)
        } else {
            ("CR", t.credit_amount)
        };
        println!(
            "{} {:<4} {:>16} {} {:<40} {}",
            t.date,
            t.branch_code,
            amount,
            side,
            t.description,
            t.running_balance.map(|b| b.to_string()).unwrap_or_default()
        );
    }
}

fn emit(res: &ParseResult, json: bool, csv: Option<PathBuf>) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&res.report())?);
    } else {
        print_summary(res);
    }
    if let Some(out) = csv {
        write_csv(&out, &res.transactions)?;
        eprintln!("Wrote {} rows to {}", res.transaction_count(), out.display());
    }
    Ok(())
}

pub fn parse(
    cfg: &Config,
    pdf: &Path,
    json: bool,
    csv: Option<PathBuf>,
    extractor: Option<Extractor>,
) -> Result<()> {
    let bytes = fs::read(pdf).with_context(|| format!("read {}", pdf.display()))?;
    let extractor = extractor.unwrap_or(cfg.statement.extractor);
    let res = parse_statement_pdf(&bytes, extractor, &cfg.statement.layout, None)?;
    emit(&res, json, csv)
}

pub fn parse_text(cfg: &Config, txt: &Path, json: bool, csv: Option<PathBuf>) -> Result<()> {
    let text = fs::read_to_string(txt).with_context(|| format!("read {}", txt.display()))?;
    let res = parse_statement_text(&text, &cfg.statement.layout, None)?;
    emit(&res, json, csv)
}

pub fn upload(
    cfg: &Config,
    pdf: &Path,
    account: &str,
    currency: Option<String>,
    json: bool,
) -> Result<()> {
    let bytes = fs::read(pdf).with_context(|| format!("read {}", pdf.display()))?;
    let currency = currency.unwrap_or_else(|| cfg.statement.layout.default_currency.clone());
    let file_name = pdf
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("statement.pdf");

    let mut svc = open_service(cfg)?;
    let out = svc.upload(
        UploadRequest {
            file_name,
            bytes: &bytes,
            bank_account_id: account,
            currency: &currency,
        },
        Utc::now(),
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let up = &out.upload;
    println!("Upload:  {}", up.id);
    println!("Account: {} ({})", up.bank_account_id, up.currency);
    println!("Period:  {} ({} .. {})", up.period_label, up.start_date, up.end_date);
    println!(
        "Lines:   {} recorded, {} dated lines skipped",
        up.transaction_count, up.lines_skipped
    );
    if !out.balance.is_balanced() {
        println!("Balance: off by {} against the printed closing balance", out.balance.difference);
    }
    println!("Tasks:   {} raised", out.tasks.len());
    for t in &out.tasks {
        println!("  - [{}] {} -> {} ({})", t.priority.as_str(), t.title, t.assigned_role.as_str(), t.id);
    }
    for f in &out.task_failures {
        println!("  ! {f}");
    }
    Ok(())
}

pub fn uploads(cfg: &Config, account: Option<&str>, json: bool) -> Result<()> {
    let svc = open_service(cfg)?;
    let rows = svc.db().list_uploads(account)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No uploads.");
        return Ok(());
    }
    for u in rows {
        println!(
            "{}  {:<16} {:<16} {:>4} lines  debits {}  credits {}  {}",
            u.id,
            u.bank_account_id,
            u.period_label,
            u.transaction_count,
            u.total_debits,
            u.total_credits,
            u.file_name
        );
    }
    Ok(())
}

pub fn lines(cfg: &Config, upload_id: &str, json: bool) -> Result<()> {
    let svc = open_service(cfg)?;
    if svc.db().get_upload(upload_id)?.is_none() {
        anyhow::bail!("no upload {upload_id} (see: ledgerdesk uploads)");
    }
    let rows = svc.db().lines_for_upload(upload_id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    for l in rows {
        println!(
            "{:>3} {} {:<4} {:>16} {:>16} {:<10} {}",
            l.line_no,
            l.date,
            l.branch_code,
            l.debit_amount,
            l.credit_amount,
            l.reconciliation_status,
            l.description
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerdesk_ingest::StatementLayout;

    #[test]
    fn csv_export_keeps_document_order() {
        let text = "PERIODE : NOVEMBER 2025\n\
                    05/11 KLIRING PT FARMA 0123 250,000 DB 750,000\n\
                    06/11 SETORAN 100,000\n";
        let res = parse_statement_text(text, &StatementLayout::default(), None).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nov.csv");
        write_csv(&out, &res.transactions).unwrap();

        let s = fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = s.lines().collect();
        assert_eq!(
            lines[0],
            "date,description,branch_code,debit_amount,credit_amount,running_balance"
        );
        assert_eq!(lines[1], "2025-11-05,KLIRING PT FARMA,0123,250000,0,750000");
        assert_eq!(lines[2], "2025-11-06,SETORAN,,0,100000,");
    }
}

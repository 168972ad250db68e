//! SQLite ledger: statement uploads, statement lines and system tasks.
//!
//! Decimals are stored as TEXT so amounts survive without float rounding.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use ledgerdesk_core::{AdvisoryTask, EventKind, Priority, Role, TaskStatus};
use ledgerdesk_ingest::ParseResult;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Reconciliation status every persisted line starts with.
pub const UNMATCHED: &str = "unmatched";

const MIGRATIONS: &[(&str, &str)] = &[("0001_init.sql", include_str!("../migrations/0001_init.sql"))];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub id: String,
    pub bank_account_id: String,
    pub currency: String,
    pub file_name: String,
    pub object_key: String,
    pub file_sha1: String,
    pub period_label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub account_number: Option<String>,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    pub total_debits: Decimal,
    pub total_credits: Decimal,
    pub transaction_count: usize,
    pub lines_skipped: usize,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementLineRecord {
    pub id: String,
    pub upload_id: String,
    pub bank_account_id: String,
    /// Position in the source document, starting at 1.
    pub line_no: usize,
    pub date: NaiveDate,
    pub description: String,
    pub branch_code: String,
    pub debit_amount: Decimal,
    pub credit_amount: Decimal,
    pub running_balance: Option<Decimal>,
    pub currency: String,
    pub reconciliation_status: String,
}

/// Caller-side facts about an upload that the parser does not know.
#[derive(Debug, Clone, Copy)]
pub struct UploadSource<'a> {
    pub bank_account_id: &'a str,
    pub currency: &'a str,
    pub file_name: &'a str,
    pub object_key: &'a str,
    pub file_sha1: &'a str,
}

pub struct LedgerDb {
    conn: Connection,
}

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn conversion_err(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_err(idx, e))
}

fn opt_decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| Decimal::from_str(&s).map_err(|e| conversion_err(idx, e)))
        .transpose()
}

fn date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| conversion_err(idx, e))
}

fn opt_date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| conversion_err(idx, e)))
        .transpose()
}

fn ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

fn usize_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<usize> {
    let v: i64 = row.get(idx)?;
    Ok(usize::try_from(v).unwrap_or(0))
}

fn enum_at<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown value '{raw}'").into(),
        )
    })
}

/// Stable id for a persisted line: same upload and position, same id.
fn line_id(upload_id: &str, line_no: usize) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("{upload_id}|{line_no}").as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    format!("ln_{}", &hex[..16])
}

const UPLOAD_COLUMNS: &str = "id, bank_account_id, currency, file_name, object_key, file_sha1, \
     period_label, start_date, end_date, account_number, opening_balance, closing_balance, \
     total_debits, total_credits, transaction_count, lines_skipped, uploaded_at";

fn upload_from_row(row: &Row<'_>) -> rusqlite::Result<UploadRecord> {
    Ok(UploadRecord {
        id: row.get(0)?,
        bank_account_id: row.get(1)?,
        currency: row.get(2)?,
        file_name: row.get(3)?,
        object_key: row.get(4)?,
        file_sha1: row.get(5)?,
        period_label: row.get(6)?,
        start_date: date_at(row, 7)?,
        end_date: date_at(row, 8)?,
        account_number: row.get(9)?,
        opening_balance: decimal_at(row, 10)?,
        closing_balance: decimal_at(row, 11)?,
        total_debits: decimal_at(row, 12)?,
        total_credits: decimal_at(row, 13)?,
        transaction_count: usize_at(row, 14)?,
        lines_skipped: usize_at(row, 15)?,
        uploaded_at: ts_at(row, 16)?,
    })
}

const TASK_COLUMNS: &str = "id, event_id, kind, entity_ref, title, detail, assigned_role, score, \
     priority, status, due_on, created_at";

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<AdvisoryTask> {
    let score: i64 = row.get(7)?;
    Ok(AdvisoryTask {
        id: row.get(0)?,
        event_id: row.get(1)?,
        kind: enum_at(row, 2, EventKind::parse)?,
        entity_ref: row.get(3)?,
        title: row.get(4)?,
        detail: row.get(5)?,
        assigned_role: enum_at(row, 6, Role::parse)?,
        score: u8::try_from(score.clamp(0, 100)).unwrap_or(100),
        priority: enum_at(row, 8, Priority::parse)?,
        status: enum_at(row, 9, TaskStatus::parse)?,
        due_on: opt_date_at(row, 10)?,
        created_at: ts_at(row, 11)?,
    })
}

impl LedgerDb {
    /// Open (creating if needed) the ledger at `path` and apply migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create ledger dir {}", parent.display()))?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open ledger db {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().context("open in-memory ledger db")?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("enable foreign keys")?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS schema_migrations (
                    version TEXT PRIMARY KEY,
                    applied_at TEXT NOT NULL
                );",
            )
            .context("create schema_migrations")?;
        for (version, sql) in MIGRATIONS {
            let applied: Option<String> = self
                .conn
                .query_row(
                    "SELECT version FROM schema_migrations WHERE version = ?1",
                    params![version],
                    |r| r.get(0),
                )
                .optional()?;
            if applied.is_some() {
                continue;
            }
            let tx = self.conn.unchecked_transaction()?;
            tx.execute_batch(sql)
                .with_context(|| format!("apply migration {version}"))?;
            tx.execute(
                "INSERT INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
                params![version, ts(Utc::now())],
            )?;
            tx.commit()?;
            debug!(version, "applied ledger migration");
        }
        Ok(())
    }

    /// Write one upload record plus one unreconciled line per parsed
    /// transaction, atomically.
    pub fn record_upload(
        &mut self,
        source: &UploadSource<'_>,
        result: &ParseResult,
        uploaded_at: DateTime<Utc>,
    ) -> Result<UploadRecord> {
        if source.bank_account_id.trim().is_empty() {
            bail!("bank account id is required");
        }
        if result.transactions.is_empty() {
            bail!("refusing to record an upload with no transactions");
        }

        let meta = &result.metadata;
        let record = UploadRecord {
            id: Uuid::new_v4().to_string(),
            bank_account_id: source.bank_account_id.to_string(),
            currency: source.currency.to_string(),
            file_name: source.file_name.to_string(),
            object_key: source.object_key.to_string(),
            file_sha1: source.file_sha1.to_string(),
            period_label: meta.period.label.clone(),
            start_date: meta.period.start_date,
            end_date: meta.period.end_date,
            account_number: meta.account_number.clone(),
            opening_balance: meta.opening_balance,
            closing_balance: meta.closing_balance,
            total_debits: result.totals.total_debits,
            total_credits: result.totals.total_credits,
            transaction_count: result.transaction_count(),
            lines_skipped: result.lines_skipped,
            uploaded_at,
        };

        let tx = self.conn.transaction().context("begin upload transaction")?;
        tx.execute(
            &format!(
                "INSERT INTO statement_uploads({UPLOAD_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
            ),
            params![
                record.id,
                record.bank_account_id,
                record.currency,
                record.file_name,
                record.object_key,
                record.file_sha1,
                record.period_label,
                record.start_date.to_string(),
                record.end_date.to_string(),
                record.account_number,
                record.opening_balance.to_string(),
                record.closing_balance.to_string(),
                record.total_debits.to_string(),
                record.total_credits.to_string(),
                record.transaction_count as i64,
                record.lines_skipped as i64,
                ts(record.uploaded_at),
            ],
        )
        .context("insert statement upload")?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO statement_lines(
                    id, upload_id, bank_account_id, line_no, txn_date, description, branch_code,
                    debit_amount, credit_amount, running_balance, currency, reconciliation_status
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )?;
            for (i, txn) in result.transactions.iter().enumerate() {
                let line_no = i + 1;
                stmt.execute(params![
                    line_id(&record.id, line_no),
                    record.id,
                    record.bank_account_id,
                    line_no as i64,
                    txn.date.to_string(),
                    txn.description,
                    txn.branch_code,
                    txn.debit_amount.to_string(),
                    txn.credit_amount.to_string(),
                    txn.running_balance.map(|b| b.to_string()),
                    record.currency,
                    UNMATCHED,
                ])
                .with_context(|| format!("insert statement line {line_no}"))?;
            }
        }
        tx.commit().context("commit upload transaction")?;

        info!(
            upload_id = %record.id,
            account = %record.bank_account_id,
            lines = record.transaction_count,
            "recorded statement upload"
        );
        Ok(record)
    }

    pub fn get_upload(&self, id: &str) -> Result<Option<UploadRecord>> {
        let sql = format!("SELECT {UPLOAD_COLUMNS} FROM statement_uploads WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], upload_from_row)
            .optional()?)
    }

    /// Newest statement period first.
    pub fn list_uploads(&self, bank_account_id: Option<&str>) -> Result<Vec<UploadRecord>> {
        let sql = format!(
            "SELECT {UPLOAD_COLUMNS} FROM statement_uploads
             WHERE ?1 IS NULL OR bank_account_id = ?1
             ORDER BY start_date DESC, uploaded_at DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![bank_account_id], upload_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Lines of one upload in document order.
    pub fn lines_for_upload(&self, upload_id: &str) -> Result<Vec<StatementLineRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, upload_id, bank_account_id, line_no, txn_date, description, branch_code,
                    debit_amount, credit_amount, running_balance, currency, reconciliation_status
             FROM statement_lines WHERE upload_id = ?1 ORDER BY line_no ASC",
        )?;
        let rows = stmt
            .query_map(params![upload_id], |row| {
                Ok(StatementLineRecord {
                    id: row.get(0)?,
                    upload_id: row.get(1)?,
                    bank_account_id: row.get(2)?,
                    line_no: usize_at(row, 3)?,
                    date: date_at(row, 4)?,
                    description: row.get(5)?,
                    branch_code: row.get(6)?,
                    debit_amount: decimal_at(row, 7)?,
                    credit_amount: decimal_at(row, 8)?,
                    running_balance: opt_decimal_at(row, 9)?,
                    currency: row.get(10)?,
                    reconciliation_status: row.get(11)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count_unmatched_lines(&self, upload_id: &str) -> Result<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM statement_lines WHERE upload_id = ?1 AND reconciliation_status = ?2",
            params![upload_id, UNMATCHED],
            |r| r.get(0),
        )?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    pub fn insert_tasks(&mut self, tasks: &[AdvisoryTask]) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }
        let now = ts(Utc::now());
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO system_tasks({TASK_COLUMNS}, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ))?;
            for t in tasks {
                stmt.execute(params![
                    t.id,
                    t.event_id,
                    t.kind.as_str(),
                    t.entity_ref,
                    t.title,
                    t.detail,
                    t.assigned_role.as_str(),
                    i64::from(t.score),
                    t.priority.as_str(),
                    t.status.as_str(),
                    t.due_on.map(|d| d.to_string()),
                    ts(t.created_at),
                    now,
                ])
                .with_context(|| format!("insert task {}", t.id))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> Result<Option<AdvisoryTask>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM system_tasks WHERE id = ?1");
        Ok(self.conn.query_row(&sql, params![id], task_from_row).optional()?)
    }

    /// Open and in-progress tasks, oldest first.
    pub fn open_tasks(&self) -> Result<Vec<AdvisoryTask>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM system_tasks
             WHERE status IN ('open', 'in_progress')
             ORDER BY created_at ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], task_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn set_task_status(&self, id: &str, status: TaskStatus) -> Result<()> {
        let n = self.conn.execute(
            "UPDATE system_tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), ts(Utc::now()), id],
        )?;
        if n == 0 {
            bail!("no task {id}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerdesk_ingest::{StatementLayout, parse_statement_text};

    const TEXT: &str = "\
PERIODE : NOVEMBER 2025
NO. REKENING : 123-XXX-7890
SALDO AWAL 1,000,000.00
05/11 TRSF E-BANKING DB 0123 250,000.00 DB 750,000.00
07/11 SETORAN TUNAI 100,000.00 850,000.00
SALDO AKHIR 850,000.00
";

    fn parsed() -> ParseResult {
        parse_statement_text(TEXT, &StatementLayout::default(), Some("IDR")).unwrap()
    }

    fn source() -> UploadSource<'static> {
        UploadSource {
            bank_account_id: "acct-bca-01",
            currency: "IDR",
            file_name: "nov.pdf",
            object_key: "statements/ab/abcdef.pdf",
            file_sha1: "abcdef",
        }
    }

    #[test]
    fn upload_writes_one_record_and_one_unmatched_line_per_transaction() {
        let mut db = LedgerDb::open_in_memory().unwrap();
        let rec = db.record_upload(&source(), &parsed(), Utc::now()).unwrap();
        assert_eq!(rec.transaction_count, 2);

        let uploads = db.list_uploads(Some("acct-bca-01")).unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0], rec);

        let lines = db.lines_for_upload(&rec.id).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line_no, 1);
        assert_eq!(lines[0].branch_code, "0123");
        assert_eq!(lines[0].debit_amount, Decimal::from(250_000));
        assert_eq!(lines[1].credit_amount, Decimal::from(100_000));
        assert!(lines.iter().all(|l| l.reconciliation_status == UNMATCHED));
        assert_eq!(db.count_unmatched_lines(&rec.id).unwrap(), 2);
    }

    #[test]
    fn uploads_are_scoped_by_account() {
        let mut db = LedgerDb::open_in_memory().unwrap();
        db.record_upload(&source(), &parsed(), Utc::now()).unwrap();
        let other = UploadSource { bank_account_id: "acct-mandiri-02", ..source() };
        db.record_upload(&other, &parsed(), Utc::now()).unwrap();

        assert_eq!(db.list_uploads(None).unwrap().len(), 2);
        assert_eq!(db.list_uploads(Some("acct-mandiri-02")).unwrap().len(), 1);
        assert!(db.list_uploads(Some("nope")).unwrap().is_empty());
    }

    #[test]
    fn blank_account_is_rejected_before_writing() {
        let mut db = LedgerDb::open_in_memory().unwrap();
        let bad = UploadSource { bank_account_id: "  ", ..source() };
        assert!(db.record_upload(&bad, &parsed(), Utc::now()).is_err());
        assert!(db.list_uploads(None).unwrap().is_empty());
    }

    #[test]
    fn tasks_persist_and_leave_the_open_set_when_closed() {
        use ledgerdesk_core::{SystemEvent, TaskEngine};

        let mut db = LedgerDb::open_in_memory().unwrap();
        let now = Utc::now();
        let out = TaskEngine::default().process(
            &[SystemEvent::new("e1", EventKind::StatementUploaded, "upl-1", now)],
            &[],
            now.date_naive(),
            now,
        );
        db.insert_tasks(&out.created).unwrap();

        let open = db.open_tasks().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].kind, EventKind::StatementUploaded);
        assert_eq!(open[0].assigned_role, Role::Accounts);

        db.set_task_status(&open[0].id, TaskStatus::Done).unwrap();
        assert!(db.open_tasks().unwrap().is_empty());
        assert_eq!(db.get_task(&open[0].id).unwrap().unwrap().status, TaskStatus::Done);
        assert!(db.set_task_status("missing", TaskStatus::Done).is_err());
    }
}

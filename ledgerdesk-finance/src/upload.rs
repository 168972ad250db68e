//! Upload orchestration: validate, parse, store the file, persist the
//! upload with its lines, then raise advisory tasks.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use ledgerdesk_core::{
    AdvisoryTask, EngineOutcome, SystemEvent, TaskBoard, TaskEngine, TaskStatus, today_in,
};
use ledgerdesk_ingest::{
    BalanceCheck, Extractor, IngestError, StatementLayout, parse_statement_pdf,
};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::ledger_db::{LedgerDb, UploadRecord, UploadSource};
use crate::object_store::ObjectStore;
use crate::task_emitter::UploadEventEmitter;

#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    pub file_name: &'a str,
    pub bytes: &'a [u8],
    pub bank_account_id: &'a str,
    pub currency: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub upload: UploadRecord,
    pub balance: BalanceCheck,
    pub tasks: Vec<AdvisoryTask>,
    pub suppressed_events: usize,
    pub task_failures: Vec<String>,
}

pub struct UploadService {
    db: LedgerDb,
    objects: ObjectStore,
    layout: StatementLayout,
    extractor: Extractor,
    engine: TaskEngine,
    tz: Tz,
}

impl UploadService {
    pub fn new(db: LedgerDb, objects: ObjectStore, engine: TaskEngine, tz: Tz) -> Self {
        Self {
            db,
            objects,
            layout: StatementLayout::default(),
            extractor: Extractor::default(),
            engine,
            tz,
        }
    }

    pub fn with_layout(mut self, layout: StatementLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn db(&self) -> &LedgerDb {
        &self.db
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    /// Full upload. Nothing is written unless the document parses to at
    /// least one transaction. Once the upload is recorded the call succeeds;
    /// task-raising errors land in `task_failures`.
    pub fn upload(&mut self, req: UploadRequest<'_>, now: DateTime<Utc>) -> Result<UploadOutcome> {
        if req.bytes.is_empty() {
            return Err(IngestError::MissingInput("statement file").into());
        }
        if req.bank_account_id.trim().is_empty() {
            return Err(IngestError::MissingInput("bank account id").into());
        }
        let currency = req.currency.trim().to_ascii_uppercase();
        if currency.is_empty() {
            return Err(IngestError::MissingInput("currency").into());
        }

        let result = parse_statement_pdf(req.bytes, self.extractor, &self.layout, Some(&currency))?;
        if result.metadata.currency != currency {
            warn!(
                statement = %result.metadata.currency,
                account = %currency,
                "statement currency differs from account currency; lines are tagged with the account currency"
            );
        }

        let ext = Path::new(req.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("pdf");
        let stored = self
            .objects
            .put_statement(req.bytes, ext)
            .context("store statement file")?;

        let source = UploadSource {
            bank_account_id: req.bank_account_id.trim(),
            currency: &currency,
            file_name: req.file_name,
            object_key: &stored.key,
            file_sha1: &stored.sha1,
        };
        let upload = self.db.record_upload(&source, &result, now)?;

        let outcome = match self.raise_upload_tasks(&upload, now) {
            Ok(outcome) => outcome,
            Err(e) => {
                let error = format!("{e:#}");
                warn!(upload_id = %upload.id, %error, "upload recorded but tasks were not raised");
                EngineOutcome {
                    failures: vec![error],
                    ..EngineOutcome::default()
                }
            }
        };

        info!(
            upload_id = %upload.id,
            lines = upload.transaction_count,
            skipped = upload.lines_skipped,
            tasks = outcome.created.len(),
            "statement upload complete"
        );

        Ok(UploadOutcome {
            upload,
            balance: result.balance_check(),
            tasks: outcome.created,
            suppressed_events: outcome.suppressed,
            task_failures: outcome.failures,
        })
    }

    fn raise_upload_tasks(&mut self, upload: &UploadRecord, now: DateTime<Utc>) -> Result<EngineOutcome> {
        let unmatched = self.db.count_unmatched_lines(&upload.id)?;
        let events = UploadEventEmitter::events_for(upload, unmatched, now);
        self.raise_events(&events, now)
    }

    /// Run events through the task engine against the persisted open tasks
    /// and persist whatever it creates.
    pub fn raise_events(&mut self, events: &[SystemEvent], now: DateTime<Utc>) -> Result<EngineOutcome> {
        let open = self.db.open_tasks()?;
        let today = today_in(now, self.tz);
        let outcome = self.engine.process(events, &open, today, now);
        self.db.insert_tasks(&outcome.created)?;
        Ok(outcome)
    }

    pub fn transition_task(&mut self, id: &str, next: TaskStatus) -> Result<AdvisoryTask> {
        let mut task = self
            .db
            .get_task(id)?
            .ok_or_else(|| anyhow!("no task {id}"))?;
        task.transition(next)?;
        self.db.set_task_status(id, next)?;
        info!(task_id = id, status = next.as_str(), "task status changed");
        Ok(task)
    }

    pub fn board(&self) -> Result<TaskBoard> {
        Ok(TaskBoard::from_tasks(self.db.open_tasks()?))
    }
}

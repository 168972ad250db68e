//! Task emitter: turns a recorded statement upload into system events
//! for the task engine.

use chrono::{DateTime, Utc};
use ledgerdesk_core::{EventKind, SystemEvent};

use crate::ledger_db::UploadRecord;

/// Emits events for a freshly recorded upload
pub struct UploadEventEmitter;

impl UploadEventEmitter {
    /// `StatementUploaded` always; `UnreconciledLines` when any line is
    /// still unmatched, carrying the total moved amount.
    pub fn events_for(
        upload: &UploadRecord,
        unmatched_lines: usize,
        now: DateTime<Utc>,
    ) -> Vec<SystemEvent> {
        let mut summary = format!(
            "{} {} for account {}: {} lines, debits {} {}, credits {} {}",
            upload.period_label,
            upload.file_name,
            upload.bank_account_id,
            upload.transaction_count,
            upload.total_debits,
            upload.currency,
            upload.total_credits,
            upload.currency,
        );
        if upload.lines_skipped > 0 {
            summary.push_str(&format!(
                "; {} dated lines could not be parsed",
                upload.lines_skipped
            ));
        }

        let mut events = vec![
            SystemEvent::new(
                format!("evt-{}-uploaded", upload.id),
                EventKind::StatementUploaded,
                &upload.id,
                now,
            )
            .with_note(summary),
        ];

        if unmatched_lines > 0 {
            events.push(
                SystemEvent::new(
                    format!("evt-{}-unreconciled", upload.id),
                    EventKind::UnreconciledLines,
                    &upload.id,
                    now,
                )
                .with_amount(upload.total_debits.saturating_add(upload.total_credits))
                .with_note(format!("{unmatched_lines} unmatched lines")),
            );
        }
        events
    }
}

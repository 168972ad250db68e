//! ledgerdesk-finance: statement upload orchestration over a SQLite ledger.

pub mod ledger_db;
pub mod object_store;
pub mod task_emitter;
pub mod upload;

pub use ledger_db::{LedgerDb, StatementLineRecord, UNMATCHED, UploadRecord, UploadSource};
pub use object_store::{ObjectStore, StoredObject, sha1_hex};
pub use task_emitter::UploadEventEmitter;
pub use upload::{UploadOutcome, UploadRequest, UploadService};

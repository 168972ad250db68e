use anyhow::{Context, Result};
use ledgerdesk_core::TaskEngine;
use ledgerdesk_finance::{LedgerDb, ObjectStore, UploadService};
use std::path::PathBuf;

use crate::config::Config;
use crate::state::ensure_ledgerdesk_home;

/// Storage paths resolved against the data home.
pub struct Paths {
    pub db: PathBuf,
    pub objects: PathBuf,
}

pub fn resolve_paths(cfg: &Config) -> Result<Paths> {
    let home = ensure_ledgerdesk_home()?;
    Ok(Paths {
        db: cfg.db_path(&home),
        objects: cfg.object_dir(&home),
    })
}

pub fn open_service(cfg: &Config) -> Result<UploadService> {
    let paths = resolve_paths(cfg)?;
    let db = LedgerDb::open(&paths.db).context("open ledger")?;
    let engine = TaskEngine::new(cfg.role_directory(), cfg.tasks.scoring.clone());
    Ok(UploadService::new(db, ObjectStore::new(paths.objects), engine, cfg.timezone()?)
        .with_layout(cfg.statement.layout.clone())
        .with_extractor(cfg.statement.extractor))
}

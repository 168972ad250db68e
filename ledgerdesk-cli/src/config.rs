use anyhow::{Context, Result};
use chrono_tz::Tz;
use ledgerdesk_core::{ReminderPolicy, RoleDirectory, ScoringPolicy, parse_tz};
use ledgerdesk_ingest::{Extractor, StatementLayout};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::state::ensure_ledgerdesk_home;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageSection,
    pub statement: StatementSection,
    pub tasks: TasksSection,
    pub notifications: NotificationsSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Defaults to `<home>/ledger.db`
    pub db_path: Option<PathBuf>,
    /// Defaults to `<home>/objects`
    pub object_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementSection {
    pub extractor: Extractor,
    #[serde(flatten)]
    pub layout: StatementLayout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TasksSection {
    /// IANA zone that decides the business "today".
    pub timezone: String,
    /// event kind -> role, e.g. `invoice_overdue = "accounts"`
    pub roles: BTreeMap<String, String>,
    pub scoring: ScoringPolicy,
    pub reminders: ReminderPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsSection {
    pub interval_secs: u64,
    /// POST target for reminder JSON; reminders are only logged when unset.
    pub webhook_url: Option<String>,
    pub max_per_tick: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub json: bool,
}

impl Default for TasksSection {
    fn default() -> Self {
        Self {
            timezone: "Asia/Jakarta".to_string(),
            roles: BTreeMap::new(),
            scoring: ScoringPolicy::default(),
            reminders: ReminderPolicy::default(),
        }
    }
}

impl Default for NotificationsSection {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            webhook_url: None,
            max_per_tick: 20,
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    pub fn db_path(&self, home: &Path) -> PathBuf {
        self.storage
            .db_path
            .clone()
            .unwrap_or_else(|| home.join("ledger.db"))
    }

    pub fn object_dir(&self, home: &Path) -> PathBuf {
        self.storage
            .object_dir
            .clone()
            .unwrap_or_else(|| home.join("objects"))
    }

    pub fn timezone(&self) -> Result<Tz> {
        parse_tz(&self.tasks.timezone).context("[tasks].timezone")
    }

    /// Role overrides; bad pairs are logged and skipped.
    pub fn role_directory(&self) -> RoleDirectory {
        let (dir, rejected) = RoleDirectory::from_pairs(
            self.tasks
                .roles
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );
        for pair in rejected {
            warn!(%pair, "ignoring unknown role override");
        }
        dir
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_ledgerdesk_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    let cfg = Config::default();
    save_config(&cfg)?;
    println!("Wrote {}", p.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerdesk_core::{EventKind, Role};

    #[test]
    fn defaults_survive_a_toml_round_trip() {
        let cfg = Config::default();
        let s = toml::to_string_pretty(&cfg).unwrap();
        let back: Config = toml::from_str(&s).unwrap();
        assert_eq!(back, cfg);
        assert!(s.contains("debit_marker = \"DB\""));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let cfg: Config = toml::from_str(
            r#"
[statement]
extractor = "library"
debit_marker = "D"

[tasks]
timezone = "Asia/Makassar"

[tasks.roles]
invoice_overdue = "accounts"
nonsense = "admin"
"#,
        )
        .unwrap();
        assert_eq!(cfg.statement.extractor, Extractor::Library);
        assert_eq!(cfg.statement.layout.debit_marker, "D");
        assert_eq!(cfg.statement.layout.credit_marker, "CR");
        assert_eq!(cfg.notifications.interval_secs, 60);
        assert_eq!(cfg.timezone().unwrap(), chrono_tz::Asia::Makassar);
        assert_eq!(cfg.role_directory().assign(EventKind::InvoiceOverdue), Role::Accounts);
    }

    #[test]
    fn storage_defaults_live_under_home() {
        let cfg = Config::default();
        let home = Path::new("/data/ledgerdesk");
        assert_eq!(cfg.db_path(home), home.join("ledger.db"));
        assert_eq!(cfg.object_dir(home), home.join("objects"));
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }
}

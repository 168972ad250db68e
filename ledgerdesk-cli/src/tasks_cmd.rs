use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveDate, Utc};
use clap::Subcommand;
use ledgerdesk_core::{
    AdvisoryTask, EventKind, ReminderIntent, ReminderLedger, Role, SystemEvent, TaskStatus,
};
use ledgerdesk_finance::LedgerDb;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::app::{open_service, resolve_paths};
use crate::config::Config;
use crate::state::{append_sent_keys, read_sent_keys, sent_keys_path};
use crate::watcher::{NotificationSink, NotificationWatcher, TaskSource, WatcherSettings};

#[derive(Subcommand, Debug)]
pub enum TasksCommand {
    /// List open tasks, most pressing first
    List {
        /// Only tasks assigned to this role
        #[arg(long)]
        role: Option<String>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Raise a system event by hand and run it through the task engine
    Raise {
        /// Event kind, e.g. low_stock, invoice_overdue, batch_expiring
        #[arg(long)]
        kind: String,

        /// Business entity the event is about (SKU, invoice number, ...)
        #[arg(long)]
        entity: String,

        #[arg(long)]
        amount: Option<String>,

        /// Due or expiry date, YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,

        #[arg(long)]
        note: Option<String>,
    },

    /// Mark a task in progress
    Start { id: String },

    /// Mark a task done
    Done { id: String },

    /// Dismiss a task
    Dismiss { id: String },

    /// Run the notification watcher until Ctrl-C
    Watch {
        /// Override [notifications].interval_secs
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

pub async fn run(cfg: &Config, cmd: TasksCommand) -> Result<()> {
    match cmd {
        TasksCommand::List { role, json } => list(cfg, role.as_deref(), json),
        TasksCommand::Raise {
            kind,
            entity,
            amount,
            due,
            note,
        } => raise(cfg, &kind, &entity, amount.as_deref(), due.as_deref(), note),
        TasksCommand::Start { id } => transition(cfg, &id, TaskStatus::InProgress),
        TasksCommand::Done { id } => transition(cfg, &id, TaskStatus::Done),
        TasksCommand::Dismiss { id } => transition(cfg, &id, TaskStatus::Dismissed),
        TasksCommand::Watch { interval_secs } => watch(cfg, interval_secs).await,
    }
}

fn print_task(t: &AdvisoryTask) {
    println!(
        "{:<8} {:>3} {:<10} {:<11} {:<11} {}  ({})",
        t.priority.as_str(),
        t.score,
        t.assigned_role.as_str(),
        t.status.as_str(),
        t.due_on.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
        t.title,
        t.id
    );
}

fn list(cfg: &Config, role: Option<&str>, json: bool) -> Result<()> {
    let svc = open_service(cfg)?;
    let board = svc.board()?;
    let tasks = match role {
        Some(r) => {
            let role = Role::parse(r).ok_or_else(|| anyhow!("unknown role '{r}'"))?;
            board.ranked_for_role(role)
        }
        None => board.ranked(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }
    if tasks.is_empty() {
        println!("No open tasks.");
        return Ok(());
    }
    for t in tasks {
        print_task(t);
    }
    if role.is_none() {
        let counts: Vec<String> = board
            .counts_by_role()
            .into_iter()
            .map(|(r, n)| format!("{}={n}", r.as_str()))
            .collect();
        println!("\n{}", counts.join("  "));
    }
    Ok(())
}

fn raise(
    cfg: &Config,
    kind: &str,
    entity: &str,
    amount: Option<&str>,
    due: Option<&str>,
    note: Option<String>,
) -> Result<()> {
    let kind = EventKind::parse(kind).ok_or_else(|| {
        let known: Vec<&str> = EventKind::ALL.iter().map(|k| k.as_str()).collect();
        anyhow!("unknown event kind '{kind}' (one of: {})", known.join(", "))
    })?;
    if entity.trim().is_empty() {
        bail!("--entity is required");
    }

    let now = Utc::now();
    let mut event = SystemEvent::new(
        format!("manual-{}-{}", kind.as_str(), now.timestamp_millis()),
        kind,
        entity.trim(),
        now,
    );
    if let Some(a) = amount {
        let a = Decimal::from_str(&a.replace(',', "")).with_context(|| format!("invalid amount '{a}'"))?;
        event = event.with_amount(a);
    }
    if let Some(d) = due {
        let d = NaiveDate::parse_from_str(d, "%Y-%m-%d").with_context(|| format!("invalid date '{d}'"))?;
        event = event.with_due_on(d);
    }
    if let Some(n) = note {
        event = event.with_note(n);
    }

    let mut svc = open_service(cfg)?;
    let out = svc.raise_events(&[event], now)?;
    for t in &out.created {
        print_task(t);
    }
    if out.suppressed > 0 {
        println!("An open task already covers {} {entity}.", kind.as_str());
    }
    if let Some(f) = out.failures.first() {
        bail!("task rule failed: {f}");
    }
    Ok(())
}

fn transition(cfg: &Config, id: &str, next: TaskStatus) -> Result<()> {
    let mut svc = open_service(cfg)?;
    let t = svc.transition_task(id, next)?;
    print_task(&t);
    Ok(())
}

/// Open tasks from the ledger; delivered keys are appended to a local log so
/// a restarted watcher does not repeat itself.
struct LedgerTaskSource {
    db: LedgerDb,
    sent_keys: PathBuf,
}

impl TaskSource for LedgerTaskSource {
    fn open_tasks(&mut self) -> Result<Vec<AdvisoryTask>> {
        self.db.open_tasks()
    }

    fn delivered(&mut self, intents: &[ReminderIntent]) -> Result<()> {
        if intents.is_empty() {
            return Ok(());
        }
        append_sent_keys(&self.sent_keys, intents.iter().map(|i| i.dedupe_key.as_str()))
    }
}

async fn watch(cfg: &Config, interval_secs: Option<u64>) -> Result<()> {
    let paths = resolve_paths(cfg)?;
    let sent_keys = sent_keys_path()?;
    let ledger = ReminderLedger::from_keys(read_sent_keys(&sent_keys)?);
    let source = LedgerTaskSource {
        db: LedgerDb::open(&paths.db)?,
        sent_keys,
    };
    let sink = match &cfg.notifications.webhook_url {
        Some(url) if !url.trim().is_empty() => NotificationSink::webhook(url.trim()),
        _ => NotificationSink::Log,
    };
    let settings = WatcherSettings {
        interval: Duration::from_secs(interval_secs.unwrap_or(cfg.notifications.interval_secs).max(1)),
        tz: cfg.timezone()?,
        policy: cfg.tasks.reminders,
        max_per_tick: cfg.notifications.max_per_tick,
    };

    info!(
        interval_secs = settings.interval.as_secs(),
        already_sent = ledger.delivered_count(),
        "notification watcher started; Ctrl-C to stop"
    );
    let handle = NotificationWatcher::start(settings, ledger, source, sink);
    tokio::signal::ctrl_c().await.context("wait for Ctrl-C")?;
    let report = handle.stop().await?;
    println!("Stopped after {} checks; {} reminders delivered.", report.ticks, report.delivered);
    Ok(())
}

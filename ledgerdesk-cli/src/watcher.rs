//! Notification watcher: a periodic reminder check with an explicit owned
//! handle. Start it, keep the handle, `stop().await` it.

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use chrono_tz::Tz;
use ledgerdesk_core::{AdvisoryTask, ReminderIntent, ReminderLedger, ReminderPolicy, TaskBoard};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Where open tasks come from, and who hears about delivered reminders.
/// Calls may block; the watcher runs them on the blocking pool.
pub trait TaskSource: Send + 'static {
    fn open_tasks(&mut self) -> Result<Vec<AdvisoryTask>>;

    fn delivered(&mut self, _intents: &[ReminderIntent]) -> Result<()> {
        Ok(())
    }
}

pub enum NotificationSink {
    Log,
    Webhook { client: reqwest::Client, url: String },
}

impl NotificationSink {
    pub fn webhook(url: impl Into<String>) -> Self {
        NotificationSink::Webhook {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub async fn deliver(&self, intent: &ReminderIntent) -> Result<()> {
        match self {
            NotificationSink::Log => {
                info!(
                    task_id = %intent.task_id,
                    role = %intent.role,
                    send_at = %intent.send_at_utc,
                    "{} | {}",
                    intent.title,
                    intent.body
                );
                Ok(())
            }
            NotificationSink::Webhook { client, url } => {
                client
                    .post(url)
                    .json(intent)
                    .send()
                    .await
                    .with_context(|| format!("POST {url}"))?
                    .error_for_status()
                    .with_context(|| format!("webhook {url} rejected reminder"))?;
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WatcherSettings {
    pub interval: Duration,
    pub tz: Tz,
    pub policy: ReminderPolicy,
    pub max_per_tick: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherReport {
    pub ticks: u64,
    pub delivered: usize,
}

pub struct NotificationWatcher<S> {
    settings: WatcherSettings,
    ledger: ReminderLedger,
    source: Arc<Mutex<S>>,
    sink: NotificationSink,
    report: WatcherReport,
}

impl<S: TaskSource> NotificationWatcher<S> {
    /// Spawn the watcher on the current tokio runtime. The first check runs
    /// immediately, then once per interval.
    pub fn start(
        settings: WatcherSettings,
        ledger: ReminderLedger,
        source: S,
        sink: NotificationSink,
    ) -> WatcherHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let watcher = NotificationWatcher {
            settings,
            ledger,
            source: Arc::new(Mutex::new(source)),
            sink,
            report: WatcherReport::default(),
        };
        let join = tokio::spawn(watcher.run(shutdown_rx));
        WatcherHandle {
            shutdown: Some(shutdown_tx),
            join: Some(join),
        }
    }

    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> WatcherReport {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => self.tick().await,
            }
        }
        debug!(ticks = self.report.ticks, "notification watcher stopped");
        self.report
    }

    /// Run a source call on the blocking pool.
    async fn with_source<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut S) -> Result<T> + Send + 'static,
    {
        let source = Arc::clone(&self.source);
        tokio::task::spawn_blocking(move || {
            let mut guard = source
                .lock()
                .map_err(|_| anyhow!("task source lock poisoned"))?;
            f(&mut guard)
        })
        .await
        .context("task source call panicked")?
    }

    async fn tick(&mut self) {
        self.report.ticks += 1;
        let tasks = match self.with_source(|s| s.open_tasks()).await {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "could not load open tasks; retrying next tick");
                return;
            }
        };

        let board = TaskBoard::from_tasks(tasks);
        let now = Utc::now();
        let due = self.ledger.due(
            board.ranked(),
            now,
            self.settings.tz,
            self.settings.policy,
            self.settings.max_per_tick,
        );

        let mut sent = Vec::with_capacity(due.len());
        for intent in due {
            match self.sink.deliver(&intent).await {
                Ok(()) => sent.push(intent),
                Err(e) => {
                    warn!(task_id = %intent.task_id, error = %format!("{e:#}"), "reminder delivery failed");
                }
            }
        }

        self.ledger.mark_delivered(&sent);
        self.report.delivered += sent.len();
        if sent.is_empty() {
            return;
        }
        if let Err(e) = self.with_source(move |s| s.delivered(&sent)).await {
            warn!(error = %format!("{e:#}"), "could not record delivered reminders");
        }
    }
}

/// Owned handle to a running watcher. Dropping it without `stop` aborts
/// the background task.
pub struct WatcherHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<WatcherReport>>,
}

impl WatcherHandle {
    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|j| !j.is_finished())
    }

    /// Signal shutdown and wait for the current tick to finish.
    pub async fn stop(mut self) -> Result<WatcherReport> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let join = self
            .join
            .take()
            .ok_or_else(|| anyhow!("watcher already stopped"))?;
        join.await.context("notification watcher panicked")
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}

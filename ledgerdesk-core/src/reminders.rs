//! Reminder policy + projection for advisory tasks.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::task::{AdvisoryTask, Priority};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderIntent {
    pub intent_id: String,
    pub task_id: String,
    pub role: String,
    pub title: String,
    pub body: String,
    pub send_at_utc: DateTime<Utc>,
    pub dedupe_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderPolicy {
    pub max_per_task: usize,
    /// Lead days for Critical tasks ahead of the due day.
    pub critical_lead_days: i64,
    /// Lead days for High tasks ahead of the due day.
    pub high_lead_days: i64,
    /// Local time of day reminders go out.
    pub send_hour: u32,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            max_per_task: 2,
            critical_lead_days: 2,
            high_lead_days: 1,
            send_hour: 8,
        }
    }
}

fn local_send_time(day: NaiveDate, hour: u32, tz: Tz) -> Option<DateTime<Utc>> {
    let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0)?;
    tz.from_local_datetime(&day.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Deterministically project a task into reminder intents.
///
/// Undated tasks get one intent sent immediately; dated tasks get slots ahead
/// of the due day by priority. Slots are kept even when already past, so a
/// watcher that starts late still sends them once.
pub fn project_task_reminders(
    task: &AdvisoryTask,
    now: DateTime<Utc>,
    tz: Tz,
    policy: ReminderPolicy,
) -> Vec<ReminderIntent> {
    if !task.status.is_open() {
        return vec![];
    }

    let title = format!("[{}] {}", task.priority.as_str(), task.title);
    let body = match task.due_on {
        Some(due) => format!("Task {} for {} is due on {due}.", task.id, task.assigned_role.as_str()),
        None => format!("Task {} for {} needs attention.", task.id, task.assigned_role.as_str()),
    };

    let slots: Vec<DateTime<Utc>> = match task.due_on {
        None => vec![now],
        Some(due) => {
            let days: Vec<NaiveDate> = match task.priority {
                Priority::Critical => vec![due - Duration::days(policy.critical_lead_days), due],
                Priority::High => vec![due - Duration::days(policy.high_lead_days)],
                Priority::Medium | Priority::Low => vec![due],
            };
            days.into_iter()
                .filter_map(|d| local_send_time(d, policy.send_hour, tz))
                .collect()
        }
    };

    slots
        .into_iter()
        .take(policy.max_per_task)
        .enumerate()
        .map(|(i, send_at)| {
            // Undated tasks remind once per task, not once per tick.
            let dedupe_key = if task.due_on.is_none() {
                format!("{}:undated", task.id)
            } else {
                format!("{}:{}:{}", task.id, send_at.timestamp(), i)
            };
            ReminderIntent {
                intent_id: format!("ri-{}-{}", task.id, i),
                task_id: task.id.clone(),
                role: task.assigned_role.as_str().to_string(),
                title: title.clone(),
                body: body.clone(),
                send_at_utc: send_at,
                dedupe_key,
            }
        })
        .collect()
}

/// Remembers delivered dedupe keys so each reminder goes out at most once.
#[derive(Debug, Default, Clone)]
pub struct ReminderLedger {
    delivered: HashSet<String>,
}

impl ReminderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from keys delivered by an earlier run.
    pub fn from_keys(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            delivered: keys.into_iter().collect(),
        }
    }

    pub fn is_delivered(&self, dedupe_key: &str) -> bool {
        self.delivered.contains(dedupe_key)
    }

    /// Intents due at `now` and not yet delivered, most pressing task first
    /// (input order is kept), capped at `limit`.
    pub fn due<'a>(
        &self,
        tasks: impl IntoIterator<Item = &'a AdvisoryTask>,
        now: DateTime<Utc>,
        tz: Tz,
        policy: ReminderPolicy,
        limit: usize,
    ) -> Vec<ReminderIntent> {
        let mut out = Vec::new();
        for task in tasks {
            for intent in project_task_reminders(task, now, tz, policy) {
                if out.len() >= limit {
                    return out;
                }
                if intent.send_at_utc <= now && !self.delivered.contains(&intent.dedupe_key) {
                    out.push(intent);
                }
            }
        }
        out
    }

    pub fn mark_delivered<'a>(&mut self, intents: impl IntoIterator<Item = &'a ReminderIntent>) {
        for i in intents {
            self.delivered.insert(i.dedupe_key.clone());
        }
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::roles::Role;
    use crate::task::TaskStatus;

    fn jakarta() -> Tz {
        "Asia/Jakarta".parse().unwrap()
    }

    fn task(priority: Priority, due: Option<(i32, u32, u32)>) -> AdvisoryTask {
        AdvisoryTask {
            id: "task-e1".to_string(),
            event_id: "e1".to_string(),
            kind: EventKind::InvoiceOverdue,
            entity_ref: "INV-1".to_string(),
            title: "Follow up".to_string(),
            detail: String::new(),
            assigned_role: Role::Sales,
            score: 0,
            priority,
            status: TaskStatus::Open,
            due_on: due.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn closed_task_emits_none() {
        let mut t = task(Priority::High, None);
        t.status = TaskStatus::Done;
        assert!(project_task_reminders(&t, Utc::now(), jakarta(), ReminderPolicy::default()).is_empty());
    }

    #[test]
    fn critical_task_emits_two_local_morning_slots() {
        let t = task(Priority::Critical, Some((2025, 11, 20)));
        let now = Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap();
        let out = project_task_reminders(&t, now, jakarta(), ReminderPolicy::default());
        assert_eq!(out.len(), 2);
        // 08:00 WIB == 01:00 UTC
        assert_eq!(out[0].send_at_utc, Utc.with_ymd_and_hms(2025, 11, 18, 1, 0, 0).unwrap());
        assert_eq!(out[1].send_at_utc, Utc.with_ymd_and_hms(2025, 11, 20, 1, 0, 0).unwrap());
        assert_ne!(out[0].dedupe_key, out[1].dedupe_key);
        assert_eq!(out[0].role, "sales");
    }

    #[test]
    fn ledger_delivers_each_key_once() {
        let tasks = vec![task(Priority::Medium, Some((2025, 11, 5))), {
            let mut t = task(Priority::Low, None);
            t.id = "task-e2".to_string();
            t
        }];
        let now = Utc.with_ymd_and_hms(2025, 11, 6, 0, 0, 0).unwrap();
        let policy = ReminderPolicy::default();
        let mut ledger = ReminderLedger::new();

        let first = ledger.due(&tasks, now, jakarta(), policy, 10);
        assert_eq!(first.len(), 2);
        ledger.mark_delivered(&first);

        let later = now + Duration::hours(1);
        assert!(ledger.due(&tasks, later, jakarta(), policy, 10).is_empty());
        assert_eq!(ledger.delivered_count(), 2);

        let resumed = ReminderLedger::from_keys(first.iter().map(|i| i.dedupe_key.clone()));
        assert!(resumed.is_delivered(&first[0].dedupe_key));
        assert!(resumed.due(&tasks, later, jakarta(), policy, 10).is_empty());
    }

    #[test]
    fn future_slots_wait_and_limit_caps_output() {
        let tasks = vec![task(Priority::High, Some((2025, 12, 31)))];
        let now = Utc.with_ymd_and_hms(2025, 11, 6, 0, 0, 0).unwrap();
        let ledger = ReminderLedger::new();
        assert!(ledger.due(&tasks, now, jakarta(), ReminderPolicy::default(), 10).is_empty());

        let undated = vec![task(Priority::Low, None)];
        assert!(ledger.due(&undated, now, jakarta(), ReminderPolicy::default(), 0).is_empty());
    }
}

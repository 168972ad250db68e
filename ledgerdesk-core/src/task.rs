//! Advisory task model produced by the task engine.
//!
//! Tasks advise a role to act on some business entity; they never mutate the
//! entity themselves.

use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::events::EventKind;
use crate::roles::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Done,
    Dismissed,
}

impl TaskStatus {
    pub fn is_open(self) -> bool {
        matches!(self, TaskStatus::Open | TaskStatus::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Dismissed => "dismissed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(TaskStatus::Open),
            "in_progress" => Some(TaskStatus::InProgress),
            "done" => Some(TaskStatus::Done),
            "dismissed" => Some(TaskStatus::Dismissed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Score >= 80
    Critical = 0,
    /// Score >= 60
    High = 1,
    /// Score >= 40
    Medium = 2,
    /// Everything else
    Low = 3,
}

impl Priority {
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => Priority::Critical,
            60..=79 => Priority::High,
            40..=59 => Priority::Medium,
            _ => Priority::Low,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(Priority::Critical),
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryTask {
    pub id: String,
    /// Event that raised this task.
    pub event_id: String,
    pub kind: EventKind,
    /// Business entity the task is about (upload id, SKU, invoice number...).
    pub entity_ref: String,
    pub title: String,
    pub detail: String,
    pub assigned_role: Role,
    /// 0-100, higher is more pressing.
    pub score: u8,
    pub priority: Priority,
    pub status: TaskStatus,
    pub due_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl AdvisoryTask {
    /// Key used to keep a single open task per entity and kind.
    pub fn dedupe_key(&self) -> (EventKind, &str) {
        (self.kind, self.entity_ref.as_str())
    }

    /// Open -> InProgress -> Done; Open/InProgress -> Dismissed.
    /// Done and Dismissed are terminal.
    pub fn transition(&mut self, next: TaskStatus) -> Result<()> {
        let allowed = matches!(
            (self.status, next),
            (TaskStatus::Open, TaskStatus::InProgress)
                | (TaskStatus::Open, TaskStatus::Done)
                | (TaskStatus::InProgress, TaskStatus::Done)
                | (TaskStatus::Open, TaskStatus::Dismissed)
                | (TaskStatus::InProgress, TaskStatus::Dismissed)
        );
        if !allowed {
            bail!(
                "task {} cannot move from {} to {}",
                self.id,
                self.status.as_str(),
                next.as_str()
            );
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> AdvisoryTask {
        AdvisoryTask {
            id: "task-evt-1".to_string(),
            event_id: "evt-1".to_string(),
            kind: EventKind::LowStock,
            entity_ref: "SKU-AMOX-500".to_string(),
            title: "Restock".to_string(),
            detail: String::new(),
            assigned_role: Role::Warehouse,
            score: 50,
            priority: Priority::Medium,
            status: TaskStatus::Open,
            due_on: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn priority_buckets() {
        assert_eq!(Priority::from_score(100), Priority::Critical);
        assert_eq!(Priority::from_score(80), Priority::Critical);
        assert_eq!(Priority::from_score(79), Priority::High);
        assert_eq!(Priority::from_score(60), Priority::High);
        assert_eq!(Priority::from_score(40), Priority::Medium);
        assert_eq!(Priority::from_score(39), Priority::Low);
        assert!(Priority::Critical < Priority::Low);
    }

    #[test]
    fn lifecycle_moves_forward_only() {
        let mut t = task();
        t.transition(TaskStatus::InProgress).unwrap();
        assert_eq!(t.status, TaskStatus::InProgress);
        t.transition(TaskStatus::Done).unwrap();
        assert!(!t.status.is_open());
        assert!(t.transition(TaskStatus::Dismissed).is_err());
        assert!(t.transition(TaskStatus::InProgress).is_err());
    }

    #[test]
    fn dismissed_is_terminal() {
        let mut t = task();
        t.transition(TaskStatus::Dismissed).unwrap();
        assert!(t.transition(TaskStatus::Done).is_err());
    }

    #[test]
    fn status_strings_round_trip() {
        for s in [TaskStatus::Open, TaskStatus::InProgress, TaskStatus::Done, TaskStatus::Dismissed] {
            assert_eq!(TaskStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn serializes_with_snake_case_enums() {
        let v = serde_json::to_value(task()).unwrap();
        assert_eq!(v["kind"], "low_stock");
        assert_eq!(v["assigned_role"], "warehouse");
        assert_eq!(v["status"], "open");
        assert_eq!(v["due_on"], serde_json::Value::Null);
    }
}

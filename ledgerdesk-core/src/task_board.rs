//! TaskBoard: open advisory tasks indexed by role.
//!
//! Design:
//! - Keep canonical task copies in a map (id -> task).
//! - Maintain a role index so each desk can list its queue without a scan.
//! - Closed tasks leave the board on upsert.
//!
//! Ranking (same for every view):
//! - priority ASC (Critical first)
//! - score DESC
//! - due date ASC (undated last)
//! - creation order ASC

use crate::roles::Role;
use crate::task::AdvisoryTask;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

fn rank(a: &AdvisoryTask, b: &AdvisoryTask) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| b.score.cmp(&a.score))
        .then_with(|| match (a.due_on, b.due_on) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

#[derive(Debug, Default, Clone)]
pub struct TaskBoard {
    tasks: HashMap<String, AdvisoryTask>,

    // idx[role] = set(task_id)
    idx: BTreeMap<Role, HashSet<String>>,
}

impl TaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tasks(tasks: impl IntoIterator<Item = AdvisoryTask>) -> Self {
        let mut board = Self::new();
        for t in tasks {
            board.upsert(t);
        }
        board
    }

    /// Insert or replace. A task that is no longer open is removed instead.
    pub fn upsert(&mut self, task: AdvisoryTask) {
        if let Some(old) = self.tasks.remove(&task.id) {
            self.deindex(&old);
        }
        if !task.status.is_open() {
            return;
        }
        self.idx
            .entry(task.assigned_role)
            .or_default()
            .insert(task.id.clone());
        self.tasks.insert(task.id.clone(), task);
    }

    pub fn ranked(&self) -> Vec<&AdvisoryTask> {
        let mut out: Vec<&AdvisoryTask> = self.tasks.values().collect();
        out.sort_by(|a, b| rank(a, b));
        out
    }

    pub fn ranked_for_role(&self, role: Role) -> Vec<&AdvisoryTask> {
        let Some(ids) = self.idx.get(&role) else {
            return vec![];
        };
        let mut out: Vec<&AdvisoryTask> = ids.iter().filter_map(|id| self.tasks.get(id)).collect();
        out.sort_by(|a, b| rank(a, b));
        out
    }

    /// Open task count per role, in role order.
    pub fn counts_by_role(&self) -> Vec<(Role, usize)> {
        self.idx
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(role, ids)| (*role, ids.len()))
            .collect()
    }

    fn deindex(&mut self, task: &AdvisoryTask) {
        if let Some(set) = self.idx.get_mut(&task.assigned_role) {
            set.remove(&task.id);
            if set.is_empty() {
                self.idx.remove(&task.assigned_role);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::task::{Priority, TaskStatus};
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn task(id: &str, role: Role, score: u8, due: Option<u32>, minute: i64) -> AdvisoryTask {
        AdvisoryTask {
            id: id.to_string(),
            event_id: format!("evt-{id}"),
            kind: EventKind::LowStock,
            entity_ref: id.to_string(),
            title: id.to_string(),
            detail: String::new(),
            assigned_role: role,
            score,
            priority: Priority::from_score(score),
            status: TaskStatus::Open,
            due_on: due.map(|d| NaiveDate::from_ymd_opt(2025, 11, d).unwrap()),
            created_at: Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap() + Duration::minutes(minute),
        }
    }

    #[test]
    fn ranks_by_priority_score_then_due_date() {
        let board = TaskBoard::from_tasks([
            task("low", Role::Accounts, 20, Some(1), 0),
            task("high-late", Role::Accounts, 65, Some(20), 1),
            task("high-soon", Role::Accounts, 65, Some(12), 2),
            task("crit", Role::Warehouse, 90, None, 3),
            task("high-top", Role::Sales, 70, None, 4),
        ]);
        let ids: Vec<_> = board.ranked().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["crit", "high-top", "high-soon", "high-late", "low"]);

        let accounts: Vec<_> = board
            .ranked_for_role(Role::Accounts)
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(accounts, vec!["high-soon", "high-late", "low"]);
        assert!(board.ranked_for_role(Role::Purchasing).is_empty());
    }

    #[test]
    fn closing_a_task_removes_it_from_the_board() {
        let mut board = TaskBoard::from_tasks([
            task("a", Role::Accounts, 50, None, 0),
            task("b", Role::Accounts, 50, None, 1),
        ]);
        let mut done = task("a", Role::Accounts, 50, None, 0);
        done.transition(TaskStatus::Done).unwrap();
        board.upsert(done);
        let ids: Vec<_> = board.ranked().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
        assert_eq!(board.counts_by_role(), vec![(Role::Accounts, 1)]);
    }

    #[test]
    fn reassignment_moves_the_index_entry() {
        let mut board = TaskBoard::from_tasks([task("a", Role::Accounts, 50, None, 0)]);
        board.upsert(task("a", Role::Admin, 50, None, 0));
        assert!(board.ranked_for_role(Role::Accounts).is_empty());
        assert_eq!(board.ranked_for_role(Role::Admin).len(), 1);
        assert_eq!(board.ranked().len(), 1);
    }
}

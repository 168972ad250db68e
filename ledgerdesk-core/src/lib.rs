//! ledgerdesk-core: events, roles and the advisory task engine.

pub mod events;
pub mod reminders;
pub mod roles;
pub mod scoring;
pub mod task;
pub mod task_board;
pub mod task_engine;
pub mod time;

pub use events::{EventKind, SystemEvent};
pub use reminders::{ReminderIntent, ReminderLedger, ReminderPolicy, project_task_reminders};
pub use roles::{Role, RoleDirectory};
pub use scoring::{AmountTier, ScoringPolicy};
pub use task::{AdvisoryTask, Priority, TaskStatus};
pub use task_board::TaskBoard;
pub use task_engine::{BuiltinRule, EngineOutcome, TaskDraft, TaskEngine, TaskRule};
pub use time::{parse_tz, today_in};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Store-assigned identifier. Opaque everywhere outside the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One checklist entry, as stored. `time` is a free-form label, not a
/// parsed timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,

    pub name: String,

    #[serde(default)]
    pub time: String,

    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// What a caller supplies when adding a task; the store fills in the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub name: String,
    pub time: String,
}

const DEFAULT_ROUTINE: [(&str, &str); 4] = [
    ("Make Bed & Open Blinds", "6:45 AM"),
    ("Brush Teeth & Wash Face", "7:00 AM"),
    ("Get Dressed (No Pajamas!)", "7:15 AM"),
    ("Eat Breakfast & Clear Plate", "7:30 AM"),
];

/// The morning routine seeded for a brand-new user.
pub fn default_routine() -> Vec<NewTask> {
    DEFAULT_ROUTINE
        .iter()
        .map(|(name, time)| NewTask {
            name: (*name).to_string(),
            time: (*time).to_string(),
        })
        .collect()
}

/// Display order: oldest first. A missing creation timestamp sorts as zero,
/// and ties keep their delivery order.
pub fn sort_for_display(tasks: &mut [Task]) {
    tasks.sort_by_key(|task| task.created_at.map(|ts| ts.timestamp_millis()).unwrap_or(0));
}

pub fn completed_count(tasks: &[Task]) -> usize {
    tasks.iter().filter(|task| task.completed).count()
}

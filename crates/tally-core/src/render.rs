use serde::Serialize;

use crate::ledger::LedgerState;
use crate::task::{Task, TaskId, completed_count};

pub const EMPTY_PLACEHOLDER: &str = "No tasks currently assigned. Add one below!";
pub const MISSING_TIME_LABEL: &str = "No deadline";

/// Semantic color for a piece of the view. The presentation layer decides
/// what each tone looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Positive,
    Negative,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRow {
    pub id: TaskId,
    pub name: String,
    pub time: String,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewModel {
    pub rows: Vec<TaskRow>,
    pub placeholder: Option<String>,
    pub progress_percent: u8,
    pub progress_label: String,
    pub progress_tone: Tone,
    pub flex_label: String,
    pub flex_tone: Tone,
    pub debt_label: String,
    pub debt_tone: Tone,
}

/// Pure projection of the current snapshot. Identical inputs produce
/// identical view models; tasks are assumed to be in display order already.
pub fn render(tasks: &[Task], ledger: LedgerState) -> ViewModel {
    let total = tasks.len();
    let completed = completed_count(tasks);

    let progress_percent = if total == 0 {
        0
    } else {
        ((completed as f64 / total as f64) * 100.0).round() as u8
    };
    let progress_tone = if total > 0 && completed == total {
        Tone::Info
    } else {
        Tone::Positive
    };

    let rows: Vec<TaskRow> = tasks
        .iter()
        .map(|task| TaskRow {
            id: task.id.clone(),
            name: task.name.clone(),
            time: if task.time.is_empty() {
                MISSING_TIME_LABEL.to_string()
            } else {
                task.time.clone()
            },
            completed: task.completed,
        })
        .collect();
    let placeholder = rows.is_empty().then(|| EMPTY_PLACEHOLDER.to_string());

    ViewModel {
        rows,
        placeholder,
        progress_percent,
        progress_label: format!("{completed}/{total} Tasks Completed"),
        progress_tone,
        flex_label: format!("{} min", ledger.flex_time),
        flex_tone: if ledger.flex_time < 0 {
            Tone::Negative
        } else {
            Tone::Positive
        },
        debt_label: format!("{} min", ledger.screen_time_debt),
        debt_tone: if ledger.screen_time_debt > 0 {
            Tone::Negative
        } else {
            Tone::Positive
        },
    }
}

use serde::Serialize;

use crate::ledger::{DAILY_REWARD_MINUTES, INITIAL_FLEX_MINUTES};
use crate::render::{Tone, ViewModel};

/// Everything the dashboard announces to the user. Events are produced by
/// the session and turned into notices here; nothing else decides wording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Ready,
    DefaultsSeeded,
    TaskAdded { name: String },
    NothingToReset,
    TasksCleared { count: usize },
    NoTasks,
    MissionIncomplete { remaining: usize },
    RewardRequested,
    RewardGranted { amount: i64, debt_cleared: i64 },
    OverageDeducted { minutes: i64 },
    StoreUnavailable,
    WriteFailed { op: WriteOp },
}

/// The store write that failed, for error wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    AddTask,
    ToggleTask,
    ResetTasks,
    Reward,
    Deduction,
}

/// Audio cue riding on a notice. `file_name` is the asset a full front end
/// would play; terminal presenters degrade to a bell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundCue {
    Success,
    Added,
    Deduct,
    Error,
    Sent,
}

impl SoundCue {
    pub fn file_name(self) -> &'static str {
        match self {
            SoundCue::Success => "access_granted.mp3",
            SoundCue::Added => "task_added.mp3",
            SoundCue::Deduct => "deduction.mp3",
            SoundCue::Error => "error.mp3",
            SoundCue::Sent => "request_sent.mp3",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub body: String,
    pub tone: Tone,
    pub sound: Option<SoundCue>,
}

fn notice(title: &str, body: String, tone: Tone, sound: Option<SoundCue>) -> Notice {
    Notice {
        title: title.to_string(),
        body,
        tone,
        sound,
    }
}

pub fn notice_for(event: &Event) -> Notice {
    match event {
        Event::Ready => notice(
            "SYSTEM READY",
            format!("Dashboard connected. Initializing {INITIAL_FLEX_MINUTES} min Flex Time."),
            Tone::Info,
            None,
        ),
        Event::DefaultsSeeded => notice(
            "DEFAULT ROUTINE",
            "Morning routine loaded. Start checking tasks!".to_string(),
            Tone::Info,
            None,
        ),
        Event::TaskAdded { name } => notice(
            "TASK ADDED",
            format!("\"{name}\" successfully added."),
            Tone::Info,
            Some(SoundCue::Added),
        ),
        Event::NothingToReset => notice(
            "NO TASKS TO RESET",
            "All current tasks are incomplete.".to_string(),
            Tone::Info,
            None,
        ),
        Event::TasksCleared { count } => notice(
            "TASKS CLEARED",
            format!("{count} completed tasks removed!"),
            Tone::Positive,
            None,
        ),
        Event::NoTasks => notice(
            "HOLD UP",
            "There are no tasks to confirm! Add some tasks first.".to_string(),
            Tone::Negative,
            Some(SoundCue::Error),
        ),
        Event::MissionIncomplete { remaining } => notice(
            "MISSION INCOMPLETE",
            format!("You have {remaining} tasks remaining."),
            Tone::Negative,
            Some(SoundCue::Error),
        ),
        Event::RewardRequested => notice(
            "REQUEST SENT",
            format!("Processing {DAILY_REWARD_MINUTES} min Reward..."),
            Tone::Info,
            Some(SoundCue::Sent),
        ),
        Event::RewardGranted {
            amount,
            debt_cleared,
        } => notice(
            "ACCESS GRANTED!",
            format!("+{amount} min awarded! Debt cleared: {debt_cleared} min."),
            Tone::Positive,
            Some(SoundCue::Success),
        ),
        Event::OverageDeducted { minutes } => notice(
            "WARNING: OVERAGE",
            format!("{minutes} min deducted. Debt increased."),
            Tone::Negative,
            Some(SoundCue::Deduct),
        ),
        Event::StoreUnavailable => notice(
            "ERROR",
            "Failed to connect to the database.".to_string(),
            Tone::Negative,
            Some(SoundCue::Error),
        ),
        Event::WriteFailed { op } => notice(
            "ERROR",
            match op {
                WriteOp::AddTask => "Could not add task. Try again.",
                WriteOp::ToggleTask => "Could not update task status.",
                WriteOp::ResetTasks => "Could not reset tasks.",
                WriteOp::Reward => "Failed to update time balance.",
                WriteOp::Deduction => "Failed to deduct time.",
            }
            .to_string(),
            Tone::Negative,
            Some(SoundCue::Error),
        ),
    }
}

/// Where view models and notices go. Presenters must not fail the dashboard;
/// callers log and swallow errors.
pub trait Presenter: Send {
    fn show_view(&mut self, view: &ViewModel) -> anyhow::Result<()>;
    fn show_notice(&mut self, notice: &Notice) -> anyhow::Result<()>;
}

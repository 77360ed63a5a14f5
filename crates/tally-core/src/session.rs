use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::ledger::{DAILY_REWARD_MINUTES, LedgerState, UserProfile};
use crate::notify::{Event, WriteOp};
use crate::store::{ProfileStamp, StateStore, StoreError, UserId};
use crate::task::{self, NewTask, Task, TaskId};

/// One user interaction, already translated out of presentation terms.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    AddTask { name: String, time: String },
    ToggleTask { id: TaskId, completed: bool },
    ResetCompleted,
    RequestReward,
    ReportOverage { minutes: i64 },
}

/// Input rejected before any write reaches the store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("task name cannot be empty")]
    EmptyTaskName,
    #[error("overage minutes must be positive")]
    NonPositiveOverage,
}

/// Per-invocation context: the signed-in user, the last-seen snapshots, and
/// the seed-once flag. Dispatching writes to the store but never patches the
/// cached state; that only changes when a snapshot comes back.
pub struct Session {
    store: Arc<dyn StateStore>,
    user: UserId,
    ledger: LedgerState,
    tasks: Vec<Task>,
    has_seeded: bool,
}

impl Session {
    pub fn new(store: Arc<dyn StateStore>, user: UserId) -> Self {
        Self {
            store,
            user,
            ledger: LedgerState::initial(),
            tasks: Vec::new(),
            has_seeded: false,
        }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn ledger(&self) -> LedgerState {
        self.ledger
    }

    /// The last-seen task snapshot, in display order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Applies a profile snapshot. A missing document means a brand-new
    /// user: write the opening balance and announce the dashboard.
    pub async fn apply_profile_snapshot(&mut self, snapshot: Option<UserProfile>) -> Vec<Event> {
        match snapshot {
            Some(profile) => {
                self.ledger = profile.ledger();
                debug!(
                    flex = self.ledger.flex_time,
                    debt = self.ledger.screen_time_debt,
                    "profile snapshot applied"
                );
                vec![]
            }
            None => {
                let opening = LedgerState::initial();
                info!("no profile document, writing opening balance");
                match self
                    .store
                    .write_profile(
                        &self.user,
                        opening.flex_time,
                        opening.screen_time_debt,
                        ProfileStamp::Created,
                    )
                    .await
                {
                    Ok(()) => {
                        self.ledger = opening;
                        vec![Event::Ready]
                    }
                    Err(err) => {
                        error!(error = %err, "failed to write opening balance");
                        vec![Event::StoreUnavailable]
                    }
                }
            }
        }
    }

    /// Applies a task snapshot, sorted for display. The first snapshot of
    /// the session decides seeding: an empty collection gets the default
    /// routine, exactly once.
    pub async fn apply_task_snapshot(&mut self, mut tasks: Vec<Task>) -> Vec<Event> {
        task::sort_for_display(&mut tasks);

        let mut events = Vec::new();
        if !self.has_seeded {
            self.has_seeded = true;
            if tasks.is_empty() {
                info!("first task snapshot is empty, loading default routine");
                match self.seed_defaults().await {
                    Ok(()) => events.push(Event::DefaultsSeeded),
                    Err(err) => error!(error = %err, "failed to load default routine"),
                }
            }
        }

        debug!(count = tasks.len(), "task snapshot applied");
        self.tasks = tasks;
        events
    }

    async fn seed_defaults(&self) -> Result<(), StoreError> {
        for new in task::default_routine() {
            self.store.add_task(&self.user, new).await?;
        }
        Ok(())
    }

    /// Turns one action into store writes and notifier events.
    #[tracing::instrument(skip(self))]
    pub async fn dispatch(&mut self, action: Action) -> Result<Vec<Event>, ActionError> {
        match action {
            Action::AddTask { name, time } => self.add_task(name, time).await,
            Action::ToggleTask { id, completed } => self.toggle_task(id, completed).await,
            Action::ResetCompleted => self.reset_completed().await,
            Action::RequestReward => self.request_reward().await,
            Action::ReportOverage { minutes } => self.report_overage(minutes).await,
        }
    }

    async fn add_task(&mut self, name: String, time: String) -> Result<Vec<Event>, ActionError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(ActionError::EmptyTaskName);
        }
        let time = time.trim().to_string();

        info!(name = %name, "adding task");
        let new = NewTask {
            name: name.clone(),
            time,
        };
        match self.store.add_task(&self.user, new).await {
            Ok(id) => {
                debug!(id = %id, "task written");
                Ok(vec![Event::TaskAdded { name }])
            }
            Err(err) => {
                warn!(error = %err, "add task failed");
                Ok(vec![Event::WriteFailed {
                    op: WriteOp::AddTask,
                }])
            }
        }
    }

    async fn toggle_task(&mut self, id: TaskId, completed: bool) -> Result<Vec<Event>, ActionError> {
        info!(id = %id, completed, "toggling task");
        match self.store.set_task_completed(&self.user, &id, completed).await {
            Ok(()) => Ok(vec![]),
            Err(err) => {
                warn!(id = %id, error = %err, "toggle failed");
                Ok(vec![Event::WriteFailed {
                    op: WriteOp::ToggleTask,
                }])
            }
        }
    }

    /// Deletes every completed task. Deletions are independent: one failure
    /// does not stop the rest, the reported count is what actually went, and
    /// only the first failure is surfaced.
    async fn reset_completed(&mut self) -> Result<Vec<Event>, ActionError> {
        let completed: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|task| task.completed)
            .map(|task| task.id.clone())
            .collect();

        if completed.is_empty() {
            debug!("nothing completed, reset is a no-op");
            return Ok(vec![Event::NothingToReset]);
        }

        info!(count = completed.len(), "clearing completed tasks");
        let mut removed = 0;
        let mut failed = false;
        for id in &completed {
            match self.store.delete_task(&self.user, id).await {
                Ok(()) => removed += 1,
                Err(err) => {
                    if !failed {
                        warn!(id = %id, error = %err, "delete failed");
                    }
                    failed = true;
                }
            }
        }

        let mut events = vec![Event::TasksCleared { count: removed }];
        if failed {
            events.push(Event::WriteFailed {
                op: WriteOp::ResetTasks,
            });
        }
        Ok(events)
    }

    /// The reward is honored only when every task is complete and the list
    /// is non-empty; refusals never touch the store.
    async fn request_reward(&mut self) -> Result<Vec<Event>, ActionError> {
        if self.tasks.is_empty() {
            return Ok(vec![Event::NoTasks]);
        }
        let remaining = self.tasks.iter().filter(|task| !task.completed).count();
        if remaining > 0 {
            debug!(remaining, "reward refused, tasks remaining");
            return Ok(vec![Event::MissionIncomplete { remaining }]);
        }

        let outcome = self.ledger.apply_reward(DAILY_REWARD_MINUTES);
        info!(
            new_flex = outcome.new_flex_time,
            new_debt = outcome.new_debt,
            debt_cleared = outcome.debt_cleared,
            "all tasks complete, writing reward"
        );

        let mut events = vec![Event::RewardRequested];
        match self
            .store
            .write_profile(
                &self.user,
                outcome.new_flex_time,
                outcome.new_debt,
                ProfileStamp::Reward,
            )
            .await
        {
            Ok(()) => events.push(Event::RewardGranted {
                amount: DAILY_REWARD_MINUTES,
                debt_cleared: outcome.debt_cleared,
            }),
            Err(err) => {
                warn!(error = %err, "reward write failed");
                events.push(Event::WriteFailed {
                    op: WriteOp::Reward,
                });
            }
        }
        Ok(events)
    }

    async fn report_overage(&mut self, minutes: i64) -> Result<Vec<Event>, ActionError> {
        if minutes <= 0 {
            return Err(ActionError::NonPositiveOverage);
        }

        let outcome = self.ledger.apply_deduction(minutes);
        info!(
            minutes,
            new_flex = outcome.new_flex_time,
            new_debt = outcome.new_debt,
            "writing deduction"
        );
        match self
            .store
            .write_profile(
                &self.user,
                outcome.new_flex_time,
                outcome.new_debt,
                ProfileStamp::Deduction,
            )
            .await
        {
            Ok(()) => Ok(vec![Event::OverageDeducted { minutes }]),
            Err(err) => {
                warn!(error = %err, "deduction write failed");
                Ok(vec![Event::WriteFailed {
                    op: WriteOp::Deduction,
                }])
            }
        }
    }
}

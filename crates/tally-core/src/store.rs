use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::ledger::UserProfile;
use crate::task::{NewTask, Task, TaskId};

/// Identity handed out at sign-in. Scopes every document path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which server-time field a profile write refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileStamp {
    Created,
    Reward,
    Deduction,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("sign-in failed: {0}")]
    SignIn(String),
}

/// Document store scoped per user: one profile document plus one task
/// collection, with live snapshot subscriptions. Watchers always receive the
/// current state first, then one full snapshot per change.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn read_profile(&self, user: &UserId) -> Result<Option<UserProfile>, StoreError>;

    /// Writes both balances and refreshes the stamped server-time field,
    /// creating the document when missing.
    async fn write_profile(
        &self,
        user: &UserId,
        flex_time: i64,
        screen_time_debt: i64,
        stamp: ProfileStamp,
    ) -> Result<(), StoreError>;

    /// Assigns the id and creation timestamp.
    async fn add_task(&self, user: &UserId, new: NewTask) -> Result<TaskId, StoreError>;

    /// Fails with [`StoreError::TaskNotFound`] when the task no longer
    /// exists.
    async fn set_task_completed(
        &self,
        user: &UserId,
        id: &TaskId,
        completed: bool,
    ) -> Result<(), StoreError>;

    /// Deleting an absent task is not an error.
    async fn delete_task(&self, user: &UserId, id: &TaskId) -> Result<(), StoreError>;

    /// Tasks in delivery order, not display order.
    async fn list_tasks(&self, user: &UserId) -> Result<Vec<Task>, StoreError>;

    async fn watch_profile(
        &self,
        user: &UserId,
    ) -> Result<mpsc::UnboundedReceiver<Option<UserProfile>>, StoreError>;

    async fn watch_tasks(
        &self,
        user: &UserId,
    ) -> Result<mpsc::UnboundedReceiver<Vec<Task>>, StoreError>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self) -> Result<UserId, IdentityError>;
}

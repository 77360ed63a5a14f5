use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tally_core::ledger::UserProfile;
use tally_core::store::{ProfileStamp, StateStore, StoreError, UserId};
use tally_core::task::{NewTask, Task, TaskId};

/// File-backed document store with in-process live subscriptions. Each user
/// gets `users/{id}/profile.json` plus `users/{id}/tasks.jsonl`; every
/// successful write re-broadcasts a full snapshot to that user's watchers.
#[derive(Debug)]
pub struct LocalStore {
    users_dir: PathBuf,
    watchers: Mutex<Watchers>,
}

#[derive(Debug, Default)]
struct Watchers {
    profile: HashMap<UserId, Vec<mpsc::UnboundedSender<Option<UserProfile>>>>,
    tasks: HashMap<UserId, Vec<mpsc::UnboundedSender<Vec<Task>>>>,
}

impl LocalStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let users_dir = data_dir.join("users");
        fs::create_dir_all(&users_dir)
            .with_context(|| format!("failed to create {}", users_dir.display()))?;
        info!(users_dir = %users_dir.display(), "opened local store");
        Ok(Self {
            users_dir,
            watchers: Mutex::new(Watchers::default()),
        })
    }

    fn user_dir(&self, user: &UserId) -> PathBuf {
        self.users_dir.join(&user.0)
    }

    fn profile_path(&self, user: &UserId) -> PathBuf {
        self.user_dir(user).join("profile.json")
    }

    fn tasks_path(&self, user: &UserId) -> PathBuf {
        self.user_dir(user).join("tasks.jsonl")
    }

    fn ensure_user_dir(&self, user: &UserId) -> anyhow::Result<()> {
        let dir = self.user_dir(user);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        Ok(())
    }

    fn load_profile(&self, user: &UserId) -> anyhow::Result<Option<UserProfile>> {
        let path = self.profile_path(user);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        let profile = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", path.display()))?;
        Ok(Some(profile))
    }

    fn load_tasks(&self, user: &UserId) -> anyhow::Result<Vec<Task>> {
        let path = self.tasks_path(user);
        if !path.exists() {
            return Ok(Vec::new());
        }
        load_jsonl(&path)
    }

    fn lock_watchers(&self) -> std::sync::MutexGuard<'_, Watchers> {
        match self.watchers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn broadcast_profile(&self, user: &UserId) {
        let snapshot = match self.load_profile(user) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(user = %user, error = %err, "skipping profile broadcast");
                return;
            }
        };
        let mut watchers = self.lock_watchers();
        if let Some(senders) = watchers.profile.get_mut(user) {
            senders.retain(|tx| tx.send(snapshot.clone()).is_ok());
        }
    }

    fn broadcast_tasks(&self, user: &UserId) {
        let snapshot = match self.load_tasks(user) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(user = %user, error = %err, "skipping task broadcast");
                return;
            }
        };
        let mut watchers = self.lock_watchers();
        if let Some(senders) = watchers.tasks.get_mut(user) {
            senders.retain(|tx| tx.send(snapshot.clone()).is_ok());
        }
    }
}

fn storage_err(err: anyhow::Error) -> StoreError {
    StoreError::Storage(format!("{err:#}"))
}

#[async_trait]
impl StateStore for LocalStore {
    async fn read_profile(&self, user: &UserId) -> Result<Option<UserProfile>, StoreError> {
        self.load_profile(user).map_err(storage_err)
    }

    #[tracing::instrument(skip(self))]
    async fn write_profile(
        &self,
        user: &UserId,
        flex_time: i64,
        screen_time_debt: i64,
        stamp: ProfileStamp,
    ) -> Result<(), StoreError> {
        self.ensure_user_dir(user).map_err(storage_err)?;
        let mut profile = self
            .load_profile(user)
            .map_err(storage_err)?
            .unwrap_or(UserProfile {
                flex_time,
                screen_time_debt,
                last_updated: None,
                last_reward: None,
                last_deduction: None,
            });
        profile.flex_time = flex_time;
        profile.screen_time_debt = screen_time_debt;
        let now = Utc::now();
        match stamp {
            ProfileStamp::Created => profile.last_updated = Some(now),
            ProfileStamp::Reward => profile.last_reward = Some(now),
            ProfileStamp::Deduction => profile.last_deduction = Some(now),
        }
        save_json_atomic(&self.profile_path(user), &profile).map_err(storage_err)?;
        debug!(user = %user, flex_time, screen_time_debt, "profile written");
        self.broadcast_profile(user);
        Ok(())
    }

    #[tracing::instrument(skip(self, new), fields(name = %new.name))]
    async fn add_task(&self, user: &UserId, new: NewTask) -> Result<TaskId, StoreError> {
        self.ensure_user_dir(user).map_err(storage_err)?;
        let mut tasks = self.load_tasks(user).map_err(storage_err)?;
        let task = Task {
            id: TaskId::random(),
            name: new.name,
            time: new.time,
            completed: false,
            created_at: Some(Utc::now()),
        };
        let id = task.id.clone();
        tasks.push(task);
        save_jsonl_atomic(&self.tasks_path(user), &tasks).map_err(storage_err)?;
        debug!(user = %user, id = %id, "task added");
        self.broadcast_tasks(user);
        Ok(id)
    }

    #[tracing::instrument(skip(self))]
    async fn set_task_completed(
        &self,
        user: &UserId,
        id: &TaskId,
        completed: bool,
    ) -> Result<(), StoreError> {
        let mut tasks = self.load_tasks(user).map_err(storage_err)?;
        let task = tasks
            .iter_mut()
            .find(|task| task.id == *id)
            .ok_or_else(|| StoreError::TaskNotFound(id.clone()))?;
        task.completed = completed;
        save_jsonl_atomic(&self.tasks_path(user), &tasks).map_err(storage_err)?;
        self.broadcast_tasks(user);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_task(&self, user: &UserId, id: &TaskId) -> Result<(), StoreError> {
        let mut tasks = self.load_tasks(user).map_err(storage_err)?;
        let before = tasks.len();
        tasks.retain(|task| task.id != *id);
        if tasks.len() == before {
            // Absent already; deletion is idempotent.
            return Ok(());
        }
        save_jsonl_atomic(&self.tasks_path(user), &tasks).map_err(storage_err)?;
        self.broadcast_tasks(user);
        Ok(())
    }

    async fn list_tasks(&self, user: &UserId) -> Result<Vec<Task>, StoreError> {
        self.load_tasks(user).map_err(storage_err)
    }

    #[tracing::instrument(skip(self))]
    async fn watch_profile(
        &self,
        user: &UserId,
    ) -> Result<mpsc::UnboundedReceiver<Option<UserProfile>>, StoreError> {
        let snapshot = self.load_profile(user).map_err(storage_err)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(snapshot);
        self.lock_watchers()
            .profile
            .entry(user.clone())
            .or_default()
            .push(tx);
        info!(user = %user, "profile watcher attached");
        Ok(rx)
    }

    #[tracing::instrument(skip(self))]
    async fn watch_tasks(
        &self,
        user: &UserId,
    ) -> Result<mpsc::UnboundedReceiver<Vec<Task>>, StoreError> {
        let snapshot = self.load_tasks(user).map_err(storage_err)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(snapshot);
        self.lock_watchers()
            .tasks
            .entry(user.clone())
            .or_default()
            .push(tx);
        info!(user = %user, "task watcher attached");
        Ok(rx)
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Task>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)
        .with_context(|| format!("failed opening {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let task: Task = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(task);
    }

    debug!(count = out.len(), "loaded tasks from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, tasks))]
fn save_jsonl_atomic(path: &Path, tasks: &[Task]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = tasks.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for task in tasks {
        let serialized = serde_json::to_string(task)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[tracing::instrument(skip(path, profile))]
fn save_json_atomic(path: &Path, profile: &UserProfile) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    let serialized = serde_json::to_string(profile)?;
    writeln!(temp, "{serialized}")?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

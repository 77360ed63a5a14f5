use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::ledger::UserProfile;
use crate::notify::{Notice, Presenter};
use crate::render::ViewModel;
use crate::store::{ProfileStamp, StateStore, StoreError, UserId};
use crate::task::{NewTask, Task, TaskId};

pub fn test_user() -> UserId {
    UserId("tester".to_string())
}

pub fn task_named(name: &str, completed: bool) -> Task {
    Task {
        id: TaskId::random(),
        name: name.to_string(),
        time: String::new(),
        completed,
        created_at: None,
    }
}

pub fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

struct Watch<T> {
    tx: Option<mpsc::UnboundedSender<T>>,
    rx: Option<mpsc::UnboundedReceiver<T>>,
}

impl<T> Watch<T> {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Some(tx),
            rx: Some(rx),
        }
    }
}

/// Scripted store double. Writes are recorded but never broadcast; tests
/// push whatever snapshots they want through `push_profile`/`push_tasks`.
pub struct MockStore {
    profile: Mutex<Option<UserProfile>>,
    tasks: Mutex<Vec<Task>>,
    added: Mutex<Vec<NewTask>>,
    deleted: Mutex<Vec<TaskId>>,
    profile_writes: Mutex<Vec<(i64, i64, ProfileStamp)>>,
    fail_profile_writes: AtomicBool,
    fail_task_adds: AtomicBool,
    fail_delete_ids: Mutex<Vec<TaskId>>,
    profile_watch: Mutex<Watch<Option<UserProfile>>>,
    tasks_watch: Mutex<Watch<Vec<Task>>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            profile: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            added: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            profile_writes: Mutex::new(Vec::new()),
            fail_profile_writes: AtomicBool::new(false),
            fail_task_adds: AtomicBool::new(false),
            fail_delete_ids: Mutex::new(Vec::new()),
            profile_watch: Mutex::new(Watch::new()),
            tasks_watch: Mutex::new(Watch::new()),
        }
    }

    pub fn fail_profile_writes(&self) {
        self.fail_profile_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_task_adds(&self) {
        self.fail_task_adds.store(true, Ordering::SeqCst);
    }

    pub fn fail_deletes_of(&self, id: &TaskId) {
        lock(&self.fail_delete_ids).push(id.clone());
    }

    pub fn added(&self) -> Vec<NewTask> {
        lock(&self.added).clone()
    }

    pub fn deleted(&self) -> Vec<TaskId> {
        lock(&self.deleted).clone()
    }

    pub fn profile_writes(&self) -> Vec<(i64, i64, ProfileStamp)> {
        lock(&self.profile_writes).clone()
    }

    pub fn push_profile(&self, snapshot: Option<UserProfile>) {
        if let Some(tx) = lock(&self.profile_watch).tx.as_ref() {
            let _ = tx.send(snapshot);
        }
    }

    pub fn push_tasks(&self, snapshot: Vec<Task>) {
        if let Some(tx) = lock(&self.tasks_watch).tx.as_ref() {
            let _ = tx.send(snapshot);
        }
    }

    /// Drops the sender so the watcher sees the stream end.
    pub fn close_profile_watch(&self) {
        lock(&self.profile_watch).tx = None;
    }

    pub fn close_tasks_watch(&self) {
        lock(&self.tasks_watch).tx = None;
    }
}

#[async_trait]
impl StateStore for MockStore {
    async fn read_profile(&self, _user: &UserId) -> Result<Option<UserProfile>, StoreError> {
        Ok(lock(&self.profile).clone())
    }

    async fn write_profile(
        &self,
        _user: &UserId,
        flex_time: i64,
        screen_time_debt: i64,
        stamp: ProfileStamp,
    ) -> Result<(), StoreError> {
        if self.fail_profile_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Storage("profile write refused".to_string()));
        }
        lock(&self.profile_writes).push((flex_time, screen_time_debt, stamp));
        let mut profile = lock(&self.profile);
        let mut updated = profile.clone().unwrap_or(UserProfile {
            flex_time,
            screen_time_debt,
            last_updated: None,
            last_reward: None,
            last_deduction: None,
        });
        updated.flex_time = flex_time;
        updated.screen_time_debt = screen_time_debt;
        *profile = Some(updated);
        Ok(())
    }

    async fn add_task(&self, _user: &UserId, new: NewTask) -> Result<TaskId, StoreError> {
        if self.fail_task_adds.load(Ordering::SeqCst) {
            return Err(StoreError::Storage("add refused".to_string()));
        }
        let task = Task {
            id: TaskId::random(),
            name: new.name.clone(),
            time: new.time.clone(),
            completed: false,
            created_at: Some(chrono::Utc::now()),
        };
        lock(&self.added).push(new);
        let id = task.id.clone();
        lock(&self.tasks).push(task);
        Ok(id)
    }

    async fn set_task_completed(
        &self,
        _user: &UserId,
        id: &TaskId,
        completed: bool,
    ) -> Result<(), StoreError> {
        let mut tasks = lock(&self.tasks);
        match tasks.iter_mut().find(|task| task.id == *id) {
            Some(task) => {
                task.completed = completed;
                Ok(())
            }
            None => Err(StoreError::TaskNotFound(id.clone())),
        }
    }

    async fn delete_task(&self, _user: &UserId, id: &TaskId) -> Result<(), StoreError> {
        if lock(&self.fail_delete_ids).contains(id) {
            return Err(StoreError::Storage("delete refused".to_string()));
        }
        lock(&self.deleted).push(id.clone());
        lock(&self.tasks).retain(|task| task.id != *id);
        Ok(())
    }

    async fn list_tasks(&self, _user: &UserId) -> Result<Vec<Task>, StoreError> {
        Ok(lock(&self.tasks).clone())
    }

    async fn watch_profile(
        &self,
        _user: &UserId,
    ) -> Result<mpsc::UnboundedReceiver<Option<UserProfile>>, StoreError> {
        lock(&self.profile_watch)
            .rx
            .take()
            .ok_or_else(|| StoreError::Storage("profile already watched".to_string()))
    }

    async fn watch_tasks(
        &self,
        _user: &UserId,
    ) -> Result<mpsc::UnboundedReceiver<Vec<Task>>, StoreError> {
        lock(&self.tasks_watch)
            .rx
            .take()
            .ok_or_else(|| StoreError::Storage("tasks already watched".to_string()))
    }
}

/// Presenter double that remembers everything it was shown. The shared
/// handles survive the engine taking ownership of the presenter itself.
pub struct RecordingPresenter {
    pub notices: Arc<Mutex<Vec<Notice>>>,
    pub views: Arc<Mutex<Vec<ViewModel>>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self {
            notices: Arc::new(Mutex::new(Vec::new())),
            views: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

pub fn titles(notices: &Arc<Mutex<Vec<Notice>>>) -> Vec<String> {
    lock(notices)
        .iter()
        .map(|notice| notice.title.clone())
        .collect()
}

impl Presenter for RecordingPresenter {
    fn show_view(&mut self, view: &ViewModel) -> anyhow::Result<()> {
        lock(&self.views).push(view.clone());
        Ok(())
    }

    fn show_notice(&mut self, notice: &Notice) -> anyhow::Result<()> {
        lock(&self.notices).push(notice.clone());
        Ok(())
    }
}

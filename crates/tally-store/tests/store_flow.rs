use tally_core::store::{IdentityProvider, ProfileStamp, StateStore, StoreError, UserId};
use tally_core::task::{NewTask, TaskId};
use tally_store::identity::LocalIdentity;
use tally_store::local::LocalStore;
use tempfile::tempdir;

fn user() -> UserId {
    UserId("integration-user".to_string())
}

fn chores(name: &str) -> NewTask {
    NewTask {
        name: name.to_string(),
        time: "5:00 PM".to_string(),
    }
}

#[tokio::test]
async fn profile_round_trips_with_stamps() {
    let dir = tempdir().expect("create tempdir");
    let store = LocalStore::open(dir.path()).expect("open store");
    let user = user();

    assert!(store.read_profile(&user).await.expect("read").is_none());

    store
        .write_profile(&user, 60, 0, ProfileStamp::Created)
        .await
        .expect("write opening profile");
    let profile = store
        .read_profile(&user)
        .await
        .expect("read")
        .expect("profile exists");
    assert_eq!(profile.flex_time, 60);
    assert_eq!(profile.screen_time_debt, 0);
    assert!(profile.last_updated.is_some());
    assert!(profile.last_reward.is_none());
    assert!(profile.last_deduction.is_none());

    store
        .write_profile(&user, 90, 0, ProfileStamp::Reward)
        .await
        .expect("write reward");
    store
        .write_profile(&user, 75, 15, ProfileStamp::Deduction)
        .await
        .expect("write deduction");

    let profile = store
        .read_profile(&user)
        .await
        .expect("read")
        .expect("profile exists");
    assert_eq!(profile.flex_time, 75);
    assert_eq!(profile.screen_time_debt, 15);
    assert!(profile.last_updated.is_some());
    assert!(profile.last_reward.is_some());
    assert!(profile.last_deduction.is_some());
}

#[tokio::test]
async fn tasks_persist_across_reopen() {
    let dir = tempdir().expect("create tempdir");
    let user = user();

    {
        let store = LocalStore::open(dir.path()).expect("open store");
        store
            .add_task(&user, chores("Feed the cat"))
            .await
            .expect("add first");
        store
            .add_task(&user, chores("Water the plants"))
            .await
            .expect("add second");
    }

    let store = LocalStore::open(dir.path()).expect("reopen store");
    let tasks = store.list_tasks(&user).await.expect("list");
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].name, "Feed the cat");
    assert_eq!(tasks[1].name, "Water the plants");
    assert!(tasks.iter().all(|task| task.created_at.is_some()));
    assert!(tasks.iter().all(|task| !task.completed));
}

#[tokio::test]
async fn task_watchers_see_initial_and_updated_snapshots() {
    let dir = tempdir().expect("create tempdir");
    let store = LocalStore::open(dir.path()).expect("open store");
    let user = user();

    let mut rx = store.watch_tasks(&user).await.expect("watch");
    let initial = rx.recv().await.expect("initial snapshot");
    assert!(initial.is_empty());

    let id = store
        .add_task(&user, chores("Do homework"))
        .await
        .expect("add");
    let after_add = rx.recv().await.expect("snapshot after add");
    assert_eq!(after_add.len(), 1);
    assert_eq!(after_add[0].id, id);

    store
        .set_task_completed(&user, &id, true)
        .await
        .expect("toggle");
    let after_toggle = rx.recv().await.expect("snapshot after toggle");
    assert!(after_toggle[0].completed);

    store.delete_task(&user, &id).await.expect("delete");
    let after_delete = rx.recv().await.expect("snapshot after delete");
    assert!(after_delete.is_empty());
}

#[tokio::test]
async fn profile_watchers_see_writes() {
    let dir = tempdir().expect("create tempdir");
    let store = LocalStore::open(dir.path()).expect("open store");
    let user = user();

    let mut rx = store.watch_profile(&user).await.expect("watch");
    assert!(rx.recv().await.expect("initial snapshot").is_none());

    store
        .write_profile(&user, 60, 0, ProfileStamp::Created)
        .await
        .expect("write");
    let snapshot = rx
        .recv()
        .await
        .expect("snapshot after write")
        .expect("profile present");
    assert_eq!(snapshot.flex_time, 60);
    assert_eq!(snapshot.screen_time_debt, 0);
}

#[tokio::test]
async fn every_watcher_gets_the_broadcast() {
    let dir = tempdir().expect("create tempdir");
    let store = LocalStore::open(dir.path()).expect("open store");
    let user = user();

    let mut first = store.watch_tasks(&user).await.expect("first watcher");
    let mut second = store.watch_tasks(&user).await.expect("second watcher");
    first.recv().await.expect("first initial");
    second.recv().await.expect("second initial");

    store
        .add_task(&user, chores("Practice piano"))
        .await
        .expect("add");
    assert_eq!(first.recv().await.expect("first update").len(), 1);
    assert_eq!(second.recv().await.expect("second update").len(), 1);
}

#[tokio::test]
async fn toggling_a_missing_task_fails() {
    let dir = tempdir().expect("create tempdir");
    let store = LocalStore::open(dir.path()).expect("open store");
    let user = user();

    let ghost = TaskId::random();
    let err = store
        .set_task_completed(&user, &ghost, true)
        .await
        .expect_err("toggle should fail");
    assert!(matches!(err, StoreError::TaskNotFound(id) if id == ghost));
}

#[tokio::test]
async fn deleting_a_missing_task_is_not_an_error() {
    let dir = tempdir().expect("create tempdir");
    let store = LocalStore::open(dir.path()).expect("open store");
    let user = user();

    store
        .delete_task(&user, &TaskId::random())
        .await
        .expect("delete of absent task");
}

#[tokio::test]
async fn identity_is_stable_across_sign_ins() {
    let dir = tempdir().expect("create tempdir");

    let first = LocalIdentity::new(dir.path())
        .sign_in()
        .await
        .expect("first sign-in");
    let second = LocalIdentity::new(dir.path())
        .sign_in()
        .await
        .expect("second sign-in");
    assert_eq!(first, second);

    let other_dir = tempdir().expect("create other tempdir");
    let other = LocalIdentity::new(other_dir.path())
        .sign_in()
        .await
        .expect("other sign-in");
    assert_ne!(first, other);
}

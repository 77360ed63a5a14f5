use std::ffi::OsString;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, anyhow};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tally_core::notify::{Event, Presenter, notice_for};
use tally_core::render::{self, TaskRow};
use tally_core::session::{Action, Session};
use tally_core::store::{IdentityProvider, StateStore, UserId};
use tally_core::sync::SyncEngine;
use tally_store::identity::LocalIdentity;
use tally_store::local::LocalStore;

use crate::cli::{self, Cli, Command};
use crate::config::{self, Config};
use crate::screen::Screen;

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let cli = Cli::parse_from(raw_args);
    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(verbose = cli.verbose, quiet = cli.quiet, "starting tally");

    let mut cfg = Config::load(cli.tallyrc.as_deref())?;
    cfg.apply_overrides(cli.rc_overrides.into_iter().map(|kv| (kv.key, kv.value)));

    let data_dir = config::resolve_data_dir(&cfg, cli.data.as_deref())
        .context("failed to resolve data directory")?;

    let command = cli.command.unwrap_or_else(|| cli::default_command(&cfg));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    runtime.block_on(run_command(command, &cfg, &data_dir))
}

async fn run_command(command: Command, cfg: &Config, data_dir: &Path) -> anyhow::Result<()> {
    let mut screen = Screen::new(cfg)?;

    let store = match LocalStore::open(data_dir) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            show(&mut screen, &[Event::StoreUnavailable]);
            return Err(err.context("failed to open the local store"));
        }
    };
    let user = match LocalIdentity::new(data_dir).sign_in().await {
        Ok(user) => user,
        Err(err) => {
            show(&mut screen, &[Event::StoreUnavailable]);
            return Err(err.into());
        }
    };
    info!(user = %user, "signed in");

    match command {
        Command::Dash => dash(store, user, screen).await,
        Command::Status { json } => status(store, user, screen, json).await,
        other => one_shot(store, user, screen, other).await,
    }
}

/// Live dashboard: the sync engine drives the screen while a background task
/// feeds typed commands into the action channel. Ends on `quit` or EOF.
async fn dash(store: Arc<LocalStore>, user: UserId, screen: Screen) -> anyhow::Result<()> {
    println!(
        "Daily Ops Dashboard. Commands: add NAME [@ TIME], toggle N, reset, reward, \
         overage MIN, quit."
    );

    let rows = screen.rows_handle();
    let (tx, rx) = mpsc::channel(16);
    let input = tokio::spawn(read_commands(tx, rows));

    let mut engine = SyncEngine::new(store, user, screen);
    let result = engine.run(rx).await;
    input.abort();
    result
}

async fn status(
    store: Arc<LocalStore>,
    user: UserId,
    mut screen: Screen,
    json: bool,
) -> anyhow::Result<()> {
    let mut session = Session::new(store.clone(), user.clone());
    let events = match hydrate(&mut session, store.as_ref(), &user).await {
        Ok(events) => events,
        Err(err) => {
            show(&mut screen, &[Event::StoreUnavailable]);
            return Err(err);
        }
    };

    let view = render::render(session.tasks(), session.ledger());
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    show(&mut screen, &events);
    screen.show_view(&view)?;
    Ok(())
}

async fn one_shot(
    store: Arc<LocalStore>,
    user: UserId,
    mut screen: Screen,
    command: Command,
) -> anyhow::Result<()> {
    let mut session = Session::new(store.clone(), user.clone());
    let events = match hydrate(&mut session, store.as_ref(), &user).await {
        Ok(events) => events,
        Err(err) => {
            show(&mut screen, &[Event::StoreUnavailable]);
            return Err(err);
        }
    };
    show(&mut screen, &events);

    let action = match command {
        Command::Add { name, time } => Action::AddTask { name, time },
        Command::Toggle { number } => toggle_action(&session, number)?,
        Command::Reset => Action::ResetCompleted,
        Command::Reward => Action::RequestReward,
        Command::Overage { minutes } => Action::ReportOverage { minutes },
        Command::Dash | Command::Status { .. } => {
            return Err(anyhow!("dash and status do not dispatch actions"));
        }
    };

    let events = session.dispatch(action).await?;
    show(&mut screen, &events);

    // Refresh from the store so the final view reflects the write.
    let profile = store.read_profile(&user).await?;
    let events = session.apply_profile_snapshot(profile).await;
    show(&mut screen, &events);
    let tasks = store.list_tasks(&user).await?;
    let events = session.apply_task_snapshot(tasks).await;
    show(&mut screen, &events);

    screen.show_view(&render::render(session.tasks(), session.ledger()))?;
    Ok(())
}

/// Feeds the session its first profile and task snapshots, seeding a fresh
/// store along the way exactly as the live dashboard would.
async fn hydrate(
    session: &mut Session,
    store: &LocalStore,
    user: &UserId,
) -> anyhow::Result<Vec<Event>> {
    let mut events = Vec::new();

    let profile = store.read_profile(user).await?;
    events.extend(session.apply_profile_snapshot(profile).await);

    let tasks = store.list_tasks(user).await?;
    let snapshot_events = session.apply_task_snapshot(tasks).await;
    let seeded = snapshot_events
        .iter()
        .any(|event| matches!(event, Event::DefaultsSeeded));
    events.extend(snapshot_events);

    if seeded {
        let tasks = store.list_tasks(user).await?;
        events.extend(session.apply_task_snapshot(tasks).await);
    }

    Ok(events)
}

fn toggle_action(session: &Session, number: usize) -> anyhow::Result<Action> {
    let position = number
        .checked_sub(1)
        .ok_or_else(|| anyhow!("task numbers start at 1"))?;
    let task = session
        .tasks()
        .get(position)
        .ok_or_else(|| anyhow!("no task numbered {number}"))?;
    Ok(Action::ToggleTask {
        id: task.id.clone(),
        completed: !task.completed,
    })
}

fn show(screen: &mut Screen, events: &[Event]) {
    for event in events {
        let notice = notice_for(event);
        debug!(title = %notice.title, "notice");
        if let Err(err) = screen.show_notice(&notice) {
            warn!(error = %err, "failed to present notice");
        }
    }
}

async fn read_commands(tx: mpsc::Sender<Action>, rows: Arc<Mutex<Vec<TaskRow>>>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "failed reading input");
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
            break;
        }
        match parse_input(trimmed, &rows) {
            Ok(action) => {
                if tx.send(action).await.is_err() {
                    break;
                }
            }
            Err(err) => eprintln!("error: {err:#}"),
        }
    }
}

/// Parses one typed dashboard command. Task numbers resolve against the rows
/// currently on screen.
fn parse_input(line: &str, rows: &Arc<Mutex<Vec<TaskRow>>>) -> anyhow::Result<Action> {
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_ascii_lowercase().as_str() {
        "add" => {
            let (name, time) = match rest.split_once(" @ ") {
                Some((name, time)) => (name.trim(), time.trim()),
                None => (rest, ""),
            };
            if name.is_empty() {
                return Err(anyhow!("usage: add NAME [@ TIME]"));
            }
            Ok(Action::AddTask {
                name: name.to_string(),
                time: time.to_string(),
            })
        }
        "toggle" | "t" => {
            let number: usize = rest.parse().context("usage: toggle N")?;
            let cache = match rows.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let row = number
                .checked_sub(1)
                .and_then(|position| cache.get(position))
                .ok_or_else(|| anyhow!("no task numbered {number}"))?;
            Ok(Action::ToggleTask {
                id: row.id.clone(),
                completed: !row.completed,
            })
        }
        "reset" => Ok(Action::ResetCompleted),
        "reward" | "confirm" => Ok(Action::RequestReward),
        "overage" => {
            let minutes: i64 = rest.parse().context("usage: overage MINUTES")?;
            Ok(Action::ReportOverage { minutes })
        }
        other => Err(anyhow!(
            "unknown command: {other} (try add, toggle, reset, reward, overage, quit)"
        )),
    }
}

use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::notify::{self, Event, Presenter};
use crate::render;
use crate::session::{Action, Session};
use crate::store::{StateStore, UserId};

/// Lifecycle of one live subscription. `Error` is terminal: the failure is
/// logged and nothing retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribing,
    Active,
    Error,
}

/// Drives the dashboard: two snapshot subscriptions plus a channel of
/// presentation actions, applied one at a time. Every state change redraws
/// the whole view.
pub struct SyncEngine<P: Presenter> {
    store: Arc<dyn StateStore>,
    session: Session,
    presenter: P,
    profile_sub: SubscriptionState,
    tasks_sub: SubscriptionState,
}

impl<P: Presenter> SyncEngine<P> {
    pub fn new(store: Arc<dyn StateStore>, user: UserId, presenter: P) -> Self {
        Self {
            session: Session::new(store.clone(), user),
            store,
            presenter,
            profile_sub: SubscriptionState::Unsubscribed,
            tasks_sub: SubscriptionState::Unsubscribed,
        }
    }

    pub fn subscription_states(&self) -> (SubscriptionState, SubscriptionState) {
        (self.profile_sub, self.tasks_sub)
    }

    /// Runs until the action channel closes. The first profile snapshot is
    /// applied before the task subscription starts, so a brand-new user sees
    /// the ready notice before the default routine loads.
    #[tracing::instrument(skip_all)]
    pub async fn run(&mut self, mut actions: mpsc::Receiver<Action>) -> anyhow::Result<()> {
        self.profile_sub = SubscriptionState::Subscribing;
        let mut profile_rx = match self.store.watch_profile(self.session.user()).await {
            Ok(rx) => rx,
            Err(err) => {
                self.profile_sub = SubscriptionState::Error;
                error!(error = %err, "profile subscription failed");
                self.emit(&[Event::StoreUnavailable]);
                return Err(err.into());
            }
        };
        match profile_rx.recv().await {
            Some(snapshot) => {
                self.profile_sub = SubscriptionState::Active;
                let events = self.session.apply_profile_snapshot(snapshot).await;
                self.emit(&events);
            }
            None => {
                self.profile_sub = SubscriptionState::Error;
                error!("profile subscription ended before the first snapshot");
                self.emit(&[Event::StoreUnavailable]);
                return Err(anyhow!("profile subscription ended"));
            }
        }

        self.tasks_sub = SubscriptionState::Subscribing;
        let mut tasks_rx = match self.store.watch_tasks(self.session.user()).await {
            Ok(rx) => rx,
            Err(err) => {
                self.tasks_sub = SubscriptionState::Error;
                error!(error = %err, "task subscription failed");
                self.emit(&[Event::StoreUnavailable]);
                return Err(err.into());
            }
        };
        match tasks_rx.recv().await {
            Some(snapshot) => {
                self.tasks_sub = SubscriptionState::Active;
                let events = self.session.apply_task_snapshot(snapshot).await;
                self.emit(&events);
            }
            None => {
                self.tasks_sub = SubscriptionState::Error;
                error!("task subscription ended before the first snapshot");
                self.emit(&[Event::StoreUnavailable]);
                return Err(anyhow!("task subscription ended"));
            }
        }
        self.redraw();

        info!(user = %self.session.user(), "dashboard live");

        loop {
            // Pending snapshots are drained before the next action so
            // dispatch always sees the freshest cache.
            tokio::select! {
                biased;

                snapshot = profile_rx.recv(), if self.profile_sub == SubscriptionState::Active => {
                    match snapshot {
                        Some(snapshot) => {
                            let events = self.session.apply_profile_snapshot(snapshot).await;
                            self.emit(&events);
                            self.redraw();
                        }
                        None => {
                            self.profile_sub = SubscriptionState::Error;
                            error!("profile subscription ended");
                        }
                    }
                }
                snapshot = tasks_rx.recv(), if self.tasks_sub == SubscriptionState::Active => {
                    match snapshot {
                        Some(snapshot) => {
                            let events = self.session.apply_task_snapshot(snapshot).await;
                            self.emit(&events);
                            self.redraw();
                        }
                        None => {
                            self.tasks_sub = SubscriptionState::Error;
                            error!("task subscription ended");
                        }
                    }
                }
                action = actions.recv() => {
                    let Some(action) = action else {
                        info!("action channel closed, stopping");
                        break;
                    };
                    match self.session.dispatch(action).await {
                        Ok(events) => self.emit(&events),
                        Err(err) => warn!(error = %err, "action rejected"),
                    }
                }
            }
        }

        Ok(())
    }

    fn redraw(&mut self) {
        let view = render::render(self.session.tasks(), self.session.ledger());
        if let Err(err) = self.presenter.show_view(&view) {
            warn!(error = %err, "presenter failed to draw the view");
        }
    }

    fn emit(&mut self, events: &[Event]) {
        for event in events {
            let notice = notify::notice_for(event);
            debug!(title = %notice.title, "notice");
            if let Err(err) = self.presenter.show_notice(&notice) {
                warn!(error = %err, "presenter failed to show a notice");
            }
        }
    }
}

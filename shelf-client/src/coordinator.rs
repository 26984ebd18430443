//! Sync coordinator - runs the sync trigger against live signals.
//!
//! The coordinator task owns a [`SyncTrigger`] from shelf-core and feeds it
//! manual requests, sync completions, and the connectivity and session
//! changes read from one ordered [`ChangeFeed`](crate::feed::ChangeFeed). It interprets the resulting actions: `StartSync` spawns one
//! `sync_all` call (bounded by a timeout), `EmitEvent` goes to the log and to
//! the published [`SyncStatus`].
//!
//! The coordinator only reads the connectivity signal and the session; it
//! never changes either.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use shelf_core::{
    Action, Session, SyncEvent, SyncReason, SyncTrigger, TriggerEvent, TriggerPolicy, TriggerState,
};
use shelf_types::SyncResult;

use crate::connectivity::ConnectivitySignal;
use crate::feed::Change;
use crate::services::SyncService;

/// Default upper bound for one `sync_all` call.
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(60);

/// Error recorded when a sync exceeds its timeout.
pub const TIMEOUT_ERROR: &str = "timeout";

/// Configuration for the sync coordinator.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    /// Trigger policy.
    pub policy: TriggerPolicy,
    /// Upper bound for one `sync_all` call.
    pub sync_timeout: Duration,
}

impl CoordinatorConfig {
    /// Also sync when a login completes while connected.
    pub fn with_sync_on_login(mut self, enabled: bool) -> Self {
        self.policy.sync_on_login = enabled;
        self
    }

    /// Set the sync timeout.
    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            policy: TriggerPolicy::default(),
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
        }
    }
}

/// Snapshot of the coordinator, published after every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// Trigger state.
    pub state: TriggerState,
    /// Connectivity as last observed by the trigger.
    pub connected: bool,
    /// Session state as last observed by the trigger.
    pub logged_in: bool,
    /// Number of syncs started.
    pub started: u64,
    /// Number of syncs finished (any outcome).
    pub completed: u64,
    /// Reason of the most recently finished sync.
    pub last_reason: Option<SyncReason>,
    /// Result of the most recently finished sync.
    pub last_result: Option<SyncResult>,
}

impl SyncStatus {
    fn initial(trigger: &SyncTrigger) -> Self {
        Self {
            state: trigger.state(),
            connected: trigger.connected(),
            logged_in: trigger.logged_in(),
            started: 0,
            completed: 0,
            last_reason: None,
            last_result: None,
        }
    }
}

enum Command {
    SyncNow,
    Shutdown,
}

/// Handle to a running coordinator task.
#[derive(Debug)]
pub struct SyncCoordinator {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SyncStatus>,
    task: JoinHandle<()>,
}

impl SyncCoordinator {
    /// Spawn the coordinator.
    ///
    /// Changes are read from `connectivity.feed()`. Session changes must be
    /// published into the same feed (see [`SessionStore::with_feed`]); the
    /// `session` receiver is only read for snapshots.
    ///
    /// The startup condition is evaluated once, against the connectivity and
    /// session values current at this call.
    ///
    /// [`SessionStore::with_feed`]: crate::session::SessionStore::with_feed
    pub fn spawn<S>(
        config: CoordinatorConfig,
        sync: Arc<S>,
        connectivity: &ConnectivitySignal,
        mut session: watch::Receiver<Session>,
    ) -> Self
    where
        S: SyncService + 'static,
    {
        // Subscribe before reading so no change falls in between.
        let changes = connectivity.feed().subscribe();
        let connectivity_state = connectivity.watch();
        let startup = TriggerEvent::Started {
            connected: *connectivity_state.borrow(),
            logged_in: session.borrow_and_update().logged_in(),
        };

        let trigger = SyncTrigger::new(config.policy);
        let (status_tx, status) = watch::channel(SyncStatus::initial(&trigger));
        let (commands, commands_rx) = mpsc::channel(8);
        let (completions_tx, completions) = mpsc::channel(1);

        let worker = CoordinatorWorker {
            config,
            sync,
            trigger,
            status: status_tx,
            completions_tx,
            in_flight: None,
        };
        let task = tokio::spawn(worker.run(
            startup,
            Inputs {
                commands: commands_rx,
                changes,
                connectivity_state,
                session,
                completions,
            },
        ));

        Self {
            commands,
            status,
            task,
        }
    }

    /// Ask for a sync now. Runs only when connected and logged in; folded
    /// into a follow-up if a sync is already running.
    pub async fn sync_now(&self) {
        let _ = self.commands.send(Command::SyncNow).await;
    }

    /// Latest status snapshot.
    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every status change.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.clone()
    }

    /// Stop the coordinator, abandoning any sync in flight.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown).await;
        let _ = self.task.await;
    }
}

struct Inputs {
    commands: mpsc::Receiver<Command>,
    changes: broadcast::Receiver<Change>,
    connectivity_state: watch::Receiver<bool>,
    session: watch::Receiver<Session>,
    completions: mpsc::Receiver<SyncResult>,
}

struct CoordinatorWorker<S> {
    config: CoordinatorConfig,
    sync: Arc<S>,
    trigger: SyncTrigger,
    status: watch::Sender<SyncStatus>,
    completions_tx: mpsc::Sender<SyncResult>,
    in_flight: Option<JoinHandle<()>>,
}

impl<S: SyncService + 'static> CoordinatorWorker<S> {
    async fn run(mut self, startup: TriggerEvent, mut inputs: Inputs) {
        tracing::info!("Sync coordinator started");
        self.handle(startup);

        let mut feed_open = true;

        loop {
            tokio::select! {
                command = inputs.commands.recv() => match command {
                    Some(Command::SyncNow) => self.handle(TriggerEvent::SyncRequested),
                    Some(Command::Shutdown) | None => break,
                },
                change = inputs.changes.recv(), if feed_open => match change {
                    Ok(change) => self.handle(change.into()),
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("Sync coordinator missed {} changes, resyncing", missed);
                        // Skip the backlog; the snapshots below cover it.
                        inputs.changes = inputs.changes.resubscribe();
                        let logged_in = inputs.session.borrow().logged_in();
                        let connected = *inputs.connectivity_state.borrow();
                        self.handle(TriggerEvent::SessionChanged { logged_in });
                        self.handle(TriggerEvent::ConnectivityChanged { connected });
                    }
                    Err(RecvError::Closed) => feed_open = false,
                },
                Some(result) = inputs.completions.recv() => {
                    self.in_flight = None;
                    self.handle(TriggerEvent::SyncFinished { result });
                }
            }
        }

        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
        tracing::info!("Sync coordinator stopped");
    }

    fn handle(&mut self, event: TriggerEvent) {
        let (next, actions) = self.trigger.clone().on_event(event);
        self.trigger = next;

        for action in actions {
            match action {
                Action::StartSync { reason } => self.start_sync(reason),
                Action::EmitEvent(event) => self.emit(event),
            }
        }

        let trigger = &self.trigger;
        self.status.send_if_modified(|status| {
            let before = (status.state, status.connected, status.logged_in);
            status.state = trigger.state();
            status.connected = trigger.connected();
            status.logged_in = trigger.logged_in();
            before != (status.state, status.connected, status.logged_in)
        });
    }

    fn start_sync(&mut self, reason: SyncReason) {
        let sync = Arc::clone(&self.sync);
        let done = self.completions_tx.clone();
        let timeout = self.config.sync_timeout;

        self.in_flight = Some(tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, sync.sync_all()).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => SyncResult::failed([e.to_string()]),
                Err(_) => {
                    tracing::warn!("Sync ({}) exceeded {:?}", reason, timeout);
                    SyncResult::failed([TIMEOUT_ERROR])
                }
            };
            let _ = done.send(result).await;
        }));
    }

    fn emit(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Started { reason } => {
                tracing::info!("Sync started ({})", reason);
                self.status.send_modify(|status| status.started += 1);
            }
            SyncEvent::Completed { reason, result } => {
                if result.success() {
                    tracing::info!(
                        "Sync finished ({}): {} items",
                        reason,
                        result.synced_item_count()
                    );
                } else {
                    tracing::warn!(
                        "Sync failed ({}): {}",
                        reason,
                        result.errors().join("; ")
                    );
                }
                self.status.send_modify(|status| {
                    status.completed += 1;
                    status.last_reason = Some(reason);
                    status.last_result = Some(result);
                });
            }
            SyncEvent::Coalesced { reason } => {
                tracing::debug!("Sync already running; queued follow-up ({})", reason);
            }
            SyncEvent::Skipped { reason, cause } => {
                tracing::info!("Sync ({}) skipped: {}", reason, cause);
            }
        }
    }
}

//! Notification polling
//!
//! Periodically fetches the unread-message and pending-connection
//! counters for the signed-in account and raises UI-observable events.
//! Deliberately independent of the entitlement gate: a locked-out user
//! still sees pending invitations.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use patron_core::{Database, EngineConfig};
use patron_net::ApiClient;

use crate::session::SessionManager;

/// UI-observable notification signals
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// Latest counter values.
    Counters {
        unread_messages: u64,
        pending_connections: u64,
    },
    /// Pending connections rose since the previous poll.
    ConnectionPulse { pending: u64 },
    /// Play the short notification cue (the sound preference is on).
    PlaySound,
}

enum PollerCommand {
    Poll,
    Shutdown,
}

/// Handle to a running poller task
pub struct PollerHandle {
    cmd_tx: mpsc::Sender<PollerCommand>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Trigger an immediate poll (e.g. on route change)
    pub async fn poke(&self) {
        let _ = self.cmd_tx.send(PollerCommand::Poll).await;
    }

    /// Stop the task and wait for it to wind down
    pub async fn stop(self) {
        let _ = self.cmd_tx.send(PollerCommand::Shutdown).await;
        let _ = self.task.await;
    }
}

/// Periodic counter fetcher
pub struct NotificationPoller {
    session: SessionManager,
    api: ApiClient,
    db: Arc<Mutex<Database>>,
    interval: Duration,
}

impl NotificationPoller {
    pub fn new(
        session: SessionManager,
        api: ApiClient,
        db: Arc<Mutex<Database>>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            session,
            api,
            db,
            interval: Duration::from_secs(config.poll_interval_secs.max(1)),
        }
    }

    /// Spawn the polling task. Polls immediately, then on every poke
    /// and on the configured interval, until the handle stops it or
    /// the event receiver is dropped.
    pub fn start(self) -> (PollerHandle, mpsc::Receiver<NotificationEvent>) {
        let (event_tx, event_rx) = mpsc::channel(16);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let task = tokio::spawn(self.run(event_tx, cmd_rx));
        (PollerHandle { cmd_tx, task }, event_rx)
    }

    async fn run(
        self,
        event_tx: mpsc::Sender<NotificationEvent>,
        mut cmd_rx: mpsc::Receiver<PollerCommand>,
    ) {
        // The previous pending count lives here, in the task, not in
        // shared state: a consumer re-render can never feed back into
        // edge detection.
        let mut previous_pending: Option<u64> = None;

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                cmd = cmd_rx.recv() => match cmd {
                    Some(PollerCommand::Poll) => {}
                    Some(PollerCommand::Shutdown) | None => break,
                },
            }

            let Some(email) = self.session.current_user().map(|u| u.email) else {
                previous_pending = None;
                continue;
            };

            let (unread, pending) = tokio::join!(
                self.api.unread_count(&email),
                self.api.pending_connections(&email),
            );

            // Each counter degrades to zero on its own failure.
            let unread = unread.unwrap_or_else(|e| {
                debug!(error = %e, "Unread count unavailable");
                0
            });
            let pending = pending.unwrap_or_else(|e| {
                debug!(error = %e, "Pending connections unavailable");
                0
            });

            if event_tx
                .send(NotificationEvent::Counters {
                    unread_messages: unread,
                    pending_connections: pending,
                })
                .await
                .is_err()
            {
                break;
            }

            if previous_pending.is_some_and(|prev| pending > prev) {
                let _ = event_tx
                    .send(NotificationEvent::ConnectionPulse { pending })
                    .await;
                if self.sound_enabled() {
                    let _ = event_tx.send(NotificationEvent::PlaySound).await;
                }
            }
            previous_pending = Some(pending);
        }

        debug!("Notification poller stopped");
    }

    fn sound_enabled(&self) -> bool {
        let db = self.db.lock().unwrap();
        db.preferences().sound_enabled().unwrap_or_else(|e| {
            warn!(error = %e, "Could not read sound preference");
            true
        })
    }
}

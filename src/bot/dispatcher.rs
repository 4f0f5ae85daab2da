//! Per-user event queues.
//!
//! Events of one user are handled strictly in arrival order by a dedicated
//! worker task; workers of different users run concurrently. A worker exits
//! once its queue is empty, and the next event for that user spawns a new
//! one. Workers are tracked so shutdown can wait for them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::channels::InboundEvent;
use crate::session::UserId;

/// Consumer of inbound events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: InboundEvent);
}

type QueueMap = Arc<Mutex<HashMap<UserId, UnboundedSender<InboundEvent>>>>;

/// Routes each event to its user's queue.
pub struct UserQueues {
    handler: Arc<dyn EventHandler>,
    queues: QueueMap,
    workers: Mutex<JoinSet<()>>,
}

impl UserQueues {
    pub fn new(handler: Arc<dyn EventHandler>) -> Self {
        Self {
            handler,
            queues: Arc::new(Mutex::new(HashMap::new())),
            workers: Mutex::new(JoinSet::new()),
        }
    }

    /// Enqueue `event` behind any pending events of the same user.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn dispatch(&self, event: InboundEvent) {
        let user_id = event.user.id;
        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());

        let event = match queues.get(&user_id) {
            Some(tx) => match tx.send(event) {
                Ok(()) => return,
                // The worker died without cleaning up (a handler panic).
                Err(mpsc::error::SendError(event)) => {
                    warn!(user_id, "User worker gone, starting a new one");
                    queues.remove(&user_id);
                    event
                }
            },
            None => event,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(event);
        queues.insert(user_id, tx);
        debug!(user_id, active = queues.len(), "User worker started");

        let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        // Reap finished workers so the set only holds live ones.
        while let Some(result) = workers.try_join_next() {
            log_worker_exit(result);
        }
        workers.spawn(run_worker(
            user_id,
            rx,
            Arc::clone(&self.handler),
            Arc::clone(&self.queues),
        ));
    }

    /// Wait up to `grace` for every worker to empty its queue.
    ///
    /// Call after the last `dispatch`. Workers still running when `grace`
    /// runs out are aborted; returns how many.
    pub async fn drain(&self, grace: Duration) -> usize {
        let mut workers =
            std::mem::take(&mut *self.workers.lock().unwrap_or_else(|e| e.into_inner()));
        if workers.is_empty() {
            return 0;
        }
        info!(workers = workers.len(), "Waiting for user workers to finish");

        let finished = tokio::time::timeout(grace, async {
            while let Some(result) = workers.join_next().await {
                log_worker_exit(result);
            }
        })
        .await;

        match finished {
            Ok(()) => 0,
            Err(_) => {
                let aborted = workers.len();
                warn!(aborted, ?grace, "User workers did not finish in time, aborting");
                workers.shutdown().await;
                aborted
            }
        }
    }

    /// Number of users with a running worker.
    pub fn active_users(&self) -> usize {
        self.queues.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn log_worker_exit(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!(error = %e, "User worker panicked");
        }
    }
}

async fn run_worker(
    user_id: UserId,
    mut rx: UnboundedReceiver<InboundEvent>,
    handler: Arc<dyn EventHandler>,
    queues: QueueMap,
) {
    loop {
        let event = match rx.try_recv() {
            Ok(event) => event,
            Err(_) => {
                // Re-check under the map lock: `dispatch` sends while holding
                // it, so an empty queue here stays empty until we are removed.
                let mut map = queues.lock().unwrap_or_else(|e| e.into_inner());
                match rx.try_recv() {
                    Ok(event) => event,
                    Err(_) => {
                        map.remove(&user_id);
                        debug!(user_id, "User worker finished");
                        return;
                    }
                }
            }
        };
        handler.handle(event).await;
    }
}

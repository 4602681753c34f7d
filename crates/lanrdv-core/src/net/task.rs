//! Supervised listener tasks.
//!
//! A long-lived listener (discovery responder, rendezvous server) runs as a
//! Tokio task owned by a [`ListenerHandle`].  The handle carries a stop
//! signal; the listener races it against every pending `recv_from` /
//! `accept` with `tokio::select!`, so a stop request takes effect even while
//! the socket is idle.
//!
//! ```text
//! ListenerHandle::spawn(name, addr, |shutdown| async move { ... })
//!   ├─ request_stop()   flag set, listener exits at its next select
//!   ├─ join().await     wait for the task to finish
//!   └─ stop().await     request_stop() + join()
//! ```
//!
//! Dropping a handle without calling `stop` also stops the listener: the
//! signal treats a vanished handle as a stop request.

use std::future::Future;
use std::net::SocketAddr;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::net::error::NetError;

/// The listener side of a stop signal.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Returns `true` once a stop has been requested.
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes when a stop is requested or the owning handle is dropped.
    pub async fn requested(&mut self) {
        // Err means the sender is gone, which is also a stop.
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

/// Owns one running listener task and its stop signal.
#[derive(Debug)]
pub struct ListenerHandle {
    name: &'static str,
    local_addr: SocketAddr,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Spawns `run` on the current Tokio runtime, passing it a fresh
    /// [`ShutdownSignal`].
    pub fn spawn<F, Fut>(name: &'static str, local_addr: SocketAddr, run: F) -> Self
    where
        F: FnOnce(ShutdownSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, rx) = watch::channel(false);
        let task = tokio::spawn(run(ShutdownSignal { rx }));
        debug!("spawned listener '{name}' on {local_addr}");
        Self {
            name,
            local_addr,
            stop_tx,
            task,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The address the listener's socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Asks the listener to stop without waiting for it.
    pub fn request_stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Returns `true` once the listener task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the listener task to exit on its own or after a stop request.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::TaskPanicked`] if the task panicked.
    pub async fn join(self) -> Result<(), NetError> {
        // Keep the sender alive while waiting so the join itself is not a stop.
        let ListenerHandle {
            name,
            stop_tx: _stop_tx,
            task,
            ..
        } = self;

        match task.await {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => {
                error!("listener '{name}' panicked: {e}");
                Err(NetError::TaskPanicked { name })
            }
        }
    }

    /// Requests a stop and waits for the listener to exit.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::TaskPanicked`] if the task panicked.
    pub async fn stop(self) -> Result<(), NetError> {
        self.request_stop();
        self.join().await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

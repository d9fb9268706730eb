//! One-shot signals between the control thread and the main flow.
//!
//! # Responsibilities
//! - `ShutdownTrigger` / `ShutdownListener`: tell the main flow a stop was requested
//! - `CompletionSignal` / `CompletionWatcher`: tell observers the control loop has exited
//!
//! # Design Decisions
//! - Firing consumes the trigger, so at most one value is ever sent
//! - Sends never block: oneshot and watch senders are non-blocking

use tokio::sync::{oneshot, watch};

use crate::lifecycle::controller::ControllerOutcome;
use crate::lifecycle::status::StopReason;

/// Create a connected shutdown trigger and listener.
pub fn shutdown_signal() -> (ShutdownTrigger, ShutdownListener) {
    let (tx, rx) = oneshot::channel();
    (
        ShutdownTrigger { tx },
        ShutdownListener {
            rx: Some(rx),
            received: None,
        },
    )
}

/// Sending half of the shutdown signal, owned by the controller.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: oneshot::Sender<StopReason>,
}

/// Returned when the listener was dropped before the trigger fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerGone(pub StopReason);

impl ShutdownTrigger {
    /// Deliver the stop reason to the main flow.
    pub fn fire(self, reason: StopReason) -> Result<(), ListenerGone> {
        self.tx.send(reason).map_err(ListenerGone)
    }
}

/// Receiving half of the shutdown signal, owned by the main flow.
#[derive(Debug)]
pub struct ShutdownListener {
    rx: Option<oneshot::Receiver<StopReason>>,
    received: Option<StopReason>,
}

impl ShutdownListener {
    /// Wait for the stop request.
    ///
    /// Returns `None` if the trigger was dropped without firing.
    pub async fn wait(mut self) -> Option<StopReason> {
        if let Some(reason) = self.received {
            return Some(reason);
        }
        match self.rx.take() {
            Some(rx) => rx.await.ok(),
            None => None,
        }
    }

    /// Blocking variant of [`wait`](Self::wait) for threads outside a runtime.
    pub fn wait_blocking(mut self) -> Option<StopReason> {
        if let Some(reason) = self.received {
            return Some(reason);
        }
        self.rx.take().and_then(|rx| rx.blocking_recv().ok())
    }

    /// Non-blocking check; once a reason is observed it is returned on every call.
    pub fn check(&mut self) -> Option<StopReason> {
        if self.received.is_some() {
            return self.received;
        }
        let rx = self.rx.as_mut()?;
        match rx.try_recv() {
            Ok(reason) => {
                self.received = Some(reason);
                self.rx = None;
                self.received
            }
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.rx = None;
                None
            }
        }
    }
}

/// Create a connected completion signal and watcher.
pub fn completion_signal() -> (CompletionSignal, CompletionWatcher) {
    let (tx, rx) = watch::channel(None);
    (CompletionSignal { tx }, CompletionWatcher { rx })
}

/// Closed exactly once, when the control loop exits.
#[derive(Debug)]
pub struct CompletionSignal {
    tx: watch::Sender<Option<ControllerOutcome>>,
}

impl CompletionSignal {
    /// Publish the outcome and close the channel.
    pub fn complete(self, outcome: ControllerOutcome) {
        self.tx.send_replace(Some(outcome));
    }
}

/// Observer side of the completion signal. Cloneable.
#[derive(Debug, Clone)]
pub struct CompletionWatcher {
    rx: watch::Receiver<Option<ControllerOutcome>>,
}

impl CompletionWatcher {
    /// Wait until the control loop has exited.
    ///
    /// Returns `None` if the signal was dropped without completing.
    pub async fn wait(&mut self) -> Option<ControllerOutcome> {
        // A closed channel still holds whatever was last published.
        let _ = self.rx.wait_for(Option::is_some).await;
        self.rx.borrow().clone()
    }

    /// The outcome, if the loop has already exited.
    pub fn outcome(&self) -> Option<ControllerOutcome> {
        self.rx.borrow().clone()
    }
}

//! Start/stop control over the driver loop.

use std::mem;

use async_trait::async_trait;
use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::{Driver, DriverSetup};
use crate::{DriverError, ProposerResult};

/// Externally visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStatus {
    /// Constructed, never started.
    NotStarted,
    /// The loop task is running.
    Running,
    /// Stopped after running, or crashed.
    Stopped,
}

/// Internal state guarded by the handle's mutex.
enum Lifecycle {
    /// The driver is parked and can be started.
    Idle(Box<Driver>),
    /// The loop task owns the driver.
    Running {
        /// Per-run token, a child of the handle's long-lived token.
        cancel: CancellationToken,
        /// Loop task; hands the driver back when it exits cleanly.
        task: JoinHandle<Driver>,
    },
    /// The loop task panicked and the driver is gone.
    Crashed,
}

/// Publishes [`DriverStatus::Stopped`] when the loop task ends, unwinding included.
struct ExitNotifier(watch::Sender<DriverStatus>);

impl Drop for ExitNotifier {
    fn drop(&mut self) {
        self.0.send_replace(DriverStatus::Stopped);
    }
}

/// Lifecycle operations exposed to the service and the admin RPC.
#[async_trait]
pub trait ProposerDriverControl: Send + Sync {
    /// Spawns the loop.
    async fn start_proposer(&self) -> Result<(), DriverError>;

    /// Cancels the loop and waits for it to exit.
    async fn stop_proposer(&self) -> Result<(), DriverError>;

    /// Like [`Self::stop_proposer`], but a loop that is not running is not an error.
    async fn stop_proposer_if_running(&self) -> Result<(), DriverError> {
        match self.stop_proposer().await {
            Err(DriverError::NotRunning) => Ok(()),
            other => other,
        }
    }

    /// Returns true unless the loop is running. Never blocks.
    fn stopped(&self) -> bool;
}

/// Owns a [`Driver`] and runs it on a background task on demand.
pub struct DriverHandle {
    /// Single ownership lock for every transition.
    state: Mutex<Lifecycle>,
    /// Last published status; readable without the lock.
    status: watch::Sender<DriverStatus>,
    /// Long-lived token; each run gets a child of it.
    cancel: CancellationToken,
}

impl std::fmt::Debug for DriverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverHandle")
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

impl DriverHandle {
    /// Wraps an already constructed driver. Each run uses a child of `cancel`.
    pub fn new(driver: Driver, cancel: CancellationToken) -> Self {
        let (status, _) = watch::channel(DriverStatus::NotStarted);
        Self { state: Mutex::new(Lifecycle::Idle(Box::new(driver))), status, cancel }
    }

    /// Connects a driver under a child of `parent`.
    ///
    /// The child token is cancelled if the handshake fails.
    pub async fn connect(setup: DriverSetup, parent: &CancellationToken) -> ProposerResult<Self> {
        let cancel = parent.child_token();
        let guard = cancel.clone().drop_guard();
        let driver = Driver::connect(setup, &cancel).await?;
        guard.disarm();
        Ok(Self::new(driver, cancel))
    }

    /// Returns the current lifecycle state.
    pub fn status(&self) -> DriverStatus {
        *self.status.borrow()
    }

    /// Subscribes to lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<DriverStatus> {
        self.status.subscribe()
    }

    /// Folds a loop task that already exited on its own back into the state.
    ///
    /// A clean exit parks the driver again; a panic leaves the handle crashed
    /// and is reported once as [`DriverError::Crashed`].
    async fn reap_finished(&self, state: &mut Lifecycle) -> Result<(), DriverError> {
        // The task publishes `Stopped` on its way out, just before it is finished.
        let exiting = *self.status.borrow() == DriverStatus::Stopped;
        if !matches!(state, Lifecycle::Running { task, .. } if exiting || task.is_finished()) {
            return Ok(());
        }
        let Lifecycle::Running { task, .. } = mem::replace(state, Lifecycle::Crashed) else {
            return Ok(());
        };
        match task.await {
            Ok(driver) => {
                *state = Lifecycle::Idle(Box::new(driver));
                info!("Driver loop exited");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Driver loop crashed");
                Err(DriverError::Crashed)
            }
        }
    }

    async fn start(&self) -> Result<(), DriverError> {
        let mut state = self.state.lock().await;
        self.reap_finished(&mut state).await?;

        match mem::replace(&mut *state, Lifecycle::Crashed) {
            Lifecycle::Idle(driver) => {
                let cancel = self.cancel.child_token();
                // Published before the spawn so an immediate exit cannot be overwritten.
                self.status.send_replace(DriverStatus::Running);
                let exit = ExitNotifier(self.status.clone());
                let run = driver.run(cancel.clone());
                let task = tokio::spawn(async move {
                    let _exit = exit;
                    run.await
                });
                *state = Lifecycle::Running { cancel, task };
                info!("Proposer started");
                Ok(())
            }
            running @ Lifecycle::Running { .. } => {
                *state = running;
                Err(DriverError::AlreadyRunning)
            }
            Lifecycle::Crashed => Err(DriverError::Crashed),
        }
    }

    async fn stop(&self) -> Result<(), DriverError> {
        let mut state = self.state.lock().await;
        self.reap_finished(&mut state).await?;

        match mem::replace(&mut *state, Lifecycle::Crashed) {
            Lifecycle::Running { cancel, task } => {
                cancel.cancel();
                let result = task.await;
                self.status.send_replace(DriverStatus::Stopped);
                match result {
                    Ok(driver) => {
                        *state = Lifecycle::Idle(Box::new(driver));
                        info!("Proposer stopped");
                        Ok(())
                    }
                    Err(e) => {
                        error!(error = %e, "Driver loop crashed");
                        Err(DriverError::Crashed)
                    }
                }
            }
            idle @ Lifecycle::Idle(_) => {
                *state = idle;
                Err(DriverError::NotRunning)
            }
            Lifecycle::Crashed => Err(DriverError::NotRunning),
        }
    }
}

#[async_trait]
impl ProposerDriverControl for DriverHandle {
    async fn start_proposer(&self) -> Result<(), DriverError> {
        self.start().await
    }

    async fn stop_proposer(&self) -> Result<(), DriverError> {
        self.stop().await
    }

    fn stopped(&self) -> bool {
        self.status() != DriverStatus::Running
    }
}

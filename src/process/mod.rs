//! Supervision of the application process.
//!
//! ```text
//! Stopped ──start──▶ Starting ──spawned──▶ Running
//!    ▲                  │                    │ stop
//!    │            spawn failed               ▼
//!    ├──────────────────┘                 Stopping ── SIGINT, wait `graceful`
//!    │                                       │ still alive
//!    │                                       ▼
//!    └──────────── exited / timed out ── ForceKilling ── SIGKILL, wait `forced`
//! ```
//!
//! At most one child is alive at any time: `restart` always finishes `stop`
//! (whatever its outcome) before spawning the next generation.

mod handle;
mod signal;

#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::error::{DevError, Result};
use crate::shutdown::CancelToken;
use crate::{debug, log};

pub use handle::{ChildHandle, CommandSpawner, ExitInfo, ProcessHandle, Spawner};

pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_KILL_TIMEOUT_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Stopped,
    Starting,
    Running,
    Stopping,
    ForceKilling,
}

/// The child currently owned by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisedProcess {
    pub pid: Option<u32>,
    pub started_at: Instant,
    /// Strictly increasing across restarts, starting at 1.
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was running.
    NotRunning,
    /// The child had exited before `stop` was called.
    AlreadyDead(ExitInfo),
    /// Exited within the graceful window.
    Exited(ExitInfo),
    /// Needed the forced tier.
    Killed(ExitInfo),
    /// Survived both tiers; logged and abandoned.
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopTimeouts {
    pub graceful: Duration,
    pub forced: Duration,
}

impl Default for StopTimeouts {
    fn default() -> Self {
        Self {
            graceful: Duration::from_millis(DEFAULT_STOP_TIMEOUT_MS),
            forced: Duration::from_millis(DEFAULT_KILL_TIMEOUT_MS),
        }
    }
}

/// Wait for the app port to be released before every spawn.
#[derive(Debug, Clone, Copy)]
pub struct PortBarrier {
    pub port: u16,
    pub attempts: u32,
    pub delay: Duration,
}

impl PortBarrier {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

struct Running<H> {
    process: SupervisedProcess,
    handle: H,
}

pub struct ProcessSupervisor<S: Spawner> {
    spawner: S,
    timeouts: StopTimeouts,
    state: ProcessState,
    current: Option<Running<S::Handle>>,
    generation: u64,
    display_url: Option<String>,
    port_barrier: Option<PortBarrier>,
}

impl<S: Spawner> ProcessSupervisor<S> {
    pub fn new(spawner: S, timeouts: StopTimeouts) -> Self {
        Self {
            spawner,
            timeouts,
            state: ProcessState::Stopped,
            current: None,
            generation: 0,
            display_url: None,
            port_barrier: None,
        }
    }

    /// URL shown in the start/restart log line.
    pub fn with_display_url(mut self, url: impl Into<String>) -> Self {
        self.display_url = Some(url.into());
        self
    }

    pub fn with_port_barrier(mut self, barrier: PortBarrier) -> Self {
        self.port_barrier = Some(barrier);
        self
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn current(&self) -> Option<&SupervisedProcess> {
        self.current.as_ref().map(|running| &running.process)
    }

    /// Spawn a new generation. Only valid from `Stopped`.
    pub async fn start(&mut self) -> Result<SupervisedProcess> {
        if let Some(running) = &self.current {
            debug!("process"; "start ignored, generation {} still running", running.process.generation);
            return Ok(running.process.clone());
        }

        self.state = ProcessState::Starting;
        if let Some(barrier) = self.port_barrier
            && let Err(e) =
                crate::probe::wait_port_free(barrier.port, barrier.attempts, barrier.delay).await
        {
            self.state = ProcessState::Stopped;
            return Err(e);
        }
        self.spawn_generation()
    }

    fn spawn_generation(&mut self) -> Result<SupervisedProcess> {
        self.log_start();
        let handle = match self.spawner.spawn() {
            Ok(handle) => handle,
            Err(source) => {
                self.state = ProcessState::Stopped;
                return Err(DevError::StartupFailed {
                    command: self.spawner.describe(),
                    source,
                });
            }
        };

        self.generation += 1;
        let process = SupervisedProcess {
            pid: handle.pid(),
            started_at: Instant::now(),
            generation: self.generation,
        };
        debug!("process"; "generation {} running (pid {:?})", process.generation, process.pid);

        self.current = Some(Running {
            process: process.clone(),
            handle,
        });
        self.state = ProcessState::Running;
        Ok(process)
    }

    /// Stop the current child, escalating from interrupt to kill.
    ///
    /// Never fails: a child that survives both tiers is reported as
    /// `TimedOut` and forgotten.
    pub async fn stop(&mut self) -> StopOutcome {
        let Some(mut running) = self.current.take() else {
            return StopOutcome::NotRunning;
        };

        let outcome = self.terminate(&mut running).await;
        self.state = ProcessState::Stopped;
        outcome
    }

    /// Stop (whatever the outcome) then start the next generation.
    ///
    /// The stop always runs to completion, but nothing is spawned once
    /// `cancel` has fired; that case returns `None`.
    pub async fn restart(
        &mut self,
        cancel: &mut CancelToken,
    ) -> Result<Option<SupervisedProcess>> {
        let outcome = self.stop().await;
        debug!("process"; "stop outcome: {:?}", outcome);
        if cancel.is_cancelled() {
            debug!("process"; "shutdown requested, not restarting");
            return Ok(None);
        }

        self.state = ProcessState::Starting;
        if let Some(barrier) = self.port_barrier {
            let waited = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                r = crate::probe::wait_port_free(barrier.port, barrier.attempts, barrier.delay) => Some(r),
            };
            match waited {
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    self.state = ProcessState::Stopped;
                    return Err(e);
                }
                None => {
                    self.state = ProcessState::Stopped;
                    return Ok(None);
                }
            }
        }
        self.spawn_generation().map(Some)
    }

    async fn terminate(&mut self, running: &mut Running<S::Handle>) -> StopOutcome {
        let handle = &mut running.handle;

        match handle.try_exit() {
            Ok(Some(exit)) => {
                log!("warning"; "server process already dead, exit code: {}", exit);
                return StopOutcome::AlreadyDead(exit);
            }
            Ok(None) => {}
            Err(e) => debug!("process"; "failed to poll child: {}", e),
        }

        self.state = ProcessState::Stopping;
        debug!("process"; "stopping server process...");
        match handle.interrupt() {
            Ok(()) => match timeout(self.timeouts.graceful, handle.wait()).await {
                Ok(Ok(exit)) => {
                    debug!("process"; "process stopped");
                    return StopOutcome::Exited(exit);
                }
                Ok(Err(e)) => debug!("process"; "failed to wait for child: {}", e),
                Err(_) => {}
            },
            Err(e) => debug!("process"; "failed to interrupt child: {}", e),
        }

        self.state = ProcessState::ForceKilling;
        log!("warning"; "process has not terminated, sending SIGKILL");
        if let Err(e) = handle.kill() {
            debug!("process"; "failed to kill child: {}", e);
        }

        match timeout(self.timeouts.forced, handle.wait()).await {
            Ok(Ok(exit)) => StopOutcome::Killed(exit),
            _ => {
                let err = DevError::ShutdownTimeout {
                    pid: running.process.pid.unwrap_or_default(),
                };
                log!("warning"; "{}", err);
                StopOutcome::TimedOut
            }
        }
    }

    fn log_start(&self) {
        let act = if self.generation == 0 { "Start" } else { "Restart" };
        match &self.display_url {
            Some(url) => log!("process"; "{}ing dev server at {} ●", act, url),
            None => log!("process"; "{}ing `{}` ●", act, self.spawner.describe()),
        }
    }
}

impl<S: Spawner> Drop for ProcessSupervisor<S> {
    fn drop(&mut self) {
        if let Some(running) = self.current.as_mut() {
            let _ = running.handle.kill();
        }
    }
}

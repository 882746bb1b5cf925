use std::path::PathBuf;

use super::classifier::{Action, ChangeClassifier, classify_static};
use super::types::ChangeBatch;
use super::{ChangeStream, log_batch};
use crate::error::{DevError, Result};
use crate::probe::{LivenessProber, ProbeOutcome};
use crate::process::{ProcessSupervisor, Spawner};
use crate::reload::ReloadBroadcaster;
use crate::shutdown::CancelToken;
use crate::{debug, log};

/// The runserver loop: one batch at a time, each fully handled (restart,
/// probe and broadcast included) before the next is taken.
pub struct AppTask<S: Spawner> {
    pub(super) supervisor: ProcessSupervisor<S>,
    prober: LivenessProber,
    broadcaster: ReloadBroadcaster,
    classifier: ChangeClassifier,
    static_root: Option<PathBuf>,
    probe_url: String,
}

impl<S: Spawner> AppTask<S> {
    pub fn new(
        supervisor: ProcessSupervisor<S>,
        prober: LivenessProber,
        broadcaster: ReloadBroadcaster,
        classifier: ChangeClassifier,
        static_root: Option<PathBuf>,
        probe_url: impl Into<String>,
    ) -> Self {
        Self {
            supervisor,
            prober,
            broadcaster,
            classifier,
            static_root,
            probe_url: probe_url.into(),
        }
    }

    pub fn supervisor(&self) -> &ProcessSupervisor<S> {
        &self.supervisor
    }

    /// Start the app and react to changes until `cancel` fires.
    ///
    /// The watch subscription is ended and the app stopped on every exit
    /// path. Only a failed spawn or a watcher failure is returned as error.
    pub async fn run(mut self, mut changes: ChangeStream, mut cancel: CancelToken) -> Result<()> {
        let result = self.drive(&mut changes, &mut cancel).await;
        drop(changes);

        let outcome = self.supervisor.stop().await;
        debug!("process"; "final stop: {:?}", outcome);
        result
    }

    async fn drive(&mut self, changes: &mut ChangeStream, cancel: &mut CancelToken) -> Result<()> {
        self.supervisor.start().await?;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                next = changes.next_batch() => next,
            };

            let batch = match next {
                Some(Ok(batch)) => batch,
                Some(Err(e)) => return Err(DevError::Watch(e)),
                None => return Ok(()),
            };
            self.handle_batch(&batch, cancel).await?;
        }
    }

    /// Act on one batch; returns how many browsers were told to reload.
    pub async fn handle_batch(&mut self, batch: &ChangeBatch, cancel: &mut CancelToken) -> Result<usize> {
        log_batch(batch);

        match self.classifier.classify(batch, self.static_root.as_deref()) {
            Action::RestartAndReloadAll => self.restart_and_reload(cancel).await,
            Action::ReloadSingle(path) => Ok(self.broadcaster.broadcast(Some(&path))),
            Action::ReloadAll => Ok(self.broadcaster.broadcast(None)),
        }
    }

    async fn restart_and_reload(&mut self, cancel: &mut CancelToken) -> Result<usize> {
        if self.supervisor.restart(cancel).await?.is_none() {
            return Ok(0);
        }

        if self.broadcaster.registry().is_empty() {
            debug!("reload"; "no browsers connected, skipping reload");
            return Ok(0);
        }

        match self.prober.wait_ready(&self.probe_url, cancel).await {
            ProbeOutcome::Ready { .. } => Ok(self.broadcaster.broadcast(None)),
            ProbeOutcome::Exhausted => {
                let err = DevError::ProbeExhausted {
                    url: self.probe_url.clone(),
                    attempts: self.prober.attempts(),
                };
                log!("warning"; "{}, not reloading", err);
                Ok(0)
            }
            ProbeOutcome::Cancelled => Ok(0),
        }
    }
}

/// The `serve` loop: no process, every change is a reload.
pub struct LiveReloadTask {
    broadcaster: ReloadBroadcaster,
}

impl LiveReloadTask {
    pub fn new(broadcaster: ReloadBroadcaster) -> Self {
        Self { broadcaster }
    }

    pub async fn run(self, mut changes: ChangeStream, mut cancel: CancelToken) -> Result<()> {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                next = changes.next_batch() => next,
            };

            match next {
                Some(Ok(batch)) => {
                    self.handle_batch(&batch);
                }
                Some(Err(e)) => return Err(DevError::Watch(e)),
                None => return Ok(()),
            }
        }
    }

    pub fn handle_batch(&self, batch: &ChangeBatch) -> usize {
        log_batch(batch);
        match classify_static(batch) {
            Action::ReloadSingle(path) => self.broadcaster.broadcast(Some(&path)),
            _ => self.broadcaster.broadcast(None),
        }
    }
}

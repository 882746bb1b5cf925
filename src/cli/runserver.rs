//! `devloop runserver`: supervise the app, restart it on source changes
//! and reload connected browsers once it answers again.

use anyhow::{Context, Result};

use super::{Servers, runtime};
use crate::config::DevConfig;
use crate::log;
use crate::probe::LivenessProber;
use crate::process::{CommandSpawner, PortBarrier, ProcessSupervisor};
use crate::reload::ReloadBroadcaster;
use crate::shutdown::CancelToken;
use crate::watch::{AppTask, ChangeClassifier, ChangeStream, WatchFilter};

pub fn run(config: &DevConfig, cancel: CancelToken) -> Result<()> {
    let runtime = runtime()?;
    let servers = Servers::start(config, config.aux_port())?;

    if servers.livereload_enabled() {
        log!("reload"; "add <script src=\"{}\"></script> to your pages", servers.script_url());
    }
    if config.static_files.path.is_some() {
        log!("serve"; "static files at http://{}{}", servers.aux_addr(), config.static_files.url);
    }

    let result = runtime.block_on(run_app(config, &servers, cancel));
    servers.shutdown();
    result
}

async fn run_app(config: &DevConfig, servers: &Servers, cancel: CancelToken) -> Result<()> {
    let mut spawner = CommandSpawner::from_argv(&config.app.command)
        .context("no app command configured")?
        .current_dir(&config.root)
        .env("PORT", config.app.port.to_string());
    for (key, value) in &config.app.env {
        spawner = spawner.env(key, value);
    }

    let supervisor = ProcessSupervisor::new(spawner, config.process.timeouts())
        .with_display_url(config.app.origin())
        .with_port_barrier(PortBarrier::new(config.app.port));
    let prober = LivenessProber::new(config.probe.attempts, config.probe.interval())
        .context("failed to create probe client")?;
    let broadcaster = ReloadBroadcaster::new(
        servers.registry.clone(),
        config.static_files.path.clone(),
        config.static_files.url.clone(),
    );
    let classifier = ChangeClassifier::new(&config.app.source_extensions);

    // subscribe before the first spawn so early edits are not lost
    let filter = WatchFilter::new(&config.watch.path, config.watch.ignore.iter().cloned());
    let changes = ChangeStream::watch(config.watch.debounce(), filter)
        .with_context(|| format!("failed to watch {}", config.watch.path.display()))?;

    let task = AppTask::new(
        supervisor,
        prober,
        broadcaster,
        classifier,
        config.static_files.path.clone(),
        config.probe_url(),
    );
    task.run(changes, cancel).await?;
    Ok(())
}

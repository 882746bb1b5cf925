//! `devloop serve PATH`: static files with live reload, no app process.

use anyhow::{Context, Result};

use super::{Servers, runtime};
use crate::config::DevConfig;
use crate::log;
use crate::reload::ReloadBroadcaster;
use crate::shutdown::CancelToken;
use crate::watch::{ChangeStream, LiveReloadTask, WatchFilter};

pub fn run(config: &DevConfig, mut cancel: CancelToken) -> Result<()> {
    let runtime = runtime()?;
    let servers = Servers::start(config, config.app.port)?;
    log!("serve"; "serving {} at http://{}", config.root.display(), servers.aux_addr());

    let result = runtime.block_on(async {
        if !servers.livereload_enabled() {
            cancel.cancelled().await;
            return Ok(());
        }

        let broadcaster = ReloadBroadcaster::new(
            servers.registry.clone(),
            config.static_files.path.clone(),
            config.static_files.url.clone(),
        );
        let filter = WatchFilter::new(&config.watch.path, config.watch.ignore.iter().cloned());
        let changes = ChangeStream::watch(config.watch.debounce(), filter)
            .with_context(|| format!("failed to watch {}", config.watch.path.display()))?;

        LiveReloadTask::new(broadcaster).run(changes, cancel).await?;
        Ok(())
    });

    servers.shutdown();
    result
}

//! Configuration utility functions.

use std::path::{Path, PathBuf};

/// Find the config file by walking upward from `start`.
///
/// ```text
/// /home/user/app/templates/   ← start
/// /home/user/app/devloop.toml ← found
/// ```
pub fn find_config_file(config_name: &Path, start: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.is_file().then(|| config_name.to_path_buf());
    }

    start
        .ancestors()
        .map(|dir| dir.join(config_name))
        .find(|candidate| candidate.is_file())
}

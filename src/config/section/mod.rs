//! Configuration sections of `devloop.toml`.

mod app;
mod livereload;
mod probe;
mod process;
mod static_files;
mod watch;

pub use app::AppConfig;
pub use livereload::LiveReloadConfig;
pub use probe::ProbeConfig;
pub use process::ProcessConfig;
pub use static_files::StaticConfig;
pub use watch::WatchConfig;

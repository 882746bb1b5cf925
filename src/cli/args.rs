//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Restart a local web app on source changes and live-reload the browser
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Print debug output
    #[arg(short, long, global = true, env = "DEVLOOP_VERBOSE")]
    pub verbose: bool,

    /// Config file path (default: devloop.toml, searched upward)
    #[arg(short = 'C', long, global = true, env = "DEVLOOP_CONFIG", value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the app, restart it on source changes and reload connected browsers
    #[command(visible_alias = "r")]
    Runserver {
        #[command(flatten)]
        args: RunserverArgs,
    },

    /// Serve a directory of static files with live reload
    #[command(visible_alias = "s")]
    Serve {
        #[command(flatten)]
        args: ServeArgs,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunserverArgs {
    /// Static files directory
    #[arg(short = 's', long = "static", env = "DEVLOOP_STATIC", value_hint = clap::ValueHint::DirPath)]
    pub static_path: Option<PathBuf>,

    /// URL prefix static files are served under
    #[arg(long, env = "DEVLOOP_STATIC_URL")]
    pub static_url: Option<String>,

    /// Project root: the child's working directory and the watch root
    #[arg(long, env = "DEVLOOP_ROOT", value_hint = clap::ValueHint::DirPath)]
    pub root: Option<PathBuf>,

    /// Host the app listens on
    #[arg(long, env = "DEVLOOP_HOST")]
    pub host: Option<String>,

    /// Port the app listens on, exported to it as $PORT
    #[arg(short, long, env = "DEVLOOP_PORT")]
    pub port: Option<u16>,

    /// Port of the script and static file server (default: port + 1)
    #[arg(long, env = "DEVLOOP_AUX_PORT")]
    pub aux_port: Option<u16>,

    #[command(flatten)]
    pub livereload: LiveReloadArgs,

    /// Command that starts the app
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "APP_COMMAND")]
    pub command: Vec<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    /// Directory to serve and watch
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub path: PathBuf,

    /// Port to serve on
    #[arg(short, long, env = "DEVLOOP_PORT")]
    pub port: Option<u16>,

    #[command(flatten)]
    pub livereload: LiveReloadArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct LiveReloadArgs {
    /// LiveReload WebSocket port
    #[arg(long, env = "DEVLOOP_WS_PORT")]
    pub ws_port: Option<u16>,

    /// Enable browser live reload
    #[arg(long, env = "DEVLOOP_LIVERELOAD", action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = true)]
    pub livereload: Option<bool>,

    /// Disable browser live reload
    #[arg(long, conflicts_with = "livereload")]
    pub no_livereload: bool,
}

impl LiveReloadArgs {
    /// `--no-livereload` wins; `None` keeps the configured value.
    pub fn enabled(&self) -> Option<bool> {
        if self.no_livereload { Some(false) } else { self.livereload }
    }
}

//! Dev loop configuration from `devloop.toml`, environment and flags.
//!
//! ```text
//! config/
//! ├── section/       # [app] [watch] [static] [livereload] [process] [probe]
//! ├── types/         # ConfigError, ConfigDiagnostics, FieldPath
//! └── mod.rs         # DevConfig (this file)
//! ```
//!
//! Precedence, lowest first: defaults, the config file, `DEVLOOP_*`
//! variables, command-line flags. clap folds the last two together.

pub mod section;
pub mod types;
mod util;

use util::find_config_file;

pub use section::{AppConfig, LiveReloadConfig, ProbeConfig, ProcessConfig, StaticConfig, WatchConfig};
pub use types::{ConfigDiagnostics, ConfigError, FieldPath};

use crate::cli::{Cli, Commands, LiveReloadArgs, RunserverArgs, ServeArgs};
use crate::error::Result;
use crate::log;
use crate::utils::path::expand_relative;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name searched for when `-C` is not given.
pub const CONFIG_FILE: &str = "devloop.toml";

/// Root configuration, one field per `devloop.toml` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevConfig {
    /// Absolute path of the loaded file, if any.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Directory relative config paths and the child's cwd resolve against.
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub app: AppConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default, rename = "static")]
    pub static_files: StaticConfig,

    #[serde(default)]
    pub livereload: LiveReloadConfig,

    #[serde(default)]
    pub process: ProcessConfig,

    #[serde(default)]
    pub probe: ProbeConfig,
}

impl DevConfig {
    /// Load, layer CLI options on top, normalize and validate.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir()?;

        let mut config = match Self::resolve_config_path(cli.config.as_deref(), &cwd)? {
            Some(path) => Self::from_path(&path)?,
            None => Self::default(),
        };

        config.finalize(&cli.command, &cwd);
        config.validate(&cli.command)?;
        Ok(config)
    }

    /// An explicit `-C` must exist; the default name is optional.
    fn resolve_config_path(explicit: Option<&Path>, cwd: &Path) -> Result<Option<PathBuf>, ConfigError> {
        match explicit {
            Some(name) => find_config_file(name, cwd)
                .map(Some)
                .ok_or_else(|| ConfigError::NotFound(name.to_path_buf())),
            None => Ok(find_config_file(Path::new(CONFIG_FILE), cwd)),
        }
    }

    /// Read a config file, warning about keys nothing reads.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let (mut config, ignored) =
            Self::parse_with_ignored(&content).map_err(|err| ConfigError::Toml(path.to_path_buf(), err))?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        config.root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), toml::de::Error> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        log!("warning"; "unknown fields in {}, ignoring:", path.display());
        for field in fields {
            eprintln!("- {field}");
        }
    }

    /// Port of the aux HTTP server, `app.port + 1` unless configured.
    pub fn aux_port(&self) -> u16 {
        self.livereload
            .aux_port
            .unwrap_or_else(|| self.app.port.saturating_add(1))
    }

    /// Liveness probe target on the app origin.
    pub fn probe_url(&self) -> String {
        self.probe.url(&self.app.origin())
    }

    // ========================================================================
    // normalization
    // ========================================================================

    /// File paths resolve against the project root, flag paths against cwd.
    fn finalize(&mut self, command: &Commands, cwd: &Path) {
        if self.config_path.is_none() {
            self.root = cwd.to_path_buf();
        }
        self.normalize_paths();

        match command {
            Commands::Runserver { args } => self.apply_runserver_args(args, cwd),
            Commands::Serve { args } => self.apply_serve_args(args, cwd),
        }

        self.app.normalize();
        self.static_files.normalize_url();
    }

    fn normalize_paths(&mut self) {
        self.root = expand_relative(&self.root, Path::new("."));
        self.watch.path = expand_relative(&self.watch.path, &self.root);
        if let Some(path) = self.static_files.path.take() {
            self.static_files.path = Some(expand_relative(&path, &self.root));
        }
    }

    fn apply_runserver_args(&mut self, args: &RunserverArgs, cwd: &Path) {
        if !args.command.is_empty() {
            self.app.command = args.command.clone();
        }
        if let Some(root) = &args.root {
            self.root = expand_relative(root, cwd);
            self.watch.path = self.root.clone();
        }
        if let Some(path) = &args.static_path {
            self.static_files.path = Some(expand_relative(path, cwd));
        }

        Self::update_option(&mut self.static_files.url, args.static_url.as_ref());
        Self::update_option(&mut self.app.host, args.host.as_ref());
        Self::update_option(&mut self.app.port, args.port.as_ref());
        if args.aux_port.is_some() {
            self.livereload.aux_port = args.aux_port;
        }
        self.apply_livereload_args(&args.livereload);
    }

    /// `serve PATH` serves and watches PATH itself at `/`.
    fn apply_serve_args(&mut self, args: &ServeArgs, cwd: &Path) {
        let path = expand_relative(&args.path, cwd);
        self.root = path.clone();
        self.watch.path = path.clone();
        self.static_files.path = Some(path);
        self.static_files.url = "/".into();

        Self::update_option(&mut self.app.port, args.port.as_ref());
        self.apply_livereload_args(&args.livereload);
    }

    fn apply_livereload_args(&mut self, args: &LiveReloadArgs) {
        Self::update_option(&mut self.livereload.enable, args.enabled().as_ref());
        Self::update_option(&mut self.livereload.ws_port, args.ws_port.as_ref());
    }

    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Collect every problem, then fail once with all of them.
    fn validate(&self, command: &Commands) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();
        let runserver = matches!(command, Commands::Runserver { .. });

        if runserver && self.app.command.is_empty() {
            diag.error_with_hint(
                AppConfig::COMMAND,
                "no command to run",
                "pass it after `runserver` or set `command` under [app]",
            );
        }
        if runserver && self.app.source_extensions.is_empty() {
            diag.error(AppConfig::SOURCE_EXTENSIONS, "must list at least one extension");
        }

        self.validate_ports(runserver, &mut diag);

        if !self.watch.path.is_dir() {
            diag.error(
                WatchConfig::PATH,
                format!("`{}` is not a directory", self.watch.path.display()),
            );
        }
        if let Some(path) = &self.static_files.path
            && !path.is_dir()
        {
            diag.error(StaticConfig::PATH, format!("`{}` is not a directory", path.display()));
        }
        if !self.static_files.url.starts_with('/') {
            diag.error(StaticConfig::URL, "must start with `/`");
        }
        if self.probe.attempts == 0 {
            diag.error(ProbeConfig::ATTEMPTS, "must be at least 1");
        }
        if self.livereload.idle_timeout_secs <= self.livereload.keepalive_secs {
            diag.error_with_hint(
                LiveReloadConfig::IDLE_TIMEOUT,
                "must be longer than the keepalive interval",
                format!("keepalive_secs is {}", self.livereload.keepalive_secs),
            );
        }

        diag.into_result()
    }

    /// Ports in use by this command must be non-zero and pairwise distinct.
    fn validate_ports(&self, runserver: bool, diag: &mut ConfigDiagnostics) {
        let mut ports = vec![(AppConfig::PORT, self.app.port)];
        if runserver {
            ports.push((LiveReloadConfig::AUX_PORT, self.aux_port()));
        }
        if self.livereload.enable {
            ports.push((LiveReloadConfig::WS_PORT, self.livereload.ws_port));
        }

        for (i, (field, port)) in ports.iter().enumerate() {
            if *port == 0 {
                diag.error(*field, "port must not be 0");
                continue;
            }
            if let Some((other, _)) = ports[..i].iter().find(|(_, p)| p == port) {
                diag.error(*field, format!("port {port} is already used by {other}"));
            }
        }
    }
}

/// Parse a config snippet, failing on unknown keys.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> DevConfig {
    let (parsed, ignored) = DevConfig::parse_with_ignored(content).unwrap();
    assert!(ignored.is_empty(), "test config has unknown fields: {ignored:?}");
    parsed
}

//! Seams between the supervisor and real OS processes.

use std::fmt;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use super::signal;

/// How a child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    code: Option<i32>,
    signal: Option<i32>,
}

impl ExitInfo {
    pub const fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub const fn signalled(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    pub const fn code(&self) -> Option<i32> {
        self.code
    }
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "{code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => f.write_str("unknown"),
        }
    }
}

/// A running child the supervisor can signal and reap.
pub trait ProcessHandle: Send {
    fn pid(&self) -> Option<u32>;

    /// Non-blocking: `Some` once the child has exited.
    fn try_exit(&mut self) -> io::Result<Option<ExitInfo>>;

    /// Ask the child to stop (SIGINT to its group on unix).
    fn interrupt(&mut self) -> io::Result<()>;

    /// Force the child to stop.
    fn kill(&mut self) -> io::Result<()>;

    fn wait(&mut self) -> impl Future<Output = io::Result<ExitInfo>> + Send;
}

/// Produces a fresh child for every (re)start.
pub trait Spawner: Send {
    type Handle: ProcessHandle;

    fn spawn(&mut self) -> io::Result<Self::Handle>;

    /// Human readable command line for logs and errors.
    fn describe(&self) -> String;
}

// ============================================================================
// Real processes
// ============================================================================

/// Spawns the configured app command.
#[derive(Debug, Clone)]
pub struct CommandSpawner {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl CommandSpawner {
    /// `None` for an empty argv.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            cwd: None,
            env: Vec::new(),
        })
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl Spawner for CommandSpawner {
    type Handle = ChildHandle;

    fn spawn(&mut self) -> io::Result<ChildHandle> {
        let program = which::which(&self.program).unwrap_or_else(|_| PathBuf::from(&self.program));

        let mut command = tokio::process::Command::new(program);
        command
            .args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn()?;
        Ok(ChildHandle {
            pid: child.id(),
            child,
        })
    }

    fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub struct ChildHandle {
    child: tokio::process::Child,
    pid: Option<u32>,
}

impl ProcessHandle for ChildHandle {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn try_exit(&mut self) -> io::Result<Option<ExitInfo>> {
        Ok(self.child.try_wait()?.map(ExitInfo::from))
    }

    fn interrupt(&mut self) -> io::Result<()> {
        match self.pid {
            Some(pid) if cfg!(unix) => signal::interrupt(pid),
            _ => self.child.start_kill(),
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        if let Some(pid) = self.pid
            && signal::kill(pid).is_ok()
        {
            return Ok(());
        }
        self.child.start_kill()
    }

    fn wait(&mut self) -> impl Future<Output = io::Result<ExitInfo>> + Send {
        let child = &mut self.child;
        async move { child.wait().await.map(ExitInfo::from) }
    }
}

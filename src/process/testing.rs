//! In-memory process doubles for driving the supervisor without real children.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{ExitInfo, ProcessHandle, Spawner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    /// Exits with code 0 on SIGINT.
    Cooperative,
    /// Ignores SIGINT, dies on SIGKILL.
    Stubborn,
    /// Ignores everything.
    Unkillable,
    /// Already exited with code 1 when spawned.
    Crashed,
    /// spawn() fails.
    Broken,
}

#[derive(Clone)]
pub struct FakeSpawner {
    pub behaviour: Behaviour,
    pub next_pid: u32,
    pub alive: Arc<AtomicUsize>,
    pub signals: Arc<Mutex<Vec<(u32, &'static str)>>>,
}

impl FakeSpawner {
    pub fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            next_pid: 100,
            alive: Arc::new(AtomicUsize::new(0)),
            signals: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

pub struct FakeHandle {
    pid: u32,
    behaviour: Behaviour,
    exited: Option<ExitInfo>,
    alive: Arc<AtomicUsize>,
    signals: Arc<Mutex<Vec<(u32, &'static str)>>>,
}

impl Spawner for FakeSpawner {
    type Handle = FakeHandle;

    fn spawn(&mut self) -> io::Result<FakeHandle> {
        if self.behaviour == Behaviour::Broken {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such program"));
        }
        self.next_pid += 1;
        self.alive.fetch_add(1, Ordering::SeqCst);
        Ok(FakeHandle {
            pid: self.next_pid,
            behaviour: self.behaviour,
            exited: (self.behaviour == Behaviour::Crashed).then_some(ExitInfo::exited(1)),
            alive: Arc::clone(&self.alive),
            signals: Arc::clone(&self.signals),
        })
    }

    fn describe(&self) -> String {
        "python app.py".into()
    }
}

impl ProcessHandle for FakeHandle {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn try_exit(&mut self) -> io::Result<Option<ExitInfo>> {
        Ok(self.exited)
    }

    fn interrupt(&mut self) -> io::Result<()> {
        self.signals.lock().push((self.pid, "INT"));
        if self.behaviour == Behaviour::Cooperative {
            self.exited = Some(ExitInfo::exited(0));
        }
        Ok(())
    }

    fn kill(&mut self) -> io::Result<()> {
        self.signals.lock().push((self.pid, "KILL"));
        if self.behaviour != Behaviour::Unkillable {
            self.exited = Some(ExitInfo::signalled(9));
        }
        Ok(())
    }

    fn wait(&mut self) -> impl Future<Output = io::Result<ExitInfo>> + Send {
        let exited = self.exited;
        async move {
            match exited {
                Some(exit) => Ok(exit),
                None => std::future::pending().await,
            }
        }
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.alive.fetch_sub(1, Ordering::SeqCst);
    }
}

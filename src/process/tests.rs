use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::testing::{Behaviour, FakeSpawner};
use super::*;
use crate::shutdown::cancel_pair;

fn fast_timeouts() -> StopTimeouts {
    StopTimeouts {
        graceful: Duration::from_millis(40),
        forced: Duration::from_millis(20),
    }
}

#[tokio::test]
async fn test_start_assigns_first_generation() {
    let mut supervisor = ProcessSupervisor::new(FakeSpawner::new(Behaviour::Cooperative), fast_timeouts());
    assert_eq!(supervisor.state(), ProcessState::Stopped);

    let process = supervisor.start().await.unwrap();
    assert_eq!(process.generation, 1);
    assert_eq!(process.pid, Some(101));
    assert_eq!(supervisor.state(), ProcessState::Running);
    assert_eq!(supervisor.current(), Some(&process));
}

#[tokio::test]
async fn test_start_while_running_is_noop() {
    let spawner = FakeSpawner::new(Behaviour::Cooperative);
    let alive = Arc::clone(&spawner.alive);
    let mut supervisor = ProcessSupervisor::new(spawner, fast_timeouts());

    let first = supervisor.start().await.unwrap();
    let second = supervisor.start().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(alive.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_generations_increase_across_restarts() {
    let spawner = FakeSpawner::new(Behaviour::Cooperative);
    let alive = Arc::clone(&spawner.alive);
    let mut supervisor = ProcessSupervisor::new(spawner, fast_timeouts());
    let (_handle, mut cancel) = cancel_pair();

    supervisor.start().await.unwrap();
    supervisor.restart(&mut cancel).await.unwrap();
    let third = supervisor.restart(&mut cancel).await.unwrap().unwrap();
    assert_eq!(third.generation, 3);

    let fourth = supervisor.restart(&mut cancel).await.unwrap().unwrap();
    assert_eq!(fourth.generation, 4);
    assert_ne!(third.pid, fourth.pid);
    assert_eq!(alive.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_restart_after_cancel_only_stops() {
    let spawner = FakeSpawner::new(Behaviour::Cooperative);
    let alive = Arc::clone(&spawner.alive);
    let mut supervisor = ProcessSupervisor::new(spawner, fast_timeouts());
    let (handle, mut cancel) = cancel_pair();

    supervisor.start().await.unwrap();
    handle.cancel();
    let next = supervisor.restart(&mut cancel).await.unwrap();

    assert!(next.is_none());
    assert!(supervisor.current().is_none());
    assert_eq!(supervisor.state(), ProcessState::Stopped);
    assert_eq!(alive.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_graceful_stop() {
    let spawner = FakeSpawner::new(Behaviour::Cooperative);
    let signals = Arc::clone(&spawner.signals);
    let mut supervisor = ProcessSupervisor::new(spawner, fast_timeouts());

    supervisor.start().await.unwrap();
    let outcome = supervisor.stop().await;

    assert_eq!(outcome, StopOutcome::Exited(ExitInfo::exited(0)));
    assert_eq!(supervisor.state(), ProcessState::Stopped);
    assert!(supervisor.current().is_none());
    assert_eq!(*signals.lock(), vec![(101, "INT")]);
}

#[tokio::test]
async fn test_stop_escalates_to_kill() {
    let spawner = FakeSpawner::new(Behaviour::Stubborn);
    let signals = Arc::clone(&spawner.signals);
    let mut supervisor = ProcessSupervisor::new(spawner, fast_timeouts());

    supervisor.start().await.unwrap();
    let outcome = supervisor.stop().await;

    assert_eq!(outcome, StopOutcome::Killed(ExitInfo::signalled(9)));
    assert_eq!(*signals.lock(), vec![(101, "INT"), (101, "KILL")]);
}

#[tokio::test]
async fn test_unkillable_child_does_not_block_restart() {
    let spawner = FakeSpawner::new(Behaviour::Unkillable);
    let alive = Arc::clone(&spawner.alive);
    let mut supervisor = ProcessSupervisor::new(spawner, fast_timeouts());

    supervisor.start().await.unwrap();
    assert_eq!(supervisor.stop().await, StopOutcome::TimedOut);
    assert_eq!(supervisor.state(), ProcessState::Stopped);

    // the abandoned handle is dropped, the next generation still starts
    let next = supervisor.start().await.unwrap();
    assert_eq!(next.generation, 2);
    assert_eq!(alive.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stop_already_dead() {
    let spawner = FakeSpawner::new(Behaviour::Crashed);
    let signals = Arc::clone(&spawner.signals);
    let mut supervisor = ProcessSupervisor::new(spawner, fast_timeouts());

    supervisor.start().await.unwrap();
    let outcome = supervisor.stop().await;

    assert_eq!(outcome, StopOutcome::AlreadyDead(ExitInfo::exited(1)));
    assert!(signals.lock().is_empty());
}

#[tokio::test]
async fn test_stop_when_stopped() {
    let mut supervisor = ProcessSupervisor::new(FakeSpawner::new(Behaviour::Cooperative), fast_timeouts());
    assert_eq!(supervisor.stop().await, StopOutcome::NotRunning);
}

#[tokio::test]
async fn test_spawn_failure_is_startup_failed() {
    let mut supervisor = ProcessSupervisor::new(FakeSpawner::new(Behaviour::Broken), fast_timeouts());

    let err = supervisor.start().await.unwrap_err();
    assert!(matches!(
        err,
        DevError::StartupFailed { ref command, .. } if command == "python app.py"
    ));
    assert_eq!(supervisor.state(), ProcessState::Stopped);
    assert!(supervisor.current().is_none());
}

#[tokio::test]
async fn test_drop_kills_running_child() {
    let spawner = FakeSpawner::new(Behaviour::Stubborn);
    let signals = Arc::clone(&spawner.signals);
    let alive = Arc::clone(&spawner.alive);

    let mut supervisor = ProcessSupervisor::new(spawner, fast_timeouts());
    supervisor.start().await.unwrap();
    drop(supervisor);

    assert_eq!(*signals.lock(), vec![(101, "KILL")]);
    assert_eq!(alive.load(Ordering::SeqCst), 0);
}

#[test]
fn test_exit_info_display() {
    assert_eq!(ExitInfo::exited(3).to_string(), "3");
    assert_eq!(ExitInfo::signalled(2).to_string(), "signal 2");
}

#[test]
fn test_command_spawner_describe() {
    let argv = vec!["python".to_string(), "-m".to_string(), "app".to_string()];
    let spawner = CommandSpawner::from_argv(&argv).unwrap();
    assert_eq!(spawner.describe(), "python -m app");
    assert!(CommandSpawner::from_argv(&[]).is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn test_real_process_interrupt() {
    let argv = vec!["sleep".to_string(), "30".to_string()];
    let spawner = CommandSpawner::from_argv(&argv).unwrap();
    let mut supervisor = ProcessSupervisor::new(
        spawner,
        StopTimeouts {
            graceful: Duration::from_secs(5),
            forced: Duration::from_secs(1),
        },
    );

    let process = supervisor.start().await.unwrap();
    assert!(process.pid.is_some());

    let outcome = supervisor.stop().await;
    assert!(matches!(outcome, StopOutcome::Exited(_)), "{outcome:?}");
}

#[cfg(unix)]
#[tokio::test]
async fn test_real_missing_program() {
    let argv = vec!["devloop-test-no-such-program".to_string()];
    let spawner = CommandSpawner::from_argv(&argv).unwrap();
    let mut supervisor = ProcessSupervisor::new(spawner, StopTimeouts::default());

    let err = supervisor.start().await.unwrap_err();
    assert!(matches!(err, DevError::StartupFailed { .. }));
}

//! Liveness probing of the supervised app.
//!
//! "Live" means the app accepted a connection and answered; the status code
//! is irrelevant. Only transport failures count as not ready.

use std::io;
use std::time::Duration;

use crate::error::{DevError, Result};
use crate::shutdown::CancelToken;
use crate::{debug, log};

pub const DEFAULT_ATTEMPTS: u32 = 20;
pub const DEFAULT_INTERVAL_MS: u64 = 100;
pub const DEFAULT_PROBE_PATH: &str = "/?_checking_alive=1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Answered on this (1-based) attempt.
    Ready { attempt: u32 },
    Exhausted,
    Cancelled,
}

impl ProbeOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

pub struct LivenessProber {
    client: reqwest::Client,
    attempts: u32,
    interval: Duration,
}

impl LivenessProber {
    pub fn new(attempts: u32, interval: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            // a restarted app must be reached on a fresh connection
            .pool_max_idle_per_host(0)
            .timeout(Duration::from_secs(1))
            .build()?;
        Ok(Self {
            client,
            attempts,
            interval,
        })
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Poll `url` until it answers, attempts run out, or `cancel` fires.
    ///
    /// Sleeps one interval before every attempt, including the first.
    pub async fn wait_ready(&self, url: &str, cancel: &mut CancelToken) -> ProbeOutcome {
        debug!("probe"; "checking app at \"{}\" is running before prompting reload...", url);

        for attempt in 1..=self.attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return ProbeOutcome::Cancelled,
                _ = tokio::time::sleep(self.interval) => {}
            }

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return ProbeOutcome::Cancelled,
                response = self.client.get(url).send() => response,
            };

            match response {
                Ok(response) => {
                    debug!("probe"; "try {} | app running ({}), reloading...", attempt, response.status());
                    return ProbeOutcome::Ready { attempt };
                }
                Err(e) => debug!("probe"; "try {} | app not running: {}", attempt, e),
            }
        }

        ProbeOutcome::Exhausted
    }
}

/// Wait until nothing is listening on `port`.
///
/// Binds and immediately releases the port; `AddrInUse` waits `delay` and
/// retries, any other bind error is returned as is.
pub async fn wait_port_free(port: u16, attempts: u32, delay: Duration) -> Result<()> {
    for remaining in (1..=attempts).rev() {
        match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => {
                drop(listener);
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                log!("warning"; "port {} is already in use, waiting {}...", port, remaining);
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(DevError::PortInUse(port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::cancel_pair;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer every connection with a canned response.
    async fn serve_canned(listener: TcpListener, status_line: &'static str) {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let body = format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
                let _ = socket.write_all(body.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    }

    fn prober(attempts: u32) -> LivenessProber {
        LivenessProber::new(attempts, Duration::from_millis(10)).unwrap()
    }

    #[tokio::test]
    async fn test_ready_on_first_attempt() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/?_checking_alive=1", listener.local_addr().unwrap());
        tokio::spawn(serve_canned(listener, "HTTP/1.1 200 OK"));

        let (_handle, mut cancel) = cancel_pair();
        let outcome = prober(5).wait_ready(&url, &mut cancel).await;
        assert_eq!(outcome, ProbeOutcome::Ready { attempt: 1 });
    }

    #[tokio::test]
    async fn test_error_status_counts_as_live() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        tokio::spawn(serve_canned(listener, "HTTP/1.1 500 Internal Server Error"));

        let (_handle, mut cancel) = cancel_pair();
        assert!(prober(5).wait_ready(&url, &mut cancel).await.is_ready());
    }

    #[tokio::test]
    async fn test_ready_after_app_comes_up() {
        // reserve a port, release it, and only start listening later
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let url = format!("http://{addr}/");

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(35)).await;
            let listener = TcpListener::bind(addr).await.unwrap();
            serve_canned(listener, "HTTP/1.1 200 OK").await;
        });

        let (_handle, mut cancel) = cancel_pair();
        match prober(50).wait_ready(&url, &mut cancel).await {
            ProbeOutcome::Ready { attempt } => assert!(attempt >= 2, "attempt {attempt}"),
            other => panic!("expected ready, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exhausted_when_nothing_listens() {
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let url = format!("http://{addr}/");

        let (_handle, mut cancel) = cancel_pair();
        let outcome = prober(3).wait_ready(&url, &mut cancel).await;
        assert_eq!(outcome, ProbeOutcome::Exhausted);
    }

    #[tokio::test]
    async fn test_cancel_aborts_retries() {
        let (handle, mut cancel) = cancel_pair();
        handle.cancel();

        let slow = LivenessProber::new(20, Duration::from_secs(10)).unwrap();
        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            slow.wait_ready("http://127.0.0.1:9/", &mut cancel),
        )
        .await
        .unwrap();
        assert_eq!(outcome, ProbeOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_port_free() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        wait_port_free(port, 1, Duration::from_millis(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_port_in_use() {
        let holder = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
        let port = holder.local_addr().unwrap().port();

        let err = wait_port_free(port, 2, Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(matches!(err, DevError::PortInUse(p) if p == port));
    }
}

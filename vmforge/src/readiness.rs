//! Service-readiness probing for freshly started VMs.
//!
//! A probe is a single bounded TCP connect. The caller loops until the
//! probe reports ready or its own budget runs out; the poller itself keeps
//! no state across calls and re-resolves the address on every attempt.

use std::io::ErrorKind;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const REFUSAL_BACKOFF: Duration = Duration::from_secs(2);

/// Probe seam consumed by the service-readiness phase.
///
/// The production implementation is [`ReadinessPoller`]; tests substitute
/// fakes with scripted probe outcomes.
#[async_trait::async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// One probe attempt; true once the service accepts connections.
    async fn wait_for_port(&self, address: &str, port: u16) -> bool;
}

#[derive(Debug, Clone)]
pub struct ReadinessPoller {
    /// Bound on a single connect attempt.
    pub connect_timeout: Duration,
    /// Sleep applied when the host actively refuses, to avoid hot-looping
    /// against a service that is still initializing.
    pub refusal_backoff: Duration,
}

impl Default for ReadinessPoller {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            refusal_backoff: REFUSAL_BACKOFF,
        }
    }
}

#[async_trait::async_trait]
impl ReadinessProbe for ReadinessPoller {
    async fn wait_for_port(&self, address: &str, port: u16) -> bool {
        self.probe(address, port).await
    }
}

impl ReadinessPoller {
    /// One probe attempt against `address:port`.
    ///
    /// Returns true when the connection is accepted. Timeouts and
    /// permission errors return false immediately; refused/unreachable
    /// errors sleep `refusal_backoff` before returning false.
    pub async fn probe(&self, address: &str, port: u16) -> bool {
        match timeout(self.connect_timeout, TcpStream::connect((address, port))).await {
            Ok(Ok(stream)) => {
                tracing::debug!(address, port, "service accepting connections");
                drop(stream);
                true
            }
            Ok(Err(e)) => {
                tracing::trace!(address, port, error = %e, "probe failed");
                match e.kind() {
                    ErrorKind::ConnectionRefused
                    | ErrorKind::HostUnreachable
                    | ErrorKind::NetworkUnreachable => {
                        tokio::time::sleep(self.refusal_backoff).await;
                        false
                    }
                    // TimedOut, PermissionDenied, resolution failures:
                    // not ready yet, caller retries on its own schedule.
                    _ => false,
                }
            }
            Err(_) => {
                tracing::trace!(address, port, "probe timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn accepting_listener_is_ready_on_first_probe() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let poller = ReadinessPoller::default();
        assert!(poller.probe("127.0.0.1", port).await);
    }

    #[tokio::test]
    async fn refused_connection_backs_off_before_returning() {
        // Bind then drop to find a port that actively refuses.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let poller = ReadinessPoller {
            connect_timeout: Duration::from_secs(5),
            refusal_backoff: Duration::from_millis(200),
        };

        let start = std::time::Instant::now();
        assert!(!poller.probe("127.0.0.1", port).await);
        assert!(
            start.elapsed() >= Duration::from_millis(200),
            "refusal must sleep the backoff, elapsed {:?}",
            start.elapsed()
        );
    }
}

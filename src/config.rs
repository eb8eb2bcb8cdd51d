use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::time::Duration;

/// Process-level settings shared by every job coordinated from this process.
///
/// Job-level settings live in [`JobConfiguration`](crate::job::JobConfiguration)
/// and are persisted in the registry; these never leave the process.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Address this process registers under `servers/` and uses as the
    /// prefix of its instance id.
    pub host_ip: IpAddr,
    /// Process id used as the suffix of the instance id.
    pub pid: u32,
    /// How often `await_leadership` re-checks the leader node.
    pub leader_poll_interval_ms: u64,
    /// Upper bound on `await_leadership`.
    pub leader_wait_timeout_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            host_ip: local_ip(),
            pid: std::process::id(),
            leader_poll_interval_ms: 100,
            leader_wait_timeout_ms: 10_000,
        }
    }
}

impl CoordinatorConfig {
    pub fn new(host_ip: IpAddr, pid: u32) -> Self {
        Self {
            host_ip,
            pid,
            ..Default::default()
        }
    }

    pub fn with_leader_poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.leader_poll_interval_ms = interval_ms;
        self
    }

    pub fn with_leader_wait_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.leader_wait_timeout_ms = timeout_ms;
        self
    }

    pub fn leader_poll_interval(&self) -> Duration {
        Duration::from_millis(self.leader_poll_interval_ms)
    }

    pub fn leader_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.leader_wait_timeout_ms)
    }
}

/// Best-effort discovery of the address used for outbound traffic.
///
/// Connecting a UDP socket sends nothing; it only asks the OS to pick a route.
/// Falls back to loopback when no route exists (isolated test hosts).
pub fn local_ip() -> IpAddr {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

/// Per-request state threaded through every data-access call.
///
/// The correlation id is a typed field rather than an entry in a generic
/// extension map, so a missing or mistyped id cannot reach the store layer.
/// `deadline` is absolute; stores may consult it to stop early.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    remote_addr: Option<SocketAddr>,
    deadline: Instant,
}

impl RequestContext {
    #[must_use]
    pub fn new(request_id: Uuid, remote_addr: Option<SocketAddr>, timeout: Duration) -> Self {
        Self {
            request_id,
            remote_addr,
            deadline: Instant::now() + timeout,
        }
    }

    /// Context for work that does not originate from an inbound request
    /// (CLI commands, seeding, tests).
    #[must_use]
    pub fn detached(timeout: Duration) -> Self {
        Self::new(Uuid::new_v4(), None, timeout)
    }

    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    #[must_use]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.request_id)
    }
}

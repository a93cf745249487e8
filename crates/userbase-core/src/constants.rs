use std::time::Duration;

/// Hard cap applied to every page request, whatever the caller asks for.
pub const MAX_PAGE_LIMIT: i64 = 25;

/// Deadline granted to a single data-access call, measured from request start.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub mod demo_users {
    /// Names seeded into the in-process store, in id order.
    pub const NAMES: [&str; 5] = ["Vasy", "VasyVasy", "Pety", "PetyPety", "Sany"];
}

//! Application constants

/// Default listen port
pub const DEFAULT_PORT: u16 = 3000;

/// Status checks per container before the item is rejected
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 5;

/// Fixed wait between status checks (seconds)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Items processed at the same time within one pass
pub const DEFAULT_PUBLISH_CONCURRENCY: usize = 8;

/// Overall budget for one pass (seconds). Kept under the usual 300s cron HTTP timeout.
pub const DEFAULT_PUBLISH_DEADLINE_SECS: u64 = 280;

/// Timeout applied to every outbound platform request (seconds)
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Graph API version used by both platform variants
pub const DEFAULT_GRAPH_API_VERSION: &str = "v21.0";

/// Longest token lifetime stored from a platform response (seconds, one year)
pub const MAX_TOKEN_LIFETIME_SECS: i64 = 365 * 24 * 3600;

/// Random bytes in an OAuth `state` value
pub const OAUTH_STATE_BYTES: usize = 16;

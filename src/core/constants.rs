/// Application-wide constants to avoid magic values throughout the codebase.
///
/// This module centralizes all magic strings, numbers, and other literal values
/// used across the application, making them easier to maintain and modify.
/// Timeout and duration constants
pub mod timeouts {
    /// Default per-request timeout in seconds
    pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
    /// Maximum reasonable per-request timeout in seconds (5 minutes)
    pub const MAX_TIMEOUT_SECONDS: u64 = 300;
    /// Minimum per-request timeout in seconds
    pub const MIN_TIMEOUT_SECONDS: u64 = 1;
    /// Connect timeout in seconds, separate from the full request deadline
    pub const CONNECT_TIMEOUT_SECONDS: u64 = 5;
    /// Default grace window for outstanding batches at shutdown, in seconds
    pub const DEFAULT_SHUTDOWN_GRACE_SECONDS: u64 = 30;
    /// Interval between completion polls during shutdown, in milliseconds
    pub const COMPLETION_POLL_MS: u64 = 500;
}

/// Probe engine constants
pub mod probes {
    /// Maximum probes simultaneously awaiting network I/O in one check call
    pub const MAX_CONCURRENT_PROBES: usize = 100;
    /// Maximum redirect hops before a probe is failed
    pub const MAX_REDIRECTS: usize = 10;
}

/// Per-URL error classifications carried in `LinkResult.error`
pub mod probe_errors {
    /// URL was empty or whitespace-only
    pub const EMPTY_URL: &str = "URL cannot be empty";
    /// URL failed syntactic validation
    pub const INVALID_URL: &str = "invalid URL format";
    /// URL scheme is not http/https
    pub const UNSUPPORTED_SCHEME: &str = "unsupported URL scheme";
    /// Request deadline exceeded
    pub const TIMEOUT: &str = "request timeout";
    /// Name resolution failed
    pub const DNS: &str = "DNS resolution failed";
    /// Low-level connection failure
    pub const CONNECTION: &str = "connection failed";
    /// Unexpected runtime fault inside one probe task
    pub const INTERNAL_FAULT: &str = "internal fault during probe";
    /// The caller passed no URL list at all
    pub const MISSING_URL_LIST: &str = "URL list must be provided";
}

/// Batch store persistence layout
pub mod storage {
    /// Default data directory
    pub const DEFAULT_DATA_DIR: &str = "data";
    /// Per-batch record file name prefix
    pub const BATCH_FILE_PREFIX: &str = "batch_";
    /// File name of the durable next-id counter record
    pub const NEXT_ID_FILE: &str = "next_id.json";
    /// Extension shared by all persisted records
    pub const RECORD_EXTENSION: &str = "json";
    /// First batch id handed out by a fresh store
    pub const FIRST_BATCH_ID: u64 = 1;
}

/// HTTP server defaults
pub mod server {
    /// Default listen address
    pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";
}

/// Report rendering constants
pub mod report {
    /// Result rows printed per page
    pub const DEFAULT_ROWS_PER_PAGE: usize = 40;
    /// Width of the URL column; longer URLs are truncated with an ellipsis
    pub const URL_COLUMN_WIDTH: usize = 48;
    /// Characters of the check timestamp shown in the table (date only)
    pub const CHECKED_AT_WIDTH: usize = 10;
}

/// Number of titles dispatched to the worker pool per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Seconds to wait for the next pooled result before declaring a timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Progress update interval for the `total` pass (tick every N articles)
pub const PROGRESS_INTERVAL: u64 = 10_000;

/// How many times a title may be dispatched before a timeout marks it failed
pub const MAX_DISPATCH_ATTEMPTS: u32 = 2;

/// Serialized article body format announced to the consumer
pub const ARTICLE_FORMAT: &str = "html";

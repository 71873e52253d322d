pub const DEFAULT_PORT: u16 = 8790;
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

// Inbound bodies can carry entire tool catalogs and code contexts.
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 200 * 1024 * 1024;

pub const MAX_CONCURRENT_UPSTREAM: usize = 3;
pub const MIN_DISPATCH_INTERVAL_MS: u64 = 200;

pub const CACHE_TTL_SECS: u64 = 24 * 60 * 60;

pub const UPSTREAM_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const STREAM_IDLE_TIMEOUT_SECS: u64 = 30;

pub const SESSION_TTL_SECS: u64 = 60 * 60;
pub const MIN_BCRYPT_COST: u32 = 10;

// max_tokens below the floor is treated as a client bug and widened.
pub const MIN_MAX_TOKENS: u32 = 100;
pub const CLAMPED_MAX_TOKENS: u32 = 4096;

pub const STATS_LOG_INTERVAL_SECS: u64 = 30;

pub const LOCAL_API_KEY_BYTES: usize = 32;
pub const SESSION_TOKEN_BYTES: usize = 32;

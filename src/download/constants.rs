//! Constants for the download module (timeouts, chunking, filename fallbacks).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default per-read timeout (5 minutes without a byte from the server).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Largest slice written to disk between cancellation checks.
pub const CHUNK_SIZE: usize = 32 * 1024;

/// Highest numeric suffix probed before falling back to a random suffix.
pub const MAX_COLLISION_PROBES: u32 = 999;

/// Length of the random suffix on `index.bin.<suffix>` names.
pub const UNKNOWN_TYPE_SUFFIX_LEN: usize = 12;

/// Length of the random suffix used once numeric probing is exhausted.
pub const COLLISION_SUFFIX_LEN: usize = 16;

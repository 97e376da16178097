//! Constants for the download module (timeouts, buffer sizes, naming).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Block size used when digesting an existing file on disk.
pub const DIGEST_BLOCK_SIZE: usize = 64 * 1024;

/// Prefix of in-flight temporary files inside the target directory.
pub const TEMP_FILE_PREFIX: &str = ".mdlocal-";

/// Suffix of in-flight temporary files inside the target directory.
pub const TEMP_FILE_SUFFIX: &str = ".part";

/// Random bytes in a temporary file name.
pub const TEMP_FILE_RANDOM_LEN: usize = 16;

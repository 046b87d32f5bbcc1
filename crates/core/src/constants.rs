/// Constants used throughout the dgrep codebase
use std::time::Duration;

// Query constants
pub const QUERY_KEY_DELIMITER: &str = ";";
pub const MIN_QUERY_TOKENS: usize = 2;

// Interactive loop
pub const EXIT_COMMAND: &str = "exit";

// Bring-up dialing
pub const DEFAULT_DIAL_INTERVAL: Duration = Duration::from_millis(125);

// Cache
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

// Wire protocol
pub const FRAME_LENGTH_BYTES: usize = 4;
pub const WIRE_VERSION: u8 = 1;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

// Matcher programs a peer may ask us to launch
pub const DEFAULT_ALLOWED_PROGRAMS: &[&str] = &["grep", "egrep", "fgrep", "zgrep"];

// Logging
pub const DGREP_LOG_VAR: &str = "DGREP_LOG";

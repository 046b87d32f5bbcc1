//! Settings for a single node's engine.

use dgrep_core::{
    Error, Result, DEFAULT_ALLOWED_PROGRAMS, DEFAULT_CACHE_CAPACITY, DEFAULT_MAX_FRAME_BYTES,
};
use dgrep_utils::RetryPolicy;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Configuration for one engine instance.
///
/// Built once at startup and shared read-only by the server, the handlers and
/// the coordinator.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Local log file every query runs against
    pub log_file: PathBuf,

    /// Address the query server binds to
    pub listen_addr: SocketAddr,

    /// Identity announced to peers; defaults to the bound address
    pub advertise_addr: Option<String>,

    /// Maximum number of cached results
    pub cache_capacity: usize,

    /// Bring-up policy for dialing peers
    pub dial_policy: RetryPolicy,

    /// Largest inbound query frame the server accepts
    pub max_frame_bytes: usize,

    /// Directory for numbered JSON exports of each query's results
    pub test_output_dir: Option<PathBuf>,

    /// Programs the matcher is allowed to launch
    pub allowed_programs: Vec<String>,
}

impl EngineConfig {
    /// Create a configuration with defaults, listening on an ephemeral loopback port
    pub fn new(log_file: impl Into<PathBuf>) -> Self {
        Self {
            log_file: log_file.into(),
            listen_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            advertise_addr: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            dial_policy: RetryPolicy::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            test_output_dir: None,
            allowed_programs: DEFAULT_ALLOWED_PROGRAMS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
        }
    }

    #[must_use]
    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    #[must_use]
    pub fn with_advertise_addr(mut self, addr: impl Into<String>) -> Self {
        self.advertise_addr = Some(addr.into());
        self
    }

    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_dial_policy(mut self, policy: RetryPolicy) -> Self {
        self.dial_policy = policy;
        self
    }

    #[must_use]
    pub fn with_max_frame_bytes(mut self, max: usize) -> Self {
        self.max_frame_bytes = max;
        self
    }

    #[must_use]
    pub fn with_test_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.test_output_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_allowed_programs<I, S>(mut self, programs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_programs = programs.into_iter().map(Into::into).collect();
        self
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(Error::configuration(
                "cache capacity must be greater than zero",
            ));
        }
        if self.max_frame_bytes == 0 {
            return Err(Error::configuration(
                "maximum frame size must be greater than zero",
            ));
        }
        if self.allowed_programs.is_empty() {
            return Err(Error::configuration(
                "at least one matcher program must be allowed",
            ));
        }
        if self.log_file.as_os_str().is_empty() {
            return Err(Error::configuration("log file path is empty"));
        }
        Ok(())
    }
}

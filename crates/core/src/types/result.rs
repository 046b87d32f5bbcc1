//! One node's answer to a query.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Output of running a query against one node's log file.
///
/// Created once per (query, node) pair. When served from a cache, `duration`
/// is the retrieval latency rather than the original compute latency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Raw matcher output
    pub output: String,
    /// Identity of the node that produced the result
    pub node: String,
    /// Base name of the log file that was searched
    pub file: String,
    /// Matched line count (or the summed count for count-mode queries)
    pub line_count: u64,
    /// How long it took to produce this result
    #[serde(rename = "execution_time_ns", with = "duration_nanos")]
    pub duration: Duration,
}

impl QueryResult {
    pub fn new(
        output: impl Into<String>,
        node: impl Into<String>,
        log_file: &Path,
        line_count: u64,
        duration: Duration,
    ) -> Self {
        let file = log_file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| log_file.display().to_string());
        Self {
            output: output.into(),
            node: node.into(),
            file,
            line_count,
            duration,
        }
    }

    /// Replace the recorded duration, e.g. with a cache-retrieval latency.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Compare everything except the execution duration.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.output == other.output
            && self.node == other.node
            && self.file == other.file
            && self.line_count == other.line_count
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Node: {}", self.node)?;
        writeln!(f, "File: {}", self.file)?;
        writeln!(f, "Num Lines: {}", self.line_count)?;
        writeln!(f, "Execution Time: {}ns", self.duration.as_nanos())?;
        writeln!(f, "Output:")?;
        writeln!(f, "{}", self.output)
    }
}

/// Serialize a `Duration` as whole nanoseconds
pub mod duration_nanos {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        nanos.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QueryResult {
        QueryResult::new(
            "ERROR one\n",
            "127.0.0.1:9001",
            Path::new("/var/log/machine.1.log"),
            1,
            Duration::from_nanos(1500),
        )
    }

    #[test]
    fn test_new_keeps_only_file_name() {
        assert_eq!(sample().file, "machine.1.log");
    }

    #[test]
    fn test_same_content_ignores_duration() {
        let a = sample();
        let b = sample().with_duration(Duration::from_secs(3));
        assert!(a.same_content(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_json_uses_nanosecond_field() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["execution_time_ns"], 1500);
        assert_eq!(json["line_count"], 1);

        let back: QueryResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_display_report_block() {
        let text = sample().to_string();
        assert!(text.starts_with("Node: 127.0.0.1:9001\nFile: machine.1.log\nNum Lines: 1\n"));
        assert!(text.contains("Execution Time: 1500ns\n"));
        assert!(text.ends_with("Output:\nERROR one\n\n"));
    }
}

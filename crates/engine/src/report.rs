//! Aggregated answer to one distributed query

use dgrep_core::QueryResult;
use std::fmt;
use std::time::Duration;

/// Every node's result for one query, local node first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryReport {
    pub key: String,
    pub results: Vec<QueryResult>,
    pub total_lines: u64,
    /// Wall-clock time from dispatch until the last result arrived
    pub elapsed: Duration,
}

impl QueryReport {
    pub fn new(key: impl Into<String>, results: Vec<QueryResult>, elapsed: Duration) -> Self {
        let total_lines = results.iter().map(|r| r.line_count).sum();
        Self {
            key: key.into(),
            results,
            total_lines,
            elapsed,
        }
    }

    /// Number of nodes that contributed a result
    pub fn node_count(&self) -> usize {
        self.results.len()
    }
}

impl fmt::Display for QueryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for result in &self.results {
            writeln!(f, "{result}")?;
        }
        writeln!(f, "Total Number of Lines: {}", self.total_lines)?;
        writeln!(f, "Elapsed Query Execution Time: {}ns", self.elapsed.as_nanos())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn result(node: &str, lines: u64) -> QueryResult {
        QueryResult::new(
            format!("{lines}\n"),
            node,
            Path::new("machine.log"),
            lines,
            Duration::from_nanos(10),
        )
    }

    #[test]
    fn test_total_is_sum_of_line_counts() {
        let report = QueryReport::new(
            "grep;-c;ERROR",
            vec![result("a", 1), result("b", 2), result("c", 0)],
            Duration::from_millis(3),
        );
        assert_eq!(report.total_lines, 3);
        assert_eq!(report.node_count(), 3);
    }

    #[test]
    fn test_display_lists_results_then_totals() {
        let report = QueryReport::new(
            "grep;-c;ERROR",
            vec![result("a", 1), result("b", 2)],
            Duration::from_nanos(4200),
        );
        let text = report.to_string();

        let a = text.find("Node: a").unwrap();
        let b = text.find("Node: b").unwrap();
        assert!(a < b);
        assert!(text.ends_with(
            "Total Number of Lines: 3\nElapsed Query Execution Time: 4200ns\n"
        ));
    }

    #[test]
    fn test_empty_report() {
        let report = QueryReport::new("grep;x", Vec::new(), Duration::ZERO);
        assert_eq!(report.total_lines, 0);
        assert!(report.to_string().starts_with("Total Number of Lines: 0\n"));
    }
}

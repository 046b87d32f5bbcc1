//! Running a query's filter program against a log file

use async_trait::async_trait;
use dgrep_core::{Error, Query, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// What a matcher produced for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutput {
    pub output: String,
    pub line_count: u64,
}

/// Executes a query against a single file.
///
/// Production code launches an external process; tests substitute a
/// deterministic implementation.
#[async_trait]
pub trait Matcher: Send + Sync {
    async fn run(&self, query: &Query, file: &Path) -> Result<MatchOutput>;
}

/// Launches the query's program with the log file appended as the last argument
#[derive(Debug, Clone)]
pub struct ProcessMatcher {
    allowed_programs: Vec<String>,
}

impl ProcessMatcher {
    pub fn new<I, S>(allowed_programs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_programs: allowed_programs.into_iter().map(Into::into).collect(),
        }
    }

    fn check_allowed(&self, program: &str) -> Result<()> {
        if self.allowed_programs.iter().any(|p| p == program) {
            Ok(())
        } else {
            Err(Error::security(format!(
                "program '{program}' is not in the allowed list ({})",
                self.allowed_programs.join(", ")
            )))
        }
    }
}

#[async_trait]
impl Matcher for ProcessMatcher {
    async fn run(&self, query: &Query, file: &Path) -> Result<MatchOutput> {
        let program = query.program();
        self.check_allowed(program)?;

        tracing::debug!(program, args = ?query.args(), file = %file.display(), "Running matcher");

        let output = Command::new(program)
            .args(query.args())
            .arg(file)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                Error::command_execution(
                    program,
                    query.args().to_vec(),
                    format!("failed to launch: {e}"),
                    None,
                )
            })?;

        // grep exits 1 when nothing matched; only 2 and above are real failures
        match output.status.code() {
            Some(0 | 1) => {}
            code => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(Error::command_execution(
                    program,
                    query.args().to_vec(),
                    stderr.trim().to_string(),
                    code,
                ));
            }
        }

        let output = String::from_utf8_lossy(&output.stdout).into_owned();
        let line_count = count_lines(&output, query.is_count_query());
        Ok(MatchOutput { output, line_count })
    }
}

/// Number of matched lines represented by `output`.
///
/// Count-mode output is one integer per searched file (optionally prefixed with
/// `file:`), and those integers are summed. Otherwise every output line counts.
pub fn count_lines(output: &str, count_mode: bool) -> u64 {
    if !count_mode {
        return output.lines().count() as u64;
    }
    output
        .lines()
        .filter_map(|line| {
            let value = line.rsplit(':').next().unwrap_or(line);
            value.trim().parse::<u64>().ok()
        })
        .sum()
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn log_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn matcher() -> ProcessMatcher {
        ProcessMatcher::new(["grep"])
    }

    #[test]
    fn test_count_lines_plain_output() {
        assert_eq!(count_lines("", false), 0);
        assert_eq!(count_lines("a\nb\n", false), 2);
        assert_eq!(count_lines("a\nb", false), 2);
    }

    #[test]
    fn test_count_lines_sums_counts() {
        assert_eq!(count_lines("2\n", true), 2);
        assert_eq!(count_lines("a.log:2\nb.log:5\n", true), 7);
        assert_eq!(count_lines("0\n", true), 0);
    }

    #[tokio::test]
    async fn test_grep_count_query() {
        let file = log_file("A\nB\nERROR\n");
        let query = Query::parse("grep -c ERROR").unwrap();

        let out = matcher().run(&query, file.path()).await.unwrap();
        assert_eq!(out.output, "1\n");
        assert_eq!(out.line_count, 1);
    }

    #[tokio::test]
    async fn test_no_match_is_not_an_error() {
        let file = log_file("A\n");

        let count = Query::parse("grep -c ERROR").unwrap();
        let out = matcher().run(&count, file.path()).await.unwrap();
        assert_eq!(out.output, "0\n");
        assert_eq!(out.line_count, 0);

        let plain = Query::parse("grep ERROR").unwrap();
        let out = matcher().run(&plain, file.path()).await.unwrap();
        assert!(out.output.is_empty());
        assert_eq!(out.line_count, 0);
    }

    #[tokio::test]
    async fn test_quoted_pattern_lines() {
        let file = log_file("INFO: Request received from client\nINFO: done\nINFO: Request received from client\n");
        let query = Query::parse(r#"grep "Request received from client""#).unwrap();

        let out = matcher().run(&query, file.path()).await.unwrap();
        assert_eq!(out.line_count, 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_command_error() {
        let dir = tempfile::tempdir().unwrap();
        let query = Query::parse("grep ERROR").unwrap();

        let err = matcher()
            .run(&query, &dir.path().join("absent.log"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::CommandExecution {
                exit_code: Some(2),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_disallowed_program_rejected() {
        let file = log_file("A\n");
        let query = Query::parse("rm -rf").unwrap();

        let err = matcher().run(&query, file.path()).await.unwrap_err();
        assert!(matches!(err, Error::Security { .. }));
        assert!(file.path().exists());
    }
}

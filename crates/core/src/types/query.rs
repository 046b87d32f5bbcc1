//! Tokenised filter queries and their canonical cache key.

use crate::constants::{MIN_QUERY_TOKENS, QUERY_KEY_DELIMITER};
use crate::errors::{Error, Result};
use std::fmt;

/// A filter command without its target file, e.g. `["grep", "-c", "ERROR"]`.
///
/// The canonical key is the tokens joined with [`QUERY_KEY_DELIMITER`]. Two
/// queries are cache-equivalent iff their keys are equal. Immutable once built.
///
/// A token containing the delimiter collides with the split form, so
/// `grep "a;b"` and `grep a b` share a key and a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    tokens: Vec<String>,
    key: String,
}

impl Query {
    /// Tokenise raw user input, honouring quoted multi-word tokens.
    ///
    /// At least [`MIN_QUERY_TOKENS`] tokens are required (a program and one argument).
    pub fn parse(raw: &str) -> Result<Self> {
        let tokens = shlex::split(raw.trim())
            .ok_or_else(|| Error::invalid_query(raw, "unbalanced quotes"))?;

        if tokens.len() < MIN_QUERY_TOKENS {
            return Err(Error::invalid_query(
                raw,
                format!("expected at least {MIN_QUERY_TOKENS} arguments, got {}", tokens.len()),
            ));
        }

        Self::from_tokens(tokens)
    }

    /// Build a query from already-split tokens.
    pub fn from_tokens<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        if tokens.is_empty() {
            return Err(Error::invalid_query("", "query has no tokens"));
        }
        let key = tokens.join(QUERY_KEY_DELIMITER);
        Ok(Self { tokens, key })
    }

    /// Rebuild a query from its canonical key.
    ///
    /// Lossy for tokens that themselves contain the delimiter.
    pub fn from_key(key: &str) -> Result<Self> {
        if key.is_empty() {
            return Err(Error::invalid_query(key, "empty canonical key"));
        }
        Self::from_tokens(key.split(QUERY_KEY_DELIMITER))
    }

    /// Rebuild a query received from a peer, checking the key matches the tokens.
    pub fn from_parts(tokens: Vec<String>, key: String) -> Result<Self> {
        let query = Self::from_tokens(tokens)?;
        if query.key != key {
            return Err(Error::invalid_query(
                key,
                format!("canonical key does not match tokens (expected '{}')", query.key),
            ));
        }
        Ok(query)
    }

    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The program to launch (first token).
    #[must_use]
    pub fn program(&self) -> &str {
        &self.tokens[0]
    }

    /// Arguments passed to the program, excluding the target file.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.tokens[1..]
    }

    /// Whether the query asks the matcher for a per-file match count
    /// (`-c`, `--count`, or a short flag cluster such as `-ic`).
    #[must_use]
    pub fn is_count_query(&self) -> bool {
        let mut args = self.args().iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--" => return false,
                "--count" => return true,
                // These take the next token as their value
                "-e" | "-f" | "-m" | "-A" | "-B" | "-C" | "--regexp" | "--file" => {
                    args.next();
                }
                flag if is_short_flag_cluster(flag) => {
                    if flag[1..].contains('c') {
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }
}

fn is_short_flag_cluster(token: &str) -> bool {
    token.len() > 1
        && token.starts_with('-')
        && !token.starts_with("--")
        && token[1..].chars().all(|c| c.is_ascii_alphabetic())
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.join(" "))
    }
}

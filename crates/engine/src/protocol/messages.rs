//! Message payloads and their versioned binary encoding

use bincode::Options;
use dgrep_core::{Error, Query, QueryResult, WIRE_VERSION};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const KIND_HELLO: u8 = 1;
const KIND_QUERY: u8 = 2;
const KIND_RESULT: u8 = 3;
const KIND_FAILURE: u8 = 4;

/// Everything two peers say to each other
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// First frame on every outbound connection
    Hello(Hello),
    Query(Query),
    Result(QueryResult),
    /// Sent in place of a result when the responder's matcher failed
    Failure(Failure),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub node_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub node: String,
    pub message: String,
}

#[derive(Serialize, Deserialize)]
struct QueryBody {
    tokens: Vec<String>,
    key: String,
}

#[derive(Serialize, Deserialize)]
struct ResultBody {
    output: String,
    node: String,
    file: String,
    line_count: u64,
    duration_nanos: u64,
}

impl From<&QueryResult> for ResultBody {
    fn from(result: &QueryResult) -> Self {
        Self {
            output: result.output.clone(),
            node: result.node.clone(),
            file: result.file.clone(),
            line_count: result.line_count,
            duration_nanos: u64::try_from(result.duration.as_nanos()).unwrap_or(u64::MAX),
        }
    }
}

impl From<ResultBody> for QueryResult {
    fn from(body: ResultBody) -> Self {
        QueryResult::new(
            body.output,
            body.node,
            Path::new(&body.file),
            body.line_count,
            Duration::from_nanos(body.duration_nanos),
        )
    }
}

/// A payload that could not be encoded or decoded
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("empty payload")]
    Empty,

    #[error("missing message kind")]
    MissingKind,

    #[error("unsupported wire version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown message kind {0}")]
    UnknownKind(u8),

    #[error("malformed body: {0}")]
    Body(#[from] bincode::Error),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl WireError {
    pub fn into_error(self, peer: &str) -> Error {
        Error::protocol(peer, self.to_string())
    }
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

/// Encode a message as `[version][kind][body]`
pub fn encode(message: &Message) -> Result<Vec<u8>, WireError> {
    let (kind, body) = match message {
        Message::Hello(hello) => (KIND_HELLO, codec().serialize(hello)?),
        Message::Query(query) => (
            KIND_QUERY,
            codec().serialize(&QueryBody {
                tokens: query.tokens().to_vec(),
                key: query.key().to_string(),
            })?,
        ),
        Message::Result(result) => (KIND_RESULT, codec().serialize(&ResultBody::from(result))?),
        Message::Failure(failure) => (KIND_FAILURE, codec().serialize(failure)?),
    };

    let mut payload = Vec::with_capacity(2 + body.len());
    payload.push(WIRE_VERSION);
    payload.push(kind);
    payload.extend_from_slice(&body);
    Ok(payload)
}

/// Decode a payload produced by [`encode`]
pub fn decode(payload: &[u8]) -> Result<Message, WireError> {
    let (&version, rest) = payload.split_first().ok_or(WireError::Empty)?;
    if version != WIRE_VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }
    let (&kind, body) = rest.split_first().ok_or(WireError::MissingKind)?;

    match kind {
        KIND_HELLO => Ok(Message::Hello(body_of(body)?)),
        KIND_QUERY => {
            let QueryBody { tokens, key } = body_of(body)?;
            Query::from_parts(tokens, key)
                .map(Message::Query)
                .map_err(|e| WireError::InvalidQuery(e.to_string()))
        }
        KIND_RESULT => Ok(Message::Result(body_of::<ResultBody>(body)?.into())),
        KIND_FAILURE => Ok(Message::Failure(body_of(body)?)),
        other => Err(WireError::UnknownKind(other)),
    }
}

fn body_of<T: DeserializeOwned>(body: &[u8]) -> Result<T, WireError> {
    Ok(codec().deserialize(body)?)
}

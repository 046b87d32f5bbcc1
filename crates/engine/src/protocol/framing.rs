//! Length-prefixed framing over any async byte stream

use dgrep_core::{Error, FRAME_LENGTH_BYTES};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const INITIAL_PAYLOAD_CAPACITY: usize = 64 * 1024;

/// Failure to move one frame across a stream
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The stream ended cleanly before the first byte of a frame
    #[error("stream closed at frame boundary")]
    Closed,

    /// The stream ended part-way through the length prefix or the payload
    #[error("stream ended after {received} of {expected} bytes")]
    Truncated { expected: usize, received: usize },

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: usize, max: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FrameError {
    /// Attach the peer identity, folding connection resets into a clean close.
    pub fn into_error(self, peer: &str) -> Error {
        match self {
            FrameError::Closed => Error::connection_closed(peer),
            FrameError::Truncated { expected, received } => {
                Error::truncated(peer, expected, received)
            }
            FrameError::TooLarge { len, max } => Error::protocol(
                peer,
                format!("frame of {len} bytes exceeds the {max} byte limit"),
            ),
            FrameError::Io(e) if is_disconnect_kind(e.kind()) => Error::connection_closed(peer),
            FrameError::Io(e) => Error::network(peer, e.to_string()),
        }
    }
}

fn is_disconnect_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::NotConnected
    )
}

/// Write `payload` as a single frame and flush it.
///
/// Prefix and payload go out in one buffer so a concurrent reader never sees a
/// prefix without its body.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;

    let mut buf = Vec::with_capacity(FRAME_LENGTH_BYTES + payload.len());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(payload);

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read exactly one frame with no size limit.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    read_frame_limited(reader, u32::MAX as usize).await
}

/// Read exactly one frame, rejecting payloads larger than `max` bytes.
///
/// Zero bytes at a frame boundary is [`FrameError::Closed`]; any shortfall after
/// that is [`FrameError::Truncated`].
pub async fn read_frame_limited<R>(reader: &mut R, max: usize) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; FRAME_LENGTH_BYTES];
    let received = fill(reader, &mut prefix).await?;
    if received == 0 {
        return Err(FrameError::Closed);
    }
    if received < FRAME_LENGTH_BYTES {
        return Err(FrameError::Truncated {
            expected: FRAME_LENGTH_BYTES,
            received,
        });
    }

    let len = u32::from_le_bytes(prefix) as usize;
    if len > max {
        return Err(FrameError::TooLarge { len, max });
    }

    // Grow with the bytes that actually arrive instead of trusting the prefix
    let mut payload = Vec::with_capacity(len.min(INITIAL_PAYLOAD_CAPACITY));
    let received = (&mut *reader).take(len as u64).read_to_end(&mut payload).await?;
    if received < len {
        return Err(FrameError::Truncated {
            expected: len,
            received,
        });
    }
    Ok(payload)
}

/// Read until `buf` is full or the stream ends, returning the bytes read.
async fn fill<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

//! Wire protocol spoken between peers
//!
//! Every message travels as a frame: a 4-byte little-endian length followed by
//! exactly that many payload bytes. The payload starts with a version byte and
//! a kind byte, followed by a bincode body with a fixed field order:
//!
//! | kind | message   | body |
//! |------|-----------|------|
//! | 1    | `Hello`   | `node_id: String` |
//! | 2    | `Query`   | `tokens: Vec<String>`, `key: String` |
//! | 3    | `Result`  | `output: String`, `node: String`, `file: String`, `line_count: u64`, `duration_nanos: u64` |
//! | 4    | `Failure` | `node: String`, `message: String` |
//!
//! Bodies use little-endian fixed-width integers; strings and sequences carry a
//! u64 little-endian length prefix.

mod framing;
mod messages;

pub use framing::{read_frame, read_frame_limited, write_frame, FrameError};
pub use messages::{decode, encode, Failure, Hello, Message, WireError};

//! Byte-level and frame-level plumbing for the NXT packet link.
//!
//! Layered bottom-up:
//! - [`raw`]: accumulation loops over a chunk transport, with the wait
//!   policy and the packet-boundary timeout tolerance
//! - [`stream`]: fixed 512-byte buffered byte I/O
//! - [`message`]: 2-byte length-prefixed frames and the exit sentinel
//!
//! Every operation reports through the closed [`LinkError`] taxonomy; the
//! two non-fatal outcomes (work done, correct no-op) travel as [`Status`].

pub mod error;
pub mod message;
pub mod raw;
pub mod stream;

pub use error::{LinkError, Result, Status};
pub use message::{Message, MAX_PAYLOAD};
pub use raw::Wait;
pub use stream::{ByteStream, BUFFER_SIZE};

//! USB bulk-transfer transport for the LEGO NXT brick.
//!
//! Provides the chunk-oriented device interface everything else builds on:
//! - [`BulkTransport`]: one bulk transfer per call, reporting bytes moved
//!   and whether the attempt timed out
//! - [`NxtBrick`]: the rusb-backed implementation (discovery by the fixed
//!   vendor/product identity, open, stale-data drain, close)
//!
//! This is the lowest layer of nxtlink. The layers above never touch rusb
//! directly; they see only the [`BulkTransport`] trait, which is why they
//! can be tested against scripted in-memory transports.

pub mod brick;
pub mod chunk;
pub mod error;

pub use brick::NxtBrick;
pub use chunk::{BulkTransport, Chunk};
pub use error::{Result, UsbError};

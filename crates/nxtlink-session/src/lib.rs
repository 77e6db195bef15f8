//! The packet-mode session with one NXT.
//!
//! [`Connection`] owns the whole lifecycle: discovery and the mode-switch
//! handshake on open, framed send/receive while open, and the coordinated
//! two-sided shutdown on close (or drop).

pub mod connection;

pub use connection::Connection;

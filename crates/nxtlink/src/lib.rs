//! Talk to a LEGO Mindstorms NXT brick over USB.
//!
//! nxtlink speaks the leJOS NXJ packet protocol: length-prefixed
//! messages over USB bulk transfers, entered through an explicit
//! mode-switch handshake and left through a two-sided shutdown where
//! each end announces the end of the conversation with a zero-length
//! frame.
//!
//! # Crate Structure
//!
//! - [`transport`]: USB discovery and chunked bulk transfers (via [`rusb`])
//! - [`frame`]: retrying raw I/O, 512-byte buffered streams, and the
//!   length-prefixed message layer
//! - [`session`]: the [`Connection`](session::Connection) state machine
//!   for handshake, messaging, and coordinated shutdown

/// Re-export transport types.
pub mod transport {
    pub use nxtlink_transport::*;
}

/// Re-export framing types.
pub mod frame {
    pub use nxtlink_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use nxtlink_session::*;
}

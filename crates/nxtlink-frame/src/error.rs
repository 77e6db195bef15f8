use nxtlink_transport::UsbError;

/// Outcome of an operation that did something, or correctly did nothing.
///
/// The no-op cases (flushing an already-empty buffer, opening an already
/// open connection) are ordinary outcomes rather than failures, and callers
/// must be able to tell them from performed work without an error path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The operation performed work.
    Done,
    /// The operation was a correct no-op.
    NoEffect,
}

/// Every way a link operation can fail.
///
/// The enum is closed on purpose: callers match on it exhaustively, and the
/// `Display` strings double as the user-facing message table.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// A bounded wait elapsed before the transfer finished.
    ///
    /// `transferred` counts the bytes that did move, so partial progress is
    /// never silently lost.
    #[error("timed out after {transferred} bytes")]
    Timeout { transferred: usize },

    /// A payload length outside `1..=65535` was supplied.
    #[error("invalid message length {0} (must be 1..=65535)")]
    InvalidLength(usize),

    /// No NXT is attached to the host.
    #[error("NXT not visible on the USB bus")]
    NotVisible,

    /// The NXT disappeared mid-call.
    #[error("the NXT has been disconnected")]
    Disconnected,

    /// The connection is not open.
    #[error("the connection is not open")]
    NotOpen,

    /// A bulk transfer failed for a reason other than timeout or loss.
    #[error("bulk transfer failed: {0}")]
    Io(#[source] UsbError),

    /// The USB stack failed outside of a transfer.
    #[error("USB stack failure: {0}")]
    Dependent(#[source] UsbError),

    /// The brick answered the packet-mode handshake with the wrong bytes.
    #[error("packet-mode handshake rejected (reply {reply:02x?})")]
    HandshakeFailed { reply: Vec<u8> },
}

pub type Result<T> = std::result::Result<T, LinkError>;

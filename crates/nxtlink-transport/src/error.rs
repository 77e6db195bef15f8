/// Errors that can occur in USB transport operations.
#[derive(Debug, thiserror::Error)]
pub enum UsbError {
    /// No attached USB device carries the NXT vendor/product identity.
    #[error("no NXT is visible on the USB bus")]
    NotFound,

    /// The brick disappeared while it was being used.
    #[error("the NXT has been disconnected")]
    Disconnected,

    /// The underlying USB stack reported a failure.
    #[error("libusb error: {0}")]
    Lib(#[from] rusb::Error),
}

pub type Result<T> = std::result::Result<T, UsbError>;

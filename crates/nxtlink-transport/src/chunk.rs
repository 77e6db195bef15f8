use crate::error::Result;

/// Outcome of a single chunk transfer attempt.
///
/// A bulk transfer can move data and still time out: a device that sends an
/// exact multiple of its packet size leaves the host waiting for more until
/// the clock runs out. Both facts therefore travel together in one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Bytes actually moved by this attempt.
    pub transferred: usize,
    /// Whether the attempt ended because the transfer timeout elapsed.
    pub timed_out: bool,
}

/// A device that moves bytes in bounded chunks.
///
/// One call is one bulk transfer. Implementations report how many bytes
/// moved and whether the attempt timed out; they never retry internally.
/// Accumulation and retry policy live in the layers above.
pub trait BulkTransport {
    /// Read at most `buf.len()` bytes from the device into `buf`.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<Chunk>;

    /// Write at most `buf.len()` bytes from `buf` to the device.
    fn write_chunk(&mut self, buf: &[u8]) -> Result<Chunk>;
}

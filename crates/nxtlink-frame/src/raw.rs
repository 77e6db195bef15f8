//! Accumulation loops over a chunk transport.
//!
//! The NXT moves bytes in bulk transfers of at most 64 bytes, each of which
//! can complete, time out with or without data, or fail. These loops turn
//! that into two predictable operations: read one burst, write one slice.

use nxtlink_transport::{BulkTransport, UsbError};

use crate::error::{LinkError, Result};

/// How an accumulating transfer treats a timed-out chunk that moved no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Wait {
    /// Treat it as "no data yet" and keep trying (the power-on default).
    #[default]
    Forever,
    /// Let it end the transfer with [`LinkError::Timeout`].
    Bounded,
}

/// Read one burst from the device into `buf`.
///
/// Accumulates chunk by chunk until the buffer is full or the device ends
/// the burst with a short packet. An empty `buf` succeeds immediately with
/// no device contact. On [`LinkError::Timeout`] the accumulated count is
/// carried in the error; the bytes themselves are already in `buf`.
pub fn read_into<T: BulkTransport>(dev: &mut T, buf: &mut [u8], wait: Wait) -> Result<usize> {
    if buf.is_empty() {
        return Ok(0);
    }
    let mut total = 0;
    // Set once a chunk times out after moving data: the transfer may have
    // stalled on the device's packet boundary rather than actually ended.
    let mut boundary = false;
    // Whether the one empty retry the boundary case is granted was used.
    let mut retried = false;
    loop {
        let chunk = dev.read_chunk(&mut buf[total..]).map_err(chunk_error)?;
        total += chunk.transferred;
        if total == buf.len() {
            return Ok(total);
        }
        match (chunk.timed_out, chunk.transferred > 0) {
            // A completed chunk with data ends the burst: the device sent a
            // short packet and has nothing more queued for this transfer.
            (false, true) => return Ok(total),

            // A completed empty chunk is the zero-length terminator that
            // resolves a boundary stall; without a stall it only ends a
            // bounded wait.
            (false, false) if boundary || wait == Wait::Bounded => return Ok(total),
            (false, false) => {}

            // Timed out after moving data. A transfer that is an exact
            // multiple of the 64-byte packet size looks exactly like this
            // even though it is complete, so do not conclude anything yet:
            // keep reading, and grant (or re-arm) one empty retry.
            (true, true) => {
                boundary = true;
                retried = false;
            }

            // The single tolerated empty retry after a boundary stall.
            (true, false) if boundary && !retried => retried = true,

            // Stalled twice in a row: the accumulated bytes are the whole
            // transfer. A bounded wait reports how far it got; an unbounded
            // one never surfaces Timeout.
            (true, false) if boundary => {
                return match wait {
                    Wait::Forever => Ok(total),
                    Wait::Bounded => Err(LinkError::Timeout { transferred: total }),
                }
            }

            // A bare timeout: under an unbounded wait this just means "no
            // data yet"; under a bounded one the read ends empty-handed.
            (true, false) => match wait {
                Wait::Forever => {}
                Wait::Bounded => return Err(LinkError::Timeout { transferred: total }),
            },
        }
    }
}

/// Write all of `buf` to the device.
///
/// Chunks that stop short are resumed from where they stopped; nothing is
/// ever written twice. An empty `buf` succeeds immediately with no device
/// contact. Under [`Wait::Bounded`] a timed-out chunk ends the call with
/// the accumulated count in the error.
pub fn write_all<T: BulkTransport>(dev: &mut T, buf: &[u8], wait: Wait) -> Result<usize> {
    if buf.is_empty() {
        return Ok(0);
    }
    let mut total = 0;
    loop {
        let chunk = dev.write_chunk(&buf[total..]).map_err(chunk_error)?;
        total += chunk.transferred;
        if total == buf.len() {
            return Ok(total);
        }
        if chunk.timed_out && wait == Wait::Bounded {
            return Err(LinkError::Timeout { transferred: total });
        }
    }
}

/// Classify a transport failure seen during a transfer.
fn chunk_error(err: UsbError) -> LinkError {
    match err {
        UsbError::Disconnected => LinkError::Disconnected,
        other => LinkError::Io(other),
    }
}

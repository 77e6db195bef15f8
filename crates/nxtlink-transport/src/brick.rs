use std::time::Duration;

use rusb::{Context, Device, DeviceHandle, UsbContext};
use tracing::{debug, info};

use crate::chunk::{BulkTransport, Chunk};
use crate::error::{Result, UsbError};

/// Vendor id the brick enumerates with (the LEGO Group).
pub const VENDOR_LEGO: u16 = 0x0694;
/// Product id of the NXT.
pub const PRODUCT_NXT: u16 = 0x0002;
/// Largest chunk the brick moves in one bulk transfer.
pub const MAX_PACKET: usize = 64;

/// Bulk endpoint the brick transmits on.
const ENDPOINT_IN: u8 = 0x82;
/// Bulk endpoint the brick receives on.
const ENDPOINT_OUT: u8 = 0x01;
const CONFIGURATION: u8 = 1;
const INTERFACE: u8 = 0;

/// Per-chunk transfer deadline.
const CHUNK_TIMEOUT: Duration = Duration::from_secs(20);
/// Short deadline used while draining stale data on open and close.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// An opened NXT with its bulk interface claimed.
///
/// Dropping the brick drains whatever it still had queued, releases the
/// interface and closes the handle.
pub struct NxtBrick {
    handle: DeviceHandle<Context>,
}

impl NxtBrick {
    /// Find the first attached NXT and claim its bulk interface.
    ///
    /// Data the brick had queued from an earlier session is read and
    /// discarded before the device is handed to the caller, so a fresh
    /// session never starts mid-stream.
    pub fn connect() -> Result<Self> {
        let context = Context::new()?;
        let device = Self::find(&context)?;
        let mut handle = device.open().map_err(open_error)?;
        handle
            .set_active_configuration(CONFIGURATION)
            .map_err(open_error)?;
        handle.claim_interface(INTERFACE).map_err(open_error)?;
        info!(
            bus = device.bus_number(),
            address = device.address(),
            "opened NXT brick"
        );
        let mut brick = Self { handle };
        brick.drain();
        Ok(brick)
    }

    /// Scan the bus for the first device with the NXT identity.
    fn find(context: &Context) -> Result<Device<Context>> {
        for device in context.devices()?.iter() {
            let descriptor = device.device_descriptor()?;
            if descriptor.vendor_id() == VENDOR_LEGO && descriptor.product_id() == PRODUCT_NXT {
                return Ok(device);
            }
        }
        Err(UsbError::NotFound)
    }

    /// Read and discard whatever the brick has queued.
    fn drain(&mut self) {
        let mut scratch = [0u8; MAX_PACKET];
        let mut discarded = 0usize;
        loop {
            match self
                .handle
                .read_bulk(ENDPOINT_IN, &mut scratch, DRAIN_TIMEOUT)
            {
                Ok(n) if n > 0 => discarded += n,
                _ => break,
            }
        }
        if discarded > 0 {
            debug!(discarded, "drained stale data from the brick");
        }
    }
}

impl BulkTransport for NxtBrick {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<Chunk> {
        match self.handle.read_bulk(ENDPOINT_IN, buf, CHUNK_TIMEOUT) {
            Ok(n) => Ok(Chunk {
                transferred: n,
                timed_out: false,
            }),
            Err(err) => chunk_outcome(err),
        }
    }

    fn write_chunk(&mut self, buf: &[u8]) -> Result<Chunk> {
        match self.handle.write_bulk(ENDPOINT_OUT, buf, CHUNK_TIMEOUT) {
            Ok(n) => Ok(Chunk {
                transferred: n,
                timed_out: false,
            }),
            Err(err) => chunk_outcome(err),
        }
    }
}

impl Drop for NxtBrick {
    fn drop(&mut self) {
        debug!("closing NXT brick");
        self.drain();
        // DeviceHandle releases the claimed interface and closes on drop.
    }
}

impl std::fmt::Debug for NxtBrick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NxtBrick")
            .field("vendor", &VENDOR_LEGO)
            .field("product", &PRODUCT_NXT)
            .finish()
    }
}

/// Map a transfer-path rusb failure onto the chunk contract.
///
/// rusb reports a bulk timeout as an error and discards the partial count
/// libusb tracked, so a timed-out attempt surfaces here as a zero-progress
/// chunk rather than as data plus a flag.
fn chunk_outcome(err: rusb::Error) -> Result<Chunk> {
    match err {
        rusb::Error::Timeout => Ok(Chunk {
            transferred: 0,
            timed_out: true,
        }),
        rusb::Error::NoDevice => Err(UsbError::Disconnected),
        other => Err(other.into()),
    }
}

/// Map an open-path rusb failure; losing the device mid-open is still loss.
fn open_error(err: rusb::Error) -> UsbError {
    match err {
        rusb::Error::NoDevice => UsbError::Disconnected,
        other => UsbError::Lib(other),
    }
}

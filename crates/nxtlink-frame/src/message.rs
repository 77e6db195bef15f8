//! Length-prefixed frames over the byte stream.
//!
//! Wire format: 2-byte little-endian payload length, then the payload.
//! Length 0 carries no payload and is reserved as the shutdown request;
//! nothing else may put it on the wire.

use nxtlink_transport::BulkTransport;

use crate::error::{LinkError, Result};
use crate::raw::{self, Wait};
use crate::stream::ByteStream;

/// Bytes in the length prefix.
pub const HEADER_SIZE: usize = 2;

/// Largest payload one frame can carry.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// The zero-length frame requesting link shutdown.
const EXIT_FRAME: [u8; HEADER_SIZE] = [0x00, 0x00];

/// One unit of traffic from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Application payload, 1 to 65535 bytes.
    Data(Vec<u8>),
    /// The peer asked for the link to be shut down.
    Exit,
}

impl Message {
    /// Payload length in bytes (0 for the shutdown request).
    pub fn len(&self) -> usize {
        match self {
            Message::Data(payload) => payload.len(),
            Message::Exit => 0,
        }
    }

    /// True only for the shutdown request.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: BulkTransport> ByteStream<T> {
    /// Frame `payload` and force it out.
    ///
    /// Rejects lengths outside `1..=65535` before touching anything. Bytes
    /// already queued when a later step fails stay queued; nothing is
    /// rolled back. The call's outcome is the final flush's outcome.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        if payload.is_empty() || payload.len() > MAX_PAYLOAD {
            return Err(LinkError::InvalidLength(payload.len()));
        }
        let [lsb, msb] = (payload.len() as u16).to_le_bytes();
        self.write_byte(lsb)?;
        self.write_byte(msb)?;
        for &byte in payload {
            self.write_byte(byte)?;
        }
        self.flush().map(|_| ())
    }

    /// Read the next frame.
    ///
    /// A zero length announces the peer's shutdown request and allocates
    /// nothing. Any failure mid-frame aborts the call with no partial
    /// payload; the stream is then mid-frame, so the session should be
    /// shut down rather than read again.
    pub fn receive(&mut self) -> Result<Message> {
        let lsb = self.read_byte()?;
        let msb = self.read_byte()?;
        let length = u16::from_le_bytes([lsb, msb]) as usize;
        if length == 0 {
            return Ok(Message::Exit);
        }
        let mut payload = vec![0u8; length];
        for slot in payload.iter_mut() {
            *slot = self.read_byte()?;
        }
        Ok(Message::Data(payload))
    }

    /// Put the zero-length shutdown frame on the wire.
    ///
    /// The frame bypasses the output queue (callers flush it first) and
    /// always waits for the device to take it, whatever the stream's wait
    /// policy says.
    pub fn send_exit(&mut self) -> Result<()> {
        raw::write_all(self.get_mut(), &EXIT_FRAME, Wait::Forever).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use nxtlink_transport::{BulkTransport, Chunk, UsbError};

    use super::*;
    use crate::error::Status;
    use crate::stream::BUFFER_SIZE;

    /// Greedy capture on writes, scripted chunks on reads.
    struct ScriptedDevice {
        reads: Vec<ReadStep>,
        next_read: usize,
        captured: Vec<u8>,
    }

    enum ReadStep {
        Chunk(Vec<u8>, bool),
        Loss,
    }

    impl ScriptedDevice {
        fn new(reads: Vec<ReadStep>) -> Self {
            Self {
                reads,
                next_read: 0,
                captured: Vec::new(),
            }
        }

        /// Script that serves `wire` to the read loop in device-sized chunks.
        fn serving(wire: &[u8]) -> Self {
            let reads = wire
                .chunks(BUFFER_SIZE)
                .map(|chunk| ReadStep::Chunk(chunk.to_vec(), false))
                .collect();
            Self::new(reads)
        }
    }

    impl BulkTransport for ScriptedDevice {
        fn read_chunk(&mut self, buf: &mut [u8]) -> nxtlink_transport::Result<Chunk> {
            let step = self.reads.get(self.next_read).expect("read script exhausted");
            self.next_read += 1;
            match step {
                ReadStep::Chunk(data, timed_out) => {
                    buf[..data.len()].copy_from_slice(data);
                    Ok(Chunk {
                        transferred: data.len(),
                        timed_out: *timed_out,
                    })
                }
                ReadStep::Loss => Err(UsbError::Disconnected),
            }
        }

        fn write_chunk(&mut self, buf: &[u8]) -> nxtlink_transport::Result<Chunk> {
            self.captured.extend_from_slice(buf);
            Ok(Chunk {
                transferred: buf.len(),
                timed_out: false,
            })
        }
    }

    /// Fails the test if touched.
    struct Untouchable;

    impl BulkTransport for Untouchable {
        fn read_chunk(&mut self, _buf: &mut [u8]) -> nxtlink_transport::Result<Chunk> {
            panic!("device must not be touched");
        }

        fn write_chunk(&mut self, _buf: &[u8]) -> nxtlink_transport::Result<Chunk> {
            panic!("device must not be touched");
        }
    }

    #[test]
    fn length_prefix_is_little_endian() {
        let mut stream = ByteStream::new(ScriptedDevice::new(Vec::new()), Wait::Forever);
        stream.send(b"hi").unwrap();
        assert_eq!(stream.get_mut().captured, &[0x02, 0x00, b'h', b'i']);
    }

    #[test]
    fn frames_round_trip() {
        let payload: Vec<u8> = (0..300).map(|i| (i % 251) as u8).collect();
        let mut out = ByteStream::new(ScriptedDevice::new(Vec::new()), Wait::Forever);
        out.send(&payload).unwrap();
        let wire = out.into_inner().captured;

        let mut inn = ByteStream::new(ScriptedDevice::serving(&wire), Wait::Forever);
        assert_eq!(inn.receive().unwrap(), Message::Data(payload));
    }

    #[test]
    fn largest_frame_round_trips() {
        let payload: Vec<u8> = (0..MAX_PAYLOAD).map(|i| (i % 251) as u8).collect();
        let mut out = ByteStream::new(ScriptedDevice::new(Vec::new()), Wait::Forever);
        out.send(&payload).unwrap();
        let wire = out.into_inner().captured;
        assert_eq!(wire.len(), HEADER_SIZE + MAX_PAYLOAD);
        assert_eq!(&wire[..2], &[0xff, 0xff]);

        let mut inn = ByteStream::new(ScriptedDevice::serving(&wire), Wait::Forever);
        assert_eq!(inn.receive().unwrap(), Message::Data(payload));
    }

    #[test]
    fn zero_length_send_is_rejected_before_any_io() {
        let mut stream = ByteStream::new(Untouchable, Wait::Forever);
        assert!(matches!(
            stream.send(&[]).unwrap_err(),
            LinkError::InvalidLength(0)
        ));
    }

    #[test]
    fn oversize_send_is_rejected_before_any_io() {
        let mut stream = ByteStream::new(Untouchable, Wait::Forever);
        let payload = vec![0u8; MAX_PAYLOAD + 1];
        assert!(matches!(
            stream.send(&payload).unwrap_err(),
            LinkError::InvalidLength(65536)
        ));
    }

    #[test]
    fn zero_length_frame_is_the_exit_request() {
        let mut stream = ByteStream::new(
            ScriptedDevice::new(vec![ReadStep::Chunk(vec![0x00, 0x00], false)]),
            Wait::Forever,
        );
        let message = stream.receive().unwrap();
        assert_eq!(message, Message::Exit);
        assert!(message.is_empty());
    }

    #[test]
    fn header_may_straddle_refills() {
        let mut stream = ByteStream::new(
            ScriptedDevice::new(vec![
                ReadStep::Chunk(vec![0x02], false),
                ReadStep::Chunk(vec![0x00, b'h', b'i'], false),
            ]),
            Wait::Forever,
        );
        assert_eq!(stream.receive().unwrap(), Message::Data(b"hi".to_vec()));
    }

    #[test]
    fn failure_mid_frame_yields_no_partial_payload() {
        let mut stream = ByteStream::new(
            ScriptedDevice::new(vec![
                ReadStep::Chunk(vec![0x05, 0x00, b'a'], false),
                ReadStep::Loss,
            ]),
            Wait::Forever,
        );
        assert!(matches!(
            stream.receive().unwrap_err(),
            LinkError::Disconnected
        ));
    }

    #[test]
    fn send_exit_bypasses_the_queue() {
        let mut stream = ByteStream::new(ScriptedDevice::new(Vec::new()), Wait::Forever);
        stream.write_byte(b'x').unwrap();
        stream.send_exit().unwrap();
        // The exit frame went out ahead of the queued byte.
        assert_eq!(stream.get_mut().captured, &[0x00, 0x00]);
        assert_eq!(stream.flush().unwrap(), Status::Done);
        assert_eq!(stream.get_mut().captured, &[0x00, 0x00, b'x']);
    }
}

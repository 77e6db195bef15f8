use nxtlink_transport::BulkTransport;
use tracing::trace;

use crate::error::{LinkError, Result, Status};
use crate::raw::{self, Wait};

/// Capacity of each direction's buffer.
///
/// Must exceed the largest chunk the transport moves in one transfer
/// (64 bytes for the NXT) so a refill or flush is a single raw call in the
/// common case.
pub const BUFFER_SIZE: usize = 512;

/// Byte-level buffered I/O over a chunk transport.
///
/// Holds one fixed input buffer (valid length plus read cursor) and one
/// fixed output buffer (queued length, always transmitted from the front).
/// Consumed input bytes are never delivered twice; queued output bytes are
/// never transmitted twice.
pub struct ByteStream<T> {
    dev: T,
    wait: Wait,
    in_buf: Box<[u8; BUFFER_SIZE]>,
    /// Valid bytes in `in_buf`; `in_pos..in_len` is still unread.
    in_len: usize,
    in_pos: usize,
    out_buf: Box<[u8; BUFFER_SIZE]>,
    /// Bytes queued in `out_buf`, flushed from index 0.
    out_len: usize,
}

impl<T: BulkTransport> ByteStream<T> {
    /// Wrap an opened device with fresh, empty buffers.
    pub fn new(dev: T, wait: Wait) -> Self {
        Self {
            dev,
            wait,
            in_buf: Box::new([0; BUFFER_SIZE]),
            in_len: 0,
            in_pos: 0,
            out_buf: Box::new([0; BUFFER_SIZE]),
            out_len: 0,
        }
    }

    /// Replace the wait policy used by refills and flushes.
    pub fn set_wait(&mut self, wait: Wait) {
        self.wait = wait;
    }

    /// The wait policy currently in force.
    pub fn wait(&self) -> Wait {
        self.wait
    }

    /// Next byte from the device, refilling the input buffer if needed.
    ///
    /// A refill only happens once every banked byte has been consumed, so
    /// no data is ever discarded. A refill that timed out may still have
    /// banked bytes; only a buffer that stays empty fails the call.
    pub fn read_byte(&mut self) -> Result<u8> {
        if self.in_pos >= self.in_len {
            match self.fill() {
                Ok(()) | Err(LinkError::Timeout { .. }) => {}
                Err(err) => return Err(err),
            }
            if self.in_pos >= self.in_len {
                return Err(LinkError::Timeout { transferred: 0 });
            }
        }
        let byte = self.in_buf[self.in_pos];
        self.in_pos += 1;
        Ok(byte)
    }

    /// Queue one byte, flushing first if the output buffer is full.
    ///
    /// A flush that timed out may still have made room; only a buffer that
    /// stays full fails the call.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        if self.out_len >= BUFFER_SIZE {
            match self.flush() {
                Ok(_) | Err(LinkError::Timeout { .. }) => {}
                Err(err) => return Err(err),
            }
            if self.out_len >= BUFFER_SIZE {
                return Err(LinkError::Timeout { transferred: 0 });
            }
        }
        self.out_buf[self.out_len] = byte;
        self.out_len += 1;
        Ok(())
    }

    /// Transmit every queued byte.
    ///
    /// An empty queue reports [`Status::NoEffect`] without touching the
    /// device. When a bounded flush times out, the bytes that did move
    /// leave the queue and the unsent tail slides to the front, so nothing
    /// is transmitted twice and nothing is dropped.
    pub fn flush(&mut self) -> Result<Status> {
        if self.out_len == 0 {
            return Ok(Status::NoEffect);
        }
        match raw::write_all(&mut self.dev, &self.out_buf[..self.out_len], self.wait) {
            Ok(_) => {
                self.out_len = 0;
                Ok(Status::Done)
            }
            Err(err) => {
                if let LinkError::Timeout { transferred } = err {
                    self.out_buf.copy_within(transferred..self.out_len, 0);
                    self.out_len -= transferred;
                    trace!(sent = transferred, queued = self.out_len, "partial flush");
                }
                Err(err)
            }
        }
    }

    /// Refill the input buffer at full capacity.
    fn fill(&mut self) -> Result<()> {
        self.in_len = 0;
        self.in_pos = 0;
        match raw::read_into(&mut self.dev, &mut self.in_buf[..], self.wait) {
            Ok(n) => {
                self.in_len = n;
                Ok(())
            }
            Err(err) => {
                // A timed-out refill still banked its partial bytes.
                if let LinkError::Timeout { transferred } = err {
                    self.in_len = transferred;
                }
                Err(err)
            }
        }
    }

    /// Mutably borrow the underlying device.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.dev
    }

    /// Consume the stream and return the device.
    pub fn into_inner(self) -> T {
        self.dev
    }
}

#[cfg(test)]
mod tests {
    use nxtlink_transport::{BulkTransport, Chunk, UsbError};

    use super::*;

    /// Serves scripted read chunks; write attempts are captured greedily.
    struct ScriptedDevice {
        reads: Vec<ReadStep>,
        next_read: usize,
        writes: Vec<WriteStep>,
        next_write: usize,
        captured: Vec<u8>,
    }

    enum ReadStep {
        Chunk(Vec<u8>, bool),
        Loss,
    }

    enum WriteStep {
        Take(usize, bool),
        Loss,
    }

    impl ScriptedDevice {
        fn reading(reads: Vec<ReadStep>) -> Self {
            Self {
                reads,
                next_read: 0,
                writes: Vec::new(),
                next_write: 0,
                captured: Vec::new(),
            }
        }

        fn writing(writes: Vec<WriteStep>) -> Self {
            Self {
                reads: Vec::new(),
                next_read: 0,
                writes,
                next_write: 0,
                captured: Vec::new(),
            }
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
            // An empty write script accepts everything in one chunk.
            if self.writes.is_empty() {
                self.captured.extend_from_slice(buf);
                return Ok(Chunk {
                    transferred: buf.len(),
                    timed_out: false,
                });
            }
            let step = self
                .writes
                .get(self.next_write)
                .expect("write script exhausted");
            self.next_write += 1;
            match step {
                WriteStep::Take(limit, timed_out) => {
                    let n = (*limit).min(buf.len());
                    self.captured.extend_from_slice(&buf[..n]);
                    Ok(Chunk {
                        transferred: n,
                        timed_out: *timed_out,
                    })
                }
                WriteStep::Loss => Err(UsbError::Disconnected),
            }
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
    fn one_refill_serves_many_bytes() {
        let dev = ScriptedDevice::reading(vec![
            ReadStep::Chunk(b"abc".to_vec(), false),
            ReadStep::Chunk(b"d".to_vec(), false),
        ]);
        let mut stream = ByteStream::new(dev, Wait::Forever);
        assert_eq!(stream.read_byte().unwrap(), b'a');
        assert_eq!(stream.read_byte().unwrap(), b'b');
        assert_eq!(stream.read_byte().unwrap(), b'c');
        // Only now is the device asked again.
        assert_eq!(stream.read_byte().unwrap(), b'd');
        assert_eq!(stream.get_mut().next_read, 2);
    }

    #[test]
    fn timed_out_refill_still_serves_banked_bytes() {
        // The refill concludes with a bounded timeout after banking two
        // bytes; read_byte must deliver them anyway.
        let dev = ScriptedDevice::reading(vec![
            ReadStep::Chunk(b"ab".to_vec(), true),
            ReadStep::Chunk(Vec::new(), true),
            ReadStep::Chunk(Vec::new(), true),
        ]);
        let mut stream = ByteStream::new(dev, Wait::Bounded);
        assert_eq!(stream.read_byte().unwrap(), b'a');
        assert_eq!(stream.read_byte().unwrap(), b'b');
    }

    #[test]
    fn empty_refill_reports_timeout() {
        let dev = ScriptedDevice::reading(vec![ReadStep::Chunk(Vec::new(), true)]);
        let mut stream = ByteStream::new(dev, Wait::Bounded);
        let err = stream.read_byte().unwrap_err();
        assert!(matches!(err, LinkError::Timeout { transferred: 0 }));
    }

    #[test]
    fn fatal_refill_error_propagates() {
        let dev = ScriptedDevice::reading(vec![ReadStep::Loss]);
        let mut stream = ByteStream::new(dev, Wait::Forever);
        assert!(matches!(
            stream.read_byte().unwrap_err(),
            LinkError::Disconnected
        ));
    }

    #[test]
    fn flush_of_an_empty_queue_is_a_no_op() {
        let mut stream = ByteStream::new(Untouchable, Wait::Forever);
        assert_eq!(stream.flush().unwrap(), Status::NoEffect);
    }

    #[test]
    fn queued_bytes_stay_local_until_flush() {
        let mut stream = ByteStream::new(Untouchable, Wait::Forever);
        for byte in 0..10u8 {
            stream.write_byte(byte).unwrap();
        }
        // Dropping the stream must not flush either.
    }

    #[test]
    fn flush_transmits_the_queue() {
        let dev = ScriptedDevice::writing(Vec::new());
        let mut stream = ByteStream::new(dev, Wait::Forever);
        for &byte in b"nxt" {
            stream.write_byte(byte).unwrap();
        }
        assert_eq!(stream.flush().unwrap(), Status::Done);
        assert_eq!(stream.get_mut().captured, b"nxt");
        // The queue is empty again.
        assert_eq!(stream.flush().unwrap(), Status::NoEffect);
    }

    #[test]
    fn partial_flush_keeps_only_the_unsent_tail() {
        let dev = ScriptedDevice::writing(vec![
            WriteStep::Take(3, true),
            WriteStep::Take(512, false),
        ]);
        let mut stream = ByteStream::new(dev, Wait::Bounded);
        for byte in 1..=8u8 {
            stream.write_byte(byte).unwrap();
        }
        let err = stream.flush().unwrap_err();
        assert!(matches!(err, LinkError::Timeout { transferred: 3 }));
        // The second flush transmits exactly the five unsent bytes.
        assert_eq!(stream.flush().unwrap(), Status::Done);
        assert_eq!(stream.get_mut().captured, &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn write_byte_flushes_a_full_buffer() {
        let dev = ScriptedDevice::writing(Vec::new());
        let mut stream = ByteStream::new(dev, Wait::Forever);
        for _ in 0..BUFFER_SIZE {
            stream.write_byte(0xaa).unwrap();
        }
        // The buffer is full; the next byte forces a flush first.
        stream.write_byte(0xbb).unwrap();
        assert_eq!(stream.get_mut().captured.len(), BUFFER_SIZE);
        assert_eq!(stream.flush().unwrap(), Status::Done);
        assert_eq!(stream.get_mut().captured.len(), BUFFER_SIZE + 1);
        assert_eq!(*stream.get_mut().captured.last().unwrap(), 0xbb);
    }

    #[test]
    fn write_byte_fails_when_no_room_can_be_made() {
        let dev = ScriptedDevice::writing(vec![WriteStep::Take(0, true)]);
        let mut stream = ByteStream::new(dev, Wait::Bounded);
        for _ in 0..BUFFER_SIZE {
            stream.write_byte(0xaa).unwrap();
        }
        let err = stream.write_byte(0xbb).unwrap_err();
        assert!(matches!(err, LinkError::Timeout { transferred: 0 }));
    }

    #[test]
    fn write_byte_surfaces_fatal_flush_errors() {
        let dev = ScriptedDevice::writing(vec![WriteStep::Loss]);
        let mut stream = ByteStream::new(dev, Wait::Forever);
        for _ in 0..BUFFER_SIZE {
            stream.write_byte(0xaa).unwrap();
        }
        assert!(matches!(
            stream.write_byte(0xbb).unwrap_err(),
            LinkError::Disconnected
        ));
    }
}

use nxtlink_frame::raw::{self, Wait};
use nxtlink_frame::{ByteStream, LinkError, Message, Result, Status, BUFFER_SIZE};
use nxtlink_transport::{BulkTransport, NxtBrick, UsbError};
use tracing::{debug, info, warn};

/// First byte of the mode-switch command: a system command expecting a reply.
const SYSTEM_COMMAND_REPLY: u8 = 0x01;
/// leJOS system command that switches the firmware into packet-stream mode.
const NXJ_PACKET_MODE: u8 = 0xff;
/// The confirmation the firmware sends once packet mode is active.
const PACKET_MODE_ACK: [u8; 3] = [0x02, 0xfe, 0xef];

/// A packet-mode link to one NXT.
///
/// Starts closed. [`open`](Connection::open) performs the mode-switch
/// handshake; [`close`](Connection::close) (or dropping the value) runs
/// the coordinated shutdown. All I/O on a closed connection fails with
/// [`LinkError::NotOpen`]. The wait policy outlives individual sessions.
pub struct Connection<T: BulkTransport> {
    stream: Option<ByteStream<T>>,
    wait: Wait,
}

impl<T: BulkTransport> Connection<T> {
    /// A closed connection with the default (unbounded) wait policy.
    pub fn new() -> Self {
        Self {
            stream: None,
            wait: Wait::default(),
        }
    }

    /// Whether a session is currently open.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// The wait policy in force for this and future sessions.
    pub fn wait(&self) -> Wait {
        self.wait
    }

    /// Set the wait policy, applying it to the live session if one exists.
    pub fn set_wait(&mut self, wait: Wait) {
        self.wait = wait;
        if let Some(stream) = self.stream.as_mut() {
            stream.set_wait(wait);
        }
    }

    /// Open a session over the device the connector produces.
    ///
    /// An already-open connection reports [`Status::NoEffect`] without
    /// running the connector. Any failure on the way drops the device
    /// again: the connection stays closed and keeps nothing.
    pub fn open_with<F>(&mut self, connect: F) -> Result<Status>
    where
        F: FnOnce() -> nxtlink_transport::Result<T>,
    {
        if self.stream.is_some() {
            return Ok(Status::NoEffect);
        }
        let mut dev = connect().map_err(open_error)?;
        enter_packet_mode(&mut dev)?;
        self.stream = Some(ByteStream::new(dev, self.wait));
        info!("packet-mode session open");
        Ok(Status::Done)
    }

    /// Send one message to the brick.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        match self.stream.as_mut() {
            Some(stream) => stream.send(payload),
            None => Err(LinkError::NotOpen),
        }
    }

    /// Receive the next message from the brick.
    pub fn receive(&mut self) -> Result<Message> {
        match self.stream.as_mut() {
            Some(stream) => stream.receive(),
            None => Err(LinkError::NotOpen),
        }
    }

    /// Shut the session down and release the device.
    ///
    /// Best-effort: flush what is queued, announce the shutdown with the
    /// zero-length frame, then drain the peer until it confirms with its
    /// own. However far that gets, the device is released exactly once and
    /// failures are logged rather than surfaced. A closed connection is
    /// left alone. The remembered wait policy is not affected by the
    /// unbounded waits used here.
    pub fn close(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        // The shutdown exchange must not give up on a bare timeout.
        stream.set_wait(Wait::Forever);
        match stream.flush() {
            // An already-empty queue is fine; the exchange still runs.
            Ok(_) => match stream.send_exit() {
                Ok(()) => drain_peer(&mut stream),
                Err(err) => warn!(%err, "could not send the exit frame"),
            },
            Err(err) => warn!(%err, "could not flush before shutdown"),
        }
        // Dropping the stream drops the device, which closes it.
        info!("session closed");
    }
}

impl Connection<NxtBrick> {
    /// Find the first attached NXT and open a session over it.
    pub fn open(&mut self) -> Result<Status> {
        self.open_with(NxtBrick::connect)
    }
}

impl<T: BulkTransport> Default for Connection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: BulkTransport> Drop for Connection<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Switch the firmware into packet mode.
///
/// Runs through the raw layer: the stream buffers do not exist yet, and
/// the exchange never gives up on a bare timeout. The reply must match the
/// confirmation byte for byte, in full.
fn enter_packet_mode<T: BulkTransport>(dev: &mut T) -> Result<()> {
    let request = [SYSTEM_COMMAND_REPLY, NXJ_PACKET_MODE];
    raw::write_all(dev, &request, Wait::Forever)?;
    let mut reply = [0u8; BUFFER_SIZE];
    let n = raw::read_into(dev, &mut reply, Wait::Forever)?;
    if reply[..n] != PACKET_MODE_ACK {
        debug!(reply = ?&reply[..n], "unexpected packet-mode reply");
        return Err(LinkError::HandshakeFailed {
            reply: reply[..n].to_vec(),
        });
    }
    Ok(())
}

/// Discard the peer's in-flight frames until it confirms the shutdown.
fn drain_peer<T: BulkTransport>(stream: &mut ByteStream<T>) {
    loop {
        match stream.receive() {
            Ok(Message::Exit) => {
                debug!("peer confirmed shutdown");
                return;
            }
            Ok(message) => {
                debug!(discarded = message.len(), "discarding frame during shutdown");
            }
            Err(err) => {
                warn!(%err, "shutdown drain ended early");
                return;
            }
        }
    }
}

/// Classify a connector failure at the session boundary.
fn open_error(err: UsbError) -> LinkError {
    match err {
        UsbError::NotFound => LinkError::NotVisible,
        UsbError::Disconnected => LinkError::Disconnected,
        other => LinkError::Dependent(other),
    }
}

//! Byte-stream transports.
//!
//! The session needs very little from the link to the module: write bytes,
//! see how many bytes are waiting, take them, and wait a bounded time for
//! more. There are no framing guarantees; a read may hold part of a line or
//! several lines.

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, trace};

/// Interval at which the default [`Transport::wait_readable`] polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Size of a single read from the underlying stream.
const READ_CHUNK: usize = 256;

/// A byte-stream link to the module.
pub trait Transport {
    /// Write all of `data`.
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush buffered writes to the device.
    fn flush(&mut self) -> io::Result<()>;

    /// Number of bytes that can be read without blocking.
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Take every byte currently available, possibly none. Never blocks.
    fn read_available(&mut self) -> io::Result<Vec<u8>>;

    /// Wait up to `timeout` for data to become available.
    ///
    /// Returns `true` as soon as at least one byte can be read. The default
    /// polls [`Transport::bytes_available`] every [`POLL_INTERVAL`], sleeping
    /// the remainder; transports with a real blocking wait override it.
    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.bytes_available()? > 0 {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Release the link. Further calls may fail.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        (**self).bytes_available()
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        (**self).read_available()
    }

    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        (**self).wait_readable(timeout)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

// ============================================================================
// Stream Transport
// ============================================================================

/// Transport over any blocking `Read`/`Write` pair.
///
/// A reader thread performs the blocking reads and forwards each chunk over a
/// channel, so [`Transport::wait_readable`] becomes a single receive with a
/// deadline instead of a poll loop. Used for serial device files and for TCP
/// bridges to a module.
pub struct StreamTransport {
    name: String,
    writer: Option<Box<dyn Write + Send>>,
    chunks: Receiver<io::Result<Vec<u8>>>,
    buffered: VecDeque<u8>,
    failure: Option<io::Error>,
    tcp: Option<TcpStream>,
    reader: Option<JoinHandle<()>>,
}

impl StreamTransport {
    /// Create a transport from a reader and a writer for the same link.
    pub fn new<R, W>(name: impl Into<String>, reader: R, writer: W) -> io::Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let name = name.into();
        let (tx, rx) = crossbeam_channel::unbounded();
        let thread_name = name.clone();
        let reader = thread::Builder::new()
            .name(format!("rx-{}", name))
            .spawn(move || reader_main(&thread_name, reader, tx))?;

        Ok(StreamTransport {
            name,
            writer: Some(Box::new(writer)),
            chunks: rx,
            buffered: VecDeque::new(),
            failure: None,
            tcp: None,
            reader: Some(reader),
        })
    }

    /// Open a serial device node (e.g. `/dev/ttyACM0`) for reading and writing.
    ///
    /// Line settings such as the baud rate are left as the device has them.
    pub fn open_device(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let reader = file.try_clone()?;
        Self::new(path.display().to_string(), reader, file)
    }

    /// Connect to a module exposed over TCP.
    pub fn connect_tcp(addr: impl ToSocketAddrs + std::fmt::Display) -> io::Result<Self> {
        let name = addr.to_string();
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let reader = stream.try_clone()?;
        let control = stream.try_clone()?;
        let mut transport = Self::new(name, reader, stream)?;
        transport.tcp = Some(control);
        Ok(transport)
    }

    /// Name of the link, for logging.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Move everything the reader thread has delivered into the local buffer.
    fn drain(&mut self) {
        loop {
            match self.chunks.try_recv() {
                Ok(Ok(chunk)) => self.buffered.extend(chunk),
                Ok(Err(e)) => self.failure = Some(e),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.failure.is_none() {
                        self.failure = Some(reader_stopped());
                    }
                    break;
                }
            }
        }
    }

    /// Report a reader failure once buffered data has been consumed.
    fn check_failure(&mut self) -> io::Result<()> {
        if self.buffered.is_empty() {
            if let Some(e) = self.failure.take() {
                return Err(e);
            }
        }
        Ok(())
    }

    fn writer(&mut self) -> io::Result<&mut Box<dyn Write + Send>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "transport closed"))
    }
}

impl Transport for StreamTransport {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        Write::write_all(self.writer()?, data)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(self.writer()?)
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        self.drain();
        self.check_failure()?;
        Ok(self.buffered.len())
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        self.drain();
        self.check_failure()?;
        Ok(self.buffered.drain(..).collect())
    }

    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        self.drain();
        self.check_failure()?;
        if !self.buffered.is_empty() {
            return Ok(true);
        }
        match self.chunks.recv_timeout(timeout) {
            Ok(Ok(chunk)) => {
                self.buffered.extend(chunk);
                Ok(!self.buffered.is_empty())
            }
            Ok(Err(e)) => Err(e),
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => Err(reader_stopped()),
        }
    }

    /// Flush and release the write side, and shut down a TCP link.
    ///
    /// Does not wait for the reader thread. For a device file the thread's
    /// cloned handle stays open while its read is blocked; it is released
    /// when that read returns after the transport is dropped. A device that
    /// never sends again keeps that handle open until the process exits.
    fn close(&mut self) -> io::Result<()> {
        let mut flushed = Ok(());
        if let Some(mut writer) = self.writer.take() {
            debug!("Closing {}", self.name);
            flushed = Write::flush(&mut writer);
        }
        if let Some(stream) = self.tcp.take() {
            // Unblocks the reader thread.
            let _ = stream.shutdown(Shutdown::Both);
        }
        // A reader blocked on a device file exits on its next read; don't wait for it.
        if let Some(reader) = self.reader.take() {
            if reader.is_finished() {
                let _ = reader.join();
            }
        }
        flushed
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for StreamTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("name", &self.name)
            .field("buffered", &self.buffered.len())
            .field("open", &self.writer.is_some())
            .finish()
    }
}

/// Reader thread: forward chunks until the stream ends or the receiver goes away.
fn reader_main<R: Read>(name: &str, mut reader: R, tx: Sender<io::Result<Vec<u8>>>) {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                let _ = tx.send(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("{} closed", name),
                )));
                break;
            }
            Ok(n) => {
                trace!("{}: read {} bytes", name, n);
                if tx.send(Ok(buf[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = tx.send(Err(e));
                break;
            }
        }
    }
    trace!("{}: reader stopped", name);
}

fn reader_stopped() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "reader thread stopped")
}

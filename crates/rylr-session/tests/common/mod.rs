//! Shared test helpers: an in-memory module that answers from a script.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use rylr_session::{CommandSession, SessionTimeouts, Transport};

/// Short timeouts so silent-module tests finish quickly.
pub const TEST_TIMEOUTS: SessionTimeouts = SessionTimeouts {
    config: Duration::from_millis(50),
    transmit: Duration::from_millis(80),
};

/// A transport that plays back scripted module output.
///
/// Each complete command written pops the next reply script and makes its
/// chunks readable. Every read hands out exactly one chunk, so tests control
/// where reads split the stream.
#[derive(Default)]
pub struct ScriptedTransport {
    written: Rc<RefCell<Vec<Vec<u8>>>>,
    replies: VecDeque<Vec<Vec<u8>>>,
    incoming: VecDeque<Vec<u8>>,
    broken: bool,
    closed: Rc<Cell<bool>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the module's answer to the next command, as read chunks.
    pub fn reply(mut self, chunks: &[&str]) -> Self {
        self.replies
            .push_back(chunks.iter().map(|c| c.as_bytes().to_vec()).collect());
        self
    }

    /// The next command gets no answer at all.
    pub fn silent(self) -> Self {
        self.reply(&[])
    }

    /// Output available before any command is sent.
    pub fn incoming(mut self, chunks: &[&str]) -> Self {
        self.incoming
            .extend(chunks.iter().map(|c| c.as_bytes().to_vec()));
        self
    }

    /// Fail reads once scripted input runs out.
    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    /// Handle to the commands written, readable after the session takes ownership.
    pub fn written_handle(&self) -> Rc<RefCell<Vec<Vec<u8>>>> {
        self.written.clone()
    }

    /// Handle to the closed flag.
    pub fn closed_handle(&self) -> Rc<Cell<bool>> {
        self.closed.clone()
    }

    fn out_of_input(&self) -> io::Result<()> {
        if self.broken && self.incoming.is_empty() {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"))
        } else {
            Ok(())
        }
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        if self.closed.get() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "closed"));
        }
        self.written.borrow_mut().push(data.to_vec());
        if data.ends_with(b"\r\n") {
            if let Some(chunks) = self.replies.pop_front() {
                self.incoming.extend(chunks);
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        self.out_of_input()?;
        Ok(self.incoming.front().map_or(0, |c| c.len()))
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        self.out_of_input()?;
        Ok(self.incoming.pop_front().unwrap_or_default())
    }

    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        self.out_of_input()?;
        if self.incoming.is_empty() {
            thread::sleep(timeout);
            Ok(false)
        } else {
            Ok(true)
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed.set(true);
        Ok(())
    }
}

/// Commands written so far, without terminators.
pub fn commands(written: &Rc<RefCell<Vec<Vec<u8>>>>) -> Vec<String> {
    written
        .borrow()
        .iter()
        .map(|w| {
            String::from_utf8_lossy(w)
                .trim_end_matches("\r\n")
                .to_string()
        })
        .collect()
}

/// A session over `transport` with test timeouts, plus its write log.
pub fn session(
    transport: ScriptedTransport,
) -> (CommandSession<ScriptedTransport>, Rc<RefCell<Vec<Vec<u8>>>>) {
    let written = transport.written_handle();
    (CommandSession::new(transport, TEST_TIMEOUTS), written)
}

//! Mock implementation of [crate::Descriptor] for testing buffers without
//! sockets.

use crate::Descriptor;
use bytes::{Buf, BytesMut};
use std::io;

/// A scripted in-memory descriptor.
///
/// Bytes queued with [Self::push] become readable (and visible to
/// [Descriptor::pending]); bytes the endpoint accepts through
/// [Descriptor::write] accumulate in [Self::written]. Transient I/O
/// conditions can be injected per call: interruptions, would-block writes, a
/// failing queued-byte query, or a query that underreports what is queued.
pub struct Endpoint {
    incoming: BytesMut,
    written: BytesMut,
    accept_limit: usize,
    interrupts: usize,
    would_blocks: usize,
    fail_pending: bool,
    suppress_pending: bool,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl Endpoint {
    /// An endpoint with nothing queued that accepts writes of any size.
    pub fn new() -> Self {
        Self {
            incoming: BytesMut::new(),
            written: BytesMut::new(),
            accept_limit: usize::MAX,
            interrupts: 0,
            would_blocks: 0,
            fail_pending: false,
            suppress_pending: false,
        }
    }

    /// Queue `bytes` for reading.
    pub fn push(&mut self, bytes: &[u8]) {
        self.incoming.extend_from_slice(bytes);
    }

    /// Every byte the endpoint has accepted, in order.
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Cap each write call at `limit` accepted bytes.
    pub fn accept_at_most(&mut self, limit: usize) {
        self.accept_limit = limit;
    }

    /// Interrupt the next `times` read or write calls.
    pub fn interrupt_next(&mut self, times: usize) {
        self.interrupts = times;
    }

    /// Report would-block for the next `times` write calls.
    pub fn would_block_next(&mut self, times: usize) {
        self.would_blocks = times;
    }

    /// Make every queued-byte query fail.
    pub fn fail_pending(&mut self) {
        self.fail_pending = true;
    }

    /// Make every queued-byte query report zero, regardless of what is
    /// queued.
    pub fn suppress_pending(&mut self) {
        self.suppress_pending = true;
    }
}

impl Descriptor for Endpoint {
    fn pending(&self) -> io::Result<usize> {
        if self.fail_pending {
            return Err(io::Error::other("queued-byte query failed"));
        }
        if self.suppress_pending {
            return Ok(0);
        }
        Ok(self.incoming.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.interrupts > 0 {
            self.interrupts -= 1;
            return Err(io::Error::from(io::ErrorKind::Interrupted));
        }
        let n = buf.len().min(self.incoming.len());
        self.incoming.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.interrupts > 0 {
            self.interrupts -= 1;
            return Err(io::Error::from(io::ErrorKind::Interrupted));
        }
        if self.would_blocks > 0 {
            self.would_blocks -= 1;
            return Err(io::Error::from(io::ErrorKind::WouldBlock));
        }
        let n = buf.len().min(self.accept_limit);
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

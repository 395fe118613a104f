//! §6 — the `Transport` contract. Device probing, autobaud, and serial
//! line handling themselves are DELIBERATELY OUT OF SCOPE (§1); this is
//! the thin interface the core depends on to read bytes in and write
//! configuration frames out.
//!
//! Grounded on `ublox/src/serialport.rs::Device`, which owns a concrete
//! `serialport::SerialPort`; here the concrete port is replaced by this
//! trait object so the core stays agnostic to serial/USB/TCP plumbing.

use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

pub trait Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
    fn set_speed(&mut self, speed: u32, parity: Parity, stopbits: StopBits) -> io::Result<()>;
}

/// An in-memory transport over a fixed byte source, used by tests and by
/// hosts replaying a capture file.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    pub inbox: std::collections::VecDeque<u8>,
    pub outbox: Vec<u8>,
}

impl MemoryTransport {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        MemoryTransport { inbox: bytes.iter().copied().collect(), outbox: Vec::new() }
    }
}

impl Transport for MemoryTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.inbox.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.inbox.pop_front().unwrap();
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outbox.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn set_speed(&mut self, _speed: u32, _parity: Parity, _stopbits: StopBits) -> io::Result<()> {
        Ok(())
    }
}

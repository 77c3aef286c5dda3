//! TCP streamer reader (§4.E): a variant of the frms6 reader used for online shared-memory
//! relay, reading the same file/frame headers off a `TcpStream` instead of a file.

use super::frms6::Frms6Reader;
use super::Reader;
use crate::error::CassResult;
use crate::event::CassEvent;
use std::io::Read;
use std::net::TcpStream;

/// Wraps a `Frms6Reader` over a live socket. The header/frame decode logic is identical to
/// the file-backed reader; only the stream type differs, since `Reader` is generic over
/// `std::io::Read`.
pub struct TcpStreamer {
    inner: Frms6Reader,
}

impl TcpStreamer {
    pub fn new() -> Self {
        Self {
            inner: Frms6Reader::new(),
        }
    }

    pub fn connect(addr: &str) -> std::io::Result<(Self, TcpStream)> {
        let stream = TcpStream::connect(addr)?;
        Ok((Self::new(), stream))
    }
}

impl Default for TcpStreamer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reader for TcpStreamer {
    fn read_header_info<R: Read>(&mut self, stream: &mut R) -> CassResult<()> {
        self.inner.read_header_info(stream)
    }

    fn read_event<R: Read>(&mut self, stream: &mut R, event: &mut CassEvent) -> CassResult<bool> {
        self.inner.read_event(stream, event)
    }
}

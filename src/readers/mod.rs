//! Format decoders that fill a `CassEvent` from a byte stream (§4.E).

pub mod frms6;
pub mod raw_sss;
pub mod tcp_stream;

use crate::error::CassResult;
use crate::event::CassEvent;
use std::io::Read;

/// Common reader contract: consume a file-level preamble once, then decode events one at a
/// time. `read_event` returns `Ok(true)` on success, `Ok(false)` on clean EOF, and an error
/// on malformed data.
pub trait Reader {
    fn read_header_info<R: Read>(&mut self, stream: &mut R) -> CassResult<()>;
    fn read_event<R: Read>(&mut self, stream: &mut R, event: &mut CassEvent) -> CassResult<bool>;
}

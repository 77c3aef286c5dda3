//! Error taxonomy shared by every fallible boundary in the crate.

use thiserror::Error;

/// The single error currency for the library half of the crate.
///
/// Readers and the serializer raise the `Truncated`/`CorruptStream`/`UnknownVersion`
/// family. `process()` bodies raise `DeviceAbsent`/`ShapeMismatch`/`InvalidData`, which the
/// processor trampoline catches and downgrades to a logged skip. Graph construction raises
/// `UnknownKind`/`UnknownProcessor`/`CyclicGraph`/`BadConfig`, which are fatal. Sinks raise
/// `IoError`.
#[derive(Debug, Error)]
pub enum CassError {
    #[error("truncated read at offset {offset}: expected {expected} bytes, got {got}")]
    Truncated {
        offset: u64,
        expected: usize,
        got: usize,
    },

    #[error("corrupt stream: {reason}")]
    CorruptStream { reason: String },

    #[error("unknown version {found}, expected {expected}")]
    UnknownVersion { found: u16, expected: u16 },

    #[error("device '{tag}' absent from event")]
    DeviceAbsent { tag: &'static str },

    #[error("shape mismatch: {reason}")]
    ShapeMismatch { reason: String },

    #[error("invalid data: {reason}")]
    InvalidData { reason: String },

    #[error("unknown processor kind '{kind}'")]
    UnknownKind { kind: String },

    #[error("unknown processor '{name}' required as a dependency")]
    UnknownProcessor { name: String },

    #[error("cyclic dependency detected involving '{name}'")]
    CyclicGraph { name: String },

    #[error("bad configuration for '{processor}': {reason}")]
    BadConfig { processor: String, reason: String },

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("no such id {id} in cached list")]
    NoSuchId { id: u64 },
}

pub type CassResult<T> = std::result::Result<T, CassError>;

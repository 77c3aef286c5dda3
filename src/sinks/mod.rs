//! Output sinks (§4.L): write selected processor results to disk on request. Only the
//! logical layout each format implies is modeled here — binding to the real HDF5/ROOT/CBF
//! libraries is out of scope (see DESIGN.md), so every sink below writes through the crate's
//! own [`crate::serializer`] rather than linking a vendor format library.

pub mod cbf_sink;
pub mod hdf5_sink;
pub mod root_sink;

use crate::error::CassResult;
use crate::result::ResultContainer;

/// A named result to be persisted, paired with the logical group it should land in.
pub struct NamedResult<'a> {
    pub group: &'a str,
    pub name: &'a str,
    pub result: &'a ResultContainer,
}

/// A destination for processor results (§4.L). Each concrete sink decides how a batch of
/// named results maps onto its own file/group layout.
pub trait ResultSink: Send + Sync {
    fn write(&self, event_id: u64, results: &[NamedResult]) -> CassResult<()>;
}

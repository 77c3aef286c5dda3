//! Device data sources (pp109): copies one sub-detector's raw frame out of the event into a
//! flat result, giving the processor graph an entry point into §3's per-event device payload.

use crate::error::{CassError, CassResult};
use crate::event::{CassEvent, DeviceTag};
use crate::processor::{Compute, ProcessContext};
use crate::result::ResultContainer;

/// Copies sub-detector `detector_index`'s raw `columns*rows` frame into a flat array result,
/// ignoring every other device and taking no dependency on the rest of the graph (pp109).
pub struct RawPixelDetectorFrame {
    pub detector_index: usize,
    pub columns: usize,
    pub rows: usize,
}

impl Compute for RawPixelDetectorFrame {
    fn process(&self, event: &CassEvent, out: &mut ResultContainer, _ctx: &ProcessContext) -> CassResult<()> {
        let payload = event.require_device(DeviceTag::PixelDetectors)?;
        let detector = payload.detectors.get(self.detector_index).ok_or_else(|| CassError::InvalidData {
            reason: format!(
                "pixel detector index {} out of range, event carries {} detectors",
                self.detector_index,
                payload.detectors.len()
            ),
        })?;
        if detector.frame.len() != self.columns * self.rows {
            return Err(CassError::ShapeMismatch {
                reason: format!(
                    "detector {} carries a {}x{} frame, configured for {}x{}",
                    self.detector_index,
                    detector.columns,
                    detector.rows,
                    self.columns,
                    self.rows
                ),
            });
        }
        out.storage.copy_from_slice(&detector.frame);
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        ResultContainer::array_1d("rawframe", self.columns * self.rows)
    }
}

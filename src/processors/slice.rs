//! Slicing and integrals (pp51, pp70, pp72-74, pp79): sub-ranges and scalar reductions of a
//! 1-D or 2-D result.

use crate::error::{CassError, CassResult};
use crate::event::CassEvent;
use crate::processor::{Compute, ProcessContext};
use crate::result::{Axis, ResultContainer};

/// What an integral/extremum reduction reports as a 0-D scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    Mean,
    Max,
    Min,
}

/// Extracts a contiguous 1-D sub-range `[lo, up)` of `input` into a freshly-binned array
/// (pp51/pp79). The output axis is rebuilt so its bin count matches the slice.
pub struct Slice1d {
    pub input: String,
    pub lo: f64,
    pub up: f64,
}

impl Slice1d {
    fn bounds(&self, axis: &Axis) -> (usize, usize) {
        let lo_bin = axis.bin(self.lo).max(0) as usize;
        let up_signed = axis.bin(self.up);
        let up_bin = if up_signed < 0 { 0 } else { (up_signed as usize).min(axis.n_bins) };
        (lo_bin.min(axis.n_bins), up_bin.max(lo_bin.min(axis.n_bins)))
    }
}

impl Compute for Slice1d {
    fn process(&self, event: &CassEvent, out: &mut ResultContainer, ctx: &ProcessContext) -> CassResult<()> {
        let handle = ctx.dependency(&self.input, event.id)?;
        let src = handle.read();
        if src.axes.len() != 1 {
            return Err(CassError::ShapeMismatch {
                reason: "Slice1d requires a 1-D input".into(),
            });
        }
        let (lo_bin, up_bin) = self.bounds(&src.axes[0]);
        let slice = &src.storage[lo_bin..up_bin];
        out.storage.iter_mut().for_each(|v| *v = 0.0);
        let n = slice.len().min(out.datasize());
        out.storage[..n].copy_from_slice(&slice[..n]);
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        let size = (self.up - self.lo).max(0.0) as usize;
        ResultContainer::array_1d("slice", size)
    }
}

/// Reduces a 1-D or 2-D `input` to a single scalar (pp70, pp72-74): sum, mean, or extremum
/// over the data bins (tail slots excluded).
pub struct Integral {
    pub input: String,
    pub reduction: Reduction,
}

impl Compute for Integral {
    fn process(&self, event: &CassEvent, out: &mut ResultContainer, ctx: &ProcessContext) -> CassResult<()> {
        let handle = ctx.dependency(&self.input, event.id)?;
        let src = handle.read();
        let n = src.datasize();
        let data = &src.storage[..n];
        let v = match self.reduction {
            Reduction::Sum => data.iter().sum(),
            Reduction::Mean => {
                if n == 0 {
                    0.0
                } else {
                    data.iter().sum::<f32>() / n as f32
                }
            }
            Reduction::Max => data.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            Reduction::Min => data.iter().copied().fold(f32::INFINITY, f32::min),
        };
        out.set_value(v);
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        ResultContainer::value("integral")
    }
}

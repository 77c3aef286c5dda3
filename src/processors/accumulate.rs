//! Accumulation (pp61-64, pp78): running reductions carried across events on a processor's
//! single shared result, per the `AccumulatingProcessor` trampoline.

use crate::error::CassResult;
use crate::event::CassEvent;
use crate::processor::{Compute, ProcessContext};
use crate::result::ResultContainer;
use std::sync::atomic::{AtomicU64, Ordering};

/// How successive event values combine into the shared accumulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AccumulateMode {
    /// pp61: arithmetic mean over all events seen so far.
    Mean,
    /// pp62: exponential moving average with smoothing factor `alpha` in `(0, 1]`.
    ExponentialMovingAverage(f32),
    /// pp63: plain running sum, never divided.
    Sum,
    /// pp64: running sum reset every `bucket` events, reporting the latest complete bucket.
    TimeBucketed { bucket: u64 },
}

/// Accumulates `input`'s value across events, shape-for-shape, into one persistent result
/// (pp61-64).
pub struct Accumulate {
    pub input: String,
    pub mode: AccumulateMode,
    pub shape_hint: ResultContainer,
    count: AtomicU64,
    bucket_count: AtomicU64,
}

impl Accumulate {
    pub fn new(input: impl Into<String>, mode: AccumulateMode, shape_hint: ResultContainer) -> Self {
        Self {
            input: input.into(),
            mode,
            shape_hint,
            count: AtomicU64::new(0),
            bucket_count: AtomicU64::new(0),
        }
    }
}

impl Compute for Accumulate {
    fn process(&self, event: &CassEvent, out: &mut ResultContainer, ctx: &ProcessContext) -> CassResult<()> {
        let handle = ctx.dependency(&self.input, event.id)?;
        let src = handle.read();
        let n = src.datasize().min(out.datasize());

        match self.mode {
            AccumulateMode::Mean => {
                let seen = self.count.fetch_add(1, Ordering::SeqCst) + 1;
                for i in 0..n {
                    out.storage[i] += (src.storage[i] - out.storage[i]) / seen as f32;
                }
            }
            AccumulateMode::ExponentialMovingAverage(alpha) => {
                let seen = self.count.fetch_add(1, Ordering::SeqCst);
                if seen == 0 {
                    out.storage[..n].copy_from_slice(&src.storage[..n]);
                } else {
                    for i in 0..n {
                        out.storage[i] = alpha * src.storage[i] + (1.0 - alpha) * out.storage[i];
                    }
                }
            }
            AccumulateMode::Sum => {
                for i in 0..n {
                    out.storage[i] += src.storage[i];
                }
            }
            AccumulateMode::TimeBucketed { bucket } => {
                let seen = self.bucket_count.fetch_add(1, Ordering::SeqCst) + 1;
                if seen % bucket == 1 {
                    out.storage[..n].copy_from_slice(&src.storage[..n]);
                } else {
                    for i in 0..n {
                        out.storage[i] += src.storage[i];
                    }
                }
            }
        }
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        self.shape_hint.clone()
    }
}

/// Counts how many times `condition`'s processor has been evaluated true since startup
/// (pp78). Implemented directly rather than via `AccumulateMode` since it ignores `input`'s
/// value entirely and only cares that it ran.
pub struct CallCounter {
    count: AtomicU64,
}

impl CallCounter {
    pub fn new() -> Self {
        Self { count: AtomicU64::new(0) }
    }
}

impl Default for CallCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Compute for CallCounter {
    fn process(&self, _event: &CassEvent, out: &mut ResultContainer, _ctx: &ProcessContext) -> CassResult<()> {
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        out.set_value(n as f32);
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        ResultContainer::value("callcounter")
    }
}

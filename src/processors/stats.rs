//! Statistics probes (pp71, pp81, pp82, pp85-88, pp91): running mean/variance/extrema of a
//! scalar input, reported as a small fixed-layout array.

use crate::error::CassResult;
use crate::event::CassEvent;
use crate::processor::{Compute, ProcessContext};
use crate::result::ResultContainer;
use parking_lot::Mutex;

/// Output layout for [`StatsProbe`]: `[mean, stdv, min, max]`.
pub const STATS_MEAN: usize = 0;
pub const STATS_STDV: usize = 1;
pub const STATS_MIN: usize = 2;
pub const STATS_MAX: usize = 3;
pub const STATS_SIZE: usize = 4;

struct Welford {
    count: u64,
    mean: f64,
    m2: f64,
    min: f32,
    max: f32,
}

impl Welford {
    fn new() -> Self {
        Self { count: 0, mean: 0.0, m2: 0.0, min: f32::INFINITY, max: f32::NEG_INFINITY }
    }

    fn push(&mut self, x: f32) {
        self.count += 1;
        let delta = x as f64 - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = x as f64 - self.mean;
        self.m2 += delta * delta2;
        self.min = self.min.min(x);
        self.max = self.max.max(x);
    }

    fn stdv(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).sqrt()
        }
    }
}

/// Running mean/standard-deviation/extrema of `input`'s scalar value across events
/// (pp71, pp81, pp82, pp85-88, pp91 — all of which differ only in which scalar feeds the
/// probe and how the result is consumed downstream, not in the reduction itself).
pub struct StatsProbe {
    pub input: String,
    state: Mutex<Welford>,
}

impl StatsProbe {
    pub fn new(input: impl Into<String>) -> Self {
        Self { input: input.into(), state: Mutex::new(Welford::new()) }
    }
}

impl Compute for StatsProbe {
    fn process(&self, event: &CassEvent, out: &mut ResultContainer, ctx: &ProcessContext) -> CassResult<()> {
        let x = ctx.dependency(&self.input, event.id)?.read().get_value();
        let mut state = self.state.lock();
        state.push(x);
        out.storage[STATS_MEAN] = state.mean as f32;
        out.storage[STATS_STDV] = state.stdv() as f32;
        out.storage[STATS_MIN] = state.min;
        out.storage[STATS_MAX] = state.max;
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        ResultContainer::array_1d("stats", STATS_SIZE)
    }
}

//! Gain calibration (pp331): accumulates the per-pixel average signal within a
//! single-photon ADU range, then derives a relative gain map from it. The pnCCD
//! column-replication special case is not carried here — see DESIGN.md.

use crate::error::{CassError, CassResult};
use crate::event::CassEvent;
use crate::processor::{Compute, ProcessContext};
use crate::result::ResultContainer;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

const GAIN: usize = 0;
const COUNT: usize = 1;
const AVERAGE: usize = 2;
const NBR_OUTPUTS: usize = 3;

pub struct GainCal {
    pub input: String,
    pub image_size: usize,
    pub adu_low: f32,
    pub adu_high: f32,
    pub min_photon_count: u64,
    pub default_gain: f32,
    pub frames_per_recalc: u64,
    counters: Mutex<Vec<(u64, f64)>>, // (count, running average) per pixel
    frames_seen: AtomicU64,
}

impl GainCal {
    pub fn new(
        input: impl Into<String>,
        image_size: usize,
        adu_low: f32,
        adu_high: f32,
        min_photon_count: u64,
        default_gain: f32,
        frames_per_recalc: u64,
    ) -> Self {
        Self {
            input: input.into(),
            image_size,
            adu_low,
            adu_high,
            min_photon_count,
            default_gain,
            frames_per_recalc,
            counters: Mutex::new(vec![(0, 0.0); image_size]),
            frames_seen: AtomicU64::new(0),
        }
    }

    fn recalculate(&self, out: &mut ResultContainer) {
        let counters = self.counters.lock();
        let size = self.image_size;
        let mut accepted = 0u64;
        let mut average_of_averages = 0.0f64;
        for (count, ave) in counters.iter() {
            if *count < self.min_photon_count {
                continue;
            }
            accepted += 1;
            average_of_averages += (*ave - average_of_averages) / accepted as f64;
        }
        for i in 0..size {
            let (count, ave) = counters[i];
            out.storage[GAIN * size + i] = if count < self.min_photon_count {
                self.default_gain
            } else {
                (average_of_averages / ave) as f32
            };
        }
    }
}

impl Compute for GainCal {
    fn process(&self, event: &CassEvent, out: &mut ResultContainer, ctx: &ProcessContext) -> CassResult<()> {
        let handle = ctx.dependency(&self.input, event.id)?;
        let src = handle.read();
        if src.datasize() != self.image_size {
            return Err(CassError::ShapeMismatch {
                reason: format!("gain calibration expects {} pixels, got {}", self.image_size, src.datasize()),
            });
        }
        let size = self.image_size;
        {
            let mut counters = self.counters.lock();
            for i in 0..size {
                let pixel = src.storage[i];
                if pixel > self.adu_low && pixel < self.adu_high {
                    let (count, ave) = &mut counters[i];
                    *count += 1;
                    *ave += (pixel as f64 - *ave) / *count as f64;
                    out.storage[COUNT * size + i] = *count as f32;
                    out.storage[AVERAGE * size + i] = *ave as f32;
                }
            }
        }

        let seen = self.frames_seen.fetch_add(1, Ordering::SeqCst) + 1;
        if self.frames_per_recalc > 0 && seen % self.frames_per_recalc == 0 {
            self.recalculate(out);
        }
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        ResultContainer::array_1d("gaincal", self.image_size * NBR_OUTPUTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cached_list::ResultHandle;
    use crate::error::CassError;
    use crate::event::EventId;
    use crate::processor::DependencyResolver;
    use parking_lot::RwLock;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct MapResolver(HashMap<String, ResultHandle>);
    impl DependencyResolver for MapResolver {
        fn result_of(&self, name: &str, _id: EventId) -> CassResult<ResultHandle> {
            self.0
                .get(name)
                .cloned()
                .ok_or_else(|| CassError::UnknownProcessor { name: name.into() })
        }
    }

    #[test]
    fn untrained_pixel_keeps_default_gain_after_recalc() {
        let mut map = HashMap::new();
        let frame = Arc::new(RwLock::new(ResultContainer::array_1d("img", 2)));
        map.insert("img".to_string(), frame.clone() as ResultHandle);
        let resolver = MapResolver(map);
        let ctx = ProcessContext { resolver: &resolver };

        let gain = GainCal::new("img", 2, 0.0, 10.0, 2, 1.5, 1);
        let mut out = gain.result_template();
        frame.write().storage.copy_from_slice(&[5.0, 50.0]); // pixel 1 out of range
        let mut evt = CassEvent::new();
        evt.id = 1;
        gain.process(&evt, &mut out, &ctx).unwrap();
        assert_eq!(out.storage[GAIN * 2 + 1], 1.5);
    }
}

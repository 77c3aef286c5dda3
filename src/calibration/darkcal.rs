//! Dark/noise calibration (pp330): trains a per-pixel offset and noise map from a stream of
//! raw frames, derives a bad-pixel mask from fixed boundaries, and exposes all four as one
//! stacked result.

use super::{BADPIX, MEAN, NBR_OUTPUTS, NVALS, STDV};
use crate::error::{CassError, CassResult};
use crate::event::CassEvent;
use crate::processor::{Compute, ProcessContext};
use crate::result::ResultContainer;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Clone, Copy, Default)]
struct PixelStat {
    mean: f64,
    m2: f64,
    n: u64,
}

impl PixelStat {
    fn cumulative_push(&mut self, x: f32) {
        self.n += 1;
        let delta = x as f64 - self.mean;
        self.mean += delta / self.n as f64;
        let delta2 = x as f64 - self.mean;
        self.m2 += delta * delta2;
    }

    fn moving_push(&mut self, x: f32, alpha: f64) {
        if self.n == 0 {
            self.mean = x as f64;
            self.m2 = 0.0;
        } else {
            let delta = x as f64 - self.mean;
            self.mean += alpha * delta;
            self.m2 = (1.0 - alpha) * (self.m2 + alpha * delta * delta);
        }
        self.n += 1;
    }

    fn stdv(&self) -> f64 {
        if self.n < 2 {
            0.0
        } else {
            (self.m2 / (self.n - 1) as f64).sqrt()
        }
    }
}

/// How the running mean/variance combine successive frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateKind {
    /// All frames weigh equally (Welford's online algorithm).
    Cumulative,
    /// Exponential weighting toward recent frames with smoothing factor `alpha`.
    Moving { alpha: f64 },
}

/// Fixed acceptance bounds for marking a pixel bad, replacing the original's optional
/// statistics-derived auto-bound feature (not carried here — see DESIGN.md).
#[derive(Debug, Clone, Copy)]
pub struct BadPixelBounds {
    pub noise_lower: f32,
    pub noise_upper: f32,
    pub offset_lower: f32,
    pub offset_upper: f32,
    pub min_fraction_trained: f32,
}

impl Default for BadPixelBounds {
    fn default() -> Self {
        Self {
            noise_lower: 1.0,
            noise_upper: 3.0,
            offset_lower: -1e20,
            offset_upper: 1e20,
            min_fraction_trained: 0.9,
        }
    }
}

pub struct DarkCal {
    pub input: String,
    pub image_size: usize,
    pub update_kind: UpdateKind,
    pub min_train_images: u64,
    pub bounds: BadPixelBounds,
    stats: Mutex<Vec<PixelStat>>,
    counter: AtomicU64,
}

impl DarkCal {
    pub fn new(
        input: impl Into<String>,
        image_size: usize,
        update_kind: UpdateKind,
        min_train_images: u64,
        bounds: BadPixelBounds,
    ) -> Self {
        Self {
            input: input.into(),
            image_size,
            update_kind,
            min_train_images,
            bounds,
            stats: Mutex::new(vec![PixelStat::default(); image_size]),
            counter: AtomicU64::new(0),
        }
    }

    fn plane_mut(out: &mut ResultContainer, plane: usize, size: usize) -> &mut [f32] {
        &mut out.storage[plane * size..(plane + 1) * size]
    }
}

impl Compute for DarkCal {
    fn process(&self, event: &CassEvent, out: &mut ResultContainer, ctx: &ProcessContext) -> CassResult<()> {
        let handle = ctx.dependency(&self.input, event.id)?;
        let src = handle.read();
        if src.datasize() != self.image_size {
            return Err(CassError::ShapeMismatch {
                reason: format!(
                    "dark calibration expects a {}-pixel raw image, got {}",
                    self.image_size,
                    src.datasize()
                ),
            });
        }

        let seen = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let mut stats = self.stats.lock();
        for i in 0..self.image_size {
            let x = src.storage[i];
            match self.update_kind {
                UpdateKind::Cumulative => stats[i].cumulative_push(x),
                UpdateKind::Moving { alpha } => stats[i].moving_push(x, alpha),
            }
        }

        let size = self.image_size;
        for i in 0..size {
            Self::plane_mut(out, MEAN, size)[i] = stats[i].mean as f32;
            Self::plane_mut(out, STDV, size)[i] = stats[i].stdv() as f32;
            Self::plane_mut(out, NVALS, size)[i] = stats[i].n as f32;
        }

        let min_pixels = self.bounds.min_fraction_trained * seen as f32;
        for i in 0..size {
            let mean = Self::plane_mut(out, MEAN, size)[i];
            let stdv = Self::plane_mut(out, STDV, size)[i];
            let nvals = Self::plane_mut(out, NVALS, size)[i];
            let bad = stdv < self.bounds.noise_lower
                || stdv > self.bounds.noise_upper
                || mean < self.bounds.offset_lower
                || mean > self.bounds.offset_upper
                || nvals < min_pixels;
            Self::plane_mut(out, BADPIX, size)[i] = bad as i32 as f32;
        }
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        ResultContainer::array_1d("darkcal", self.image_size * NBR_OUTPUTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cached_list::ResultHandle;
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
    fn trains_mean_and_flags_noisy_pixel_bad() {
        let mut map = HashMap::new();
        let frame_slot = Arc::new(RwLock::new(ResultContainer::array_1d("raw", 2)));
        map.insert("raw".to_string(), frame_slot.clone() as ResultHandle);
        let resolver = MapResolver(map);
        let ctx = ProcessContext { resolver: &resolver };

        let cal = DarkCal::new("raw", 2, UpdateKind::Cumulative, 3, BadPixelBounds::default());
        let mut out = cal.result_template();
        let mut evt = CassEvent::new();
        // pixel 0 is quiet (constant 10), pixel 1 is noisy (alternating 0/100)
        for (id, v0, v1) in [(1u64, 10.0, 0.0), (2, 10.0, 100.0), (3, 10.0, 0.0), (4, 10.0, 100.0)] {
            frame_slot.write().storage.copy_from_slice(&[v0, v1]);
            evt.id = id;
            cal.process(&evt, &mut out, &ctx).unwrap();
        }
        assert_eq!(out.storage[MEAN * 2], 10.0);
        assert_eq!(out.storage[BADPIX * 2], 0.0);
        assert_eq!(out.storage[BADPIX * 2 + 1], 1.0);
    }
}

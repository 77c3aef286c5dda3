//! Partial covariance (supplemented, grounded on the original's `pp412`): running
//! bin-by-bin covariance between a 1-D waveform and a scalar intensity, computed with the
//! same on-line update the original uses for its covariance family —
//! `cov_n = ((n-1)*cov_{n-1} + (x_n - aveX_n)*(y_n - aveY_{n-1})) / n`.

use crate::error::CassResult;
use crate::event::CassEvent;
use crate::processor::{Compute, ProcessContext};
use crate::result::{Axis, ResultContainer};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

struct State {
    wave_average: Vec<f32>,
    intensity_average: f32,
}

/// Running covariance between `wave_input` (1-D) and `intensity_input` (0-D) across events.
pub struct CovarianceMap {
    pub wave_input: String,
    pub intensity_input: String,
    pub axis: Axis,
    state: Mutex<State>,
    n: AtomicU64,
}

impl CovarianceMap {
    pub fn new(wave_input: impl Into<String>, intensity_input: impl Into<String>, axis: Axis) -> Self {
        let size = axis.n_bins;
        Self {
            wave_input: wave_input.into(),
            intensity_input: intensity_input.into(),
            axis,
            state: Mutex::new(State { wave_average: vec![0.0; size], intensity_average: 0.0 }),
            n: AtomicU64::new(0),
        }
    }
}

impl Compute for CovarianceMap {
    fn process(&self, event: &CassEvent, out: &mut ResultContainer, ctx: &ProcessContext) -> CassResult<()> {
        let wave_handle = ctx.dependency(&self.wave_input, event.id)?;
        let wave = wave_handle.read();
        let intensity = ctx.dependency(&self.intensity_input, event.id)?.read().get_value();

        let n = self.n.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.lock();
        let intensity_average_old = state.intensity_average;
        let size = self.axis.n_bins.min(wave.datasize()).min(out.datasize());

        for i in 0..size {
            let x = wave.storage[i];
            let wave_average_old = state.wave_average[i];
            let wave_average_new = wave_average_old + (x - wave_average_old) / n as f32;
            let cov_old = out.storage[i];
            out.storage[i] = ((n - 1) as f32 * cov_old + (x - wave_average_new) * (intensity - intensity_average_old)) / n as f32;
            state.wave_average[i] = wave_average_new;
        }
        state.intensity_average += (intensity - intensity_average_old) / n as f32;
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        ResultContainer::array_1d("covariance", self.axis.n_bins)
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

    struct MapResolver(Arc<RwLock<HashMap<String, ResultHandle>>>);
    impl DependencyResolver for MapResolver {
        fn result_of(&self, name: &str, _id: EventId) -> CassResult<ResultHandle> {
            self.0
                .read()
                .get(name)
                .cloned()
                .ok_or_else(|| CassError::UnknownProcessor { name: name.into() })
        }
    }

    #[test]
    fn covariance_is_positive_for_correlated_signals() {
        let wave = Arc::new(RwLock::new(ResultContainer::array_1d("wave", 1)));
        let intensity = Arc::new(RwLock::new(ResultContainer::value("intensity")));
        let mut map = HashMap::new();
        map.insert("wave".to_string(), wave.clone() as ResultHandle);
        map.insert("intensity".to_string(), intensity.clone() as ResultHandle);
        let resolver = MapResolver(Arc::new(RwLock::new(map)));
        let ctx = ProcessContext { resolver: &resolver };

        let cov = CovarianceMap::new("wave", "intensity", Axis::new(1, 0.0, 1.0, "bin"));
        let mut out = cov.result_template();
        let mut evt = CassEvent::new();
        for (id, w, i) in [(1u64, 1.0, 1.0), (2, 2.0, 2.0), (3, 3.0, 3.0), (4, 4.0, 4.0)] {
            wave.write().storage[0] = w;
            intensity.write().set_value(i);
            evt.id = id;
            cov.process(&evt, &mut out, &ctx).unwrap();
        }
        assert!(out.storage[0] > 0.0);
    }
}

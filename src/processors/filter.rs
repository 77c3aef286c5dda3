//! IIR filtering (pp89): a first-order low-pass filter applied element-wise to a result,
//! carrying its previous output across events.

use crate::error::CassResult;
use crate::event::CassEvent;
use crate::processor::{Compute, ProcessContext};
use crate::result::ResultContainer;
use parking_lot::Mutex;

/// `y[n] = alpha * x[n] + (1 - alpha) * y[n-1]`, applied independently to every data bin.
/// Unlike [`crate::processors::accumulate::AccumulateMode::ExponentialMovingAverage`], this
/// is a per-event result (via `BaseProcessor`), not a shared accumulator: each event gets its
/// own filtered snapshot, seeded from the previous one.
pub struct IirFilter {
    pub input: String,
    pub alpha: f32,
    pub shape_hint: ResultContainer,
    previous: Mutex<Option<Vec<f32>>>,
}

impl IirFilter {
    pub fn new(input: impl Into<String>, alpha: f32, shape_hint: ResultContainer) -> Self {
        Self {
            input: input.into(),
            alpha,
            shape_hint,
            previous: Mutex::new(None),
        }
    }
}

impl Compute for IirFilter {
    fn process(&self, event: &CassEvent, out: &mut ResultContainer, ctx: &ProcessContext) -> CassResult<()> {
        let handle = ctx.dependency(&self.input, event.id)?;
        let src = handle.read();
        let n = src.datasize().min(out.datasize());

        let mut prev = self.previous.lock();
        match prev.as_ref() {
            None => {
                out.storage[..n].copy_from_slice(&src.storage[..n]);
            }
            Some(last) => {
                for i in 0..n {
                    out.storage[i] = self.alpha * src.storage[i] + (1.0 - self.alpha) * last[i];
                }
            }
        }
        *prev = Some(out.storage[..n].to_vec());
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        self.shape_hint.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cached_list::ResultHandle;
    use crate::error::CassError;
    use crate::event::EventId;
    use crate::processor::DependencyResolver;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct MapResolver(Arc<parking_lot::RwLock<HashMap<String, ResultHandle>>>);
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
    fn filter_converges_toward_a_constant_input() {
        let input = Arc::new(parking_lot::RwLock::new(ResultContainer::value("x")));
        input.write().set_value(10.0);
        let mut map = HashMap::new();
        map.insert("x".to_string(), input as ResultHandle);
        let resolver = MapResolver(Arc::new(parking_lot::RwLock::new(map)));
        let ctx = ProcessContext { resolver: &resolver };

        let filt = IirFilter::new("x", 0.5, ResultContainer::value("y"));
        let mut out = filt.result_template();
        let mut evt = CassEvent::new();
        let mut last = 0.0;
        for id in 1..=10u64 {
            evt.id = id;
            filt.process(&evt, &mut out, &ctx).unwrap();
            last = out.get_value();
        }
        assert!((last - 10.0).abs() < 0.1);
    }
}

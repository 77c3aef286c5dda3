//! Histogramming (pp60, pp65-69): fills a 1-D or 2-D histogram from one or two scalar
//! processors per event, with an optional weight input.

use crate::error::CassResult;
use crate::event::CassEvent;
use crate::processor::{Compute, ProcessContext};
use crate::result::{Axis, ResultContainer};

/// Fills a 1-D histogram axis from `input`'s scalar value each event (pp60).
pub struct Histogram1d {
    pub input: String,
    pub weight: Option<String>,
    pub axis: Axis,
}

impl Compute for Histogram1d {
    fn process(&self, event: &CassEvent, out: &mut ResultContainer, ctx: &ProcessContext) -> CassResult<()> {
        let x = ctx.dependency(&self.input, event.id)?.read().get_value() as f64;
        let w = match &self.weight {
            Some(name) => ctx.dependency(name, event.id)?.read().get_value(),
            None => 1.0,
        };
        out.histogram(x, w);
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        ResultContainer::histogram_1d("hist1d", self.axis.clone())
    }
}

/// Fills a 2-D histogram from two scalar processors, `x_input` and `y_input` (pp65-69).
pub struct Histogram2d {
    pub x_input: String,
    pub y_input: String,
    pub weight: Option<String>,
    pub xaxis: Axis,
    pub yaxis: Axis,
}

impl Compute for Histogram2d {
    fn process(&self, event: &CassEvent, out: &mut ResultContainer, ctx: &ProcessContext) -> CassResult<()> {
        let x = ctx.dependency(&self.x_input, event.id)?.read().get_value() as f64;
        let y = ctx.dependency(&self.y_input, event.id)?.read().get_value() as f64;
        let w = match &self.weight {
            Some(name) => ctx.dependency(name, event.id)?.read().get_value(),
            None => 1.0,
        };
        out.histogram2d(x, y, w);
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        ResultContainer::histogram_2d("hist2d", self.xaxis.clone(), self.yaxis.clone())
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
    fn fills_1d_histogram_from_scalar_input() {
        let mut x = ResultContainer::value("x");
        x.set_value(2.5);
        let mut map = HashMap::new();
        map.insert("x".to_string(), Arc::new(RwLock::new(x)) as ResultHandle);
        let resolver = MapResolver(map);
        let ctx = ProcessContext { resolver: &resolver };

        let hist = Histogram1d {
            input: "x".into(),
            weight: None,
            axis: Axis::new(4, 0.0, 4.0, "x"),
        };
        let mut out = hist.result_template();
        let mut evt = CassEvent::new();
        evt.id = 1;
        hist.process(&evt, &mut out, &ctx).unwrap();
        assert_eq!(out.storage[2], 1.0);
    }
}

//! Projections (pp50, pp57): sum or weighted-sum one axis of a 2-D result over a
//! configured open-interval range.

use crate::error::CassResult;
use crate::event::CassEvent;
use crate::processor::{Compute, ProcessContext};
use crate::result::{Axis, ResultContainer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectAxis {
    X,
    Y,
}

/// Plain (pp50) or weighted (pp57) projection of `input` over `[lo, up)` on `axis`.
/// Weighted projection skips `exclusion_value` and divides by the accepted-bin count per
/// output column/row.
pub struct Projection {
    pub input: String,
    pub axis: ProjectAxis,
    pub lo: f64,
    pub up: f64,
    pub weighted: bool,
    pub exclusion_value: f32,
    pub other_axis: Axis,
}

impl Compute for Projection {
    fn process(&self, event: &CassEvent, out: &mut ResultContainer, ctx: &ProcessContext) -> CassResult<()> {
        let handle = ctx.dependency(&self.input, event.id)?;
        let src = handle.read();
        let (x_bins, y_bins) = (src.axes[0].n_bins, src.axes[1].n_bins);

        out.storage.iter_mut().for_each(|v| *v = 0.0);
        if self.up <= self.lo {
            // empty range: property 4 — result stays all zeros, axis untouched.
            return Ok(());
        }

        match self.axis {
            ProjectAxis::X => {
                // sum over x in [lo, up), one output value per y
                let xaxis = src.axes[0].clone();
                let (lo_bin, up_bin) = clamp_range(&xaxis, self.lo, self.up);
                for y in 0..y_bins {
                    let mut sum = 0.0f32;
                    let mut count = 0usize;
                    for x in lo_bin..up_bin {
                        let v = src.storage[y * x_bins + x];
                        if self.weighted && v == self.exclusion_value {
                            continue;
                        }
                        sum += v;
                        count += 1;
                    }
                    out.storage[y] = if self.weighted && count > 0 {
                        sum / count as f32
                    } else {
                        sum
                    };
                }
            }
            ProjectAxis::Y => {
                let yaxis = src.axes[1].clone();
                let (lo_bin, up_bin) = clamp_range(&yaxis, self.lo, self.up);
                for x in 0..x_bins {
                    let mut sum = 0.0f32;
                    let mut count = 0usize;
                    for y in lo_bin..up_bin {
                        let v = src.storage[y * x_bins + x];
                        if self.weighted && v == self.exclusion_value {
                            continue;
                        }
                        sum += v;
                        count += 1;
                    }
                    out.storage[x] = if self.weighted && count > 0 {
                        sum / count as f32
                    } else {
                        sum
                    };
                }
            }
        }
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        ResultContainer::histogram_1d("projection", self.other_axis.clone())
    }
}

/// Clamps an open interval `[lo, up)` to in-range bin indices, never touching the tail.
fn clamp_range(axis: &Axis, lo: f64, up: f64) -> (usize, usize) {
    let lo_bin = axis.bin(lo).max(0) as usize;
    let up_bin_signed = axis.bin(up);
    let up_bin = if up_bin_signed < 0 {
        0
    } else {
        (up_bin_signed as usize).min(axis.n_bins)
    };
    (lo_bin.min(axis.n_bins), up_bin.max(lo_bin.min(axis.n_bins)))
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
                .ok_or_else(|| crate::error::CassError::UnknownProcessor { name: name.into() })
        }
    }

    #[test]
    fn empty_range_projection_is_zero_with_axis_intact() {
        let xaxis = Axis::new(2, 0.0, 2.0, "x");
        let yaxis = Axis::new(2, 0.0, 2.0, "y");
        let mut img = ResultContainer::histogram_2d("img", xaxis.clone(), yaxis);
        img.histogram2d(0.5, 0.5, 5.0);

        let mut map = HashMap::new();
        map.insert("img".to_string(), Arc::new(RwLock::new(img)) as ResultHandle);
        let resolver = MapResolver(map);
        let ctx = ProcessContext { resolver: &resolver };

        let proj = Projection {
            input: "img".into(),
            axis: ProjectAxis::X,
            lo: 1.0,
            up: 1.0,
            weighted: false,
            exclusion_value: 0.0,
            other_axis: xaxis.clone(),
        };
        let mut out = proj.result_template();
        let mut evt = CassEvent::new();
        evt.id = 1;
        proj.process(&evt, &mut out, &ctx).unwrap();
        assert_eq!(out.storage.iter().sum::<f32>(), 0.0);
        assert_eq!(out.axes[0].n_bins, xaxis.n_bins);
    }
}

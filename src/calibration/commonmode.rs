//! Common-mode background level (pp333): splits an image into fixed-width strips and fills
//! each strip with its mean or median pixel value, the same shape as the input. The
//! histogram-peak ASIC variant (pp334) is not carried here — see DESIGN.md.

use crate::error::{CassError, CassResult};
use crate::event::CassEvent;
use crate::processor::{Compute, ProcessContext};
use crate::result::ResultContainer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalcKind {
    Mean,
    Median,
}

fn trimmed_mean(values: &mut [f32], snr: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f32;
    let sum: f32 = values.iter().sum();
    let mean0 = sum / n;
    let var0 = values.iter().map(|v| (v - mean0) * (v - mean0)).sum::<f32>() / n;
    let stdv0 = var0.sqrt();
    let (lo, hi) = (mean0 - snr * stdv0, mean0 + snr * stdv0);
    let kept: Vec<f32> = values.iter().copied().filter(|v| *v >= lo && *v <= hi).collect();
    if kept.is_empty() {
        mean0
    } else {
        kept.iter().sum::<f32>() / kept.len() as f32
    }
}

fn median(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Common-mode level per fixed-width strip of `input` (pp333).
pub struct CommonMode {
    pub input: String,
    pub width: usize,
    pub kind: CalcKind,
    pub snr: f32,
    pub shape_hint: ResultContainer,
}

impl Compute for CommonMode {
    fn process(&self, event: &CassEvent, out: &mut ResultContainer, ctx: &ProcessContext) -> CassResult<()> {
        let handle = ctx.dependency(&self.input, event.id)?;
        let src = handle.read();
        let n = src.datasize();
        if self.width == 0 || n % self.width != 0 {
            return Err(CassError::ShapeMismatch {
                reason: format!("image size {n} is not a multiple of common-mode width {}", self.width),
            });
        }
        let parts = n / self.width;
        for part in 0..parts {
            let begin = part * self.width;
            let mut strip: Vec<f32> = src.storage[begin..begin + self.width].to_vec();
            let level = match self.kind {
                CalcKind::Mean => trimmed_mean(&mut strip, self.snr),
                CalcKind::Median => median(&mut strip),
            };
            out.storage[begin..begin + self.width].fill(level);
        }
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
    fn s4_median_commonmode_on_a_strip() {
        let mut img = ResultContainer::array_1d("img", 8);
        img.storage.copy_from_slice(&[1.0, 2.0, 3.0, 4.0, 100.0, 5.0, 6.0, 7.0]);
        let mut map = HashMap::new();
        map.insert("img".to_string(), Arc::new(RwLock::new(img)) as ResultHandle);
        let resolver = MapResolver(map);
        let ctx = ProcessContext { resolver: &resolver };

        let cm = CommonMode {
            input: "img".into(),
            width: 8,
            kind: CalcKind::Median,
            snr: 4.0,
            shape_hint: ResultContainer::array_1d("cm", 8),
        };
        let mut out = cm.result_template();
        let mut evt = CassEvent::new();
        evt.id = 1;
        cm.process(&evt, &mut out, &ctx).unwrap();
        // median of [1,2,3,4,5,6,7,100] is (4+5)/2 = 4.5, robust to the single outlier
        assert!(out.storage.iter().all(|v| (*v - 4.5).abs() < 1e-6));
    }
}

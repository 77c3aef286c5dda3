//! Hot-pixel masking (pp332): a pixel is marked permanently hot once it has stayed inside a
//! suspicious ADU range for too many consecutive frames, or exceeds an absolute ceiling.

use crate::error::{CassError, CassResult};
use crate::event::CassEvent;
use crate::processor::{Compute, ProcessContext};
use crate::result::ResultContainer;

const MASK: usize = 0;
const CONSECUTIVE: usize = 1;
const NBR_OUTPUTS: usize = 2;

pub struct HotPixelMask {
    pub input: String,
    pub image_size: usize,
    pub adu_low: f32,
    pub adu_high: f32,
    pub max_consecutive: u32,
    pub max_adu: f32,
}

impl HotPixelMask {
    pub fn new(input: impl Into<String>, image_size: usize, adu_low: f32, adu_high: f32, max_consecutive: u32, max_adu: f32) -> Self {
        Self { input: input.into(), image_size, adu_low, adu_high, max_consecutive, max_adu }
    }
}

impl Compute for HotPixelMask {
    fn process(&self, event: &CassEvent, out: &mut ResultContainer, ctx: &ProcessContext) -> CassResult<()> {
        let handle = ctx.dependency(&self.input, event.id)?;
        let src = handle.read();
        if src.datasize() != self.image_size {
            return Err(CassError::ShapeMismatch {
                reason: format!("hot-pixel mask expects {} pixels, got {}", self.image_size, src.datasize()),
            });
        }
        let size = self.image_size;
        for i in 0..size {
            if out.storage[MASK * size + i] == -1.0 {
                continue; // already permanently hot
            }
            let pixel = src.storage[i];
            if pixel > self.adu_low && pixel < self.adu_high {
                out.storage[CONSECUTIVE * size + i] += 1.0;
                if out.storage[CONSECUTIVE * size + i] >= self.max_consecutive as f32 {
                    out.storage[MASK * size + i] = -1.0;
                }
            } else {
                out.storage[CONSECUTIVE * size + i] = 0.0;
            }
            if pixel > self.max_adu {
                out.storage[MASK * size + i] = -1.0;
            }
        }
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        ResultContainer::array_1d("hotpixelmask", self.image_size * NBR_OUTPUTS)
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
    fn pixel_stuck_in_range_gets_masked() {
        let mut map = HashMap::new();
        let frame = Arc::new(RwLock::new(ResultContainer::array_1d("img", 1)));
        map.insert("img".to_string(), frame.clone() as ResultHandle);
        let resolver = MapResolver(map);
        let ctx = ProcessContext { resolver: &resolver };

        let hp = HotPixelMask::new("img", 1, 90.0, 110.0, 3, 1e6);
        let mut out = hp.result_template();
        let mut evt = CassEvent::new();
        for id in 1..=3u64 {
            frame.write().storage[0] = 100.0;
            evt.id = id;
            hp.process(&evt, &mut out, &ctx).unwrap();
        }
        assert_eq!(out.storage[MASK], -1.0);
    }
}

//! Delay-line position reconstruction (pp5000/5001): combines four TDC channel hit times
//! (two signal-propagation directions per layer) into an impact position and a sum-condition
//! check for the first coincident hit.

use crate::error::{CassError, CassResult};
use crate::event::{CassEvent, DeviceTag};
use crate::processor::{Compute, ProcessContext};
use crate::result::ResultContainer;

pub const POS_X: usize = 0;
pub const POS_Y: usize = 1;
pub const POS_SUM_U: usize = 2;
pub const POS_SUM_V: usize = 3;
pub const POSITION_SIZE: usize = 4;

/// Reconstructs `(x, y)` from the first hit on each of four delay-line ends, `u1/u2/v1/v2`,
/// using `x = scale * (u1 - u2)`, `y = scale * (v1 - v2)`. The two sum channels,
/// `u1 + u2` and `v1 + v2`, are reported unscaled so a downstream processor can gate on the
/// flight-time coincidence window (pp5001's role in the original).
pub struct DelaylinePosition {
    pub u1_channel: usize,
    pub u2_channel: usize,
    pub v1_channel: usize,
    pub v2_channel: usize,
    pub scale: f32,
}

fn first_hit(payload: &crate::event::DevicePayload, channel: usize) -> CassResult<f64> {
    payload
        .tdc_channels
        .get(channel)
        .and_then(|c| c.hit_times.first().copied())
        .ok_or_else(|| CassError::InvalidData {
            reason: format!("no hit recorded on TDC channel {channel}"),
        })
}

impl Compute for DelaylinePosition {
    fn process(&self, event: &CassEvent, out: &mut ResultContainer, _ctx: &ProcessContext) -> CassResult<()> {
        let payload = event.require_device(DeviceTag::AcqirisTDC)?;
        let u1 = first_hit(payload, self.u1_channel)?;
        let u2 = first_hit(payload, self.u2_channel)?;
        let v1 = first_hit(payload, self.v1_channel)?;
        let v2 = first_hit(payload, self.v2_channel)?;

        out.storage[POS_X] = self.scale * (u1 - u2) as f32;
        out.storage[POS_Y] = self.scale * (v1 - v2) as f32;
        out.storage[POS_SUM_U] = (u1 + u2) as f32;
        out.storage[POS_SUM_V] = (v1 + v2) as f32;
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        ResultContainer::array_1d("delayline_position", POSITION_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cached_list::ResultHandle;
    use crate::error::CassError;
    use crate::event::{EventId, TdcChannel};
    use crate::processor::DependencyResolver;

    struct NoDeps;
    impl DependencyResolver for NoDeps {
        fn result_of(&self, name: &str, _id: EventId) -> CassResult<ResultHandle> {
            Err(CassError::UnknownProcessor { name: name.into() })
        }
    }

    #[test]
    fn reconstructs_position_from_four_channels() {
        let mut evt = CassEvent::new();
        evt.id = 1;
        let payload = evt.device_mut(DeviceTag::AcqirisTDC);
        payload.tdc_channels.push(TdcChannel { hit_times: vec![10.0] }); // u1
        payload.tdc_channels.push(TdcChannel { hit_times: vec![6.0] }); // u2
        payload.tdc_channels.push(TdcChannel { hit_times: vec![8.0] }); // v1
        payload.tdc_channels.push(TdcChannel { hit_times: vec![8.0] }); // v2

        let pos = DelaylinePosition { u1_channel: 0, u2_channel: 1, v1_channel: 2, v2_channel: 3, scale: 0.5 };
        let mut out = pos.result_template();
        let resolver = NoDeps;
        let ctx = ProcessContext { resolver: &resolver };
        pos.process(&evt, &mut out, &ctx).unwrap();
        assert_eq!(out.storage[POS_X], 2.0); // 0.5 * (10 - 6)
        assert_eq!(out.storage[POS_Y], 0.0); // 0.5 * (8 - 8)
        assert_eq!(out.storage[POS_SUM_U], 16.0);
    }
}

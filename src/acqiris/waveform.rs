//! Constant-fraction discrimination (pp150-class) and TDC hit counting (pp250-class) on raw
//! digitizer channels carried directly on the event, grounded on the channel layout in
//! `cass_acqiris`'s `Instrument`/`Channel` device model.

use crate::error::{CassError, CassResult};
use crate::event::{CassEvent, DeviceTag};
use crate::processor::{Compute, ProcessContext};
use crate::result::ResultContainer;

/// Finds threshold-crossing hit times on one Acqiris channel using a constant-fraction
/// discriminator: a crossing is reported where the waveform, delayed and inverted-and-scaled
/// by `fraction`, crosses zero, provided the raw sample first exceeded `threshold`.
pub struct ConstantFractionDiscriminator {
    pub channel_index: usize,
    pub threshold: f64,
    pub fraction: f64,
    pub delay_samples: usize,
}

impl Compute for ConstantFractionDiscriminator {
    fn process(&self, event: &CassEvent, out: &mut ResultContainer, _ctx: &ProcessContext) -> CassResult<()> {
        let payload = event.require_device(DeviceTag::Acqiris)?;
        let channel = payload
            .acqiris_channels
            .get(self.channel_index)
            .ok_or_else(|| CassError::InvalidData {
                reason: format!("no Acqiris channel at index {}", self.channel_index),
            })?;

        out.reset_table();
        let samples = &channel.samples;
        let delay = self.delay_samples.max(1);
        let mut hits = Vec::new();
        for i in delay..samples.len() {
            let raw = channel.offset + samples[i] as f64 * channel.gain;
            if raw.abs() < self.threshold {
                continue;
            }
            let delayed = channel.offset + samples[i - delay] as f64 * channel.gain;
            let cfd_prev = samples[i - 1] as f64 * channel.gain - self.fraction * (samples[i - 1 - delay] as f64 * channel.gain);
            let cfd_curr = samples[i] as f64 * channel.gain - self.fraction * delayed;
            if i > 0 && cfd_prev.signum() != cfd_curr.signum() {
                let t = channel.horpos + i as f64 * channel.sample_interval;
                hits.push(t as f32);
            }
        }
        if !hits.is_empty() {
            out.append_rows(&hits)?;
        }
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        ResultContainer::table("cfdhits", 1)
    }
}

/// Counts the hits recorded on one TDC channel for the current event (pp250-class).
pub struct TdcHitCount {
    pub channel_index: usize,
}

impl Compute for TdcHitCount {
    fn process(&self, event: &CassEvent, out: &mut ResultContainer, _ctx: &ProcessContext) -> CassResult<()> {
        let payload = event.require_device(DeviceTag::AcqirisTDC)?;
        let channel = payload
            .tdc_channels
            .get(self.channel_index)
            .ok_or_else(|| CassError::InvalidData {
                reason: format!("no TDC channel at index {}", self.channel_index),
            })?;
        out.set_value(channel.hit_times.len() as f32);
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        ResultContainer::value("tdchitcount")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AcqirisChannel;
    use crate::processor::DependencyResolver;
    use crate::event::EventId;
    use crate::cached_list::ResultHandle;

    struct NoDeps;
    impl DependencyResolver for NoDeps {
        fn result_of(&self, name: &str, _id: EventId) -> CassResult<ResultHandle> {
            Err(CassError::UnknownProcessor { name: name.into() })
        }
    }

    #[test]
    fn cfd_finds_a_single_edge() {
        let mut evt = CassEvent::new();
        evt.id = 1;
        let samples: Vec<i16> = (0..20).map(|i| if i < 10 { 0 } else { 1000 }).collect();
        evt.device_mut(DeviceTag::Acqiris).acqiris_channels.push(AcqirisChannel {
            horpos: 0.0,
            offset: 0.0,
            gain: 1.0,
            sample_interval: 1.0,
            samples,
        });

        let cfd = ConstantFractionDiscriminator { channel_index: 0, threshold: 100.0, fraction: 0.5, delay_samples: 2 };
        let mut out = cfd.result_template();
        let resolver = NoDeps;
        let ctx = ProcessContext { resolver: &resolver };
        cfd.process(&evt, &mut out, &ctx).unwrap();
        assert!(!out.storage.is_empty());
    }

    #[test]
    fn tdc_hit_count_reports_channel_length() {
        let mut evt = CassEvent::new();
        evt.id = 1;
        evt.device_mut(DeviceTag::AcqirisTDC).tdc_channels.push(crate::event::TdcChannel {
            hit_times: vec![1.0, 2.0, 3.0],
        });
        let counter = TdcHitCount { channel_index: 0 };
        let mut out = counter.result_template();
        let resolver = NoDeps;
        let ctx = ProcessContext { resolver: &resolver };
        counter.process(&evt, &mut out, &ctx).unwrap();
        assert_eq!(out.get_value(), 3.0);
    }
}

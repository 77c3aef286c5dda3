//! Event aggregate (§4.D): a monotonic id plus a fixed map from device tag to device
//! payload.

use crate::error::{CassError, CassResult};
use crate::serializer::{Deserializer, Serializer};
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::io::{Read, Write};

/// `(timestamp<<32)|fiducial`, §3/§6.
pub type EventId = u64;

pub fn event_id(timestamp_secs: u32, fiducial: u32) -> EventId {
    ((timestamp_secs as u64) << 32) | fiducial as u64
}

pub fn timestamp_of(id: EventId) -> u32 {
    (id >> 32) as u32
}

pub fn fiducial_of(id: EventId) -> u32 {
    (id & 0xFFFF_FFFF) as u32
}

/// `YYYY-MM-DDThh:mm:ss_<fiducial>`; id 0 renders `UnknownTime_0`.
pub fn render_event_id(id: EventId) -> String {
    if id == 0 {
        return "UnknownTime_0".to_string();
    }
    let secs = timestamp_of(id) as i64;
    let fiducial = fiducial_of(id);
    match Utc.timestamp_opt(secs, 0).single() {
        Some(dt) => format!("{}_{}", dt.format("%Y-%m-%dT%H:%M:%S"), fiducial),
        None => format!("UnknownTime_{fiducial}"),
    }
}

/// One sub-detector's pixel frame: column/row count, row-major float pixels, plus optional
/// auxiliary metadata (§3).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PixelDetector {
    pub columns: usize,
    pub rows: usize,
    pub original_columns: usize,
    pub original_rows: usize,
    pub frame: Vec<f32>,
    pub camax_magic: u32,
    pub info: String,
}

impl PixelDetector {
    pub fn new(columns: usize, rows: usize) -> Self {
        Self {
            columns,
            rows,
            original_columns: columns,
            original_rows: rows,
            frame: vec![0.0; columns * rows],
            camax_magic: 0,
            info: String::new(),
        }
    }

    /// Row-major index, y slow / x fast, matching the §3 2-D linearization convention.
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.columns + x
    }

    pub fn serialize<W: Write>(&self, ser: &mut Serializer<W>) -> CassResult<()> {
        ser.add_sizet(self.columns)?;
        ser.add_sizet(self.rows)?;
        ser.add_sizet(self.original_columns)?;
        ser.add_sizet(self.original_rows)?;
        ser.add_u32(self.camax_magic)?;
        ser.add_string(&self.info)?;
        ser.add_sizet(self.frame.len())?;
        for v in &self.frame {
            ser.add_f32(*v)?;
        }
        Ok(())
    }

    pub fn deserialize<R: Read>(de: &mut Deserializer<R>) -> CassResult<Self> {
        let columns = de.retrieve_sizet()?;
        let rows = de.retrieve_sizet()?;
        let original_columns = de.retrieve_sizet()?;
        let original_rows = de.retrieve_sizet()?;
        let camax_magic = de.retrieve_u32()?;
        let info = de.retrieve_string()?;
        let n = de.retrieve_sizet()?;
        let mut frame = Vec::with_capacity(n);
        for _ in 0..n {
            frame.push(de.retrieve_f32()?);
        }
        Ok(Self {
            columns,
            rows,
            original_columns,
            original_rows,
            frame,
            camax_magic,
            info,
        })
    }
}

/// One waveform digitizer channel (§3): horizontal position, vertical offset, gain, sample
/// interval, and a 16-bit sample sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcqirisChannel {
    pub horpos: f64,
    pub offset: f64,
    pub gain: f64,
    pub sample_interval: f64,
    pub samples: Vec<i16>,
}

/// A set of TDC hit times (doubles) for one channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TdcChannel {
    pub hit_times: Vec<f64>,
}

/// The closed set of device tags a CASSEvent can carry (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceTag {
    PixelDetectors,
    Acqiris,
    AcqirisTDC,
    MachineData,
}

impl DeviceTag {
    pub const ALL: [DeviceTag; 4] = [
        DeviceTag::PixelDetectors,
        DeviceTag::Acqiris,
        DeviceTag::AcqirisTDC,
        DeviceTag::MachineData,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DeviceTag::PixelDetectors => "PixelDetectors",
            DeviceTag::Acqiris => "Acqiris",
            DeviceTag::AcqirisTDC => "AcqirisTDC",
            DeviceTag::MachineData => "MachineData",
        }
    }
}

/// One device's payload. Distinct variants stand in for the original's polymorphic device
/// base class; the closed set matches §9's "tagged sum type" recommendation for a closed
/// variant set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DevicePayload {
    pub detectors: Vec<PixelDetector>,
    pub acqiris_channels: Vec<AcqirisChannel>,
    pub tdc_channels: Vec<TdcChannel>,
    pub machine_data: HashMap<String, f64>,
}

impl DevicePayload {
    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
            && self.acqiris_channels.is_empty()
            && self.tdc_channels.is_empty()
            && self.machine_data.is_empty()
    }

    fn serialize<W: Write>(&self, ser: &mut Serializer<W>) -> CassResult<()> {
        ser.add_sizet(self.detectors.len())?;
        for d in &self.detectors {
            d.serialize(ser)?;
        }
        ser.add_sizet(self.acqiris_channels.len())?;
        for c in &self.acqiris_channels {
            ser.add_f64(c.horpos)?;
            ser.add_f64(c.offset)?;
            ser.add_f64(c.gain)?;
            ser.add_f64(c.sample_interval)?;
            ser.add_sizet(c.samples.len())?;
            for s in &c.samples {
                ser.add_i16(*s)?;
            }
        }
        ser.add_sizet(self.tdc_channels.len())?;
        for t in &self.tdc_channels {
            ser.add_sizet(t.hit_times.len())?;
            for h in &t.hit_times {
                ser.add_f64(*h)?;
            }
        }
        ser.add_sizet(self.machine_data.len())?;
        for (k, v) in &self.machine_data {
            ser.add_string(k)?;
            ser.add_f64(*v)?;
        }
        Ok(())
    }

    fn deserialize<R: Read>(de: &mut Deserializer<R>) -> CassResult<Self> {
        let n_det = de.retrieve_sizet()?;
        let mut detectors = Vec::with_capacity(n_det);
        for _ in 0..n_det {
            detectors.push(PixelDetector::deserialize(de)?);
        }
        let n_acq = de.retrieve_sizet()?;
        let mut acqiris_channels = Vec::with_capacity(n_acq);
        for _ in 0..n_acq {
            let horpos = de.retrieve_f64()?;
            let offset = de.retrieve_f64()?;
            let gain = de.retrieve_f64()?;
            let sample_interval = de.retrieve_f64()?;
            let n_samples = de.retrieve_sizet()?;
            let mut samples = Vec::with_capacity(n_samples);
            for _ in 0..n_samples {
                samples.push(de.retrieve_i16()?);
            }
            acqiris_channels.push(AcqirisChannel {
                horpos,
                offset,
                gain,
                sample_interval,
                samples,
            });
        }
        let n_tdc = de.retrieve_sizet()?;
        let mut tdc_channels = Vec::with_capacity(n_tdc);
        for _ in 0..n_tdc {
            let n_hits = de.retrieve_sizet()?;
            let mut hit_times = Vec::with_capacity(n_hits);
            for _ in 0..n_hits {
                hit_times.push(de.retrieve_f64()?);
            }
            tdc_channels.push(TdcChannel { hit_times });
        }
        let n_md = de.retrieve_sizet()?;
        let mut machine_data = HashMap::with_capacity(n_md);
        for _ in 0..n_md {
            let k = de.retrieve_string()?;
            let v = de.retrieve_f64()?;
            machine_data.insert(k, v);
        }
        Ok(Self {
            detectors,
            acqiris_channels,
            tdc_channels,
            machine_data,
        })
    }
}

const EVENT_WIRE_VERSION: u16 = 1;

/// Owns the event id and the fixed device mapping. Devices are constructed once and reused
/// via `clear()`, matching the "devices constructed once per event object, reused via pool"
/// lifecycle rule (§3).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CassEvent {
    pub id: EventId,
    devices: HashMap<DeviceTag, DevicePayload>,
}

impl CassEvent {
    pub fn new() -> Self {
        Self {
            id: 0,
            devices: DeviceTag::ALL.iter().map(|t| (*t, DevicePayload::default())).collect(),
        }
    }

    pub fn clear(&mut self) {
        self.id = 0;
        for payload in self.devices.values_mut() {
            *payload = DevicePayload::default();
        }
    }

    pub fn device(&self, tag: DeviceTag) -> &DevicePayload {
        self.devices.get(&tag).expect("all tags preallocated")
    }

    pub fn device_mut(&mut self, tag: DeviceTag) -> &mut DevicePayload {
        self.devices.get_mut(&tag).expect("all tags preallocated")
    }

    /// Returns the device's payload, raising `DeviceAbsent` if it carries no data — distinct
    /// from an empty-but-present payload per §4.D.
    pub fn require_device(&self, tag: DeviceTag) -> CassResult<&DevicePayload> {
        let payload = self.device(tag);
        if payload.is_empty() {
            Err(CassError::DeviceAbsent { tag: tag.name() })
        } else {
            Ok(payload)
        }
    }

    pub fn serialize<W: Write>(&self, ser: &mut Serializer<W>) -> CassResult<()> {
        ser.add_u16(EVENT_WIRE_VERSION)?;
        ser.add_u64(self.id)?;
        for tag in DeviceTag::ALL {
            self.device(tag).serialize(ser)?;
        }
        Ok(())
    }

    pub fn deserialize<R: Read>(de: &mut Deserializer<R>) -> CassResult<Self> {
        let version = de.retrieve_u16()?;
        if version != EVENT_WIRE_VERSION {
            return Err(CassError::UnknownVersion {
                found: version,
                expected: EVENT_WIRE_VERSION,
            });
        }
        let id = de.retrieve_u64()?;
        let mut devices = HashMap::with_capacity(DeviceTag::ALL.len());
        for tag in DeviceTag::ALL {
            devices.insert(tag, DevicePayload::deserialize(de)?);
        }
        Ok(Self { id, devices })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn render_event_id_handles_sentinel() {
        assert_eq!(render_event_id(0), "UnknownTime_0");
    }

    #[test]
    fn round_trips_with_every_device_populated() {
        let mut evt = CassEvent::new();
        evt.id = event_id(1_700_000_000, 42);
        evt.device_mut(DeviceTag::PixelDetectors)
            .detectors
            .push(PixelDetector::new(2, 2));
        evt.device_mut(DeviceTag::Acqiris)
            .acqiris_channels
            .push(AcqirisChannel {
                horpos: 1.0,
                offset: 2.0,
                gain: 3.0,
                sample_interval: 4.0,
                samples: vec![1, -2, 3],
            });
        evt.device_mut(DeviceTag::AcqirisTDC)
            .tdc_channels
            .push(TdcChannel {
                hit_times: vec![0.1, 0.2],
            });
        evt.device_mut(DeviceTag::MachineData)
            .machine_data
            .insert("photon_energy_ev".into(), 9000.0);

        let mut buf = Vec::new();
        {
            let mut ser = Serializer::new(&mut buf);
            evt.serialize(&mut ser).unwrap();
        }
        let mut de = Deserializer::new(Cursor::new(buf));
        let evt2 = CassEvent::deserialize(&mut de).unwrap();
        assert_eq!(evt, evt2);
    }

    #[test]
    fn missing_device_is_distinguished_from_empty() {
        let evt = CassEvent::new();
        assert!(matches!(
            evt.require_device(DeviceTag::Acqiris),
            Err(CassError::DeviceAbsent { .. })
        ));
    }
}

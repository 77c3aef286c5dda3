//! raw-sss reader: Per Johnsonn's commercial CCD frame format (§4.E, §6).

use super::Reader;
use crate::error::{CassError, CassResult};
use crate::event::{CassEvent, DeviceTag, PixelDetector};
use std::io::Read;

fn read_u32(stream: &mut impl Read) -> CassResult<u32> {
    let mut b = [0u8; 4];
    stream.read_exact(&mut b).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            CassError::Truncated {
                offset: 0,
                expected: 4,
                got: 0,
            }
        } else {
            CassError::IoError(e)
        }
    })?;
    Ok(u32::from_le_bytes(b))
}

#[derive(Debug, Default)]
pub struct RawSssReader {
    width: usize,
    height: usize,
    n_images: usize,
    image_counter: usize,
    header_read: bool,
}

impl RawSssReader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reader for RawSssReader {
    fn read_header_info<R: Read>(&mut self, stream: &mut R) -> CassResult<()> {
        self.width = read_u32(stream)? as usize;
        self.height = read_u32(stream)? as usize;
        self.n_images = read_u32(stream)? as usize;
        self.image_counter = 0;
        self.header_read = true;
        Ok(())
    }

    fn read_event<R: Read>(&mut self, stream: &mut R, event: &mut CassEvent) -> CassResult<bool> {
        if !self.header_read {
            self.read_header_info(stream)?;
        }

        self.image_counter += 1;
        if self.image_counter > self.n_images {
            return Err(CassError::CorruptStream {
                reason: format!(
                    "trying to read image {} but the header reported only {}",
                    self.image_counter, self.n_images
                ),
            });
        }

        let event_id = match read_u32(stream) {
            Ok(v) => v,
            Err(CassError::Truncated { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };

        let n_pixels = self.width * self.height;
        let mut pixels = vec![0u8; n_pixels];
        stream.read_exact(&mut pixels).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                CassError::Truncated {
                    offset: 0,
                    expected: n_pixels,
                    got: 0,
                }
            } else {
                CassError::IoError(e)
            }
        })?;
        let height_check = read_u32(stream)? as usize;
        if height_check != self.height {
            return Err(CassError::CorruptStream {
                reason: format!(
                    "read height {height_check} does not match header height {}",
                    self.height
                ),
            });
        }

        event.id = event_id as u64;
        let payload = event.device_mut(DeviceTag::PixelDetectors);
        if payload.detectors.is_empty() {
            payload.detectors.push(PixelDetector::default());
        }
        let det = &mut payload.detectors[0];
        det.columns = self.width;
        det.rows = self.height;
        det.original_columns = self.width;
        det.original_rows = self.height;
        det.frame = pixels.iter().map(|p| *p as f32).collect();
        Ok(true)
    }
}

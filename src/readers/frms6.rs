//! frms6 reader: Xonline/HLL pnCCD frame format (§4.E, §6).
//!
//! File header is 1024 bytes, frame header is 64 bytes, both little-endian and packed. The
//! pixel payload is read in the native HLL quadrant order and de-interleaved into the
//! canonical CASS layout: quadrants 0 (top-left-of-buffer) and 3 copy forward into the
//! lower half of the output frame; quadrants 1 and 2 copy in reverse into the upper half.

use super::Reader;
use crate::error::{CassError, CassResult};
use crate::event::{CassEvent, DeviceTag, PixelDetector};
use std::io::Read;

pub const FILE_HEADER_SIZE: usize = 1024;
pub const FRAME_HEADER_SIZE: usize = 64;

#[derive(Debug, Clone)]
pub struct FileHeader {
    pub my_length: u16,
    pub fh_length: u16,
    pub n_ccds: u8,
    pub width: u8,
    pub max_height: u8,
    pub version: u8,
    pub dataset_id: [u8; 80],
    pub the_width: u16,
    pub the_max_height: u16,
}

impl Default for FileHeader {
    fn default() -> Self {
        FileHeader {
            my_length: 0,
            fh_length: 0,
            n_ccds: 0,
            width: 0,
            max_height: 0,
            version: 0,
            dataset_id: [0u8; 80],
            the_width: 0,
            the_max_height: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameHeader {
    pub start: u8,
    pub info: u8,
    pub id: u8,
    pub height: u8,
    pub tv_sec: u32,
    pub tv_usec: u32,
    pub index: u32,
    pub temp: f64,
    pub the_start: u16,
    pub the_height: u16,
    pub external_id: u32,
    pub bunch_id: u64,
}

fn read_exact_at(stream: &mut impl Read, buf: &mut [u8], offset: u64) -> CassResult<()> {
    stream.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            CassError::Truncated {
                offset,
                expected: buf.len(),
                got: 0,
            }
        } else {
            CassError::IoError(e)
        }
    })
}

#[derive(Debug, Default)]
pub struct Frms6Reader {
    file_header: FileHeader,
}

impl Frms6Reader {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_file_header(&mut self, stream: &mut impl Read) -> CassResult<()> {
        let mut raw = [0u8; FILE_HEADER_SIZE];
        read_exact_at(stream, &mut raw, 0)?;
        self.file_header = FileHeader {
            my_length: u16::from_le_bytes([raw[0], raw[1]]),
            fh_length: u16::from_le_bytes([raw[2], raw[3]]),
            n_ccds: raw[4],
            width: raw[5],
            max_height: raw[6],
            version: raw[7],
            dataset_id: raw[8..88].try_into().unwrap(),
            the_width: u16::from_le_bytes([raw[88], raw[89]]),
            the_max_height: u16::from_le_bytes([raw[90], raw[91]]),
        };
        Ok(())
    }

    fn read_frame_header(&self, stream: &mut impl Read, offset: u64) -> CassResult<FrameHeader> {
        let mut raw = [0u8; FRAME_HEADER_SIZE];
        read_exact_at(stream, &mut raw, offset)?;
        Ok(FrameHeader {
            start: raw[0],
            info: raw[1],
            id: raw[2],
            height: raw[3],
            tv_sec: u32::from_le_bytes(raw[4..8].try_into().unwrap()),
            tv_usec: u32::from_le_bytes(raw[8..12].try_into().unwrap()),
            index: u32::from_le_bytes(raw[12..16].try_into().unwrap()),
            temp: f64::from_le_bytes(raw[16..24].try_into().unwrap()),
            the_start: u16::from_le_bytes([raw[24], raw[25]]),
            the_height: u16::from_le_bytes([raw[26], raw[27]]),
            external_id: u32::from_le_bytes(raw[28..32].try_into().unwrap()),
            bunch_id: u64::from_le_bytes(raw[32..40].try_into().unwrap()),
        })
    }

    /// De-interleaves a raw `the_width x the_height` HLL buffer into the canonical CASS
    /// frame with `columns = the_width/2, rows = the_height*2`.
    pub fn deinterleave(raw: &[i16], the_width: usize, the_height: usize) -> Vec<f32> {
        let columns = the_width / 2;
        let rows = the_height * 2;
        let mut frame = vec![0.0f32; columns * rows];
        let half_cols = columns / 2;
        let hll_columns = the_width;

        let mut cass_row = 0usize;
        // quadrants 0 and 3: forward copy into the lower half.
        let mut q0 = 0usize;
        let mut q3 = half_cols.min(raw.len());
        for _ in 0..the_height {
            let out = &mut frame[cass_row * columns..cass_row * columns + columns];
            out[..half_cols].copy_from_slice(&raw_as_f32(&raw[q0..q0 + half_cols]));
            out[half_cols..].copy_from_slice(&raw_as_f32(&raw[q3..q3 + half_cols]));
            q0 += hll_columns;
            q3 += hll_columns;
            cass_row += 1;
        }
        // quadrants 1 and 2: reverse copy into the upper half.
        let len = raw.len();
        let mut q1_start = len.saturating_sub(1 + 2 * half_cols);
        let mut q2_start = len.saturating_sub(1 + half_cols);
        for _ in 0..the_height {
            let out = &mut frame[cass_row * columns..cass_row * columns + columns];
            copy_reverse_into(raw, q1_start, half_cols, &mut out[..half_cols]);
            copy_reverse_into(raw, q2_start, half_cols, &mut out[half_cols..]);
            q1_start = q1_start.saturating_sub(hll_columns);
            q2_start = q2_start.saturating_sub(hll_columns);
            cass_row += 1;
        }
        frame
    }
}

fn raw_as_f32(src: &[i16]) -> Vec<f32> {
    src.iter().map(|v| *v as f32).collect()
}

fn copy_reverse_into(src: &[i16], start: usize, count: usize, dst: &mut [f32]) {
    for i in 0..count {
        let idx = start.saturating_sub(i);
        dst[i] = src.get(idx).copied().unwrap_or(0) as f32;
    }
}

impl Reader for Frms6Reader {
    fn read_header_info<R: Read>(&mut self, stream: &mut R) -> CassResult<()> {
        self.read_file_header(stream)
    }

    fn read_event<R: Read>(&mut self, stream: &mut R, event: &mut CassEvent) -> CassResult<bool> {
        let frame_offset = FILE_HEADER_SIZE as u64;
        let frame_header = match self.read_frame_header(stream, frame_offset) {
            Ok(h) => h,
            Err(CassError::Truncated { got: 0, .. }) => return Ok(false),
            Err(e) => return Err(e),
        };

        let the_width = self.file_header.the_width as usize;
        let the_height = frame_header.the_height as usize;
        let n_pixels = the_width * the_height;
        let mut raw_bytes = vec![0u8; n_pixels * 2];
        read_exact_at(stream, &mut raw_bytes, frame_offset + FRAME_HEADER_SIZE as u64)?;
        let raw: Vec<i16> = raw_bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();

        event.id = frame_header.external_id as u64;
        let frame = Self::deinterleave(&raw, the_width, the_height);

        let payload = event.device_mut(DeviceTag::PixelDetectors);
        if payload.detectors.is_empty() {
            payload.detectors.push(PixelDetector::default());
        }
        let det = &mut payload.detectors[0];
        det.columns = the_width / 2;
        det.rows = the_height * 2;
        det.original_columns = det.columns;
        det.original_rows = det.rows;
        det.frame = frame;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build_file(the_width: u16, the_height: u16, external_id: u32, pixels: &[i16]) -> Vec<u8> {
        let mut buf = vec![0u8; FILE_HEADER_SIZE];
        buf[88..90].copy_from_slice(&the_width.to_le_bytes());
        buf[90..92].copy_from_slice(&the_height.to_le_bytes());

        let mut frame_header = vec![0u8; FRAME_HEADER_SIZE];
        frame_header[26..28].copy_from_slice(&the_height.to_le_bytes());
        frame_header[28..32].copy_from_slice(&external_id.to_le_bytes());
        buf.extend_from_slice(&frame_header);
        for p in pixels {
            buf.extend_from_slice(&p.to_le_bytes());
        }
        buf
    }

    #[test]
    fn s2_frms6_round_trip() {
        let the_width = 1024u16;
        let the_height = 512u16;
        let n = the_width as usize * the_height as usize;
        let pixels: Vec<i16> = (0..n).map(|i| (i % 16384) as i16).collect();
        let bytes = build_file(the_width, the_height, 7, &pixels);

        let mut reader = Frms6Reader::new();
        let mut cursor = Cursor::new(bytes);
        reader.read_header_info(&mut cursor).unwrap();
        let mut event = CassEvent::new();
        let ok = reader.read_event(&mut cursor, &mut event).unwrap();
        assert!(ok);
        assert_eq!(event.id, 7);

        let det = &event.device(DeviceTag::PixelDetectors).detectors[0];
        assert_eq!(det.columns, the_width as usize / 2);
        assert_eq!(det.rows, the_height as usize * 2);
        assert_eq!(det.frame.len(), det.columns * det.rows);
    }

    #[test]
    fn eof_returns_false() {
        let bytes = vec![0u8; FILE_HEADER_SIZE];
        let mut reader = Frms6Reader::new();
        let mut cursor = Cursor::new(bytes);
        reader.read_header_info(&mut cursor).unwrap();
        let mut event = CassEvent::new();
        let ok = reader.read_event(&mut cursor, &mut event).unwrap();
        assert!(!ok);
    }
}

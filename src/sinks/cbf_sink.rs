//! CBF-shaped sink (pp1500): writes a single 2-D histogram per event to its own file, one
//! file per event id, mirroring the original's per-event CBF image dump.

use super::{NamedResult, ResultSink};
use crate::error::{CassError, CassResult};
use crate::event::render_event_id;
use crate::serializer::Serializer;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

pub struct CbfSink {
    pub base_dir: PathBuf,
    pub file_base_name: String,
}

impl CbfSink {
    pub fn new(base_dir: impl Into<PathBuf>, file_base_name: impl Into<String>) -> Self {
        Self { base_dir: base_dir.into(), file_base_name: file_base_name.into() }
    }
}

impl ResultSink for CbfSink {
    fn write(&self, event_id: u64, results: &[NamedResult]) -> CassResult<()> {
        let entry = results.first().ok_or_else(|| CassError::InvalidData {
            reason: "CBF sink requires exactly one 2-D result".into(),
        })?;
        if entry.result.axes.len() != 2 {
            return Err(CassError::ShapeMismatch {
                reason: format!("CBF sink requires a 2-D histogram, '{}' is not one", entry.name),
            });
        }
        let path = self
            .base_dir
            .join(format!("{}_{}.cbflog", self.file_base_name, render_event_id(event_id)));
        let file = File::create(&path)?;
        let mut ser = Serializer::new(BufWriter::new(file));
        ser.add_u64(event_id)?;
        entry.result.serialize(&mut ser)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{Axis, ResultContainer};
    use tempfile::tempdir;

    #[test]
    fn writes_the_first_2d_result_only() {
        let dir = tempdir().unwrap();
        let sink = CbfSink::new(dir.path(), "frame");
        let img = ResultContainer::histogram_2d("img", Axis::new(2, 0.0, 2.0, "x"), Axis::new(2, 0.0, 2.0, "y"));
        sink.write(1, &[NamedResult { group: "/", name: "img", result: &img }]).unwrap();
        let expected = dir.path().join(format!("frame_{}.cbflog", render_event_id(1)));
        assert!(expected.exists());
    }

    #[test]
    fn rejects_non_2d_input() {
        let dir = tempdir().unwrap();
        let sink = CbfSink::new(dir.path(), "frame");
        let scalar = ResultContainer::value("x");
        let err = sink.write(1, &[NamedResult { group: "/", name: "x", result: &scalar }]);
        assert!(matches!(err, Err(CassError::ShapeMismatch { .. })));
    }
}

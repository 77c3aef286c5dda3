//! HDF5-shaped sink (pp1002): one file per event (or a growing run file), with each result
//! written under `<group>/<name>` the way the original's hdf5 converter lays results out so
//! downstream tools like crystfel can find them by a predictable path.

use super::{NamedResult, ResultSink};
use crate::error::CassResult;
use crate::event::render_event_id;
use crate::serializer::Serializer;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

pub struct Hdf5Sink {
    pub base_dir: PathBuf,
    pub file_base_name: String,
    pub one_file_per_event: bool,
}

impl Hdf5Sink {
    pub fn new(base_dir: impl Into<PathBuf>, file_base_name: impl Into<String>, one_file_per_event: bool) -> Self {
        Self { base_dir: base_dir.into(), file_base_name: file_base_name.into(), one_file_per_event }
    }

    fn path_for(&self, event_id: u64) -> PathBuf {
        let suffix = if self.one_file_per_event {
            render_event_id(event_id)
        } else {
            "run".to_string()
        };
        self.base_dir.join(format!("{}_{}.h5log", self.file_base_name, suffix))
    }
}

impl ResultSink for Hdf5Sink {
    fn write(&self, event_id: u64, results: &[NamedResult]) -> CassResult<()> {
        let path = self.path_for(event_id);
        let file = File::create(&path)?;
        let mut ser = Serializer::new(BufWriter::new(file));
        ser.add_u64(event_id)?;
        ser.add_sizet(results.len())?;
        for entry in results {
            ser.add_string(entry.group)?;
            ser.add_string(entry.name)?;
            entry.result.serialize(&mut ser)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ResultContainer;
    use tempfile::tempdir;

    #[test]
    fn writes_one_file_per_event_with_group_qualified_entries() {
        let dir = tempdir().unwrap();
        let sink = Hdf5Sink::new(dir.path(), "run", true);
        let mut image = ResultContainer::array_1d("img", 4);
        image.storage.copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        let entries = [NamedResult { group: "/data", name: "img", result: &image }];
        sink.write(crate::event::event_id(1_700_000_000, 5), &entries).unwrap();
        let expected = dir.path().join(format!("run_{}.h5log", render_event_id(crate::event::event_id(1_700_000_000, 5))));
        assert!(expected.exists());
    }
}

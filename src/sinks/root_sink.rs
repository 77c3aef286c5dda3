//! ROOT-shaped sink (pp2000): appends one row per event to a growing table, one column per
//! named 0-D result, mirroring the original's tree-of-scalars layout without linking ROOT.

use super::{NamedResult, ResultSink};
use crate::error::{CassError, CassResult};
use parking_lot::Mutex;
use std::collections::HashMap;

/// An in-memory column store standing in for a ROOT `TTree`: one named column per scalar
/// result, appended to every time `write` is called.
pub struct RootSink {
    columns: Mutex<HashMap<String, Vec<f32>>>,
}

impl RootSink {
    pub fn new() -> Self {
        Self { columns: Mutex::new(HashMap::new()) }
    }

    pub fn column(&self, name: &str) -> Option<Vec<f32>> {
        self.columns.lock().get(name).cloned()
    }

    pub fn row_count(&self) -> usize {
        self.columns.lock().values().map(|c| c.len()).max().unwrap_or(0)
    }
}

impl Default for RootSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultSink for RootSink {
    fn write(&self, _event_id: u64, results: &[NamedResult]) -> CassResult<()> {
        let mut columns = self.columns.lock();
        for entry in results {
            if !entry.result.axes.is_empty() {
                return Err(CassError::ShapeMismatch {
                    reason: format!("ROOT sink only accepts 0-D results, '{}' is not scalar", entry.name),
                });
            }
            columns.entry(entry.name.to_string()).or_default().push(entry.result.get_value());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ResultContainer;

    #[test]
    fn appends_a_row_per_write() {
        let sink = RootSink::new();
        let mut a = ResultContainer::value("energy");
        a.set_value(1.0);
        sink.write(1, &[NamedResult { group: "/", name: "energy", result: &a }]).unwrap();
        a.set_value(2.0);
        sink.write(2, &[NamedResult { group: "/", name: "energy", result: &a }]).unwrap();
        assert_eq!(sink.column("energy").unwrap(), vec![1.0, 2.0]);
        assert_eq!(sink.row_count(), 2);
    }

    #[test]
    fn rejects_non_scalar_results() {
        let sink = RootSink::new();
        let arr = ResultContainer::array_1d("arr", 3);
        let err = sink.write(1, &[NamedResult { group: "/", name: "arr", result: &arr }]);
        assert!(matches!(err, Err(CassError::ShapeMismatch { .. })));
    }
}

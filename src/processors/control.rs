//! Control processors (pp12, pp15, pp75, pp76, pp77): constants, change detection, clearing
//! another processor's result, quitting, and id-list membership.

use crate::error::CassResult;
use crate::event::CassEvent;
use crate::processor::{Compute, ProcessContext};
use crate::result::ResultContainer;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// A fixed constant result, ignoring the event entirely (pp12).
pub struct Constant {
    pub value: ResultContainer,
}

impl Compute for Constant {
    fn process(&self, _event: &CassEvent, out: &mut ResultContainer, _ctx: &ProcessContext) -> CassResult<()> {
        out.assign(&self.value);
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        self.value.clone()
    }
}

/// Reports `1.0` when `input`'s 0-D value has moved by more than `difference` since the
/// previous event, `0.0` otherwise (pp15). Shares state across events, so it runs as an
/// `AccumulatingProcessor`.
pub struct ValueChanged {
    pub input: String,
    pub difference: f32,
    previous: Mutex<Option<f32>>,
}

impl ValueChanged {
    pub fn new(input: impl Into<String>, difference: f32) -> Self {
        let difference = if difference == 0.0 { f32::EPSILON } else { difference };
        Self { input: input.into(), difference, previous: Mutex::new(None) }
    }
}

impl Compute for ValueChanged {
    fn process(&self, event: &CassEvent, out: &mut ResultContainer, ctx: &ProcessContext) -> CassResult<()> {
        let current = ctx.dependency(&self.input, event.id)?.read().get_value();
        let mut prev = self.previous.lock();
        let changed = match *prev {
            None => false,
            Some(p) => (current - p).abs() > self.difference,
        };
        *prev = Some(current);
        out.set_value(changed as i32 as f32);
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        ResultContainer::value("valuechanged")
    }
}

/// Clears `target`'s result whenever run (pp75): the manager only reaches this processor when
/// its `condition` evaluates true, so `process` unconditionally clears.
pub struct ClearResult {
    pub target: String,
}

impl Compute for ClearResult {
    fn process(&self, event: &CassEvent, out: &mut ResultContainer, ctx: &ProcessContext) -> CassResult<()> {
        let handle = ctx.dependency(&self.target, event.id)?;
        handle.write().clear();
        out.set_value(1.0);
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        ResultContainer::value("clearresult")
    }
}

/// Raises a latched quit flag whenever run (pp76): the manager only reaches this processor
/// when its `condition` evaluates true. The flag is sticky and readable via [`Quit::requested`]
/// so the run loop can stop after the current event finishes.
pub struct Quit {
    requested: AtomicBool,
}

impl Quit {
    pub fn new() -> Self {
        Self { requested: AtomicBool::new(false) }
    }

    pub fn requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

impl Default for Quit {
    fn default() -> Self {
        Self::new()
    }
}

impl Compute for Quit {
    fn process(&self, _event: &CassEvent, out: &mut ResultContainer, _ctx: &ProcessContext) -> CassResult<()> {
        self.requested.store(true, Ordering::SeqCst);
        out.set_value(1.0);
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        ResultContainer::value("quit")
    }
}

/// Reports `1.0` when the current event id is on a fixed, precomputed id list (pp77).
pub struct IdOnList {
    ids: HashSet<u64>,
}

impl IdOnList {
    pub fn new(ids: impl IntoIterator<Item = u64>) -> Self {
        Self { ids: ids.into_iter().collect() }
    }
}

impl Compute for IdOnList {
    fn process(&self, event: &CassEvent, out: &mut ResultContainer, _ctx: &ProcessContext) -> CassResult<()> {
        out.set_value(self.ids.contains(&event.id) as i32 as f32);
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        ResultContainer::value("idonlist")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cached_list::ResultHandle;
    use crate::error::CassError;
    use crate::event::EventId;
    use crate::processor::DependencyResolver;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct MapResolver(Arc<parking_lot::RwLock<HashMap<String, ResultHandle>>>);
    impl DependencyResolver for MapResolver {
        fn result_of(&self, name: &str, _id: EventId) -> CassResult<ResultHandle> {
            self.0
                .read()
                .get(name)
                .cloned()
                .ok_or_else(|| CassError::UnknownProcessor { name: name.into() })
        }
    }

    #[test]
    fn value_changed_flags_a_jump() {
        let input = Arc::new(parking_lot::RwLock::new(ResultContainer::value("x")));
        let mut map = HashMap::new();
        map.insert("x".to_string(), input.clone() as ResultHandle);
        let resolver = MapResolver(Arc::new(parking_lot::RwLock::new(map)));
        let ctx = ProcessContext { resolver: &resolver };

        let vc = ValueChanged::new("x", 0.5);
        let mut out = vc.result_template();
        let mut evt = CassEvent::new();

        input.write().set_value(1.0);
        evt.id = 1;
        vc.process(&evt, &mut out, &ctx).unwrap();
        assert_eq!(out.get_value(), 0.0); // no previous value yet

        input.write().set_value(5.0);
        evt.id = 2;
        vc.process(&evt, &mut out, &ctx).unwrap();
        assert_eq!(out.get_value(), 1.0);
    }

    #[test]
    fn quit_latches_once_triggered() {
        struct NoDeps;
        impl DependencyResolver for NoDeps {
            fn result_of(&self, name: &str, _id: EventId) -> CassResult<ResultHandle> {
                Err(CassError::UnknownProcessor { name: name.into() })
            }
        }
        let resolver = NoDeps;
        let ctx = ProcessContext { resolver: &resolver };
        let quit = Quit::new();
        assert!(!quit.requested());
        let mut out = quit.result_template();
        let mut evt = CassEvent::new();
        evt.id = 1;
        quit.process(&evt, &mut out, &ctx).unwrap();
        assert!(quit.requested());
    }

    #[test]
    fn id_on_list_checks_membership() {
        struct NoDeps;
        impl DependencyResolver for NoDeps {
            fn result_of(&self, name: &str, _id: EventId) -> CassResult<ResultHandle> {
                Err(CassError::UnknownProcessor { name: name.into() })
            }
        }
        let resolver = NoDeps;
        let ctx = ProcessContext { resolver: &resolver };
        let list = IdOnList::new([1, 3, 5]);
        let mut out = list.result_template();
        let mut evt = CassEvent::new();
        evt.id = 3;
        list.process(&evt, &mut out, &ctx).unwrap();
        assert_eq!(out.get_value(), 1.0);
        evt.id = 4;
        list.process(&evt, &mut out, &ctx).unwrap();
        assert_eq!(out.get_value(), 0.0);
    }
}

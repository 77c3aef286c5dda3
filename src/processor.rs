//! The processor base contract (§4.F): a unit of the graph that declares dependencies,
//! loads configuration, and runs `process(event, result)` once per event under a condition.
//!
//! Two base shapes are provided, mirroring the original's `Processor`/`AccumulatingProcessor`
//! split: [`BaseProcessor`] borrows a fresh slot from a [`CachedList`] per event;
//! [`AccumulatingProcessor`] owns one shared result that every worker updates under its
//! write lock. Both are generic over a [`Compute`] implementation supplying the actual
//! per-processor algorithm, so the trampoline (condition check, locking, promotion, error
//! downgrade) is written once.

use crate::cached_list::{CachedList, ResultHandle};
use crate::error::{CassError, CassResult};
use crate::event::{CassEvent, EventId};
use crate::result::ResultContainer;
use parking_lot::RwLock;
use std::sync::Arc;

/// Resolves a named processor's result for a given event id. Implemented by the
/// `ProcessorManager` and handed to every `process()` call so a processor can read its
/// dependencies' and condition's output.
pub trait DependencyResolver: Send + Sync {
    fn result_of(&self, name: &str, id: EventId) -> CassResult<ResultHandle>;
}

/// Per-call context threaded through `process()`.
pub struct ProcessContext<'a> {
    pub resolver: &'a dyn DependencyResolver,
}

impl<'a> ProcessContext<'a> {
    pub fn dependency(&self, name: &str, id: EventId) -> CassResult<ResultHandle> {
        self.resolver.result_of(name, id)
    }
}

/// The per-processor algorithm: everything the original's `process(evt, result)` override
/// did, minus the slot/lock/condition bookkeeping the base classes already handle.
pub trait Compute: Send + Sync {
    fn process(
        &self,
        event: &CassEvent,
        result: &mut ResultContainer,
        ctx: &ProcessContext,
    ) -> CassResult<()>;

    /// A freshly constructed result shaped for this processor's output, used to seed the
    /// `CachedList`/shared result. Most processors build this once in their constructor.
    fn result_template(&self) -> ResultContainer;
}

/// Node-level contract the manager drives: every processor, whether per-event or
/// accumulating, implements this.
pub trait ProcNode: Send + Sync {
    fn name(&self) -> &str;
    fn dependencies(&self) -> &[String];
    fn condition(&self) -> Option<&str>;
    fn process_event(&self, event: &CassEvent, ctx: &ProcessContext) -> CassResult<()>;
    fn result(&self, id: EventId) -> CassResult<ResultHandle>;
    fn release_event(&self, id: EventId);
    fn about_to_quit(&self) -> CassResult<()> {
        Ok(())
    }
    fn process_command(&self, _cmd: &str) -> CassResult<()> {
        Ok(())
    }
}

fn condition_is_true(condition: Option<&str>, id: EventId, ctx: &ProcessContext) -> CassResult<bool> {
    match condition {
        None => Ok(true),
        Some(name) => Ok(ctx.dependency(name, id)?.read().is_true()),
    }
}

/// Downgrades a data-shaped error to a logged skip; propagates everything else.
fn catch_data_errors(name: &str, id: EventId, r: CassResult<()>) -> CassResult<()> {
    match r {
        Err(CassError::InvalidData { reason })
        | Err(CassError::ShapeMismatch { reason }) => {
            log::warn!("{name}: skipping event {id:#018x}: {reason}");
            Ok(())
        }
        Err(CassError::DeviceAbsent { tag }) => {
            log::warn!("{name}: skipping event {id:#018x}: device '{tag}' absent");
            Ok(())
        }
        other => other,
    }
}

/// Standard per-event processor: borrows a fresh `CachedList` slot for every event.
pub struct BaseProcessor<C: Compute> {
    name: String,
    dependencies: Vec<String>,
    condition: Option<String>,
    cached_list: CachedList,
    compute: C,
}

impl<C: Compute> BaseProcessor<C> {
    pub fn new(
        name: impl Into<String>,
        dependencies: Vec<String>,
        condition: Option<String>,
        workers: usize,
        compute: C,
    ) -> Self {
        let template = compute.result_template();
        Self {
            name: name.into(),
            dependencies,
            condition,
            cached_list: CachedList::new(template, workers),
            compute,
        }
    }
}

impl<C: Compute> ProcNode for BaseProcessor<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    fn process_event(&self, event: &CassEvent, ctx: &ProcessContext) -> CassResult<()> {
        let handle = self.cached_list.new_item(event.id);
        if !condition_is_true(self.condition(), event.id, ctx)? {
            return Ok(());
        }
        let outcome = {
            let mut guard = handle.write();
            guard.id = event.id;
            self.compute.process(event, &mut guard, ctx)
        };
        if outcome.is_ok() {
            self.cached_list.promote_to_latest(event.id);
        }
        catch_data_errors(&self.name, event.id, outcome)
    }

    fn result(&self, id: EventId) -> CassResult<ResultHandle> {
        if id == 0 {
            Ok(self.cached_list.latest())
        } else {
            self.cached_list.item(id)
        }
    }

    fn release_event(&self, id: EventId) {
        self.cached_list.release(id);
    }
}

/// Accumulating processor: every worker updates the same shared result under its write
/// lock; `result()` always returns it and `release_event` is a no-op.
pub struct AccumulatingProcessor<C: Compute> {
    name: String,
    dependencies: Vec<String>,
    condition: Option<String>,
    shared: Arc<RwLock<ResultContainer>>,
    compute: C,
}

impl<C: Compute> AccumulatingProcessor<C> {
    pub fn new(
        name: impl Into<String>,
        dependencies: Vec<String>,
        condition: Option<String>,
        compute: C,
    ) -> Self {
        let template = compute.result_template();
        Self {
            name: name.into(),
            dependencies,
            condition,
            shared: Arc::new(RwLock::new(template)),
            compute,
        }
    }

    pub fn shared_handle(&self) -> ResultHandle {
        self.shared.clone()
    }
}

impl<C: Compute> ProcNode for AccumulatingProcessor<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    fn process_event(&self, event: &CassEvent, ctx: &ProcessContext) -> CassResult<()> {
        if !condition_is_true(self.condition(), event.id, ctx)? {
            return Ok(());
        }
        let outcome = {
            let mut guard = self.shared.write();
            guard.id = event.id;
            self.compute.process(event, &mut guard, ctx)
        };
        catch_data_errors(&self.name, event.id, outcome)
    }

    fn result(&self, _id: EventId) -> CassResult<ResultHandle> {
        Ok(self.shared.clone())
    }

    fn release_event(&self, _id: EventId) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::CassEvent;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct AlwaysTen;
    impl Compute for AlwaysTen {
        fn process(&self, _e: &CassEvent, r: &mut ResultContainer, _ctx: &ProcessContext) -> CassResult<()> {
            r.set_value(10.0);
            Ok(())
        }
        fn result_template(&self) -> ResultContainer {
            ResultContainer::value("ten")
        }
    }

    struct EmptyResolver;
    impl DependencyResolver for EmptyResolver {
        fn result_of(&self, name: &str, _id: EventId) -> CassResult<ResultHandle> {
            Err(CassError::UnknownProcessor { name: name.into() })
        }
    }

    struct MapResolver(Mutex<HashMap<String, ResultHandle>>);
    impl DependencyResolver for MapResolver {
        fn result_of(&self, name: &str, _id: EventId) -> CassResult<ResultHandle> {
            self.0
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .ok_or_else(|| CassError::UnknownProcessor { name: name.into() })
        }
    }

    #[test]
    fn unconditional_processor_computes_and_promotes() {
        let p = BaseProcessor::new("p", vec![], None, 2, AlwaysTen);
        let resolver = EmptyResolver;
        let ctx = ProcessContext { resolver: &resolver };
        let mut evt = CassEvent::new();
        evt.id = 1;
        p.process_event(&evt, &ctx).unwrap();
        assert_eq!(p.result(0).unwrap().read().get_value(), 10.0);
        assert_eq!(p.result(1).unwrap().read().get_value(), 10.0);
    }

    #[test]
    fn false_condition_skips_compute() {
        let mut cond_map = HashMap::new();
        let cond_result = Arc::new(RwLock::new(ResultContainer::value("cond")));
        cond_result.write().set_value(0.0);
        cond_map.insert("cond".to_string(), cond_result as ResultHandle);
        let resolver = MapResolver(Mutex::new(cond_map));
        let ctx = ProcessContext { resolver: &resolver };

        let p = BaseProcessor::new("p", vec![], Some("cond".into()), 2, AlwaysTen);
        let mut evt = CassEvent::new();
        evt.id = 1;
        p.process_event(&evt, &ctx).unwrap();
        // slot was reserved but never promoted; latest() still reads the cleared default
        assert_eq!(p.result(0).unwrap().read().get_value(), 0.0);
    }

    #[test]
    fn accumulating_processor_shares_one_result() {
        let p = AccumulatingProcessor::new("acc", vec![], None, AlwaysTen);
        let resolver = EmptyResolver;
        let ctx = ProcessContext { resolver: &resolver };
        let mut evt = CassEvent::new();
        evt.id = 1;
        p.process_event(&evt, &ctx).unwrap();
        evt.id = 2;
        p.process_event(&evt, &ctx).unwrap();
        assert_eq!(p.result(1).unwrap().read().get_value(), 10.0);
        assert_eq!(p.result(2).unwrap().read().get_value(), 10.0);
        assert!(Arc::ptr_eq(
            &p.result(1).unwrap(),
            &p.result(2).unwrap()
        ));
    }
}

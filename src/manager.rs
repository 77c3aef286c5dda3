//! Graph owner (§4.G): registry, activation, topological ordering, per-event traversal,
//! and command/shutdown fan-out.

use crate::config::{ProcessorConfig, Settings};
use crate::error::{CassError, CassResult};
use crate::event::{CassEvent, EventId};
use crate::processor::{DependencyResolver, ProcessContext, ProcNode};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A kind-string-to-constructor entry in the processor registry (§9: "behaviour keyed on
/// an integer enum is best modelled as a registry from string to constructor").
pub type Ctor =
    Arc<dyn Fn(&str, &ProcessorConfig, usize) -> CassResult<Arc<dyn ProcNode>> + Send + Sync>;

#[derive(Default)]
struct GraphState {
    registry: HashMap<String, Arc<dyn ProcNode>>,
    /// Topological order: each processor appears after every one of its dependencies.
    active: Vec<String>,
}

enum Color {
    Gray,
    Black,
}

/// The manager holds a reader/writer lock write-acquired only across a rebuild and
/// read-acquired for every `process_event`/`result_of` call (§5).
pub struct ProcessorManager {
    state: RwLock<GraphState>,
    settings: RwLock<Settings>,
    workers: usize,
    ctors: HashMap<String, Ctor>,
}

impl std::fmt::Debug for ProcessorManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorManager")
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

impl ProcessorManager {
    pub fn build(settings: Settings, workers: usize, ctors: HashMap<String, Ctor>) -> CassResult<Self> {
        let mgr = Self {
            state: RwLock::new(GraphState::default()),
            settings: RwLock::new(settings),
            workers,
            ctors,
        };
        mgr.rebuild()?;
        Ok(mgr)
    }

    /// Tears down and rebuilds the graph within a write-locked section (§3 lifecycle rule).
    pub fn rebuild(&self) -> CassResult<()> {
        let settings = self.settings.read();
        let mut registry = HashMap::new();
        let mut color: HashMap<String, Color> = HashMap::new();
        let mut order = Vec::new();
        for name in settings.general.activate.clone() {
            self.visit(&settings, &name, &mut registry, &mut color, &mut order)?;
        }
        let mut state = self.state.write();
        state.registry = registry;
        state.active = order;
        Ok(())
    }

    pub fn reload(&self, settings: Settings) -> CassResult<()> {
        *self.settings.write() = settings;
        self.rebuild()
    }

    fn visit(
        &self,
        settings: &Settings,
        name: &str,
        registry: &mut HashMap<String, Arc<dyn ProcNode>>,
        color: &mut HashMap<String, Color>,
        order: &mut Vec<String>,
    ) -> CassResult<()> {
        match color.get(name) {
            Some(Color::Black) => return Ok(()),
            Some(Color::Gray) => {
                return Err(CassError::CyclicGraph { name: name.into() })
            }
            None => {}
        }
        color.insert(name.to_string(), Color::Gray);

        let cfg = settings
            .processor(name)
            .map_err(|_| CassError::UnknownProcessor { name: name.into() })?;
        let ctor = self
            .ctors
            .get(&cfg.kind)
            .ok_or_else(|| CassError::UnknownKind { kind: cfg.kind.clone() })?;
        let node = ctor(name, cfg, self.workers)?;

        let mut deps = node.dependencies().to_vec();
        if let Some(c) = node.condition() {
            deps.push(c.to_string());
        }
        for dep in deps {
            self.visit(settings, &dep, registry, color, order)?;
        }

        registry.insert(name.to_string(), node);
        color.insert(name.to_string(), Color::Black);
        order.push(name.to_string());
        Ok(())
    }

    /// Runs one event through every activated processor, in topological order.
    pub fn process_event(&self, event: &CassEvent) -> CassResult<()> {
        let state = self.state.read();
        let ctx = ProcessContext { resolver: self };
        for name in &state.active {
            let node = state.registry.get(name).expect("active implies registered");
            node.process_event(event, &ctx)?;
        }
        Ok(())
    }

    /// Releases every processor's slot for `id`, making it eligible for reuse.
    pub fn release_event(&self, id: EventId) {
        let state = self.state.read();
        for node in state.registry.values() {
            node.release_event(id);
        }
    }

    /// Dispatches an opaque command string to one named processor.
    pub fn process_command(&self, name: &str, cmd: &str) -> CassResult<()> {
        let state = self.state.read();
        let node = state
            .registry
            .get(name)
            .ok_or_else(|| CassError::UnknownProcessor { name: name.into() })?;
        node.process_command(cmd)
    }

    /// Fans `about_to_quit` out once to every processor, in reverse topological order.
    pub fn about_to_quit(&self) -> CassResult<()> {
        let state = self.state.read();
        for name in state.active.iter().rev() {
            let node = state.registry.get(name).expect("active implies registered");
            node.about_to_quit()?;
        }
        Ok(())
    }

    pub fn active_order(&self) -> Vec<String> {
        self.state.read().active.clone()
    }
}

impl DependencyResolver for ProcessorManager {
    fn result_of(&self, name: &str, id: EventId) -> CassResult<crate::cached_list::ResultHandle> {
        let state = self.state.read();
        let node = state
            .registry
            .get(name)
            .ok_or_else(|| CassError::UnknownProcessor { name: name.into() })?;
        node.result(id)
    }
}

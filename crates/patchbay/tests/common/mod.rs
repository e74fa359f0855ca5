//! Shared fixtures for the engine integration tests
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use patchbay::{
    ComponentContext, ComponentLifecycle, ComponentState, ComponentStateListener, Error, Result,
    ServiceBinding,
};

/// Append-only log shared between a test and its lifecycle callbacks
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<S: Into<String>>(&self, entry: S) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.entries()
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Lifecycle implementation that records every callback, optionally failing
/// selected phases
pub struct Recorder {
    journal: Journal,
    fail_phases: HashSet<&'static str>,
}

impl Recorder {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            fail_phases: HashSet::new(),
        }
    }

    pub fn failing(journal: &Journal, phases: &[&'static str]) -> Self {
        Self {
            journal: journal.clone(),
            fail_phases: phases.iter().copied().collect(),
        }
    }

    fn emit(&self, phase: &'static str, entry: String) -> Result<()> {
        self.journal.record(entry);
        if self.fail_phases.contains(phase) {
            return Err(Error::internal(format!("{} deliberately failed", phase)));
        }
        Ok(())
    }
}

impl ComponentLifecycle for Recorder {
    fn init(&mut self, _ctx: &ComponentContext) -> Result<()> {
        self.emit("init", "init".to_string())
    }

    fn start(&mut self, _ctx: &ComponentContext) -> Result<()> {
        self.emit("start", "start".to_string())
    }

    fn stop(&mut self, _ctx: &ComponentContext) -> Result<()> {
        self.emit("stop", "stop".to_string())
    }

    fn destroy(&mut self, _ctx: &ComponentContext) -> Result<()> {
        self.emit("destroy", "destroy".to_string())
    }

    fn bind(&mut self, dependency: &str, binding: &ServiceBinding) -> Result<()> {
        self.emit(
            "bind",
            format!("bind {} #{}", dependency, binding.handle().registration_id()),
        )
    }

    fn unbind(&mut self, dependency: &str, binding: &ServiceBinding) -> Result<()> {
        self.emit(
            "unbind",
            format!(
                "unbind {} #{}",
                dependency,
                binding.handle().registration_id()
            ),
        )
    }

    fn swap(&mut self, dependency: &str, old: &ServiceBinding, new: &ServiceBinding) -> Result<()> {
        self.emit(
            "swap",
            format!(
                "swap {} #{}->#{}",
                dependency,
                old.handle().registration_id(),
                new.handle().registration_id()
            ),
        )
    }
}

/// State listener that records transitions into a journal
pub struct StateLog(pub Journal);

impl ComponentStateListener for StateLog {
    fn on_state_change(&self, component: &str, old: ComponentState, new: ComponentState) {
        self.0
            .record(format!("state {} {}->{}", component, old, new));
    }
}

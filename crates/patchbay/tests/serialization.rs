//! Gate serialization under concurrent registry churn
//!
//! Many threads mutate the registry at once; the component must observe a
//! serialized event stream and converge to exactly the state a sequential
//! replay of the final registry contents would produce.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use patchbay::{
    Cardinality, ComponentContext, ComponentDeclaration, ComponentLifecycle, ComponentState,
    DependencyDeclaration, Engine, Result, ServiceBinding, ServiceProperties,
};

/// Counts callback overlap and net bind balance
#[derive(Default)]
struct Probe {
    running: AtomicUsize,
    overlap: AtomicUsize,
    binds: AtomicUsize,
    unbinds: AtomicUsize,
    bound_ids: Mutex<Vec<u64>>,
}

struct ProbeLifecycle(Arc<Probe>);

impl ProbeLifecycle {
    fn guard<R>(&self, f: impl FnOnce() -> R) -> R {
        // Two callbacks of one component running at once would trip this.
        let running = self.0.running.fetch_add(1, Ordering::SeqCst);
        if running > 0 {
            self.0.overlap.fetch_add(1, Ordering::SeqCst);
        }
        let result = f();
        self.0.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl ComponentLifecycle for ProbeLifecycle {
    fn init(&mut self, _ctx: &ComponentContext) -> Result<()> {
        self.guard(|| Ok(()))
    }

    fn start(&mut self, _ctx: &ComponentContext) -> Result<()> {
        self.guard(|| Ok(()))
    }

    fn stop(&mut self, _ctx: &ComponentContext) -> Result<()> {
        self.guard(|| Ok(()))
    }

    fn bind(&mut self, _dependency: &str, binding: &ServiceBinding) -> Result<()> {
        self.guard(|| {
            self.0.binds.fetch_add(1, Ordering::SeqCst);
            self.0
                .bound_ids
                .lock()
                .unwrap()
                .push(binding.handle().registration_id());
            Ok(())
        })
    }

    fn unbind(&mut self, _dependency: &str, binding: &ServiceBinding) -> Result<()> {
        self.guard(|| {
            self.0.unbinds.fetch_add(1, Ordering::SeqCst);
            let mut bound = self.0.bound_ids.lock().unwrap();
            if let Some(position) = bound
                .iter()
                .position(|id| *id == binding.handle().registration_id())
            {
                bound.remove(position);
            }
            Ok(())
        })
    }
}

#[test]
fn test_concurrent_churn_converges_to_sequential_result() -> anyhow::Result<()> {
    let engine = Arc::new(Engine::new());
    let probe = Arc::new(Probe::default());
    let id = engine.declare(
        ComponentDeclaration::new("churned").with_dependency(
            DependencyDeclaration::new("workers", "cap").with_cardinality(Cardinality::OneOrMore),
        ),
        Box::new(ProbeLifecycle(Arc::clone(&probe))),
    )?;

    // A floor provider keeps the dependency satisfiable throughout.
    let floor = engine
        .registry()
        .register_instance("cap", 0usize, ServiceProperties::new())?;
    engine.enable(&id)?;

    let threads = 4usize;
    let rounds = 125usize;
    let mut workers = Vec::new();
    for t in 0..threads {
        let engine = Arc::clone(&engine);
        workers.push(thread::spawn(move || {
            for round in 0..rounds {
                let handle = engine
                    .registry()
                    .register_instance(
                        "cap",
                        t * rounds + round,
                        ServiceProperties::new()
                            .with(patchbay::constants::RANKING_PROPERTY, (round % 7) as i64),
                    )
                    .unwrap();
                // Keep every fourth provider; remove the rest.
                if round % 4 != 0 {
                    engine.registry().unregister(&handle).unwrap();
                }
            }
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }

    // No two callbacks of the component ever overlapped.
    assert_eq!(probe.overlap.load(Ordering::SeqCst), 0);

    // The component settled on exactly the providers a sequential replay of
    // the final registry contents would select.
    let description = engine.describe(&id)?;
    assert_eq!(description.state, ComponentState::Active);
    let expected: Vec<u64> = engine
        .registry()
        .find_matching("cap", None)?
        .iter()
        .map(|handle| handle.registration_id())
        .collect();
    let selected: Vec<u64> = description.dependencies[0]
        .selected
        .iter()
        .map(|summary| summary.registration_id)
        .collect();
    assert_eq!(selected, expected);

    // Bind/unbind callbacks balanced out to the surviving set.
    let mut seen: Vec<u64> = probe.bound_ids.lock().unwrap().clone();
    let mut survivors = expected.clone();
    seen.sort_unstable();
    survivors.sort_unstable();
    assert_eq!(seen, survivors);
    assert_eq!(
        probe.binds.load(Ordering::SeqCst) - probe.unbinds.load(Ordering::SeqCst),
        seen.len()
    );

    engine.registry().unregister(&floor)?;
    engine.shutdown();
    Ok(())
}

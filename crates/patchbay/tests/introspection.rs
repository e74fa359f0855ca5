//! Introspection surface: snapshots, serialization, and concurrent reads

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use common::{Journal, Recorder};
use patchbay::{
    BindingPolicy, Cardinality, ComponentDeclaration, ComponentState, DependencyDeclaration,
    DependencyState, Engine, ServiceProperties,
};

#[test]
fn test_description_reflects_declaration_and_resolution() {
    let engine = Engine::new();
    let journal = Journal::new();
    let id = engine
        .declare(
            ComponentDeclaration::new("web-server")
                .with_property("vendor", "acme")
                .with_dependency(
                    DependencyDeclaration::new("backend", "http.backend")
                        .with_filter("(tier=fast)")
                        .with_cardinality(Cardinality::ExactlyOne)
                        .with_policy(BindingPolicy::Static),
                ),
            Box::new(Recorder::new(&journal)),
        )
        .unwrap();
    engine.enable(&id).unwrap();
    let backend = engine
        .registry()
        .register_instance(
            "http.backend",
            "backend-1".to_string(),
            ServiceProperties::new().with("tier", "fast"),
        )
        .unwrap();

    let description = engine.describe(&id).unwrap();
    assert_eq!(description.name, "web-server");
    assert!(description.enabled);
    assert_eq!(description.state, ComponentState::Active);
    assert_eq!(description.properties.get_str("vendor"), Some("acme"));

    let dependency = &description.dependencies[0];
    assert_eq!(dependency.name, "backend");
    assert_eq!(dependency.capability, "http.backend");
    assert_eq!(dependency.declared_filter.as_deref(), Some("(tier=fast)"));
    assert_eq!(dependency.effective_filter.as_deref(), Some("(tier=fast)"));
    assert_eq!(dependency.state, DependencyState::Satisfied);
    assert_eq!(dependency.policy, BindingPolicy::Static);
    assert_eq!(dependency.bound[0].registration_id, backend.registration_id());
}

#[test]
fn test_description_serializes_to_json() {
    let engine = Engine::new();
    let journal = Journal::new();
    let id = engine
        .declare(
            ComponentDeclaration::new("serialized")
                .with_dependency(DependencyDeclaration::new("svc", "cap")),
            Box::new(Recorder::new(&journal)),
        )
        .unwrap();
    engine.enable(&id).unwrap();

    let json = serde_json::to_value(engine.describe(&id).unwrap()).unwrap();
    assert_eq!(json["name"], "serialized");
    assert_eq!(json["state"], "waiting");
    assert_eq!(json["dependencies"][0]["cardinality"], "1..1");
    assert_eq!(json["dependencies"][0]["state"], "unsatisfied");
}

#[test]
fn test_describe_all_lists_every_component() {
    let engine = Engine::new();
    for name in ["one", "two", "three"] {
        engine
            .declare(
                ComponentDeclaration::new(name),
                Box::new(Recorder::new(&Journal::new())),
            )
            .unwrap();
    }
    let names: Vec<String> = engine
        .describe_all()
        .into_iter()
        .map(|description| description.name)
        .collect();
    assert_eq!(names.len(), 3);
    for name in ["one", "two", "three"] {
        assert!(names.iter().any(|n| n == name));
    }
}

#[test]
fn test_describe_is_safe_during_gate_activity() {
    let engine = Arc::new(Engine::new());
    let journal = Journal::new();
    let id = engine
        .declare(
            ComponentDeclaration::new("busy").with_dependency(
                DependencyDeclaration::new("workers", "cap")
                    .with_cardinality(Cardinality::ZeroOrMore)
                    .optional(),
            ),
            Box::new(Recorder::new(&journal)),
        )
        .unwrap();
    engine.enable(&id).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let churn = {
        let engine = Arc::clone(&engine);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                let handle = engine
                    .registry()
                    .register_instance("cap", 1u8, ServiceProperties::new())
                    .unwrap();
                engine.registry().unregister(&handle).unwrap();
            }
        })
    };

    // Concurrent reads must always observe a coherent snapshot.
    for _ in 0..500 {
        let description = engine.describe(&id).unwrap();
        assert_eq!(description.name, "busy");
        let dependency = &description.dependencies[0];
        assert!(dependency.selected.len() <= dependency.matching.len());
    }
    stop.store(true, Ordering::Relaxed);
    churn.join().unwrap();
}

#[test]
fn test_unknown_component_is_reported() {
    let engine = Engine::new();
    assert!(engine.describe("nope").is_err());
    assert!(engine.enable("nope").is_err());
    assert!(engine.disable("nope").is_err());
    assert!(engine.destroy("nope").is_err());
}

#[test]
fn test_shutdown_destroys_everything() {
    let engine = Engine::new();
    let journal = Journal::new();
    let id = engine
        .declare(
            ComponentDeclaration::new("doomed"),
            Box::new(Recorder::new(&journal)),
        )
        .unwrap();
    engine.enable(&id).unwrap();
    engine.shutdown();
    assert!(journal.entries().contains(&"destroy".to_string()));
    assert!(engine.describe_all().is_empty());
    assert_eq!(engine.registry().provider_count(), 0);
}

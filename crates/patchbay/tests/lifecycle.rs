//! Component lifecycle: activation, deactivation, callback ordering, and
//! failure handling

mod common;

use std::sync::Arc;

use common::{Journal, Recorder, StateLog};
use patchbay::{
    Cardinality, ComponentDeclaration, ComponentState, DependencyDeclaration, Engine,
    ServiceProperties,
};

#[test]
fn test_component_without_dependencies_activates_on_enable() {
    let engine = Engine::new();
    let journal = Journal::new();
    let id = engine
        .declare(
            ComponentDeclaration::new("standalone"),
            Box::new(Recorder::new(&journal)),
        )
        .unwrap();

    assert_eq!(engine.describe(&id).unwrap().state, ComponentState::Inactive);
    engine.enable(&id).unwrap();
    assert_eq!(engine.describe(&id).unwrap().state, ComponentState::Active);
    assert_eq!(journal.entries(), vec!["init", "start"]);
}

#[test]
fn test_component_waits_for_required_dependency() {
    let engine = Engine::new();
    let journal = Journal::new();
    let id = engine
        .declare(
            ComponentDeclaration::new("consumer")
                .with_dependency(DependencyDeclaration::new("sink", "log.sink")),
            Box::new(Recorder::new(&journal)),
        )
        .unwrap();
    engine.enable(&id).unwrap();
    assert_eq!(engine.describe(&id).unwrap().state, ComponentState::Waiting);
    assert!(journal.entries().is_empty());

    let handle = engine
        .registry()
        .register_instance("log.sink", "stdout", ServiceProperties::new())
        .unwrap();
    assert_eq!(engine.describe(&id).unwrap().state, ComponentState::Active);
    assert_eq!(
        journal.entries(),
        vec![
            "init".to_string(),
            format!("bind sink #{}", handle.registration_id()),
            "start".to_string()
        ]
    );
}

#[test]
fn test_losing_required_dependency_stops_then_unbinds() {
    let engine = Engine::new();
    let journal = Journal::new();
    let id = engine
        .declare(
            ComponentDeclaration::new("consumer")
                .with_dependency(DependencyDeclaration::new("sink", "log.sink")),
            Box::new(Recorder::new(&journal)),
        )
        .unwrap();
    engine.enable(&id).unwrap();
    let handle = engine
        .registry()
        .register_instance("log.sink", "stdout", ServiceProperties::new())
        .unwrap();
    journal.clear();

    engine.registry().unregister(&handle).unwrap();
    assert_eq!(engine.describe(&id).unwrap().state, ComponentState::Waiting);
    assert_eq!(
        journal.entries(),
        vec![
            "stop".to_string(),
            format!("unbind sink #{}", handle.registration_id())
        ]
    );
}

#[test]
fn test_start_invoked_exactly_once_between_stops() {
    let engine = Engine::new();
    let journal = Journal::new();
    let id = engine
        .declare(
            ComponentDeclaration::new("consumer")
                .with_dependency(DependencyDeclaration::new("sink", "log.sink")),
            Box::new(Recorder::new(&journal)),
        )
        .unwrap();
    engine.enable(&id).unwrap();

    // Flap the provider several times.
    for _ in 0..5 {
        let handle = engine
            .registry()
            .register_instance("log.sink", "stdout", ServiceProperties::new())
            .unwrap();
        engine.registry().unregister(&handle).unwrap();
    }

    // Every start must be separated from the next by exactly one stop.
    let phases: Vec<String> = journal
        .entries()
        .into_iter()
        .filter(|entry| entry == "start" || entry == "stop")
        .collect();
    assert_eq!(phases.len(), 10);
    for pair in phases.chunks(2) {
        assert_eq!(pair, ["start".to_string(), "stop".to_string()]);
    }
}

#[test]
fn test_bind_order_follows_declaration_and_unbind_reverses() {
    let engine = Engine::new();
    let journal = Journal::new();
    let id = engine
        .declare(
            ComponentDeclaration::new("consumer")
                .with_dependency(DependencyDeclaration::new("first", "cap.a"))
                .with_dependency(DependencyDeclaration::new("second", "cap.b")),
            Box::new(Recorder::new(&journal)),
        )
        .unwrap();
    engine.enable(&id).unwrap();
    let a = engine
        .registry()
        .register_instance("cap.a", 1u32, ServiceProperties::new())
        .unwrap();
    let b = engine
        .registry()
        .register_instance("cap.b", 2u32, ServiceProperties::new())
        .unwrap();
    assert_eq!(engine.describe(&id).unwrap().state, ComponentState::Active);
    assert_eq!(
        journal.entries(),
        vec![
            "init".to_string(),
            format!("bind first #{}", a.registration_id()),
            format!("bind second #{}", b.registration_id()),
            "start".to_string()
        ]
    );

    journal.clear();
    engine.disable(&id).unwrap();
    assert_eq!(engine.describe(&id).unwrap().state, ComponentState::Inactive);
    assert_eq!(
        journal.entries(),
        vec![
            "stop".to_string(),
            format!("unbind second #{}", b.registration_id()),
            format!("unbind first #{}", a.registration_id())
        ]
    );
}

#[test]
fn test_optional_dependency_does_not_gate_activation() {
    let engine = Engine::new();
    let journal = Journal::new();
    let id = engine
        .declare(
            ComponentDeclaration::new("consumer").with_dependency(
                DependencyDeclaration::new("maybe", "cap.opt")
                    .with_cardinality(Cardinality::ZeroOrOne)
                    .optional(),
            ),
            Box::new(Recorder::new(&journal)),
        )
        .unwrap();
    engine.enable(&id).unwrap();
    assert_eq!(engine.describe(&id).unwrap().state, ComponentState::Active);

    // A provider appearing later binds without restarting the component.
    journal.clear();
    let handle = engine
        .registry()
        .register_instance("cap.opt", 9u32, ServiceProperties::new())
        .unwrap();
    assert_eq!(
        journal.entries(),
        vec![format!("bind maybe #{}", handle.registration_id())]
    );
    assert_eq!(engine.describe(&id).unwrap().state, ComponentState::Active);
}

#[test]
fn test_failing_init_reverts_to_waiting_without_crashing() {
    let engine = Engine::new();
    let journal = Journal::new();
    let id = engine
        .declare(
            ComponentDeclaration::new("broken")
                .with_dependency(DependencyDeclaration::new("sink", "log.sink")),
            Box::new(Recorder::failing(&journal, &["init"])),
        )
        .unwrap();
    engine.enable(&id).unwrap();
    engine
        .registry()
        .register_instance("log.sink", "stdout", ServiceProperties::new())
        .unwrap();

    let description = engine.describe(&id).unwrap();
    assert_eq!(description.state, ComponentState::Waiting);
    let last_error = description.last_error.unwrap();
    assert!(last_error.contains("init"), "unexpected error: {}", last_error);
    // start never ran
    assert_eq!(journal.count_prefix("start"), 0);
}

#[test]
fn test_failing_stop_still_deactivates() {
    let engine = Engine::new();
    let journal = Journal::new();
    let id = engine
        .declare(
            ComponentDeclaration::new("grumpy")
                .with_dependency(DependencyDeclaration::new("sink", "log.sink")),
            Box::new(Recorder::failing(&journal, &["stop"])),
        )
        .unwrap();
    engine.enable(&id).unwrap();
    let handle = engine
        .registry()
        .register_instance("log.sink", "stdout", ServiceProperties::new())
        .unwrap();
    engine.registry().unregister(&handle).unwrap();
    assert_eq!(engine.describe(&id).unwrap().state, ComponentState::Waiting);
}

#[test]
fn test_destroy_runs_callback_and_silences_component() {
    let engine = Engine::new();
    let journal = Journal::new();
    let state_log = Journal::new();
    let id = engine
        .declare(
            ComponentDeclaration::new("victim")
                .with_dependency(DependencyDeclaration::new("sink", "log.sink")),
            Box::new(Recorder::new(&journal)),
        )
        .unwrap();
    engine
        .add_state_listener(&id, Arc::new(StateLog(state_log.clone())))
        .unwrap();
    engine.enable(&id).unwrap();
    engine
        .registry()
        .register_instance("log.sink", "stdout", ServiceProperties::new())
        .unwrap();

    engine.destroy(&id).unwrap();
    assert!(journal.entries().contains(&"destroy".to_string()));
    assert!(engine.describe(&id).is_err());

    // Provider churn after destroy must not reach the dead component.
    journal.clear();
    engine
        .registry()
        .register_instance("log.sink", "stderr", ServiceProperties::new())
        .unwrap();
    assert!(journal.entries().is_empty());

    let transitions = state_log.entries();
    assert!(transitions
        .last()
        .unwrap()
        .ends_with("waiting->destroyed"));
}

#[test]
fn test_enable_completion_observable_through_state_listener() {
    let engine = Engine::new();
    let journal = Journal::new();
    let state_log = Journal::new();
    let id = engine
        .declare(
            ComponentDeclaration::new("observed"),
            Box::new(Recorder::new(&journal)),
        )
        .unwrap();
    engine
        .add_state_listener(&id, Arc::new(StateLog(state_log.clone())))
        .unwrap();
    engine.enable(&id).unwrap();
    assert_eq!(
        state_log.entries(),
        vec![
            "state observed inactive->waiting".to_string(),
            "state observed waiting->active".to_string()
        ]
    );
}

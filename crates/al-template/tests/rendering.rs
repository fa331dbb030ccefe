//! Rendering against a populated state machine

use al_core::{Context, EntityId};
use al_event_bus::EventBus;
use al_state_machine::StateMachine;
use al_template::{TemplateEngine, TemplateError};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

fn make_engine() -> TemplateEngine {
    let state_machine = Arc::new(StateMachine::new(Arc::new(EventBus::new())));

    state_machine.set(
        EntityId::new("light", "kitchen").unwrap(),
        "on",
        HashMap::from([
            ("brightness".to_string(), json!(180)),
            ("friendly_name".to_string(), json!("Kitchen Light")),
        ]),
        Context::new(),
    );
    state_machine.set(
        EntityId::new("sensor", "hallway_lux").unwrap(),
        "35",
        HashMap::new(),
        Context::new(),
    );

    TemplateEngine::new(state_machine)
}

#[test]
fn test_states_function() {
    let engine = make_engine();
    assert_eq!(engine.render("{{ states('light.kitchen') }}").unwrap(), "on");
    assert_eq!(
        engine.render("{{ states('light.missing') }}").unwrap(),
        "unknown"
    );
}

#[test]
fn test_states_attribute_access() {
    let engine = make_engine();
    assert_eq!(
        engine.render("{{ states.light.kitchen.state }}").unwrap(),
        "on"
    );
    assert_eq!(
        engine
            .render("{{ states.light.kitchen.attributes.brightness }}")
            .unwrap(),
        "180"
    );
    assert_eq!(
        engine.render("{{ states.light.kitchen.name }}").unwrap(),
        "Kitchen Light"
    );
}

#[test]
fn test_state_helpers() {
    let engine = make_engine();
    assert_eq!(
        engine.render("{{ is_state('light.kitchen', 'on') }}").unwrap(),
        "True"
    );
    assert_eq!(
        engine
            .render("{{ state_attr('light.kitchen', 'brightness') }}")
            .unwrap(),
        "180"
    );
    assert_eq!(
        engine.render("{{ has_value('sensor.hallway_lux') }}").unwrap(),
        "True"
    );
    assert_eq!(
        engine
            .render("{{ iif(is_state('light.kitchen', 'off'), 'dark', 'lit') }}")
            .unwrap(),
        "lit"
    );
}

#[test]
fn test_slugify_filter() {
    let engine = make_engine();
    assert_eq!(
        engine.render("{{ 'Living Room' | slugify }}").unwrap(),
        "living_room"
    );
}

#[test]
fn test_render_native_converts_numbers() {
    let engine = make_engine();
    assert_eq!(
        engine
            .render_native("{{ states('sensor.hallway_lux') | int * 2 }}")
            .unwrap(),
        json!(70)
    );
    assert_eq!(
        engine.render_native("{{ states('light.kitchen') }}").unwrap(),
        json!("on")
    );
}

#[test]
fn test_render_native_converts_booleans_and_none() {
    let engine = make_engine();
    assert_eq!(
        engine
            .render_native("{{ is_state('light.kitchen', 'on') }}")
            .unwrap(),
        json!(true)
    );
    assert_eq!(
        engine
            .render_native("{{ is_state('light.kitchen', 'off') }}")
            .unwrap(),
        json!(false)
    );
    assert_eq!(
        engine
            .render_native("{{ state_attr('light.kitchen', 'missing') }}")
            .unwrap(),
        json!(null)
    );
}

#[test]
fn test_syntax_error() {
    let engine = make_engine();
    let err = engine.render("{{ states('light.kitchen') ").unwrap_err();
    assert!(matches!(err, TemplateError::Syntax(_)));
}

//! Entity setup and EntityBase behavior against an in-process host

use std::collections::HashMap;
use std::sync::Arc;

use al_core::{Context, EntityId, ServiceCall};
use automatic_lighting::constants::{CONTEXT_MAX_LENGTH, DOMAIN, STATE_IDLE};
use automatic_lighting::{AutomaticLighting, EntityBase, HomeAssistant};
use serde_json::{json, Map, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;

fn setup() -> (TempDir, Arc<HomeAssistant>, Arc<AutomaticLighting>) {
    let temp_dir = TempDir::new().unwrap();
    let hass = Arc::new(HomeAssistant::new(temp_dir.path()));
    let integration = AutomaticLighting::async_setup(hass.clone());
    (temp_dir, hass, integration)
}

fn data(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

/// Register `light.turn_on` and hand back every call it receives
fn record_calls(hass: &HomeAssistant) -> mpsc::UnboundedReceiver<ServiceCall> {
    let (tx, rx) = mpsc::unbounded_channel();
    hass.services.register("light", "turn_on", move |call: ServiceCall| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(call);
            Ok(None)
        }
    });
    rx
}

async fn configure(hass: &HomeAssistant, name: &str) -> String {
    let form = hass.flows.start_config_flow(DOMAIN).await.unwrap();
    hass.flows
        .progress_flow(&form.flow_id, json!({"name": name}).as_object().cloned())
        .await
        .unwrap()
        .entry_id
        .unwrap()
}

#[tokio::test]
async fn test_setup_all_publishes_entity_state() {
    let (_dir, hass, integration) = setup();
    let entry_id = configure(&hass, "Living Room").await;

    let results = hass.config_entries.setup_all().await;
    assert!(results.iter().all(Result::is_ok));
    assert!(hass.config_entries.get(&entry_id).unwrap().is_loaded());

    let state = hass.states.get("automatic_lighting.living_room").unwrap();
    assert_eq!(state.state, STATE_IDLE);
    assert_eq!(state.attributes["block_duration"], json!(60));
    assert_eq!(state.attributes["friendly_name"], json!("Living Room"));

    let entity = integration.entity(&entry_id).unwrap();
    assert_eq!(integration.entity_count(), 1);
    assert!(entity.base().is_context_internal(&state.context));
}

#[tokio::test]
async fn test_reload_picks_up_new_options() {
    let (_dir, hass, integration) = setup();
    let entry_id = configure(&hass, "Hall").await;
    hass.config_entries.setup(&entry_id).await.unwrap();

    let form = hass.flows.start_options_flow(&entry_id).await.unwrap();
    hass.flows
        .progress_flow(&form.flow_id, data(json!({"block_duration": 90})).into())
        .await
        .unwrap();
    integration.async_reload_entry(&entry_id).await.unwrap();

    assert_eq!(integration.entity(&entry_id).unwrap().block_duration(), 90);
    let state = hass.states.get("automatic_lighting.hall").unwrap();
    assert_eq!(state.attributes["block_duration"], json!(90));
}

#[tokio::test]
async fn test_symbol_only_name_sets_up_under_domain() {
    let (_dir, hass, integration) = setup();
    let entry_id = configure(&hass, "!!!").await;

    hass.config_entries.setup(&entry_id).await.unwrap();
    let entity = integration.entity(&entry_id).unwrap();
    assert_eq!(entity.entity_id().to_string(), "automatic_lighting.automatic_lighting");
    let state = hass.states.get("automatic_lighting.automatic_lighting").unwrap();
    assert_eq!(state.attributes["friendly_name"], json!("!!!"));
}

#[tokio::test]
async fn test_names_with_same_slug_get_distinct_ids() {
    let (_dir, hass, integration) = setup();
    let upper = configure(&hass, "Hallway").await;
    let lower = configure(&hass, "hallway").await;

    hass.config_entries.setup(&upper).await.unwrap();
    hass.config_entries.setup(&lower).await.unwrap();
    assert_eq!(
        integration.entity(&upper).unwrap().entity_id().to_string(),
        "automatic_lighting.hallway"
    );
    assert_eq!(
        integration.entity(&lower).unwrap().entity_id().to_string(),
        "automatic_lighting.hallway_2"
    );
    assert_eq!(hass.states.domain_states(DOMAIN).len(), 2);
    assert_eq!(
        hass.states.get("automatic_lighting.hallway_2").unwrap().attributes["friendly_name"],
        json!("hallway")
    );

    integration.async_reload_entry(&lower).await.unwrap();
    assert_eq!(
        integration.entity(&lower).unwrap().entity_id().to_string(),
        "automatic_lighting.hallway_2"
    );
    assert_eq!(hass.states.domain_states(DOMAIN).len(), 2);
}

#[tokio::test]
async fn test_call_service_renders_templates() {
    let (_dir, hass, _) = setup();
    let mut calls = record_calls(&hass);
    hass.states.set(
        EntityId::new("sensor", "x").unwrap(),
        "42",
        HashMap::new(),
        Context::new(),
    );
    let base = EntityBase::from_hass("kitchen", &hass);

    base.call_service(
        "light",
        "turn_on",
        data(json!({"brightness": "{{ states('sensor.x') }}", "name": "kitchen"})),
    )
    .await
    .unwrap();

    let call = calls.recv().await.unwrap();
    assert_eq!(call.service_data, json!({"brightness": 42, "name": "kitchen"}));
    assert_eq!(call.context.id.len(), CONTEXT_MAX_LENGTH);
    assert!(base.is_context_internal(&call.context));
    assert_eq!(base.context(), Some(call.context));
}

#[tokio::test]
async fn test_failed_template_is_dropped_and_call_still_dispatches() {
    let (_dir, hass, _) = setup();
    let mut calls = record_calls(&hass);
    let base = EntityBase::from_hass("kitchen", &hass);

    base.call_service(
        "light",
        "turn_on",
        data(json!({"brightness": "{{ states( }}", "entity_id": "light.kitchen"})),
    )
    .await
    .unwrap();

    let call = calls.recv().await.unwrap();
    assert_eq!(call.service_data, json!({"entity_id": "light.kitchen"}));
}

#[tokio::test]
async fn test_missing_service_is_only_logged() {
    let (_dir, hass, _) = setup();
    let base = EntityBase::from_hass("kitchen", &hass);

    base.call_service("light", "does_not_exist", Map::new())
        .await
        .unwrap();
    assert!(base.context().is_some());
}

#[tokio::test]
async fn test_fire_event_keeps_payload() {
    let (_dir, hass, _) = setup();
    let mut events = hass.bus.subscribe("automatic_lighting_test");
    let base = EntityBase::from_hass("kitchen", &hass);
    let payload = json!({"template": "{{ states('sensor.x') }}", "nested": {"a": [1, 2]}});

    base.fire_event("automatic_lighting_test", data(payload.clone()));

    let event = events.recv().await.unwrap();
    assert_eq!(event.data, payload);
    assert!(base.is_context_internal(&event.context));
}

#[tokio::test]
async fn test_contexts_of_two_instances() {
    let (_dir, hass, _) = setup();
    let first = EntityBase::from_hass("first", &hass);
    let second = EntityBase::from_hass("second", &hass);

    let a = first.create_context();
    let b = first.create_context();
    assert_eq!(a.id[..6], b.id[..6]);
    assert_ne!(a.id, b.id);
    assert!(first.is_context_internal(&a) && first.is_context_internal(&b));
    assert!(!second.is_context_internal(&a));
}

//! Template engine
//!
//! Renders Jinja-style templates with access to entity states.

use crate::error::TemplateResult;
use crate::states::StatesObject;
use al_state_machine::StateMachine;
use minijinja::{Environment, Value};
use std::sync::Arc;
use tracing::debug;

pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    pub fn new(state_machine: Arc<StateMachine>) -> Self {
        let states = Arc::new(StatesObject::new(state_machine));
        let mut env = Environment::new();
        env.set_debug(true);

        env.add_global("states", Value::from_object((*states).clone()));

        let s = states.clone();
        env.add_function("is_state", move |entity_id: &str, state: Value| {
            s.is_state(entity_id, &state)
        });
        let s = states.clone();
        env.add_function("state_attr", move |entity_id: &str, attribute: &str| {
            s.state_attr(entity_id, attribute)
        });
        let s = states.clone();
        env.add_function(
            "is_state_attr",
            move |entity_id: &str, attribute: &str, value: Value| {
                s.is_state_attr(entity_id, attribute, &value)
            },
        );
        let s = states;
        env.add_function("has_value", move |entity_id: &str| s.has_value(entity_id));
        env.add_function("iif", iif);

        env.add_filter("slugify", |value: &str| al_core::slugify(value));

        Self { env }
    }

    /// Whether a string contains template markup
    pub fn is_template(template: &str) -> bool {
        template.contains("{{") || template.contains("{%") || template.contains("{#")
    }

    /// Render a template to text
    pub fn render(&self, template: &str) -> TemplateResult<String> {
        debug!(template = %template, "Rendering template");
        Ok(self.env.render_str(template, ())?)
    }

    /// Render a template and parse the output into a native JSON value
    ///
    /// Output that reads as a number, boolean, none, list or mapping becomes
    /// that type; anything else is returned as the trimmed string.
    pub fn render_native(&self, template: &str) -> TemplateResult<serde_json::Value> {
        let rendered = self.render(template)?;
        Ok(parse_native(rendered.trim()))
    }
}

fn parse_native(rendered: &str) -> serde_json::Value {
    // minijinja prints booleans and none the Python way
    match rendered {
        "True" => return serde_json::Value::Bool(true),
        "False" => return serde_json::Value::Bool(false),
        "None" | "none" => return serde_json::Value::Null,
        _ => {}
    }
    match serde_json::from_str::<serde_json::Value>(rendered) {
        Ok(
            value @ (serde_json::Value::Number(_)
            | serde_json::Value::Bool(_)
            | serde_json::Value::Array(_)
            | serde_json::Value::Object(_)),
        ) => value,
        _ => serde_json::Value::String(rendered.to_string()),
    }
}

/// Inline if: `iif(condition, if_true, if_false)`
fn iif(condition: Value, if_true: Option<Value>, if_false: Option<Value>) -> Value {
    if condition.is_true() {
        if_true.unwrap_or(Value::from(true))
    } else {
        if_false.unwrap_or(Value::from(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_template() {
        assert!(TemplateEngine::is_template("{{ states('sensor.lux') }}"));
        assert!(TemplateEngine::is_template("{% if true %}on{% endif %}"));
        assert!(TemplateEngine::is_template("{# note #}"));
        assert!(!TemplateEngine::is_template("kitchen"));
        assert!(!TemplateEngine::is_template("{ brace }"));
    }

    #[test]
    fn test_parse_native() {
        assert_eq!(parse_native("42"), json!(42));
        assert_eq!(parse_native("0.5"), json!(0.5));
        assert_eq!(parse_native("true"), json!(true));
        assert_eq!(parse_native("True"), json!(true));
        assert_eq!(parse_native("False"), json!(false));
        assert_eq!(parse_native("none"), json!(null));
        assert_eq!(parse_native("None"), json!(null));
        assert_eq!(parse_native("[1, 2]"), json!([1, 2]));
        assert_eq!(parse_native("kitchen"), json!("kitchen"));
        assert_eq!(parse_native("\"quoted\""), json!("\"quoted\""));
        assert_eq!(parse_native(""), json!(""));
    }
}

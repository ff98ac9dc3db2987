//! Action configuration templating using minijinja.
//!
//! String values in an action node's configuration may reference the run
//! context:
//! ```json
//! { "message": "Monitor {{ device.serial }} assigned to {{ patientId }}" }
//! ```
//!
//! A string that is exactly one `{{ expression }}` keeps the expression's
//! type, so `{ "count": "{{ monitorsAvailable }}" }` stays a number. Strings
//! without template syntax pass through untouched.

use minijinja::{Environment, UndefinedBehavior, Value};
use serde_json::Map;

use careflow_workflow::{RunError, RunErrorKind};

pub(crate) struct TemplateRenderer {
  env: Environment<'static>,
}

impl TemplateRenderer {
  pub fn new() -> Self {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    Self { env }
  }

  /// Render every templated string in `config` against `context`.
  pub fn render_config(
    &self,
    node_id: &str,
    config: &Map<String, serde_json::Value>,
    context: &Map<String, serde_json::Value>,
  ) -> Result<Map<String, serde_json::Value>, RunError> {
    let ctx = Value::from_serialize(context);

    let mut rendered = Map::with_capacity(config.len());
    for (key, value) in config {
      let value = self
        .render_value(value, &ctx)
        .map_err(|message| {
          RunError::at_node(
            node_id,
            RunErrorKind::Configuration,
            format!("failed to render config '{}': {}", key, message),
          )
        })?;
      rendered.insert(key.clone(), value);
    }
    Ok(rendered)
  }

  fn render_value(
    &self,
    value: &serde_json::Value,
    ctx: &Value,
  ) -> Result<serde_json::Value, String> {
    match value {
      serde_json::Value::String(s) if is_template(s) => self.render_string(s, ctx),
      serde_json::Value::Array(items) => items
        .iter()
        .map(|item| self.render_value(item, ctx))
        .collect::<Result<Vec<_>, _>>()
        .map(serde_json::Value::Array),
      serde_json::Value::Object(map) => {
        let mut rendered = Map::with_capacity(map.len());
        for (key, item) in map {
          rendered.insert(key.clone(), self.render_value(item, ctx)?);
        }
        Ok(serde_json::Value::Object(rendered))
      }
      other => Ok(other.clone()),
    }
  }

  fn render_string(&self, template: &str, ctx: &Value) -> Result<serde_json::Value, String> {
    if let Some(expr) = single_expression(template) {
      let value = self
        .env
        .compile_expression(expr)
        .and_then(|compiled| compiled.eval(ctx.clone()))
        .map_err(|e| e.to_string())?;
      if value.is_undefined() {
        return Err(format!("undefined value: {}", expr));
      }
      return serde_json::to_value(&value).map_err(|e| e.to_string());
    }

    self
      .env
      .render_str(template, ctx.clone())
      .map(serde_json::Value::String)
      .map_err(|e| e.to_string())
  }
}

fn is_template(s: &str) -> bool {
  s.contains("{{") || s.contains("{%")
}

/// The expression inside a string consisting of exactly one `{{ ... }}`.
fn single_expression(template: &str) -> Option<&str> {
  let inner = template
    .trim()
    .strip_prefix("{{")?
    .strip_suffix("}}")?;
  if inner.contains("{{") || inner.contains("}}") || inner.contains("{%") {
    return None;
  }
  Some(inner.trim())
}

use serde_json::Value;

/// Coerce a value to a finite number.
///
/// Numbers pass through; strings are trimmed and parsed. Everything else,
/// including booleans, null and blank strings, does not coerce.
pub fn to_number(value: &Value) -> Option<f64> {
  let n = match value {
    Value::Number(n) => n.as_f64()?,
    Value::String(s) => {
      let trimmed = s.trim();
      if trimmed.is_empty() {
        return None;
      }
      trimmed.parse::<f64>().ok()?
    }
    _ => return None,
  };
  n.is_finite().then_some(n)
}

/// Render a value as text for substring and loose equality checks.
pub fn to_text(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Null => String::new(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    other => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_to_number() {
    assert_eq!(to_number(&json!(42)), Some(42.0));
    assert_eq!(to_number(&json!(2.5)), Some(2.5));
    assert_eq!(to_number(&json!(" 100 ")), Some(100.0));
    assert_eq!(to_number(&json!("-3")), Some(-3.0));
  }

  #[test]
  fn test_to_number_fails_closed() {
    assert_eq!(to_number(&json!("abc")), None);
    assert_eq!(to_number(&json!("")), None);
    assert_eq!(to_number(&json!("NaN")), None);
    assert_eq!(to_number(&json!("inf")), None);
    assert_eq!(to_number(&json!(true)), None);
    assert_eq!(to_number(&json!(null)), None);
    assert_eq!(to_number(&json!([1])), None);
  }

  #[test]
  fn test_to_text() {
    assert_eq!(to_text(&json!("hello")), "hello");
    assert_eq!(to_text(&json!(42)), "42");
    assert_eq!(to_text(&json!(false)), "false");
    assert_eq!(to_text(&json!(null)), "");
    assert_eq!(to_text(&json!(["a", 1])), r#"["a",1]"#);
  }
}

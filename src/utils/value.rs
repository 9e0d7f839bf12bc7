use serde_json::Value;

/// Convert a JSON claim value into a display string, dropping control characters.
/// Returns `None` for null, objects and arrays.
pub fn claim_to_string(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    let cleaned: String = raw.chars().filter(|c| !c.is_control()).collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stringifies_scalars() {
        assert_eq!(claim_to_string(&json!("abc")), Some("abc".to_string()));
        assert_eq!(claim_to_string(&json!(42)), Some("42".to_string()));
        assert_eq!(claim_to_string(&json!(true)), Some("true".to_string()));
    }

    #[test]
    fn test_rejects_structures_and_blank_values() {
        assert_eq!(claim_to_string(&json!(null)), None);
        assert_eq!(claim_to_string(&json!({"a": 1})), None);
        assert_eq!(claim_to_string(&json!("\n\t")), None);
    }

    #[test]
    fn test_strips_control_characters() {
        assert_eq!(claim_to_string(&json!("ad\u{0007}min")), Some("admin".to_string()));
    }
}

//! Configuration merge logic
//!
//! Layers merge as a shallow-recursive union:
//! - Top-level mappings on both sides: merged key by key, overlay wins
//! - Anything else: the overlay value replaces the base value entirely
//!
//! The key-by-key merge goes exactly one level deep. Second-level values are
//! replaced, never recursed into.

use serde_json::{Map, Value};

use super::store::ConfigError;

/// Merge `overlay` on top of `base`.
///
/// Merge semantics per top-level key:
/// - Both mappings: `base[key]` is updated with the entries of `overlay[key]`
/// - Otherwise: `overlay[key]` replaces `base[key]` (mapping or not)
/// - Keys only in `base` are kept
pub fn merge_layer(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match (base_map.remove(&key), overlay_value) {
                    (Some(Value::Object(mut inner)), Value::Object(overlay_inner)) => {
                        inner.extend(overlay_inner);
                        Value::Object(inner)
                    }
                    (_, overlay_value) => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }

        // A non-mapping layer replaces whatever was below it
        (_, overlay) => overlay,
    }
}

/// Merge layers in order (first is base, last has highest precedence)
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers
        .into_iter()
        .fold(Value::Object(Map::new()), merge_layer)
}

/// Build the partial layer for `section.key = raw`.
///
/// `raw` is read as a YAML scalar (`true`, `8080`, `null`), falling back to
/// a plain string.
pub fn partial_for_key(path: &str, raw: &str) -> Result<Value, ConfigError> {
    let (section, key) = match path.split_once('.') {
        Some((section, key)) if !section.is_empty() && !key.is_empty() => (section, key),
        _ => {
            return Err(ConfigError::Invalid(format!(
                "expected <section>.<key>, got '{}'",
                path
            )))
        }
    };

    let value = match serde_yaml_bw::from_str::<Value>(raw) {
        Ok(value) if !value.is_object() && !value.is_array() => value,
        _ => Value::String(raw.to_string()),
    };

    let mut inner = Map::new();
    inner.insert(key.to_string(), value);
    let mut outer = Map::new();
    outer.insert(section.to_string(), Value::Object(inner));
    Ok(Value::Object(outer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_for_key_scalars() {
        assert_eq!(
            partial_for_key("project.subdomains", "false").unwrap(),
            json!({"project": {"subdomains": false}})
        );
        assert_eq!(
            partial_for_key("user.default-server", "stolos.example.com").unwrap(),
            json!({"user": {"default-server": "stolos.example.com"}})
        );
    }

    #[test]
    fn test_partial_for_key_keeps_dotted_tail() {
        // Server hosts contain dots; only the first one splits
        assert_eq!(
            partial_for_key("servers.stolos.example.com", "x").unwrap(),
            json!({"servers": {"stolos.example.com": "x"}})
        );
    }

    #[test]
    fn test_partial_for_key_rejects_bare_key() {
        assert!(matches!(
            partial_for_key("subdomains", "true"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(partial_for_key(".x", "1").is_err());
    }

    #[test]
    fn test_partial_for_key_structured_value_is_string() {
        assert_eq!(
            partial_for_key("project.stack", "[a, b]").unwrap(),
            json!({"project": {"stack": "[a, b]"}})
        );
    }

    #[test]
    fn test_nested_mappings_union() {
        let user = json!({"a": {"x": 1}});
        let project = json!({"a": {"y": 2}});
        assert_eq!(merge_layer(user, project), json!({"a": {"x": 1, "y": 2}}));
    }

    #[test]
    fn test_scalar_replaced_by_mapping() {
        let user = json!({"a": 1});
        let project = json!({"a": {"y": 2}});
        assert_eq!(merge_layer(user, project), json!({"a": {"y": 2}}));
    }

    #[test]
    fn test_mapping_replaced_by_scalar() {
        let user = json!({"a": {"x": 1}});
        let project = json!({"a": "flat"});
        assert_eq!(merge_layer(user, project), json!({"a": "flat"}));
    }

    #[test]
    fn test_project_wins_on_conflict() {
        let user = json!({"project": {"server": "a.example.com", "stack": "node"}});
        let project = json!({"project": {"server": "b.example.com"}});
        let merged = merge_layer(user, project);

        assert_eq!(merged["project"]["server"], "b.example.com");
        assert_eq!(merged["project"]["stack"], "node");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let layer = json!({
            "user": {"default-server": "stolos.example.com"},
            "servers": {"stolos.example.com": {"username": "alice"}},
            "flag": true
        });
        assert_eq!(merge_layer(layer.clone(), layer.clone()), layer);
    }

    #[test]
    fn test_second_level_is_replaced_not_recursed() {
        let user = json!({"servers": {"h": {"username": "alice", "token": "t"}}});
        let project = json!({"servers": {"h": {"username": "bob"}}});
        let merged = merge_layer(user, project);

        assert_eq!(merged["servers"]["h"], json!({"username": "bob"}));
    }

    #[test]
    fn test_base_only_keys_kept() {
        let merged = merge_layer(json!({"a": 1, "b": 2}), json!({"b": 3}));
        assert_eq!(merged, json!({"a": 1, "b": 3}));
    }

    #[test]
    fn test_merge_layers_empty() {
        assert_eq!(merge_layers(vec![]), json!({}));
    }

    #[test]
    fn test_merge_layers_order() {
        let merged = merge_layers(vec![json!({"k": 1}), json!({"k": 2})]);
        assert_eq!(merged["k"], 2);
    }
}

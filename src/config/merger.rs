//! Deep merge of YAML configuration layers.
//!
//! `.quire/config.local.yml` is laid over `.quire/config.yml` with these
//! rules:
//!
//! - Mappings are merged key by key, recursively
//! - A null in the overlay removes the key
//! - Anything else in the overlay (scalars, sequences) replaces the base

use serde_yaml::{Mapping, Value};

/// Lay `overlay` over `base`.
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    let (Value::Mapping(base_map), Value::Mapping(overlay_map)) = (base, overlay) else {
        return overlay.clone();
    };

    let mut merged = base_map.clone();
    for (key, value) in overlay_map {
        if value.is_null() {
            merged.remove(key);
            continue;
        }
        let combined = match base_map.get(key) {
            Some(existing) => deep_merge(existing, value),
            None => value.clone(),
        };
        merged.insert(key.clone(), combined);
    }
    Value::Mapping(merged)
}

/// Merge layers in order; the last layer wins.
pub fn merge_configs(layers: &[Value]) -> Value {
    layers
        .iter()
        .fold(Value::Mapping(Mapping::new()), |acc, layer| deep_merge(&acc, layer))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn overlay_scalar_replaces_base() {
        let merged = deep_merge(&yaml("debug: false\nextension: html"), &yaml("debug: true"));
        assert_eq!(merged["debug"], true);
        assert_eq!(merged["extension"], "html");
    }

    #[test]
    fn mappings_merge_recursively() {
        let base = yaml(
            r#"
components:
  alert: ui.alert
  card: ui.card
"#,
        );
        let overlay = yaml(
            r#"
components:
  card: local.card
"#,
        );

        let merged = deep_merge(&base, &overlay);
        assert_eq!(merged["components"]["alert"], "ui.alert");
        assert_eq!(merged["components"]["card"], "local.card");
    }

    #[test]
    fn null_removes_key() {
        let merged = deep_merge(
            &yaml("cache: var/cache\nviews: views"),
            &yaml("cache: null"),
        );
        assert!(merged.get("cache").is_none());
        assert_eq!(merged["views"], "views");
    }

    #[test]
    fn sequences_are_replaced() {
        let merged = deep_merge(&yaml("list: [a, b]"), &yaml("list: [c]"));
        assert_eq!(merged["list"].as_sequence().unwrap().len(), 1);
    }

    #[test]
    fn merge_configs_applies_layers_in_order() {
        let merged = merge_configs(&[
            yaml("max_depth: 10"),
            yaml("max_depth: 20\ndebug: true"),
            yaml("max_depth: 30"),
        ]);
        assert_eq!(merged["max_depth"], 30);
        assert_eq!(merged["debug"], true);
    }

    #[test]
    fn empty_layer_list_is_empty_mapping() {
        assert_eq!(merge_configs(&[]), Value::Mapping(Mapping::new()));
    }
}

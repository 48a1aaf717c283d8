//! JSON merge helpers for layered configuration.

use serde_json::Value;

/// Overlay `overlay` onto `base`. Objects merge key by key; anything else
/// replaces the base value, including `null`.
pub(super) fn merge_values(base: &mut Value, overlay: &Value) {
    merge_locked(base, overlay, None);
}

/// Same as [`merge_values`], except that leaves present in `locked` keep the
/// base value.
pub(super) fn merge_locked(base: &mut Value, overlay: &Value, locked: Option<&Value>) {
    match (base, overlay, locked) {
        (_, _, Some(lock)) if !lock.is_object() => {}
        (Value::Object(base_map), Value::Object(overlay_map), _) => {
            let locked_map = locked.and_then(Value::as_object);
            for (key, value) in overlay_map {
                let key_lock = locked_map.and_then(|map| map.get(key));
                match base_map.get_mut(key) {
                    Some(existing) => merge_locked(existing, value, key_lock),
                    None if key_lock.is_some_and(|lock| !lock.is_object()) => {}
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_slot, overlay_value, _) => {
            *base_slot = overlay_value.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn nested_objects_merge_by_key() {
        let mut base = json!({ "store": { "dimension": 8, "capacity": 10 } });
        merge_values(&mut base, &json!({ "store": { "capacity": 20 } }));
        assert_eq!(base, json!({ "store": { "dimension": 8, "capacity": 20 } }));
    }

    #[test]
    fn locked_leaves_survive_overlay() {
        let locked = json!({ "store": { "capacity": 5 } });
        let mut base = locked.clone();
        merge_locked(
            &mut base,
            &json!({ "store": { "capacity": 50, "dimension": 16 } }),
            Some(&locked),
        );
        assert_eq!(base, json!({ "store": { "capacity": 5, "dimension": 16 } }));
    }

    #[test]
    fn null_overrides_previous_value() {
        let mut base = json!({ "store": { "similarity_threshold": 0.5 } });
        merge_values(&mut base, &json!({ "store": { "similarity_threshold": null } }));
        assert_eq!(base, json!({ "store": { "similarity_threshold": null } }));
    }
}

//! Request-shape defaults.
//!
//! Stored records drop every field equal to its default so the hot and cold
//! payloads stay small; typed reads put the defaults back.

use serde_json::{json, Map, Value};

use super::MeasurementType;

/// Default `measurementOptions` for a measurement type.
pub fn default_options(kind: MeasurementType) -> Value {
    match kind {
        MeasurementType::Ping => json!({
            "packets": 3,
            "protocol": "ICMP",
            "port": 80,
            "ipVersion": 4,
        }),
        MeasurementType::Traceroute => json!({
            "protocol": "ICMP",
            "port": 80,
            "ipVersion": 4,
        }),
        MeasurementType::Dns => json!({
            "query": { "type": "A" },
            "protocol": "UDP",
            "port": 53,
            "trace": false,
            "ipVersion": 4,
        }),
        MeasurementType::Mtr => json!({
            "protocol": "ICMP",
            "port": 80,
            "packets": 3,
            "ipVersion": 4,
        }),
        MeasurementType::Http => json!({
            "request": { "method": "HEAD", "path": "/", "query": "" },
            "protocol": "HTTPS",
            "ipVersion": 4,
        }),
    }
}

/// Defaults of a whole stored record for the given type.
pub fn record_defaults(kind: MeasurementType) -> Value {
    json!({
        "limit": 1,
        "locations": [],
        "inProgressUpdates": false,
        "measurementOptions": default_options(kind),
    })
}

/// Recursively remove fields of `doc` that deep-equal the same field in
/// `defaults`. Objects emptied by the removal are removed too.
pub fn strip_defaults(doc: &mut Value, defaults: &Value) {
    let (Value::Object(fields), Value::Object(default_fields)) = (doc, defaults) else {
        return;
    };

    fields.retain(|key, value| match default_fields.get(key) {
        None => true,
        Some(default) if value == default => false,
        Some(default @ Value::Object(_)) if value.is_object() => {
            strip_defaults(value, default);
            !value.as_object().is_some_and(Map::is_empty)
        }
        Some(_) => true,
    });
}

/// Inverse of [`strip_defaults`]: fill in every default field missing from
/// `doc`, recursing into nested objects.
pub fn fill_defaults(doc: &mut Value, defaults: &Value) {
    let (Value::Object(fields), Value::Object(default_fields)) = (doc, defaults) else {
        return;
    };

    for (key, default) in default_fields {
        match fields.get_mut(key) {
            None => {
                fields.insert(key.clone(), default.clone());
            }
            Some(value) => fill_defaults(value, default),
        }
    }
}

/// Overlay user-supplied options onto the type defaults.
pub fn merge_options(kind: MeasurementType, options: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = Value::Object(options.clone());
    fill_defaults(&mut merged, &default_options(kind));
    match merged {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_removes_defaults_recursively() {
        let mut doc = json!({
            "id": "x",
            "limit": 1,
            "locations": [],
            "measurementOptions": {
                "query": { "type": "A" },
                "protocol": "TCP",
                "port": 53,
            },
        });
        strip_defaults(&mut doc, &record_defaults(MeasurementType::Dns));

        assert_eq!(
            doc,
            json!({
                "id": "x",
                "measurementOptions": { "protocol": "TCP" },
            })
        );
    }

    #[test]
    fn test_strip_drops_emptied_objects() {
        let mut doc = json!({
            "limit": 5,
            "measurementOptions": { "packets": 3, "protocol": "ICMP" },
        });
        strip_defaults(&mut doc, &record_defaults(MeasurementType::Ping));
        assert_eq!(doc, json!({ "limit": 5 }));
    }

    #[test]
    fn test_fill_restores_stripped_fields() {
        let original = json!({
            "limit": 1,
            "locations": [],
            "inProgressUpdates": false,
            "measurementOptions": {
                "request": { "method": "GET", "path": "/", "query": "" },
                "protocol": "HTTPS",
                "ipVersion": 4,
            },
        });
        let defaults = record_defaults(MeasurementType::Http);

        let mut doc = original.clone();
        strip_defaults(&mut doc, &defaults);
        assert_eq!(doc, json!({ "measurementOptions": { "request": { "method": "GET" } } }));

        fill_defaults(&mut doc, &defaults);
        assert_eq!(doc, original);
    }

    #[test]
    fn test_merge_options_keeps_user_values() {
        let mut user = Map::new();
        user.insert("packets".to_string(), json!(10));
        let merged = merge_options(MeasurementType::Ping, &user);
        assert_eq!(merged.get("packets"), Some(&json!(10)));
        assert_eq!(merged.get("protocol"), Some(&json!("ICMP")));
    }
}

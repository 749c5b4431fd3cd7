//! Recursive enrichment walk: `type_uid`, enum siblings, object recursion,
//! observable collection, `json_t` opacity.
//!
//! One schema-driven walk rather than one function per vendor: an unknown
//! attribute or a `json_t`-typed one is left untouched and the walk doesn't
//! recurse into it, so enrichment is safe to run against data the catalog
//! doesn't fully describe.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::path;
use crate::schema::catalog::{AttributeDef, ObservableTemplate, SchemaCatalog, OTHER_ACTIVITY_ID};

/// Enriches `event` against `catalog`, returning a new tree. Never invents a
/// `class_uid`: if the event carries none, or it names an unknown class, the
/// tree is returned unchanged.
pub fn enrich(catalog: &SchemaCatalog, event: &Value, add_enum_siblings: bool, add_observables: bool) -> Value {
    let mut output = event.clone();

    let Some(class_uid) = event.get("class_uid").and_then(Value::as_i64) else {
        return output;
    };
    let Some(class_def) = catalog.class_by_uid(class_uid) else {
        return output;
    };

    let activity_id = event.get("activity_id").and_then(Value::as_i64);
    let type_uid = class_uid * 100 + activity_id.unwrap_or(OTHER_ACTIVITY_ID);
    path::set(&mut output, "type_uid", Value::from(type_uid));

    let templates = if add_observables { catalog.observable_templates_for(class_uid) } else { None };
    let mut observables = Vec::new();

    if let Some(obj) = event.as_object() {
        walk(catalog, &class_def.attributes, obj, "", &mut output, add_enum_siblings, add_observables, templates, &mut observables);
    }

    if add_observables && !observables.is_empty() {
        path::set(&mut output, "observables", Value::Array(observables));
    }

    output
}

#[allow(clippy::too_many_arguments)]
fn walk(
    catalog: &SchemaCatalog,
    attributes: &HashMap<String, AttributeDef>,
    obj: &Map<String, Value>,
    parent_path: &str,
    output: &mut Value,
    add_enum_siblings: bool,
    add_observables: bool,
    templates: Option<&HashMap<String, ObservableTemplate>>,
    observables: &mut Vec<Value>,
) {
    for (name, value) in obj {
        let Some(attr) = attributes.get(name) else {
            // Unknown attribute: already copied unchanged by the initial clone.
            continue;
        };
        if attr.is_opaque() {
            // json_t: already copied unchanged, no further walk.
            continue;
        }
        let path = join_path(parent_path, name);

        if add_enum_siblings {
            if let Some(enum_def) = &attr.enum_def {
                write_enum_sibling(enum_def, name, value, parent_path, output);
                continue;
            }
        }

        if let Some(object_name) = &attr.object_type {
            if let Some(object_def) = catalog.object(object_name) {
                if value.is_object() {
                    emit_object_observable(add_observables, templates, &path, observables);
                    if let Some(child) = value.as_object() {
                        walk(catalog, &object_def.attributes, child, &path, output, add_enum_siblings, add_observables, templates, observables);
                    }
                    continue;
                } else if attr.is_array && value.is_array() {
                    emit_object_observable(add_observables, templates, &path, observables);
                    if let Some(elements) = value.as_array() {
                        for element in elements {
                            if let Some(child) = element.as_object() {
                                walk(catalog, &object_def.attributes, child, &path, output, add_enum_siblings, add_observables, templates, observables);
                            }
                        }
                    }
                    continue;
                }
            }
        }

        if add_observables {
            if let Some(template) = templates.and_then(|t| t.get(&path)) {
                if !template.is_object_level {
                    observables.push(scalar_observable(template, value));
                }
            }
        }
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

/// Writes the companion string field for an enum-valued attribute:
/// `attr.enum.sibling` if set, else `name` with a trailing `_id` stripped
/// (skipped if `name` lacks that suffix); never overwrites an existing value
/// at the sibling path.
fn write_enum_sibling(
    enum_def: &crate::schema::catalog::EnumDef,
    name: &str,
    value: &Value,
    parent_path: &str,
    output: &mut Value,
) {
    let Some(sibling) = enum_def.sibling.clone().or_else(|| name.strip_suffix("_id").map(String::from)) else {
        return;
    };
    let sibling_path = join_path(parent_path, &sibling);
    if path::get(output, &sibling_path).is_some() {
        return;
    }
    let key = path::to_display_string(value);
    if let Some(enum_value) = enum_def.values.get(&key) {
        path::set(output, &sibling_path, Value::String(enum_value.caption.clone()));
    }
}

fn emit_object_observable(
    add_observables: bool,
    templates: Option<&HashMap<String, ObservableTemplate>>,
    path: &str,
    observables: &mut Vec<Value>,
) {
    if !add_observables {
        return;
    }
    if let Some(template) = templates.and_then(|t| t.get(path)) {
        if template.is_object_level {
            let mut descriptor = Map::new();
            descriptor.insert("name".to_string(), Value::String(template.path.clone()));
            descriptor.insert("type".to_string(), Value::String(template.type_name.clone()));
            descriptor.insert("type_id".to_string(), Value::from(template.type_id));
            observables.push(Value::Object(descriptor));
        }
    }
}

fn scalar_observable(template: &ObservableTemplate, value: &Value) -> Value {
    let mut descriptor = Map::new();
    descriptor.insert("name".to_string(), Value::String(template.path.clone()));
    descriptor.insert("type".to_string(), Value::String(template.type_name.clone()));
    descriptor.insert("type_id".to_string(), Value::from(template.type_id));
    descriptor.insert("value".to_string(), value.clone());
    Value::Object(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn enum_sibling_schema() -> Value {
        json!({
            "classes": {
                "Network Activity": {
                    "uid": 1020,
                    "attributes": {
                        "disposition_id": {"enum": {"5": {"caption": "Ack"}}}
                    }
                }
            }
        })
    }

    fn observables_schema() -> Value {
        json!({
            "types": {"ip_t": {"observable": 2, "caption": "IP Address"}},
            "objects": {
                "network_interface": {
                    "attributes": {"ip": {"type": "ip_t"}}
                }
            },
            "classes": {
                "Network Activity": {
                    "uid": 1020,
                    "attributes": {
                        "network_interface": {"object_type": "network_interface"}
                    }
                }
            }
        })
    }

    #[test]
    fn enum_sibling_is_written_and_type_uid_derived() {
        let catalog = SchemaCatalog::load(&enum_sibling_schema()).unwrap();
        let event = json!({"disposition_id": 5, "class_uid": 1020, "activity_id": 1});
        let enriched = enrich(&catalog, &event, true, false);
        assert_eq!(enriched["disposition"], json!("Ack"));
        assert_eq!(enriched["type_uid"], json!(102001));
    }

    #[test]
    fn observables_are_collected_with_name_type_and_value() {
        let catalog = SchemaCatalog::load(&observables_schema()).unwrap();
        let event = json!({"class_uid": 1020, "activity_id": 1, "network_interface": {"ip": "10.0.0.1"}});
        let enriched = enrich(&catalog, &event, false, true);
        let observables = enriched["observables"].as_array().unwrap();
        assert_eq!(observables.len(), 1);
        assert_eq!(observables[0]["name"], json!("network_interface.ip"));
        assert_eq!(observables[0]["type"], json!("IP Address"));
        assert_eq!(observables[0]["type_id"], json!(2));
        assert_eq!(observables[0]["value"], json!("10.0.0.1"));
    }

    #[test]
    fn unknown_class_uid_passes_through_unchanged() {
        let catalog = SchemaCatalog::load(&enum_sibling_schema()).unwrap();
        let event = json!({"class_uid": 9999, "foo": "bar"});
        let enriched = enrich(&catalog, &event, true, true);
        assert_eq!(enriched, event);
    }

    #[test]
    fn missing_class_uid_passes_through_unchanged() {
        let catalog = SchemaCatalog::load(&enum_sibling_schema()).unwrap();
        let event = json!({"foo": "bar"});
        let enriched = enrich(&catalog, &event, true, true);
        assert_eq!(enriched, event);
    }

    #[test]
    fn enrichment_is_idempotent() {
        let catalog = SchemaCatalog::load(&observables_schema()).unwrap();
        let event = json!({"class_uid": 1020, "activity_id": 1, "network_interface": {"ip": "10.0.0.1"}});
        let once = enrich(&catalog, &event, true, true);
        let twice = enrich(&catalog, &once, true, true);
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_activity_id_falls_back_to_other() {
        let catalog = SchemaCatalog::load(&enum_sibling_schema()).unwrap();
        let event = json!({"class_uid": 1020});
        let enriched = enrich(&catalog, &event, true, true);
        assert_eq!(enriched["type_uid"], json!(1020 * 100 + 99));
    }
}

//! Schema catalog: `classes`/`objects`/`types` loaded once from a single
//! JSON document, indexed by uid/name.
//!
//! Parsed by hand over `serde_json::Value`, the same convention
//! `rules::doc::RuleDoc` uses, rather than `#[derive(Deserialize)]`, because
//! an attribute's `enum` map mixes a reserved `sibling` key with
//! caller-chosen numeric keys.

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use serde_json::{Map, Value};

use crate::error::{PipelineError, Result};

/// OCSF's reserved "Other" activity id, used as the `type_uid` fallback when
/// an event's `class_uid` is known but `activity_id` is absent.
pub const OTHER_ACTIVITY_ID: i64 = 99;

/// One enum value's display caption.
#[derive(Debug, Clone)]
pub struct EnumValue {
    pub caption: String,
}

/// An attribute's `enum` definition: optional sibling-field override, plus
/// the stringified-int → caption map.
#[derive(Debug, Clone, Default)]
pub struct EnumDef {
    pub sibling: Option<String>,
    pub values: HashMap<String, EnumValue>,
}

/// One attribute entry inside a class or object definition.
#[derive(Debug, Clone, Default)]
pub struct AttributeDef {
    pub type_name: Option<String>,
    pub object_type: Option<String>,
    pub is_array: bool,
    pub enum_def: Option<EnumDef>,
}

impl AttributeDef {
    pub fn is_opaque(&self) -> bool {
        self.type_name.as_deref() == Some("json_t")
    }
}

/// One object definition (`network_interface`, …). An object-def may itself
/// carry an `observable` id, distinct from any `observable` id carried by the
/// *types* of its own attributes.
#[derive(Debug, Clone, Default)]
pub struct ObjectDef {
    pub attributes: HashMap<String, AttributeDef>,
    pub observable: Option<i64>,
}

/// One scalar type definition (`ip_t`, …).
#[derive(Debug, Clone, Default)]
pub struct TypeDef {
    pub observable: Option<i64>,
    pub caption: Option<String>,
}

/// One event class definition (`Network Activity`, …), keyed by its integer
/// `uid` after indexing.
#[derive(Debug, Clone, Default)]
pub struct ClassDef {
    pub uid: i64,
    pub attributes: HashMap<String, AttributeDef>,
}

/// A precomputed, path-keyed observable descriptor template: schema-derived
/// (type id/name), independent of any particular event's values.
#[derive(Debug, Clone)]
pub struct ObservableTemplate {
    pub path: String,
    pub type_id: i64,
    pub type_name: String,
    /// True if this template describes an object-level observable (attr's
    /// `object_type` names an object whose own def carries `observable`),
    /// in which case the emitted descriptor carries no `value`.
    pub is_object_level: bool,
}

/// Loaded once from a single JSON document. Indexed by class-uid,
/// object-name, and type-name. The `class-uid → observable templates` map is
/// computed lazily under a single-entry guard on first access.
pub struct SchemaCatalog {
    classes: HashMap<i64, ClassDef>,
    objects: HashMap<String, ObjectDef>,
    types: HashMap<String, TypeDef>,
    observable_types: HashMap<i64, String>,
    observable_templates: OnceCell<HashMap<i64, HashMap<String, ObservableTemplate>>>,
}

impl SchemaCatalog {
    pub fn load(document: &Value) -> Result<Self> {
        let obj = document
            .as_object()
            .ok_or_else(|| PipelineError::schema("schema document must be a JSON object"))?;

        let types = parse_types(obj.get("types"))?;
        let mut observable_types = HashMap::new();
        for def in types.values() {
            if let (Some(id), Some(caption)) = (def.observable, &def.caption) {
                observable_types.entry(id).or_insert_with(|| caption.clone());
            }
        }

        let objects = parse_objects(obj.get("objects"))?;
        let classes = parse_classes(obj.get("classes"))?;

        Ok(SchemaCatalog {
            classes,
            objects,
            types,
            observable_types,
            observable_templates: OnceCell::new(),
        })
    }

    pub fn class_by_uid(&self, uid: i64) -> Option<&ClassDef> {
        self.classes.get(&uid)
    }

    pub fn object(&self, name: &str) -> Option<&ObjectDef> {
        self.objects.get(name)
    }

    pub fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    pub fn observable_type_name(&self, id: i64) -> &str {
        self.observable_types.get(&id).map(String::as_str).unwrap_or("Other")
    }

    /// Returns the path-keyed observable template map for `class_uid`,
    /// building templates for every known class on first access. The
    /// single-entry guard means the cost is paid once even under concurrent
    /// first access.
    pub fn observable_templates_for(&self, class_uid: i64) -> Option<&HashMap<String, ObservableTemplate>> {
        let all = self.observable_templates.get_or_init(|| {
            self.classes
                .iter()
                .map(|(uid, class_def)| (*uid, self.build_templates(&class_def.attributes)))
                .collect()
        });
        all.get(&class_uid)
    }

    fn build_templates(&self, attributes: &HashMap<String, AttributeDef>) -> HashMap<String, ObservableTemplate> {
        let mut templates = HashMap::new();
        let mut path_stack: Vec<String> = Vec::new();
        self.walk_templates(attributes, &mut path_stack, &mut templates);
        templates
    }

    fn walk_templates(
        &self,
        attributes: &HashMap<String, AttributeDef>,
        path_stack: &mut Vec<String>,
        templates: &mut HashMap<String, ObservableTemplate>,
    ) {
        for (name, attr) in attributes {
            if attr.is_opaque() {
                continue;
            }
            path_stack.push(name.clone());
            let path = path_stack.join(".");

            if let Some(object_name) = &attr.object_type {
                if segment_repeats_too_often(path_stack, object_name) {
                    path_stack.pop();
                    continue;
                }
                if let Some(object_def) = self.objects.get(object_name) {
                    if let Some(id) = object_def.observable {
                        templates.insert(
                            path.clone(),
                            ObservableTemplate {
                                path: path.clone(),
                                type_id: id,
                                type_name: self.observable_type_name(id).to_string(),
                                is_object_level: true,
                            },
                        );
                    }
                    self.walk_templates(&object_def.attributes, path_stack, templates);
                }
            } else if let Some(type_name) = &attr.type_name {
                if let Some(id) = self.types.get(type_name).and_then(|t| t.observable) {
                    templates.insert(
                        path.clone(),
                        ObservableTemplate {
                            path,
                            type_id: id,
                            type_name: self.observable_type_name(id).to_string(),
                            is_object_level: false,
                        },
                    );
                }
            }
            path_stack.pop();
        }
    }
}

/// Heuristic cycle guard: a schema whose object graph self-references would
/// otherwise recurse unboundedly while building templates. A looped object
/// path is detected heuristically — any path segment repeating beyond this
/// threshold halts the walk down that branch.
const PATH_REPEAT_THRESHOLD: usize = 3;

fn segment_repeats_too_often(path_stack: &[String], segment: &str) -> bool {
    path_stack.iter().filter(|s| s.as_str() == segment).count() >= PATH_REPEAT_THRESHOLD
}

fn parse_types(value: Option<&Value>) -> Result<HashMap<String, TypeDef>> {
    let Some(value) = value else { return Ok(HashMap::new()) };
    let obj = value
        .as_object()
        .ok_or_else(|| PipelineError::schema("`types` must be a JSON object"))?;
    let mut types = HashMap::new();
    for (name, def) in obj {
        let def_obj = def
            .as_object()
            .ok_or_else(|| PipelineError::schema(format!("type `{name}` must be a JSON object")))?;
        types.insert(
            name.clone(),
            TypeDef {
                observable: def_obj.get("observable").and_then(Value::as_i64),
                caption: def_obj.get("caption").and_then(Value::as_str).map(String::from),
            },
        );
    }
    Ok(types)
}

fn parse_objects(value: Option<&Value>) -> Result<HashMap<String, ObjectDef>> {
    let Some(value) = value else { return Ok(HashMap::new()) };
    let obj = value
        .as_object()
        .ok_or_else(|| PipelineError::schema("`objects` must be a JSON object"))?;
    let mut objects = HashMap::new();
    for (name, def) in obj {
        let def_obj = def
            .as_object()
            .ok_or_else(|| PipelineError::schema(format!("object `{name}` must be a JSON object")))?;
        objects.insert(
            name.clone(),
            ObjectDef {
                attributes: parse_attributes(def_obj.get("attributes"))?,
                observable: def_obj.get("observable").and_then(Value::as_i64),
            },
        );
    }
    Ok(objects)
}

fn parse_classes(value: Option<&Value>) -> Result<HashMap<i64, ClassDef>> {
    let Some(value) = value else { return Ok(HashMap::new()) };
    let obj = value
        .as_object()
        .ok_or_else(|| PipelineError::schema("`classes` must be a JSON object"))?;
    let mut classes = HashMap::new();
    for (caption, def) in obj {
        let def_obj = def
            .as_object()
            .ok_or_else(|| PipelineError::schema(format!("class `{caption}` must be a JSON object")))?;
        let uid = def_obj
            .get("uid")
            .and_then(Value::as_i64)
            .ok_or_else(|| PipelineError::schema(format!("class `{caption}` missing integer `uid`")))?;
        classes.insert(
            uid,
            ClassDef { uid, attributes: parse_attributes(def_obj.get("attributes"))? },
        );
    }
    Ok(classes)
}

fn parse_attributes(value: Option<&Value>) -> Result<HashMap<String, AttributeDef>> {
    let Some(value) = value else { return Ok(HashMap::new()) };
    let obj = value
        .as_object()
        .ok_or_else(|| PipelineError::schema("`attributes` must be a JSON object"))?;
    let mut attributes = HashMap::new();
    for (name, def) in obj {
        let def_obj = def
            .as_object()
            .ok_or_else(|| PipelineError::schema(format!("attribute `{name}` must be a JSON object")))?;
        attributes.insert(name.clone(), parse_attribute_def(def_obj)?);
    }
    Ok(attributes)
}

fn parse_attribute_def(def_obj: &Map<String, Value>) -> Result<AttributeDef> {
    let enum_def = match def_obj.get("enum") {
        Some(Value::Object(enum_obj)) => Some(parse_enum_def(enum_obj)?),
        Some(_) => return Err(PipelineError::schema("attribute `enum` must be a JSON object")),
        None => None,
    };
    Ok(AttributeDef {
        type_name: def_obj.get("type").and_then(Value::as_str).map(String::from),
        object_type: def_obj.get("object_type").and_then(Value::as_str).map(String::from),
        is_array: def_obj.get("is_array").and_then(Value::as_bool).unwrap_or(false),
        enum_def,
    })
}

fn parse_enum_def(enum_obj: &Map<String, Value>) -> Result<EnumDef> {
    let mut def = EnumDef::default();
    for (key, value) in enum_obj {
        if key == "sibling" {
            def.sibling = value.as_str().map(String::from);
            continue;
        }
        let caption = value
            .as_object()
            .and_then(|o| o.get("caption"))
            .and_then(Value::as_str)
            .ok_or_else(|| PipelineError::schema(format!("enum value `{key}` missing `caption`")))?;
        def.values.insert(key.clone(), EnumValue { caption: caption.to_string() });
    }
    Ok(def)
}

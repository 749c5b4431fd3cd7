//! The event envelope.
//!
//! `data` holds the whole event as a free-form JSON tree rather than a fixed
//! struct with named fields, since the attribute set varies by source type
//! and pipeline stage. End-of-stream is modeled as an explicit tagged variant
//! rather than a nullable "poison" value, so it can never be mistaken for a
//! normal (if empty) event.

use serde_json::{Map, Value};

use crate::path;

/// Three attributes every raw event carries before parsing.
pub const RAW_EVENT_FIELD: &str = "rawEvent";
pub const TENANT_FIELD: &str = "tenant";
pub const SOURCE_TYPE_FIELD: &str = "sourceType";
/// Top-level key under which `EventProcessor` preserves passthrough
/// attributes a matching Translator did not consume.
pub const UNMAPPED_FIELD: &str = "unmapped";

/// An event flowing through the pipeline: either a live value or the
/// end-of-stream sentinel. No `Event::Data` is ever equal to `Event::Eos`,
/// and there is exactly one sentinel variant.
#[derive(Debug, Clone)]
pub enum Event {
    Data(Value),
    Eos,
}

impl Event {
    /// Builds a normal event from an attribute tree. Panics if `tree` is not
    /// a JSON object — every call site constructs events from an object, so
    /// this is a programming error, not a runtime condition.
    pub fn new(tree: Value) -> Self {
        debug_assert!(tree.is_object(), "event tree must be a JSON object");
        Event::Data(tree)
    }

    pub fn empty() -> Self {
        Event::Data(Value::Object(Map::new()))
    }

    pub fn is_eos(&self) -> bool {
        matches!(self, Event::Eos)
    }

    pub fn tree(&self) -> Option<&Value> {
        match self {
            Event::Data(v) => Some(v),
            Event::Eos => None,
        }
    }

    pub fn tree_mut(&mut self) -> Option<&mut Value> {
        match self {
            Event::Data(v) => Some(v),
            Event::Eos => None,
        }
    }

    pub fn into_tree(self) -> Option<Value> {
        match self {
            Event::Data(v) => Some(v),
            Event::Eos => None,
        }
    }

    /// Convenience accessor for a dotted-path string field (used heavily for
    /// `rawEvent`/`sourceType`/`tenant`).
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.tree().and_then(|t| path::get(t, field)).and_then(Value::as_str)
    }

    pub fn source_type(&self) -> Option<&str> {
        self.get_str(SOURCE_TYPE_FIELD)
    }

    pub fn raw_event(&self) -> Option<&str> {
        self.get_str(RAW_EVENT_FIELD)
    }
}

/// Builds a raw event carrying the three required raw attributes.
pub fn raw_event(raw: impl Into<String>, source_type: impl Into<String>, tenant: impl Into<String>) -> Event {
    let mut tree = Map::new();
    tree.insert(RAW_EVENT_FIELD.to_string(), Value::String(raw.into()));
    tree.insert(SOURCE_TYPE_FIELD.to_string(), Value::String(source_type.into()));
    tree.insert(TENANT_FIELD.to_string(), Value::String(tenant.into()));
    Event::Data(Value::Object(tree))
}

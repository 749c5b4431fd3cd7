//! `Translator` / `TranslatorsManager`: the compiled, `tree -> tree | null`
//! rule interpreter.
//!
//! A rule document is parsed and its regex/pattern grammars compiled once,
//! up front; the guard → staged-sub-parse → rewrite sequence that follows is
//! a cheap `translate` call per event against that precompiled form.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::coercion;
use crate::path;
use crate::rules::doc::{MoveTarget, RewriteOp, RewriteRule, RuleDoc};

/// One compiled Translator: an immutable function `tree -> tree | null`.
pub struct Translator {
    doc: RuleDoc,
}

impl Translator {
    pub fn compile(value: &Value) -> crate::error::Result<Self> {
        Ok(Translator { doc: RuleDoc::compile(value)? })
    }

    /// Evaluates this Translator against `parsed`: guard, then staged
    /// sub-parsing, then field rewrites. Returns `None` if the `when` guard
    /// rejects the input. Otherwise returns the rewritten output tree plus
    /// the set of top-level keys of `parsed` that were consumed (read and
    /// removed) by a `@move` or `@remove` rule — `EventProcessor` uses this
    /// set to compute the passthrough `unmapped.*` attributes.
    pub fn translate(&self, parsed: &Value) -> Option<(Value, HashSet<String>)> {
        if let Some(when) = &self.doc.when {
            if !when.eval(parsed) {
                return None;
            }
        }

        let mut working = parsed.clone();
        let original_keys: HashSet<String> = working
            .as_object()
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default();

        for step in &self.doc.parsers {
            let Some(text) = path::get(&working, &step.input_path).and_then(Value::as_str) else {
                trace!(path = %step.input_path, "staged parser input missing or not a string, skipping stage");
                continue;
            };
            let text = text.to_string();
            match step.parser.parse(&text) {
                Ok(subtree) => merge_at(&mut working, &step.output_path, subtree),
                Err(err) => warn!(path = %step.input_path, error = %err, "staged sub-parse failed, skipping stage"),
            }
        }

        let mut output = Value::Object(Map::new());
        for rule in &self.doc.rules {
            apply_rewrite(rule, &mut working, &mut output);
        }

        let consumed = original_keys
            .into_iter()
            .filter(|key| working.as_object().map(|obj| !obj.contains_key(key)).unwrap_or(true))
            .collect();

        Some((output, consumed))
    }
}

/// Merges `value` into `tree` at a dotted path, deep-merging object into
/// object so a later stage's output can add siblings to an earlier stage's
/// without clobbering it — later staged parsers see the merges from earlier
/// ones.
fn merge_at(tree: &mut Value, output_path: &str, value: Value) {
    match path::get(tree, output_path) {
        Some(Value::Object(existing)) if value.is_object() => {
            let mut merged = existing.clone();
            if let Value::Object(incoming) = value {
                for (k, v) in incoming {
                    merged.insert(k, v);
                }
            }
            path::set(tree, output_path, Value::Object(merged));
        }
        _ => path::set(tree, output_path, value),
    }
}

fn apply_rewrite(rule: &RewriteRule, working: &mut Value, output: &mut Value) {
    match &rule.op {
        RewriteOp::Move(target) => {
            let value = path::remove(working, &rule.key);
            write_target(output, target, value);
        }
        RewriteOp::Copy(target) => {
            let value = path::get_owned(working, &rule.key);
            write_target(output, target, value);
        }
        RewriteOp::Value(literal) => {
            path::set(output, &rule.key, literal.clone());
        }
        RewriteOp::Enum { name, default, values } => {
            let mapped = path::get(working, &rule.key).and_then(|value| {
                let key = path::to_display_string(value);
                values.get(&key).cloned()
            });
            if let Some(resolved) = mapped.or_else(|| default.clone()) {
                path::set(output, name, resolved);
            }
        }
        RewriteOp::Remove => {
            path::remove(working, &rule.key);
        }
    }
}

/// Writes a `@move`/`@copy` result to its target, applying coercion and
/// falling back to `default` when the source was missing or failed
/// coercion: a missing source with no `default` leaves the target untouched
/// rather than writing `null`, so a `@move` of an absent field is a no-op.
fn write_target(output: &mut Value, target: &MoveTarget, value: Option<Value>) {
    match target {
        MoveTarget::Simple(name) => {
            if let Some(value) = value {
                path::set(output, name, value);
            }
        }
        MoveTarget::Typed { name, coerce, default } => {
            let resolved = match value {
                Some(value) => match coerce {
                    Some(kind) => coercion::coerce(&value, *kind),
                    None => Some(value),
                },
                None => None,
            };
            if let Some(final_value) = resolved.or_else(|| default.clone()) {
                path::set(output, name, final_value);
            }
        }
    }
}

/// An ordered collection of Translators for a single source type.
/// `translate` tries each in order and returns the first non-null result.
#[derive(Default)]
pub struct TranslatorsManager {
    translators: Vec<Translator>,
}

impl TranslatorsManager {
    pub fn new() -> Self {
        TranslatorsManager { translators: Vec::new() }
    }

    pub fn push(&mut self, translator: Translator) {
        self.translators.push(translator);
    }

    pub fn len(&self) -> usize {
        self.translators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.translators.is_empty()
    }

    pub fn translate(&self, parsed: &Value) -> Option<(Value, HashSet<String>)> {
        self.translators.iter().find_map(|t| t.translate(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn simple_move_translates_tree() {
        let translator = Translator::compile(&json!({
            "rules": [{"id": {"@move": "id"}}]
        }))
        .unwrap();
        let (out, consumed) = translator.translate(&json!({"id": 7})).unwrap();
        assert_eq!(out, json!({"id": 7}));
        assert!(consumed.contains("id"));
    }

    #[test]
    fn when_guard_rejects_non_matching_input() {
        let translator = Translator::compile(&json!({
            "when": "kind = 'firewall'",
            "rules": [{"id": {"@move": "id"}}]
        }))
        .unwrap();
        assert!(translator.translate(&json!({"id": 7, "kind": "router"})).is_none());
        assert!(translator.translate(&json!({"id": 7, "kind": "firewall"})).is_some());
    }

    #[test]
    fn missing_move_source_is_noop_and_default_applies() {
        let translator = Translator::compile(&json!({
            "rules": [{"missing": {"@move": {"name": "port", "type": "integer", "default": 0}}}]
        }))
        .unwrap();
        let (out, _) = translator.translate(&json!({})).unwrap();
        assert_eq!(out["port"], json!(0));
    }

    #[test]
    fn later_rule_overwrites_earlier_target() {
        let translator = Translator::compile(&json!({
            "rules": [
                {"a": {"@move": "target"}},
                {"b": {"@move": "target"}}
            ]
        }))
        .unwrap();
        let (out, _) = translator.translate(&json!({"a": "first", "b": "second"})).unwrap();
        assert_eq!(out["target"], json!("second"));
    }

    #[test]
    fn copy_retains_source_move_does_not() {
        let translator = Translator::compile(&json!({
            "rules": [
                {"a": {"@copy": "copied"}},
                {"a": {"@move": "moved"}}
            ]
        }))
        .unwrap();
        let (out, consumed) = translator.translate(&json!({"a": "x"})).unwrap();
        assert_eq!(out["copied"], json!("x"));
        assert_eq!(out["moved"], json!("x"));
        assert!(consumed.contains("a"));
    }

    #[test]
    fn staged_sub_parse_splits_dotted_ip() {
        let translator = Translator::compile(&json!({
            "parser": {"name": "event_data.ip", "pattern": "#{ip1}.#{ip2}.#{ip3}.#{ip4}", "output": "event_data"},
            "rules": [{"event_data": {"@move": "event_data"}}]
        }))
        .unwrap();
        let (out, _) = translator
            .translate(&json!({"event_data": {"ip": "192.168.1.120"}}))
            .unwrap();
        assert_eq!(out["event_data"]["ip1"], json!("192"));
        assert_eq!(out["event_data"]["ip4"], json!("120"));
        assert_eq!(out["event_data"]["ip"], json!("192.168.1.120"));
    }

    #[test]
    fn manager_returns_first_matching_translator() {
        let mut manager = TranslatorsManager::new();
        manager.push(
            Translator::compile(&json!({"when": "kind = 'a'", "rules": [{"id": {"@value": "A"}}]})).unwrap(),
        );
        manager.push(
            Translator::compile(&json!({"rules": [{"id": {"@value": "fallback"}}]})).unwrap(),
        );
        let (out, _) = manager.translate(&json!({"kind": "b"})).unwrap();
        assert_eq!(out["id"], json!("fallback"));
    }

    #[test]
    fn enum_maps_value_or_falls_back_to_default() {
        let translator = Translator::compile(&json!({
            "rules": [{"code": {"@enum": {"name": "status", "default": "Unknown", "values": {"5": "Ack"}}}}]
        }))
        .unwrap();
        let (matched, _) = translator.translate(&json!({"code": 5})).unwrap();
        assert_eq!(matched["status"], json!("Ack"));
        let (unmatched, _) = translator.translate(&json!({"code": 9})).unwrap();
        assert_eq!(unmatched["status"], json!("Unknown"));
    }
}

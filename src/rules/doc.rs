//! Rule-document compilation: one Rust type per recognized JSON shape,
//! rejecting anything else at load time.
//!
//! Parsed by a hand-rolled walk over `serde_json::Value` rather than
//! `#[derive(Deserialize)]`, because a rewrite rule is a *single-key* map
//! whose key is caller-chosen data (`{"<source-path>": {"@move": ..}}`), a
//! shape `serde`'s derive macros do not express directly.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::coercion::CoerceType;
use crate::error::{PipelineError, Result};
use crate::parser::{Parser, PatternParser, RegexParser};
use crate::when::Predicate;

/// One staged sub-parse step (a `parser`/`parsers` entry).
pub struct ParserStep {
    pub input_path: String,
    pub output_path: String,
    pub parser: Arc<dyn Parser>,
}

/// Where a `@move`/`@copy` rewrite writes its result, and how.
pub enum MoveTarget {
    /// `arg` was a bare string: write as-is, no coercion.
    Simple(String),
    /// `arg` was `{name, type, default}`.
    Typed { name: String, coerce: Option<CoerceType>, default: Option<Value> },
}

/// The five rewrite operators a rewrite rule recognizes.
pub enum RewriteOp {
    Move(MoveTarget),
    Copy(MoveTarget),
    Value(Value),
    Enum { name: String, default: Option<Value>, values: HashMap<String, Value> },
    Remove,
}

/// A single field-rewrite rule: `{key: {op: arg}}`. `key` is a source-path
/// for `@move`/`@copy`/`@enum`/`@remove`, and is reused as the *target*
/// path for `@value` (which has no source to read).
pub struct RewriteRule {
    pub key: String,
    pub op: RewriteOp,
}

/// One compiled rule document.
pub struct RuleDoc {
    pub desc: Option<String>,
    pub when: Option<Predicate>,
    pub parsers: Vec<ParserStep>,
    pub rules: Vec<RewriteRule>,
}

impl RuleDoc {
    /// Compiles a rule document from its JSON representation. Pre-compiles
    /// every regex/pattern grammar and resolves `when` into a `Predicate`
    /// up front, so a bad rule document fails at load time rather than
    /// mid-stream.
    pub fn compile(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| PipelineError::rule_load("rule document must be a JSON object"))?;

        let desc = obj.get("desc").and_then(Value::as_str).map(String::from);
        let when = obj
            .get("when")
            .and_then(Value::as_str)
            .map(Predicate::compile)
            .transpose()?;

        let mut parsers = Vec::new();
        if let Some(single) = obj.get("parser") {
            parsers.push(compile_parser_step(as_object(single, "parser")?)?);
        }
        if let Some(seq) = obj.get("parsers") {
            let arr = seq
                .as_array()
                .ok_or_else(|| PipelineError::rule_load("`parsers` must be an array"))?;
            for step in arr {
                parsers.push(compile_parser_step(as_object(step, "parsers[]")?)?);
            }
        }

        let mut rules = Vec::new();
        if let Some(seq) = obj.get("rules") {
            let arr = seq
                .as_array()
                .ok_or_else(|| PipelineError::rule_load("`rules` must be an array"))?;
            for entry in arr {
                let entry_obj = as_object(entry, "rules[]")?;
                if entry_obj.len() != 1 {
                    return Err(PipelineError::rule_load(
                        "each rewrite rule must be a single-key mapping {source-path: {op: arg}}",
                    ));
                }
                let (key, opval) = entry_obj.iter().next().expect("len checked above");
                let opmap = as_object(opval, "rules[].<key>")?;
                rules.push(compile_rewrite_rule(key, opmap)?);
            }
        }

        Ok(RuleDoc { desc, when, parsers, rules })
    }
}

fn as_object<'a>(value: &'a Value, where_: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| PipelineError::rule_load(format!("expected a JSON object at {where_}")))
}

fn compile_parser_step(obj: &Map<String, Value>) -> Result<ParserStep> {
    let input_path = obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| PipelineError::rule_load("parser step missing `name`"))?
        .to_string();
    let output_path = obj
        .get("output")
        .and_then(Value::as_str)
        .ok_or_else(|| PipelineError::rule_load("parser step missing `output`"))?
        .to_string();

    let parser: Arc<dyn Parser> = if let Some(pattern) = obj.get("pattern").and_then(Value::as_str) {
        Arc::new(PatternParser::compile(pattern)?)
    } else if let Some(regex) = obj.get("regex").and_then(Value::as_str) {
        Arc::new(RegexParser::compile(regex)?)
    } else {
        return Err(PipelineError::rule_load("parser step must have `pattern` or `regex`"));
    };

    Ok(ParserStep { input_path, output_path, parser })
}

fn compile_rewrite_rule(key: &str, opmap: &Map<String, Value>) -> Result<RewriteRule> {
    let mut op = None;
    for (opname, arg) in opmap {
        match opname.as_str() {
            "desc" => continue,
            "@move" => op = Some(RewriteOp::Move(compile_move_target(arg)?)),
            "@copy" => op = Some(RewriteOp::Copy(compile_move_target(arg)?)),
            "@value" => op = Some(RewriteOp::Value(compile_value_arg(arg))),
            "@enum" => op = Some(compile_enum_arg(arg)?.into()),
            "@remove" => op = Some(RewriteOp::Remove),
            other => return Err(PipelineError::rule_load(format!("unknown rewrite operator `{other}`"))),
        }
    }
    let op = op.ok_or_else(|| {
        PipelineError::rule_load(format!("rewrite rule for `{key}` has no recognized operator"))
    })?;
    Ok(RewriteRule { key: key.to_string(), op })
}

fn compile_move_target(arg: &Value) -> Result<MoveTarget> {
    match arg {
        Value::String(s) => Ok(MoveTarget::Simple(s.clone())),
        Value::Object(obj) => {
            let name = obj
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| PipelineError::rule_load("@move/@copy object form missing `name`"))?
                .to_string();
            let coerce = obj
                .get("type")
                .and_then(Value::as_str)
                .map(CoerceType::parse_name)
                .transpose()?;
            let default = obj.get("default").cloned();
            Ok(MoveTarget::Typed { name, coerce, default })
        }
        _ => Err(PipelineError::rule_load("@move/@copy arg must be a string or {name, type, default}")),
    }
}

fn compile_value_arg(arg: &Value) -> Value {
    match arg {
        Value::Object(obj) if obj.contains_key("value") => obj.get("value").cloned().unwrap_or(Value::Null),
        other => other.clone(),
    }
}

fn compile_enum_arg(arg: &Value) -> Result<(String, Option<Value>, HashMap<String, Value>)> {
    let obj = arg
        .as_object()
        .ok_or_else(|| PipelineError::rule_load("@enum arg must be {name, default, values}"))?;
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| PipelineError::rule_load("@enum arg missing `name`"))?
        .to_string();
    let default = obj.get("default").cloned();
    let values = obj
        .get("values")
        .and_then(Value::as_object)
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();
    Ok((name, default, values))
}

impl From<(String, Option<Value>, HashMap<String, Value>)> for RewriteOp {
    fn from((name, default, values): (String, Option<Value>, HashMap<String, Value>)) -> Self {
        RewriteOp::Enum { name, default, values }
    }
}

//! Parsers: the per-source-type `Parser` interface (concrete vendor parsers
//! are a separate concern, registered against a source type and driven
//! through the fuzzy map) and the two staged sub-parser grammars a rule
//! document can drive for re-parsing an already-parsed field.
//!
//! `RegexParser` wraps a named-capture `regex::Regex`. `PatternParser`'s
//! `#{name}` placeholder grammar is the minimal concrete sub-parser grammar
//! needed to drive staged re-parsing (e.g. splitting a dotted IP quad) when
//! a rule document doesn't want to write a full regex for it.

use std::collections::HashMap;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{PipelineError, Result};

/// A function from raw text to an attribute tree that may fail. Implemented
/// both by concrete vendor parsers and by the staged sub-parsers a rule
/// document compiles (`PatternParser`, `RegexParser`).
pub trait Parser: Send + Sync {
    fn parse(&self, text: &str) -> Result<Value>;
}

/// A `#{name}` placeholder grammar: literal text between placeholders must
/// match verbatim, and each placeholder captures up to the next literal
/// boundary (non-greedy for every placeholder but the last, which is
/// greedy so it can absorb the remainder of the input).
pub struct PatternParser {
    regex: Regex,
    names: Vec<String>,
}

impl PatternParser {
    pub fn compile(pattern: &str) -> Result<Self> {
        let mut names = Vec::new();
        let mut regex_src = String::from("^");
        let mut rest = pattern;
        while let Some(start) = rest.find("#{") {
            let (literal, after_open) = rest.split_at(start);
            regex_src.push_str(&regex::escape(literal));
            let after_open = &after_open[2..];
            let Some(end) = after_open.find('}') else {
                return Err(PipelineError::rule_load(format!(
                    "unterminated placeholder in pattern grammar: {pattern}"
                )));
            };
            let name = after_open[..end].to_string();
            names.push(name.clone());
            regex_src.push_str(&format!("(?P<{name}>.+?)"));
            rest = &after_open[end + 1..];
        }
        regex_src.push_str(&regex::escape(rest));
        regex_src.push('$');
        // The last placeholder should be greedy so it can absorb any
        // remaining literal-free tail; swap its final non-greedy marker.
        if let Some(last) = names.last() {
            let needle = format!("(?P<{last}>.+?)");
            let replacement = format!("(?P<{last}>.+)");
            if let Some(idx) = regex_src.rfind(&needle) {
                regex_src.replace_range(idx..idx + needle.len(), &replacement);
            }
        }
        let regex = Regex::new(&regex_src)
            .map_err(|e| PipelineError::rule_load(format!("invalid pattern grammar `{pattern}`: {e}")))?;
        Ok(PatternParser { regex, names })
    }
}

impl Parser for PatternParser {
    fn parse(&self, text: &str) -> Result<Value> {
        let captures = self
            .regex
            .captures(text)
            .ok_or_else(|| PipelineError::parse(format!("pattern did not match: {text}")))?;
        let mut map = Map::new();
        for name in &self.names {
            if let Some(m) = captures.name(name) {
                map.insert(name.clone(), Value::String(m.as_str().to_string()));
            }
        }
        Ok(Value::Object(map))
    }
}

/// A named-capture regex grammar: every named group in the compiled regex
/// becomes a top-level key of the resulting tree.
pub struct RegexParser {
    regex: Regex,
}

impl RegexParser {
    pub fn compile(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| PipelineError::rule_load(format!("invalid regex grammar `{pattern}`: {e}")))?;
        Ok(RegexParser { regex })
    }
}

impl Parser for RegexParser {
    fn parse(&self, text: &str) -> Result<Value> {
        let captures = self
            .regex
            .captures(text)
            .ok_or_else(|| PipelineError::parse(format!("regex did not match: {text}")))?;
        let mut map = Map::new();
        for name in self.regex.capture_names().flatten() {
            if let Some(m) = captures.name(name) {
                map.insert(name.to_string(), Value::String(m.as_str().to_string()));
            }
        }
        Ok(Value::Object(map))
    }
}

/// A `Parser` keyed registry for code registering concrete vendor parsers
/// against a source type, resolved through the fuzzy map in `demux`.
pub type ParserRegistry = HashMap<String, std::sync::Arc<dyn Parser>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_parser_splits_dotted_quad() {
        let parser = PatternParser::compile("#{ip1}.#{ip2}.#{ip3}.#{ip4}").unwrap();
        let tree = parser.parse("192.168.1.120").unwrap();
        assert_eq!(tree["ip1"], "192");
        assert_eq!(tree["ip2"], "168");
        assert_eq!(tree["ip3"], "1");
        assert_eq!(tree["ip4"], "120");
    }

    #[test]
    fn pattern_parser_fails_on_mismatch() {
        let parser = PatternParser::compile("#{a}-#{b}").unwrap();
        assert!(parser.parse("nodashhere").is_err());
    }

    #[test]
    fn pattern_parser_last_capture_is_greedy() {
        let parser = PatternParser::compile("#{a}-#{b}").unwrap();
        let tree = parser.parse("no-dash-here").unwrap();
        assert_eq!(tree["a"], "no");
        assert_eq!(tree["b"], "dash-here");
    }

    #[test]
    fn regex_parser_uses_named_groups() {
        let parser = RegexParser::compile(r"^(?P<host>\S+) (?P<pid>\d+)$").unwrap();
        let tree = parser.parse("fw01 4821").unwrap();
        assert_eq!(tree["host"], "fw01");
        assert_eq!(tree["pid"], "4821");
    }
}

//! The `when` predicate mini-language.
//!
//! ```text
//! expr   := term ( ("and"|"or") term )*
//! term   := path op literal | "not" term | "(" expr ")"
//! op     := "=" | "!=" | "like"
//! ```
//!
//! `when` is a plain string rather than a JSON-tagged expression tree, so
//! this module owns its own tokenizer and recursive-descent parser rather
//! than reusing `serde_json`'s deserializer.

use crate::error::{PipelineError, Result};
use crate::path;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Like,
}

/// A compiled `when` predicate, evaluated against the current working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Compare { path: String, op: CompareOp, literal: String },
    Not(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    /// Compiles a `when` string into a `Predicate`. Returns a
    /// `RuleLoadError` on malformed syntax — this only happens at rule-load
    /// time, aborting startup rather than failing mid-stream.
    pub fn compile(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        let mut pos = 0;
        let expr = parse_expr(&tokens, &mut pos)?;
        if pos != tokens.len() {
            return Err(PipelineError::rule_load(format!(
                "trailing tokens in `when` expression: {source}"
            )));
        }
        Ok(expr)
    }

    /// Evaluates the predicate against `tree`. A missing path makes any
    /// comparison false, short-circuiting `and`/`or`/`not` around it in the
    /// usual way.
    pub fn eval(&self, tree: &Value) -> bool {
        match self {
            Predicate::Compare { path: p, op, literal } => {
                let Some(value) = path::get(tree, p) else { return false };
                let rendered = path::to_display_string(value);
                match op {
                    CompareOp::Eq => &rendered == literal,
                    CompareOp::Ne => &rendered != literal,
                    CompareOp::Like => rendered.contains(literal.as_str()),
                }
            }
            Predicate::Not(inner) => !inner.eval(tree),
            Predicate::And(lhs, rhs) => lhs.eval(tree) && rhs.eval(tree),
            Predicate::Or(lhs, rhs) => lhs.eval(tree) || rhs.eval(tree),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Path(String),
    Literal(String),
    Op(CompareOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '\'' => {
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != '\'' {
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(PipelineError::rule_load(format!(
                        "unterminated string literal in `when`: {source}"
                    )));
                }
                tokens.push(Token::Literal(chars[start..j].iter().collect()));
                i = j + 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(CompareOp::Ne));
                i += 2;
            }
            '=' => {
                tokens.push(Token::Op(CompareOp::Eq));
                i += 1;
            }
            _ => {
                let start = i;
                while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '(' && chars[i] != ')' {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.to_ascii_lowercase().as_str() {
                    "and" => tokens.push(Token::And),
                    "or" => tokens.push(Token::Or),
                    "not" => tokens.push(Token::Not),
                    "like" => tokens.push(Token::Op(CompareOp::Like)),
                    _ => tokens.push(Token::Path(word)),
                }
            }
        }
    }
    Ok(tokens)
}

fn parse_expr(tokens: &[Token], pos: &mut usize) -> Result<Predicate> {
    let mut result = parse_term(tokens, pos)?;
    loop {
        match tokens.get(*pos) {
            Some(Token::And) => {
                *pos += 1;
                let rhs = parse_term(tokens, pos)?;
                result = Predicate::And(Box::new(result), Box::new(rhs));
            }
            Some(Token::Or) => {
                *pos += 1;
                let rhs = parse_term(tokens, pos)?;
                result = Predicate::Or(Box::new(result), Box::new(rhs));
            }
            _ => break,
        }
    }
    Ok(result)
}

fn parse_term(tokens: &[Token], pos: &mut usize) -> Result<Predicate> {
    match tokens.get(*pos) {
        Some(Token::Not) => {
            *pos += 1;
            let inner = parse_term(tokens, pos)?;
            Ok(Predicate::Not(Box::new(inner)))
        }
        Some(Token::LParen) => {
            *pos += 1;
            let inner = parse_expr(tokens, pos)?;
            match tokens.get(*pos) {
                Some(Token::RParen) => {
                    *pos += 1;
                    Ok(inner)
                }
                _ => Err(PipelineError::rule_load("unbalanced parentheses in `when`")),
            }
        }
        Some(Token::Path(p)) => {
            let path = p.clone();
            *pos += 1;
            let op = match tokens.get(*pos) {
                Some(Token::Op(op)) => op.clone(),
                _ => return Err(PipelineError::rule_load(format!("expected comparison operator after `{path}`"))),
            };
            *pos += 1;
            let literal = match tokens.get(*pos) {
                Some(Token::Literal(lit)) => lit.clone(),
                _ => return Err(PipelineError::rule_load(format!("expected string literal after operator for `{path}`"))),
            };
            *pos += 1;
            Ok(Predicate::Compare { path, op, literal })
        }
        other => Err(PipelineError::rule_load(format!("unexpected token in `when` expression: {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equality_and_like() {
        let tree = json!({"sourceType": "syslog:firewall", "n": 5});
        assert!(Predicate::compile("sourceType = 'syslog:firewall'").unwrap().eval(&tree));
        assert!(Predicate::compile("sourceType like 'firewall'").unwrap().eval(&tree));
        assert!(!Predicate::compile("sourceType like 'router'").unwrap().eval(&tree));
    }

    #[test]
    fn missing_path_is_false() {
        let tree = json!({});
        assert!(!Predicate::compile("absent = 'x'").unwrap().eval(&tree));
    }

    #[test]
    fn boolean_composition_and_negation() {
        let tree = json!({"a": "1", "b": "2"});
        assert!(Predicate::compile("a = '1' and b = '2'").unwrap().eval(&tree));
        assert!(Predicate::compile("a = '9' or b = '2'").unwrap().eval(&tree));
        assert!(Predicate::compile("not (a = '9')").unwrap().eval(&tree));
    }

    #[test]
    fn unbalanced_parens_fail_to_compile() {
        assert!(Predicate::compile("(a = '1'").is_err());
    }
}

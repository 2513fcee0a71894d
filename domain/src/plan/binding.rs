//! Input bindings.
//!
//! Step inputs are JSON values whose strings may reference earlier step
//! outputs with `${root.path}` templates, where `root` is a step id or an
//! output binding name and `path` is a sequence of `.field` and `[index]`
//! segments. Inputs are parsed into a [`BindingExpr`] tree once and resolved
//! against a [`BindingScope`] at execution time, so a missing value is a
//! typed [`BindingError`] rather than a malformed string.
//!
//! A string that consists of exactly one reference resolves to the
//! referenced JSON value with its type preserved; references embedded in a
//! longer string are rendered into text.

use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("malformed binding '{text}': {reason}")]
    Malformed { text: String, reason: String },

    #[error("unresolved binding root '{0}'")]
    Unresolved(String),

    #[error("binding '{reference}' has no value at '{segment}'")]
    MissingField { reference: String, segment: String },
}

impl BindingError {
    fn malformed(text: &str, reason: impl Into<String>) -> Self {
        BindingError::Malformed {
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Field(name) => write!(f, ".{}", name),
            PathSegment::Index(index) => write!(f, "[{}]", index),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// A reference into a prior step's output: `root(.field|[index])*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub root: String,
    pub path: Vec<PathSegment>,
}

impl Reference {
    pub fn parse(text: &str) -> Result<Self, BindingError> {
        let trimmed = text.trim();
        let root_end = trimmed
            .find(|c: char| !is_ident_char(c))
            .unwrap_or(trimmed.len());
        let root = &trimmed[..root_end];
        if root.is_empty() {
            return Err(BindingError::malformed(text, "empty reference root"));
        }

        let mut path = Vec::new();
        let mut rest = &trimmed[root_end..];
        while let Some(c) = rest.chars().next() {
            match c {
                '.' => {
                    let body = &rest[1..];
                    let end = body.find(|c: char| !is_ident_char(c)).unwrap_or(body.len());
                    if end == 0 {
                        return Err(BindingError::malformed(text, "empty field name"));
                    }
                    path.push(PathSegment::Field(body[..end].to_string()));
                    rest = &body[end..];
                }
                '[' => {
                    let Some(close) = rest.find(']') else {
                        return Err(BindingError::malformed(text, "unterminated index"));
                    };
                    let index = rest[1..close]
                        .trim()
                        .parse::<usize>()
                        .map_err(|_| BindingError::malformed(text, "index is not a non-negative integer"))?;
                    path.push(PathSegment::Index(index));
                    rest = &rest[close + 1..];
                }
                other => {
                    return Err(BindingError::malformed(
                        text,
                        format!("unexpected character '{}'", other),
                    ));
                }
            }
        }

        Ok(Self {
            root: root.to_string(),
            path,
        })
    }

    /// First field name in the path, used to type-check against an output schema.
    pub fn first_field(&self) -> Option<&str> {
        match self.path.first() {
            Some(PathSegment::Field(name)) => Some(name),
            _ => None,
        }
    }

    /// Walk the path inside a root value.
    pub fn lookup<'v>(&self, root_value: &'v Value) -> Result<&'v Value, BindingError> {
        let mut current = root_value;
        for segment in &self.path {
            let next = match segment {
                PathSegment::Field(name) => current.get(name.as_str()),
                PathSegment::Index(index) => current.get(*index),
            };
            current = next.ok_or_else(|| BindingError::MissingField {
                reference: self.to_string(),
                segment: segment.to_string(),
            })?;
        }
        Ok(current)
    }

    pub fn resolve<'v>(&self, scope: &'v BindingScope) -> Result<&'v Value, BindingError> {
        let root = scope
            .get(&self.root)
            .ok_or_else(|| BindingError::Unresolved(self.root.clone()))?;
        self.lookup(root)
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.root)?;
        for segment in &self.path {
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Text(String),
    Ref(Reference),
}

/// Parsed form of one input value.
#[derive(Debug, Clone, PartialEq)]
pub enum BindingExpr {
    Literal(Value),
    Reference(Reference),
    Template(Vec<TemplatePart>),
    Object(Vec<(String, BindingExpr)>),
    Array(Vec<BindingExpr>),
}

impl BindingExpr {
    pub fn parse(value: &Value) -> Result<Self, BindingError> {
        match value {
            Value::String(text) => parse_template(text),
            Value::Array(items) => {
                let parsed = items
                    .iter()
                    .map(BindingExpr::parse)
                    .collect::<Result<Vec<_>, _>>()?;
                if parsed.iter().all(BindingExpr::is_literal) {
                    Ok(BindingExpr::Literal(value.clone()))
                } else {
                    Ok(BindingExpr::Array(parsed))
                }
            }
            Value::Object(map) => {
                let parsed = map
                    .iter()
                    .map(|(k, v)| BindingExpr::parse(v).map(|e| (k.clone(), e)))
                    .collect::<Result<Vec<_>, _>>()?;
                if parsed.iter().all(|(_, e)| e.is_literal()) {
                    Ok(BindingExpr::Literal(value.clone()))
                } else {
                    Ok(BindingExpr::Object(parsed))
                }
            }
            other => Ok(BindingExpr::Literal(other.clone())),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, BindingExpr::Literal(_))
    }

    /// Every reference appearing in this expression.
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            BindingExpr::Literal(_) => {}
            BindingExpr::Reference(reference) => out.push(reference),
            BindingExpr::Template(parts) => {
                for part in parts {
                    if let TemplatePart::Ref(reference) = part {
                        out.push(reference);
                    }
                }
            }
            BindingExpr::Object(fields) => {
                for (_, expr) in fields {
                    expr.collect_references(out);
                }
            }
            BindingExpr::Array(items) => {
                for expr in items {
                    expr.collect_references(out);
                }
            }
        }
    }

    pub fn resolve(&self, scope: &BindingScope) -> Result<Value, BindingError> {
        match self {
            BindingExpr::Literal(value) => Ok(value.clone()),
            BindingExpr::Reference(reference) => reference.resolve(scope).cloned(),
            BindingExpr::Template(parts) => {
                let mut rendered = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => rendered.push_str(text),
                        TemplatePart::Ref(reference) => match reference.resolve(scope)? {
                            Value::String(s) => rendered.push_str(s),
                            other => rendered.push_str(&other.to_string()),
                        },
                    }
                }
                Ok(Value::String(rendered))
            }
            BindingExpr::Object(fields) => {
                let mut map = Map::new();
                for (key, expr) in fields {
                    map.insert(key.clone(), expr.resolve(scope)?);
                }
                Ok(Value::Object(map))
            }
            BindingExpr::Array(items) => items
                .iter()
                .map(|expr| expr.resolve(scope))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
        }
    }
}

fn parse_template(text: &str) -> Result<BindingExpr, BindingError> {
    if !text.contains("${") {
        return Ok(BindingExpr::Literal(Value::String(text.to_string())));
    }

    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        if start > 0 {
            parts.push(TemplatePart::Text(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(BindingError::malformed(text, "unterminated '${'"));
        };
        parts.push(TemplatePart::Ref(Reference::parse(&after[..end])?));
        rest = &after[end + 1..];
    }
    if !rest.is_empty() {
        parts.push(TemplatePart::Text(rest.to_string()));
    }

    match parts.as_slice() {
        [TemplatePart::Ref(reference)] => Ok(BindingExpr::Reference(reference.clone())),
        _ => Ok(BindingExpr::Template(parts)),
    }
}

/// Parse every input of a step.
pub fn parse_inputs(inputs: &Map<String, Value>) -> Result<Vec<(String, BindingExpr)>, BindingError> {
    inputs
        .iter()
        .map(|(key, value)| BindingExpr::parse(value).map(|expr| (key.clone(), expr)))
        .collect()
}

/// Resolve every input of a step into a concrete JSON object.
pub fn resolve_inputs(
    inputs: &Map<String, Value>,
    scope: &BindingScope,
) -> Result<Map<String, Value>, BindingError> {
    let mut resolved = Map::new();
    for (key, expr) in parse_inputs(inputs)? {
        resolved.insert(key, expr.resolve(scope)?);
    }
    Ok(resolved)
}

/// Step outputs visible to one step, keyed by step id and output binding name.
#[derive(Debug, Clone, Default)]
pub struct BindingScope {
    values: HashMap<String, Value>,
}

impl BindingScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a step's output under its id and, when different, its output binding.
    pub fn bind(&mut self, step_id: &str, output_binding: Option<&str>, value: Value) {
        if let Some(name) = output_binding
            && name != step_id
        {
            self.values.insert(name.to_string(), value.clone());
        }
        self.values.insert(step_id.to_string(), value);
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope() -> BindingScope {
        let mut scope = BindingScope::new();
        scope.bind(
            "s1",
            Some("profile"),
            json!({"account_id": "A-7", "tier": 3, "tags": ["vip", "eu"]}),
        );
        scope
    }

    #[test]
    fn test_reference_parse() {
        let reference = Reference::parse("profile.tags[1]").unwrap();
        assert_eq!(reference.root, "profile");
        assert_eq!(
            reference.path,
            vec![PathSegment::Field("tags".into()), PathSegment::Index(1)]
        );
        assert_eq!(reference.to_string(), "profile.tags[1]");
        assert_eq!(reference.first_field(), Some("tags"));

        assert!(Reference::parse("").is_err());
        assert!(Reference::parse("s1.").is_err());
        assert!(Reference::parse("s1[x]").is_err());
        assert!(Reference::parse("s1[0").is_err());
    }

    #[test]
    fn test_whole_string_reference_preserves_type() {
        let expr = BindingExpr::parse(&json!("${s1.tier}")).unwrap();
        assert!(matches!(expr, BindingExpr::Reference(_)));
        assert_eq!(expr.resolve(&scope()).unwrap(), json!(3));
    }

    #[test]
    fn test_template_renders_text() {
        let expr = BindingExpr::parse(&json!("acct ${profile.account_id} tier ${s1.tier}")).unwrap();
        assert_eq!(expr.references().len(), 2);
        assert_eq!(expr.resolve(&scope()).unwrap(), json!("acct A-7 tier 3"));
    }

    #[test]
    fn test_nested_values() {
        let expr = BindingExpr::parse(&json!({"ids": ["${s1.account_id}", "fixed"], "n": 1})).unwrap();
        assert_eq!(
            expr.resolve(&scope()).unwrap(),
            json!({"ids": ["A-7", "fixed"], "n": 1})
        );

        let literal = BindingExpr::parse(&json!({"a": [1, 2], "b": "plain"})).unwrap();
        assert!(literal.is_literal());
    }

    #[test]
    fn test_resolution_errors_are_typed() {
        let unknown = BindingExpr::parse(&json!("${s9.x}")).unwrap();
        assert_eq!(
            unknown.resolve(&scope()),
            Err(BindingError::Unresolved("s9".into()))
        );

        let missing = BindingExpr::parse(&json!("${s1.tags[5]}")).unwrap();
        assert!(matches!(
            missing.resolve(&scope()),
            Err(BindingError::MissingField { .. })
        ));

        assert!(matches!(
            BindingExpr::parse(&json!("${s1.a")),
            Err(BindingError::Malformed { .. })
        ));
    }

    #[test]
    fn test_resolve_inputs() {
        let inputs = json!({"account": "${profile.account_id}", "limit": 10});
        let resolved = resolve_inputs(inputs.as_object().unwrap(), &scope()).unwrap();
        assert_eq!(resolved["account"], json!("A-7"));
        assert_eq!(resolved["limit"], json!(10));
    }
}

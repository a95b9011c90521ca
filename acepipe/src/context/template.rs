//! Named-placeholder templates.
//!
//! Syntax is the common brace format used by existing stage configurations:
//!
//! - `{name}` is replaced by the stringified value bound to `name`.
//! - `{name[field][0]}` indexes into objects by key and arrays by position.
//! - `{{` and `}}` produce literal braces.
//!
//! Format specs (`{x:>4}`) and conversions (`{x!r}`) are rejected at parse time.

use crate::errors::TemplateError;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

/// A source of values for placeholder substitution.
pub trait Scope {
    /// Resolves a root placeholder name.
    fn lookup(&self, name: &str) -> Option<Value>;
}

impl Scope for HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Scope for BTreeMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Scope for serde_json::Map<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// A single `{...}` reference inside a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Root name looked up in the scope.
    pub name: String,
    /// Index chain applied to the root value.
    pub path: Vec<String>,
    /// The text between the braces, used in error messages.
    pub raw: String,
}

impl Placeholder {
    fn resolve(&self, scope: &dyn Scope) -> Result<String, TemplateError> {
        let root = scope
            .lookup(&self.name)
            .ok_or_else(|| TemplateError::missing(&self.raw))?;

        let mut current = &root;
        for segment in &self.path {
            let next = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            current = next.ok_or_else(|| TemplateError::missing(&self.raw))?;
        }

        Ok(stringify(current))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

/// A parsed template, ready to render any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parses template text.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::Malformed` for unbalanced braces, empty
    /// placeholders, and format specs or conversions.
    pub fn parse(source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        let segments = parse_segments(&source)?;
        Ok(Self { source, segments })
    }

    /// Returns the original template text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns every placeholder, in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(p) => Some(p),
            Segment::Literal(_) => None,
        })
    }

    /// Returns the distinct root names referenced by the template.
    #[must_use]
    pub fn root_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for p in self.placeholders() {
            if !names.contains(&p.name.as_str()) {
                names.push(&p.name);
            }
        }
        names
    }

    /// Renders the template against a scope.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::MissingPlaceholder` naming the first
    /// placeholder that cannot be resolved.
    pub fn render(&self, scope: &dyn Scope) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(p) => out.push_str(&p.resolve(scope)?),
            }
        }
        Ok(out)
    }
}

/// Parses and renders a template in one step.
///
/// # Errors
///
/// Returns any parse or resolution error.
pub fn render(template: &str, scope: &dyn Scope) -> Result<String, TemplateError> {
    Template::parse(template)?.render(scope)
}

/// Converts a bound value into prompt text.
///
/// Strings are inserted verbatim, everything else as compact JSON.
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn field_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<name>[^\[\]]+)(?P<path>(?:\[[^\[\]]+\])*)$")
            .unwrap_or_else(|e| unreachable!("static placeholder pattern: {e}"))
    })
}

fn index_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\[([^\[\]]+)\]").unwrap_or_else(|e| unreachable!("static index pattern: {e}"))
    })
}

fn parse_segments(source: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = source.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' if chars.peek().map(|&(_, n)| n) == Some('{') => {
                chars.next();
                literal.push('{');
            }
            '{' => {
                let start = pos + 1;
                let mut end = None;
                for (p, n) in chars.by_ref() {
                    match n {
                        '}' => {
                            end = Some(p);
                            break;
                        }
                        '{' => return Err(TemplateError::malformed(p, "unexpected '{' inside placeholder")),
                        _ => {}
                    }
                }
                let end = end.ok_or_else(|| TemplateError::malformed(pos, "unclosed '{'"))?;
                let placeholder = parse_placeholder(&source[start..end], pos)?;
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder(placeholder));
            }
            '}' if chars.peek().map(|&(_, n)| n) == Some('}') => {
                chars.next();
                literal.push('}');
            }
            '}' => return Err(TemplateError::malformed(pos, "single '}' encountered")),
            _ => literal.push(c),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn parse_placeholder(field: &str, position: usize) -> Result<Placeholder, TemplateError> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Err(TemplateError::malformed(position, "empty placeholder"));
    }
    if trimmed.contains(':') || trimmed.contains('!') {
        return Err(TemplateError::malformed(
            position,
            format!("format specs and conversions are not supported in '{{{trimmed}}}'"),
        ));
    }

    let caps = field_pattern()
        .captures(trimmed)
        .ok_or_else(|| TemplateError::malformed(position, format!("invalid placeholder '{{{trimmed}}}'")))?;

    let name = caps.name("name").map_or("", |m| m.as_str()).to_string();
    let path = caps
        .name("path")
        .map(|m| {
            index_pattern()
                .captures_iter(m.as_str())
                .filter_map(|c| c.get(1).map(|s| s.as_str().to_string()))
                .collect()
        })
        .unwrap_or_default();

    Ok(Placeholder {
        name,
        path,
        raw: trimmed.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn scope() -> BTreeMap<String, Value> {
        let mut scope = BTreeMap::new();
        scope.insert("title_cn".to_string(), json!("春望"));
        scope.insert("1_translate_json".to_string(), json!("{\"title_en\": \"Spring View\"}"));
        scope.insert("2_b_data".to_string(), json!({"score": 7, "notes": ["a", "b"]}));
        scope.insert("count".to_string(), json!(3));
        scope
    }

    #[test]
    fn test_render_simple_placeholders() {
        let out = render("Title: {title_cn} ({count})", &scope()).unwrap();
        assert_eq!(out, "Title: 春望 (3)");
    }

    #[test]
    fn test_render_digit_leading_key() {
        let out = render("Prior: {1_translate_json}", &scope()).unwrap();
        assert_eq!(out, "Prior: {\"title_en\": \"Spring View\"}");
    }

    #[test]
    fn test_escaped_braces_are_literal() {
        let out = render("{{\n  \"title_cn\": \"{title_cn}\"\n}}", &scope()).unwrap();
        assert_eq!(out, "{\n  \"title_cn\": \"春望\"\n}");
    }

    #[test]
    fn test_indexed_lookup() {
        let s = scope();
        assert_eq!(render("{2_b_data[score]}", &s).unwrap(), "7");
        assert_eq!(render("{2_b_data[notes][1]}", &s).unwrap(), "b");
    }

    #[test]
    fn test_structured_values_render_as_json() {
        let out = render("{2_b_data}", &scope()).unwrap();
        assert_eq!(out, r#"{"notes":["a","b"],"score":7}"#);
    }

    #[test]
    fn test_missing_root_names_key() {
        let err = render("{title_cn} {absent}", &scope()).unwrap_err();
        assert_eq!(err, TemplateError::missing("absent"));
    }

    #[test]
    fn test_missing_indexed_field() {
        let err = render("{2_b_data[verdict]}", &scope()).unwrap_err();
        assert_eq!(err, TemplateError::missing("2_b_data[verdict]"));
    }

    #[test]
    fn test_malformed_templates() {
        assert!(matches!(Template::parse("{unclosed"), Err(TemplateError::Malformed { .. })));
        assert!(matches!(Template::parse("stray }"), Err(TemplateError::Malformed { .. })));
        assert!(matches!(Template::parse("{}"), Err(TemplateError::Malformed { .. })));
        assert!(matches!(Template::parse("{x:>4}"), Err(TemplateError::Malformed { .. })));
        assert!(matches!(Template::parse("{a{b}}"), Err(TemplateError::Malformed { .. })));
    }

    #[test]
    fn test_root_names_are_distinct_and_ordered() {
        let t = Template::parse("{b} {a} {b[x]} {{c}}").unwrap();
        assert_eq!(t.root_names(), vec!["b", "a"]);
        assert_eq!(t.placeholders().count(), 3);
    }

    #[test]
    fn test_template_without_placeholders() {
        let t = Template::parse("plain text").unwrap();
        assert_eq!(t.render(&BTreeMap::new()).unwrap(), "plain text");
        assert_eq!(t.source(), "plain text");
    }
}

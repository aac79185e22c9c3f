//! JSONPath evaluation over `serde_json` documents.
//!
//! Supported syntax:
//!
//! | Expression | Meaning |
//! |---|---|
//! | `$` | document root |
//! | `.name`, `['name']`, `["name"]` | object member |
//! | `[2]`, `[-1]` | array element, negative counts from the end |
//! | `.*`, `[*]`, `.[*]` | every member or element |
//! | `..name`, `..*`, `..[0]` | deep scan |
//! | `[0,2]`, `['a','b']` | union |
//! | `[1:3]`, `[::2]` | array slice |
//!
//! Filter expressions (`[?(...)]`) are not supported.

use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{MapperError, Result};

/// A parsed JSONPath expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Child(Selector),
    Descendant(Selector),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Selector {
    Names(Vec<String>),
    Indices(Vec<i64>),
    Wildcard,
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: i64,
    },
}

/// One hop from a parent value to a child.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Key(String),
    Index(usize),
}

impl JsonPath {
    pub fn parse(path: &str) -> Result<Self> {
        Parser::new(path).parse()
    }

    /// A definite path names at most one location: no wildcards, deep scans, unions or slices.
    pub fn is_definite(&self) -> bool {
        self.segments.iter().all(|segment| match segment {
            Segment::Child(Selector::Names(names)) => names.len() == 1,
            Segment::Child(Selector::Indices(indices)) => indices.len() == 1,
            _ => false,
        })
    }

    /// Every value matched by this path, in document order.
    pub fn select<'v>(&self, root: &'v Value) -> Vec<&'v Value> {
        self.evaluate(root).into_iter().map(|(_, v)| v).collect()
    }

    /// Read the value at this path.
    ///
    /// A definite path yields the matched value itself, any other path a JSON array of all
    /// matches. Matching nothing is an error.
    pub fn read(&self, root: &Value) -> Result<Value> {
        let mut matches = self.select(root);
        if matches.is_empty() {
            return Err(self.not_found("no match"));
        }
        if self.is_definite() {
            Ok(matches.swap_remove(0).clone())
        } else {
            Ok(Value::Array(matches.into_iter().cloned().collect()))
        }
    }

    /// Set `key` to `value` on every object matched by this path.
    ///
    /// Existing keys are overwritten in place, new keys are appended. Nothing is written unless
    /// the path matches at least one value and every match is an object.
    pub fn put(&self, root: &mut Value, key: &str, value: Value) -> Result<()> {
        let mut locations = vec![];
        for (steps, matched) in self.evaluate(root) {
            if !matched.is_object() {
                return Err(self.not_found("matched a value that is not an object"));
            }
            locations.push(steps);
        }
        if locations.is_empty() {
            return Err(self.not_found("no match"));
        }
        tracing::debug!(path = %self, matches = locations.len(), key, "putting value");

        // deepest first, so a write on a parent can't orphan a matched descendant
        locations.sort_by_key(|steps| Reverse(steps.len()));
        for steps in &locations {
            self.insert_at(root, steps, key, value.clone())?;
        }
        Ok(())
    }

    fn insert_at(&self, root: &mut Value, steps: &[Step], key: &str, value: Value) -> Result<()> {
        let target = steps
            .iter()
            .try_fold(root, |current, step| match step {
                Step::Key(k) => current.get_mut(k.as_str()),
                Step::Index(i) => current.get_mut(*i),
            })
            .and_then(Value::as_object_mut)
            .ok_or_else(|| self.not_found("location vanished while writing"))?;
        target.insert(key.to_string(), value);
        Ok(())
    }

    fn not_found(&self, reason: &str) -> MapperError {
        MapperError::PathNotFound(format!("`{}`: {reason}", self.source))
    }

    fn evaluate<'v>(&self, root: &'v Value) -> Vec<(Vec<Step>, &'v Value)> {
        let mut current = vec![(vec![], root)];
        for segment in &self.segments {
            let mut next = vec![];
            for (steps, value) in current {
                match segment {
                    Segment::Child(selector) => selector.apply(&steps, value, &mut next),
                    Segment::Descendant(selector) => {
                        descend(&steps, value, &mut |steps: &[Step], node: &'v Value| {
                            selector.apply(steps, node, &mut next)
                        })
                    }
                }
            }
            current = next;
        }
        current
    }
}

impl FromStr for JsonPath {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Selector {
    fn apply<'v>(&self, steps: &[Step], value: &'v Value, out: &mut Vec<(Vec<Step>, &'v Value)>) {
        let child = |step: Step| {
            let mut steps = steps.to_vec();
            steps.push(step);
            steps
        };

        match (self, value) {
            (Selector::Names(names), Value::Object(map)) => {
                for name in names {
                    if let Some(v) = map.get(name) {
                        out.push((child(Step::Key(name.clone())), v));
                    }
                }
            }
            (Selector::Indices(indices), Value::Array(items)) => {
                for &index in indices {
                    if let Some(i) = normalize_index(index, items.len()) {
                        out.push((child(Step::Index(i)), &items[i]));
                    }
                }
            }
            (Selector::Wildcard, Value::Object(map)) => {
                for (k, v) in map {
                    out.push((child(Step::Key(k.clone())), v));
                }
            }
            (Selector::Wildcard, Value::Array(items)) => {
                for (i, v) in items.iter().enumerate() {
                    out.push((child(Step::Index(i)), v));
                }
            }
            (Selector::Slice { start, end, step }, Value::Array(items)) => {
                for i in slice_indices(*start, *end, *step, items.len()) {
                    out.push((child(Step::Index(i)), &items[i]));
                }
            }
            _ => {}
        }
    }
}

/// Visit `value` and all of its descendants, parents before children.
fn descend<'v, F>(steps: &[Step], value: &'v Value, visit: &mut F)
where
    F: FnMut(&[Step], &'v Value),
{
    visit(steps, value);
    let mut child_steps = steps.to_vec();
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                child_steps.push(Step::Key(k.clone()));
                descend(&child_steps, v, visit);
                child_steps.pop();
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                child_steps.push(Step::Index(i));
                descend(&child_steps, v, visit);
                child_steps.pop();
            }
        }
        _ => {}
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { len + index } else { index };
    (0..len).contains(&i).then_some(i as usize)
}

fn slice_indices(start: Option<i64>, end: Option<i64>, step: i64, len: usize) -> Vec<usize> {
    let len = len as i64;
    let clamp = |i: i64, lo: i64, hi: i64| {
        let i = if i < 0 { len + i } else { i };
        i.clamp(lo, hi)
    };

    let mut out = vec![];
    if step > 0 {
        let mut i = start.map_or(0, |s| clamp(s, 0, len));
        let stop = end.map_or(len, |e| clamp(e, 0, len));
        while i < stop {
            out.push(i as usize);
            i = match i.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
    } else {
        let mut i = start.map_or(len - 1, |s| clamp(s, -1, len - 1));
        let stop = end.map_or(-1, |e| clamp(e, -1, len - 1));
        while i > stop {
            out.push(i as usize);
            i = match i.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
    }
    out
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.trim().chars().collect(),
            pos: 0,
        }
    }

    fn parse(mut self) -> Result<JsonPath> {
        if self.peek() != Some('$') {
            return Err(self.error("must start with `$`"));
        }
        self.pos += 1;

        let mut segments = vec![];
        while let Some(c) = self.peek() {
            let segment = match c {
                '.' if self.peek_at(1) == Some('.') => {
                    self.pos += 2;
                    Segment::Descendant(self.dotted_selector()?)
                }
                '.' => {
                    self.pos += 1;
                    Segment::Child(self.dotted_selector()?)
                }
                '[' => Segment::Child(self.bracket_selector()?),
                other => return Err(self.error(format!("unexpected `{other}`"))),
            };
            segments.push(segment);
        }

        Ok(JsonPath {
            source: self.source.to_string(),
            segments,
        })
    }

    /// Selector after one or two dots: a name, `*`, or a bracket expression.
    fn dotted_selector(&mut self) -> Result<Selector> {
        match self.peek() {
            Some('[') => self.bracket_selector(),
            Some('*') => {
                self.pos += 1;
                Ok(Selector::Wildcard)
            }
            _ => {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c == '.' || c == '[' {
                        break;
                    }
                    self.pos += 1;
                }
                if start == self.pos {
                    return Err(self.error("empty member name"));
                }
                let name: String = self.chars[start..self.pos].iter().collect();
                Ok(Selector::Names(vec![name]))
            }
        }
    }

    fn bracket_selector(&mut self) -> Result<Selector> {
        // skip '['
        self.pos += 1;
        self.skip_whitespace();

        let selector = match self.peek() {
            Some('*') => {
                self.pos += 1;
                Selector::Wildcard
            }
            Some('?') | Some('(') => {
                return Err(self.error("filter and script expressions are not supported"));
            }
            Some('\'') | Some('"') => {
                let mut names = vec![self.quoted()?];
                self.skip_whitespace();
                while self.peek() == Some(',') {
                    self.pos += 1;
                    self.skip_whitespace();
                    names.push(self.quoted()?);
                    self.skip_whitespace();
                }
                Selector::Names(names)
            }
            _ => {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c == ']' {
                        break;
                    }
                    self.pos += 1;
                }
                let body: String = self.chars[start..self.pos].iter().collect();
                self.numeric_selector(&body)?
            }
        };

        self.skip_whitespace();
        if self.peek() != Some(']') {
            return Err(self.error("expected `]`"));
        }
        self.pos += 1;
        Ok(selector)
    }

    fn numeric_selector(&self, body: &str) -> Result<Selector> {
        if body.contains(':') {
            let parts: Vec<&str> = body.split(':').map(str::trim).collect();
            if parts.len() > 3 {
                return Err(self.error(format!("invalid slice `{body}`")));
            }
            let bound = |i: usize| -> Result<Option<i64>> {
                match parts.get(i) {
                    None | Some(&"") => Ok(None),
                    Some(s) => s
                        .parse()
                        .map(Some)
                        .map_err(|_| self.error(format!("invalid slice `{body}`"))),
                }
            };
            let step = bound(2)?.unwrap_or(1);
            if step == 0 {
                return Err(self.error("slice step cannot be zero"));
            }
            return Ok(Selector::Slice {
                start: bound(0)?,
                end: bound(1)?,
                step,
            });
        }

        let indices = body
            .split(',')
            .map(|s| {
                s.trim()
                    .parse::<i64>()
                    .map_err(|_| self.error(format!("invalid index `{}`", s.trim())))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Selector::Indices(indices))
    }

    fn quoted(&mut self) -> Result<String> {
        let Some(quote) = self.peek().filter(|c| *c == '\'' || *c == '"') else {
            return Err(self.error("expected a quoted name"));
        };
        self.pos += 1;

        let mut name = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated quoted name")),
                Some('\\') => {
                    let escaped = self
                        .peek_at(1)
                        .ok_or_else(|| self.error("unterminated quoted name"))?;
                    name.push(escaped);
                    self.pos += 2;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(name);
                }
                Some(c) => {
                    name.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn error(&self, reason: impl Into<String>) -> MapperError {
        MapperError::invalid_path(self.source, reason)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc() -> Value {
        json!({
            "greeting": "hello",
            "test": ["world"],
            "store": {
                "book": [
                    {"title": "a", "price": 8},
                    {"title": "b", "price": 12},
                    {"title": "c", "price": 9}
                ],
                "bicycle": {"price": 20}
            },
            "odd key": 1
        })
    }

    fn read(path: &str) -> Result<Value> {
        JsonPath::parse(path)?.read(&doc())
    }

    #[test]
    fn test_definite_reads() {
        assert_eq!(read("$").unwrap(), doc());
        assert_eq!(read("$.test").unwrap(), json!(["world"]));
        assert_eq!(read("$.greeting").unwrap(), json!("hello"));
        assert_eq!(read("$.store.book[1].title").unwrap(), json!("b"));
        assert_eq!(read("$['store']['bicycle'].price").unwrap(), json!(20));
        assert_eq!(read("$.store.book[-1].title").unwrap(), json!("c"));
        assert_eq!(read("$[\"odd key\"]").unwrap(), json!(1));
    }

    #[test]
    fn test_indefinite_reads() {
        assert_eq!(read("$.test.[*]").unwrap(), json!(["world"]));
        assert_eq!(read("$.test[*]").unwrap(), json!(["world"]));
        assert_eq!(read("$.store.book[*].title").unwrap(), json!(["a", "b", "c"]));
        assert_eq!(read("$..price").unwrap(), json!([8, 12, 9, 20]));
        assert_eq!(read("$.store.book[0,2].price").unwrap(), json!([8, 9]));
        assert_eq!(read("$.store.book[1:].title").unwrap(), json!(["b", "c"]));
        assert_eq!(read("$.store.book[::-1].title").unwrap(), json!(["c", "b", "a"]));
        assert_eq!(read("$.store.*.price").unwrap(), json!([20]));
        assert_eq!(read("$['greeting','test']").unwrap(), json!(["hello", ["world"]]));
    }

    #[test]
    fn test_single_wildcard_match_is_array() {
        // one wildcard match still comes back as an array
        assert_eq!(read("$.store.bicycle.*").unwrap(), json!([20]));
    }

    #[test]
    fn test_missing_paths() {
        for path in ["$.missing", "$.test[3]", "$.greeting.inner", "$..nothing", "$.test[5:]"] {
            let err = read(path).unwrap_err();
            assert!(matches!(err, MapperError::PathNotFound(_)), "{path}");
        }
    }

    #[test]
    fn test_invalid_paths() {
        for path in ["test", "$.", "$[?(@.price < 10)]", "$[1", "$['a", "$[a]", "$[::0]"] {
            let err = JsonPath::parse(path).unwrap_err();
            assert!(matches!(err, MapperError::InvalidPath { .. }), "{path}");
        }
    }

    #[test]
    fn test_is_definite() {
        assert!(JsonPath::parse("$").unwrap().is_definite());
        assert!(JsonPath::parse("$.a[0]['b']").unwrap().is_definite());
        assert!(!JsonPath::parse("$.a[*]").unwrap().is_definite());
        assert!(!JsonPath::parse("$..a").unwrap().is_definite());
        assert!(!JsonPath::parse("$[0,1]").unwrap().is_definite());
    }

    #[test]
    fn test_put_on_root_appends_key() {
        let mut value = json!({"greeting": "hello", "test": ["world"]});
        JsonPath::parse("$")
            .unwrap()
            .put(&mut value, "testkey", json!(["bla"]))
            .unwrap();
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"greeting":"hello","test":["world"],"testkey":["bla"]}"#
        );
    }

    #[test]
    fn test_put_overwrites_in_place() {
        let mut value = json!({"a": 1, "b": 2, "c": 3});
        JsonPath::parse("$")
            .unwrap()
            .put(&mut value, "b", json!("x"))
            .unwrap();
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"a":1,"b":"x","c":3}"#);
    }

    #[test]
    fn test_put_on_every_match() {
        let mut value = doc();
        JsonPath::parse("$.store.book[*]")
            .unwrap()
            .put(&mut value, "seen", json!(true))
            .unwrap();
        assert_eq!(
            JsonPath::parse("$..seen").unwrap().read(&value).unwrap(),
            json!([true, true, true])
        );
    }

    #[test]
    fn test_slice_with_huge_step() {
        let value = json!({"test": ["a", "b", "c"]});
        let path = JsonPath::parse("$.test[1::9223372036854775807]").unwrap();
        assert_eq!(path.read(&value).unwrap(), json!(["b"]));

        let path = JsonPath::parse("$.test[::-9223372036854775808]").unwrap();
        assert_eq!(path.read(&value).unwrap(), json!(["c"]));
    }

    #[test]
    fn test_put_on_nested_matches_sharing_the_key() {
        let mut value = json!({"a": {"b": {}}});
        JsonPath::parse("$..*")
            .unwrap()
            .put(&mut value, "b", json!(1))
            .unwrap();
        assert_eq!(value, json!({"a": {"b": 1}}));
    }

    #[test]
    fn test_put_requires_objects() {
        let mut value = doc();
        let err = JsonPath::parse("$.test")
            .unwrap()
            .put(&mut value, "k", json!(1))
            .unwrap_err();
        assert!(matches!(err, MapperError::PathNotFound(_)));

        // mixed matches leave the document untouched
        let err = JsonPath::parse("$.store.*")
            .unwrap()
            .put(&mut value, "k", json!(1))
            .unwrap_err();
        assert!(matches!(err, MapperError::PathNotFound(_)));
        assert_eq!(value, doc());

        let err = JsonPath::parse("$.nope")
            .unwrap()
            .put(&mut value, "k", json!(1))
            .unwrap_err();
        assert!(matches!(err, MapperError::PathNotFound(_)));
    }
}

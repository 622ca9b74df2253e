//! Minimal HTML tag rendering
//!
//! Helpers build `Tag` values so callers can inspect attributes and data
//! decorations before rendering them into whatever template engine they use.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};
use tracing::warn;

/// A void HTML element (`<input>`, `<img>`) with attributes and `data-*` entries
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    name: &'static str,
    attributes: BTreeMap<String, String>,
    data: Map<String, Value>,
}

impl Tag {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            attributes: BTreeMap::new(),
            data: Map::new(),
        }
    }

    /// `<input type="...">`
    pub fn input(input_type: &str) -> Self {
        Self::new("input").with_attr("type", input_type)
    }

    /// `<img src="...">`
    pub fn img(src: impl Into<String>) -> Self {
        Self::new("img").with_attr("src", src)
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Builder pattern: set an attribute
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn data_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn set_data(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Merge entries into the data attributes; later entries win
    pub fn merge_data<'a, I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        for (key, value) in entries {
            self.data.insert(key.clone(), value.clone());
        }
    }

    pub fn render(&self) -> String {
        let mut html = format!("<{}", self.name);

        for (key, value) in &self.attributes {
            if !is_valid_name(key) {
                warn!(tag = self.name, attribute = %key, "Skipping attribute with unsafe name");
                continue;
            }
            html.push_str(&format!(" {}=\"{}\"", key, escape(value)));
        }

        for (key, value) in &self.data {
            if !is_valid_name(key) {
                warn!(tag = self.name, data = %key, "Skipping data entry with unsafe name");
                continue;
            }
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            html.push_str(&format!(
                " data-{}=\"{}\"",
                key.replace('_', "-"),
                escape(&rendered)
            ));
        }

        html.push('>');
        html
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Attribute and `data-*` names are limited to `[A-Za-z0-9_:-]`
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '-'))
}

/// Escape a value for use inside a double-quoted attribute
fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

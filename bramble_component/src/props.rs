// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed component properties and their attribute form.
//!
//! Every property has a kind that fixes how it is written to and read back from an
//! attribute:
//!
//! | Kind | Attribute | Parsed back |
//! |---|---|---|
//! | `String` | the string | the string |
//! | `Number` | shortest decimal | `f64`, default if unparsable |
//! | `Boolean` | present (`""`) or absent | `true` unless absent or `"false"` |
//! | `Array`, `Object` | JSON | JSON, default if unparsable or the wrong shape |

use core::fmt;

use serde_json::Value;

/// The value kind of a property.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropKind {
    /// Free text.
    String,
    /// A finite or non-finite `f64`.
    Number,
    /// A flag; reflected as attribute presence.
    Boolean,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
}

impl fmt::Display for PropKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        })
    }
}

/// A property value.
#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    /// A string.
    String(String),
    /// A number.
    Number(f64),
    /// A boolean.
    Boolean(bool),
    /// An array or object.
    Json(Value),
}

impl PropValue {
    /// The string, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The number, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The flag, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The JSON value, if this is an array or object.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Whether this value can be stored in a property of `kind`.
    pub fn fits(&self, kind: PropKind) -> bool {
        match (self, kind) {
            (Self::String(_), PropKind::String)
            | (Self::Number(_), PropKind::Number)
            | (Self::Boolean(_), PropKind::Boolean)
            | (Self::Json(Value::Array(_)), PropKind::Array)
            | (Self::Json(Value::Object(_)), PropKind::Object) => true,
            _ => false,
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<Value> for PropValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Declaration of one property.
///
/// ```
/// use bramble_component::{PropDefinition, PropKind, PropValue};
///
/// let prop = PropDefinition::number("openDelay").with_default(150.0);
/// assert_eq!(prop.attribute_name(), "open-delay");
/// assert_eq!(prop.kind(), PropKind::Number);
/// assert_eq!(prop.parse(Some("oops")), PropValue::Number(150.0));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct PropDefinition {
    name: String,
    kind: PropKind,
    default: PropValue,
    reflect: bool,
    attribute: Option<String>,
}

impl PropDefinition {
    /// A property of `kind` with that kind's empty default, reflected to an attribute.
    pub fn new(name: impl Into<String>, kind: PropKind) -> Self {
        let default = match kind {
            PropKind::String => PropValue::String(String::new()),
            PropKind::Number => PropValue::Number(0.0),
            PropKind::Boolean => PropValue::Boolean(false),
            PropKind::Array => PropValue::Json(Value::Array(Vec::new())),
            PropKind::Object => PropValue::Json(Value::Object(serde_json::Map::new())),
        };
        Self {
            name: name.into(),
            kind,
            default,
            reflect: true,
            attribute: None,
        }
    }

    /// A string property.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, PropKind::String)
    }

    /// A number property.
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, PropKind::Number)
    }

    /// A boolean property.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, PropKind::Boolean)
    }

    /// An array property.
    pub fn array(name: impl Into<String>) -> Self {
        Self::new(name, PropKind::Array)
    }

    /// An object property.
    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, PropKind::Object)
    }

    /// Set the default. A value of the wrong kind is ignored with a warning.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<PropValue>) -> Self {
        let value = value.into();
        if value.fits(self.kind) {
            self.default = value;
        } else {
            tracing::warn!(prop = %self.name, kind = %self.kind, "default of the wrong kind ignored");
        }
        self
    }

    /// Keep the value in element storage instead of an attribute.
    #[must_use]
    pub fn without_reflection(mut self) -> Self {
        self.reflect = false;
        self
    }

    /// Use an explicit attribute name instead of the kebab-cased property name.
    #[must_use]
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// The property name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value kind.
    pub fn kind(&self) -> PropKind {
        self.kind
    }

    /// The default value.
    pub fn default_value(&self) -> &PropValue {
        &self.default
    }

    /// Whether the value lives in an attribute.
    pub fn reflects(&self) -> bool {
        self.reflect
    }

    /// The attribute this property reads from and, when reflecting, writes to.
    pub fn attribute_name(&self) -> String {
        self.attribute
            .clone()
            .unwrap_or_else(|| kebab_case(&self.name))
    }

    /// Parse an attribute value (or its absence) into this property's kind.
    pub fn parse(&self, raw: Option<&str>) -> PropValue {
        parse_attribute(raw, self.kind, &self.default)
    }

    /// The attribute form of `value`; `None` means the attribute is removed.
    pub fn serialize(&self, value: &PropValue) -> Option<String> {
        serialize_value(value)
    }
}

/// `openDelay` → `open-delay`.
///
/// ```
/// use bramble_component::kebab_case;
///
/// assert_eq!(kebab_case("closeOnSelect"), "close-on-select");
/// assert_eq!(kebab_case("value"), "value");
/// ```
pub fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Parse an attribute value by kind, falling back to `default` where the text does not parse.
pub fn parse_attribute(raw: Option<&str>, kind: PropKind, default: &PropValue) -> PropValue {
    match kind {
        PropKind::Boolean => PropValue::Boolean(raw.is_some_and(|v| v != "false")),
        PropKind::String => raw.map_or_else(|| default.clone(), PropValue::from),
        PropKind::Number => raw
            .and_then(|v| v.trim().parse::<f64>().ok())
            .map_or_else(|| default.clone(), PropValue::Number),
        PropKind::Array | PropKind::Object => raw
            .and_then(|v| serde_json::from_str::<Value>(v).ok())
            .map(PropValue::Json)
            .filter(|v| v.fits(kind))
            .unwrap_or_else(|| default.clone()),
    }
}

/// Serialize a value for its attribute. `Boolean(false)` serializes to `None` (absent).
pub fn serialize_value(value: &PropValue) -> Option<String> {
    match value {
        PropValue::Boolean(true) => Some(String::new()),
        PropValue::Boolean(false) => None,
        PropValue::String(s) => Some(s.clone()),
        PropValue::Number(n) => Some(format_number(*n)),
        PropValue::Json(v) => Some(v.to_string()),
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else {
        // Shortest round-tripping form; integral values print without `.0`.
        format!("{n}")
    }
}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::name::Name;
use crate::path::Path;

/// A single property value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    String(String),
    Long(i64),
    Double(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    Binary(Vec<u8>),
    Uuid(Uuid),
    Name(Name),
    Path(Path),
}

impl Value {
    /// The string content for textual values, used by full-text matching.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Name(n) => Some(n.as_str()),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s:?}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Date(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Binary(v) => write!(f, "<{} bytes>", v.len()),
            Value::Uuid(v) => write!(f, "{v}"),
            Value::Name(v) => write!(f, "{v}"),
            Value::Path(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Uuid(value)
    }
}

/// A named, ordered list of values attached to a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Property {
    name: Name,
    values: Vec<Value>,
}

impl Property {
    pub fn new(name: Name, values: Vec<Value>) -> Self {
        Self { name, values }
    }

    /// A property holding exactly one value.
    pub fn single(name: Name, value: impl Into<Value>) -> Self {
        Self {
            name,
            values: vec![value.into()],
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn first_value(&self) -> Option<&Value> {
        self.values.first()
    }

    pub fn is_single(&self) -> bool {
        self.values.len() == 1
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = [", self.name)?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    #[test]
    fn single_property() {
        let p = Property::single(name("title"), "Hello");
        assert!(p.is_single());
        assert_eq!(p.first_value(), Some(&Value::String("Hello".into())));
    }

    #[test]
    fn display_lists_values() {
        let p = Property::new(name("n"), vec![Value::Long(1), Value::Boolean(true)]);
        assert_eq!(p.to_string(), "n = [1, true]");
    }

    #[test]
    fn value_text_projection() {
        assert_eq!(Value::from("abc").as_text(), Some("abc"));
        assert_eq!(Value::Long(3).as_text(), None);
    }

    #[test]
    fn serde_tagged_form() {
        let json = serde_json::to_string(&Value::Long(7)).unwrap();
        assert_eq!(json, r#"{"type":"long","value":7}"#);
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Value::Long(7));
    }
}

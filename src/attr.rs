use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

/// Free-form attribute payload attached to a log message.
pub type Data = BTreeMap<String, JsonValue>;

/// A single key/value attribute carried by an event or a derived handler.
#[derive(Debug, Clone)]
pub struct Attr {
    pub key: String,
    pub value: Value,
}

/// Attribute value.
#[derive(Clone)]
pub enum Value {
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    /// Merged as the error's `Display` text.
    Error(Arc<dyn Error + Send + Sync>),
    /// Arbitrary, possibly nested, JSON value.
    Json(JsonValue),
    /// Named group of attributes, merged as a nested object.
    Group(Vec<Attr>),
}

impl Attr {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Attr {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn group(key: impl Into<String>, attrs: Vec<Attr>) -> Self {
        Attr {
            key: key.into(),
            value: Value::Group(attrs),
        }
    }

    pub fn error(key: impl Into<String>, err: impl Error + Send + Sync + 'static) -> Self {
        Attr {
            key: key.into(),
            value: Value::Error(Arc::new(err)),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v:?}"),
            Value::I64(v) => write!(f, "{v:?}"),
            Value::U64(v) => write!(f, "{v:?}"),
            Value::F64(v) => write!(f, "{v:?}"),
            Value::Str(v) => write!(f, "{v:?}"),
            Value::Error(e) => write!(f, "Error({e})"),
            Value::Json(v) => write!(f, "{v}"),
            Value::Group(attrs) => f.debug_list().entries(attrs).finish(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I64(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U64(u64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        Value::Json(v)
    }
}

impl Value {
    fn to_json(&self) -> JsonValue {
        match self {
            Value::Bool(v) => JsonValue::from(*v),
            Value::I64(v) => JsonValue::from(*v),
            Value::U64(v) => JsonValue::from(*v),
            // Non-finite floats have no JSON form and become null.
            Value::F64(v) => JsonValue::from(*v),
            Value::Str(v) => JsonValue::String(v.clone()),
            Value::Error(e) => JsonValue::String(e.to_string()),
            Value::Json(v) => v.clone(),
            Value::Group(attrs) => {
                let mut nested = Data::new();
                merge_attrs(&mut nested, attrs);
                JsonValue::Object(nested.into_iter().collect())
            }
        }
    }
}

/// Merge `attrs` into `data`, later keys overriding earlier ones.
///
/// Groups become nested objects keyed by the group name and are merged
/// into an existing object at that key. Empty groups are skipped and a
/// group with an empty key is inlined into the current level.
pub fn merge_attrs(data: &mut Data, attrs: &[Attr]) {
    for attr in attrs {
        merge_attr(data, attr);
    }
}

fn merge_attr(data: &mut Data, attr: &Attr) {
    match &attr.value {
        Value::Group(children) if children.is_empty() => {}
        Value::Group(children) if attr.key.is_empty() => merge_attrs(data, children),
        Value::Group(children) => {
            let mut nested = match data.remove(&attr.key) {
                Some(JsonValue::Object(existing)) => existing.into_iter().collect(),
                _ => Data::new(),
            };
            merge_attrs(&mut nested, children);
            data.insert(
                attr.key.clone(),
                JsonValue::Object(nested.into_iter().collect()),
            );
        }
        value => {
            data.insert(attr.key.clone(), value.to_json());
        }
    }
}

/// Merge `attrs` into the object found by following `path` from `data`,
/// creating (or replacing non-object values with) empty objects on the way.
pub fn merge_attrs_at(data: &mut Data, path: &[String], attrs: &[Attr]) {
    if attrs.is_empty() {
        return;
    }
    match path.split_first() {
        None => merge_attrs(data, attrs),
        Some((head, rest)) => {
            let mut nested = match data.remove(head) {
                Some(JsonValue::Object(existing)) => existing.into_iter().collect(),
                _ => Data::new(),
            };
            merge_attrs_at(&mut nested, rest, attrs);
            data.insert(head.clone(), JsonValue::Object(nested.into_iter().collect()));
        }
    }
}

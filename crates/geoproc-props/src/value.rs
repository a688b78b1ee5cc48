//! Property value types

use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::error::{PropertyError, PropertyResult};

/// Declared type of a property, used to convert command text into a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PropertyType {
    /// String value
    #[default]
    Str,
    /// 64-bit integer
    Int,
    /// 64-bit float
    Float,
    /// Boolean value
    Bool,
    /// Comma-separated list of strings
    List,
}

impl PropertyType {
    /// Name used in command files
    pub fn name(&self) -> &'static str {
        match self {
            PropertyType::Str => "str",
            PropertyType::Int => "int",
            PropertyType::Float => "float",
            PropertyType::Bool => "bool",
            PropertyType::List => "list",
        }
    }

    /// Convert text to a value of this type
    pub fn parse_value(&self, text: &str) -> PropertyResult<PropertyValue> {
        let trimmed = text.trim();
        match self {
            PropertyType::Str => Ok(PropertyValue::String(text.to_string())),
            PropertyType::Int => trimmed
                .parse::<i64>()
                .map(PropertyValue::Int)
                .map_err(|_| PropertyError::invalid_value("int", text)),
            PropertyType::Float => trimmed
                .parse::<f64>()
                .map(PropertyValue::Float)
                .map_err(|_| PropertyError::invalid_value("float", text)),
            PropertyType::Bool => parse_bool(trimmed)
                .map(PropertyValue::Bool)
                .ok_or_else(|| PropertyError::invalid_value("bool", text)),
            PropertyType::List => Ok(PropertyValue::List(
                split_list(text)
                    .into_iter()
                    .map(PropertyValue::String)
                    .collect(),
            )),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PropertyType {
    type Err = PropertyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "str" | "string" => Ok(PropertyType::Str),
            "int" | "integer" => Ok(PropertyType::Int),
            "float" | "double" => Ok(PropertyType::Float),
            "bool" | "boolean" => Ok(PropertyType::Bool),
            "list" => Ok(PropertyType::List),
            _ => Err(PropertyError::UnknownType(s.to_string())),
        }
    }
}

/// Parse a boolean keyword (true/false, yes/no, on/off, 1/0)
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Split comma-separated text into trimmed, non-empty items
pub fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Opaque reference to an object held in a property
///
/// Equality is identity: two references are equal only if they point at the
/// same allocation.
#[derive(Clone)]
pub struct ObjectRef {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl ObjectRef {
    /// Wrap a value
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            inner: Arc::new(value),
        }
    }

    /// Name of the wrapped type
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrow the wrapped value if it has type `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("type_name", &self.type_name)
            .finish()
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.type_name.rsplit("::").next().unwrap_or(self.type_name);
        write!(f, "<object:{}>", short)
    }
}

fn serialize_object_ref<S: Serializer>(obj: &ObjectRef, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&obj.to_string())
}

/// A property value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// String value
    String(String),
    /// Integer value
    Int(i64),
    /// Floating-point value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// List of values
    List(Vec<PropertyValue>),
    /// Opaque object reference
    #[serde(serialize_with = "serialize_object_ref")]
    Object(ObjectRef),
}

impl PropertyValue {
    /// Name of this value's type
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "str",
            PropertyValue::Int(_) => "int",
            PropertyValue::Float(_) => "float",
            PropertyValue::Bool(_) => "bool",
            PropertyValue::List(_) => "list",
            PropertyValue::Object(_) => "object",
        }
    }

    /// Try to get as a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            PropertyValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            PropertyValue::Bool(b) => Some(i64::from(*b)),
            PropertyValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Try to get as a float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(f) => Some(*f),
            PropertyValue::Int(i) => Some(*i as f64),
            PropertyValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Try to get as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            PropertyValue::Int(i) => Some(*i != 0),
            PropertyValue::String(s) => parse_bool(s),
            _ => None,
        }
    }

    /// Try to get as a list
    pub fn as_list(&self) -> Option<&[PropertyValue]> {
        match self {
            PropertyValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Try to get as an object reference
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            PropertyValue::Object(o) => Some(o),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) => write!(f, "{}", s),
            PropertyValue::Int(i) => write!(f, "{}", i),
            PropertyValue::Float(n) => write!(f, "{}", n),
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            PropertyValue::Object(o) => write!(f, "{}", o),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Int(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(items: Vec<PropertyValue>) -> Self {
        PropertyValue::List(items)
    }
}

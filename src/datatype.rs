// used to print out readable forms of a value
use std::fmt;

use serde::ser::{Serialize, SerializeSeq, Serializer};
use serde_json::Value as Json;

use crate::instance::Snapshot;

// ------------- ScalarType -------------
/// The closed set of non-reference SOFT7 property types.
///
/// These are the leaf types a property value may carry once every `shape`
/// level has been peeled off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Float,
    Int,
    Complex,
    Dict,
    Boolean,
    Bytes,
    ByteArray,
}

impl ScalarType {
    /// The name used for this type in entity documents.
    pub fn soft_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Float => "float",
            Self::Int => "int",
            Self::Complex => "complex",
            Self::Dict => "dict",
            Self::Boolean => "boolean",
            Self::Bytes => "bytes",
            Self::ByteArray => "bytearray",
        }
    }

    /// Look up a type from its document name. `str` is accepted as an alias
    /// for `string`.
    pub fn from_soft_name(name: &str) -> Option<Self> {
        match name {
            "string" | "str" => Some(Self::String),
            "float" => Some(Self::Float),
            "int" => Some(Self::Int),
            "complex" => Some(Self::Complex),
            "dict" => Some(Self::Dict),
            "boolean" => Some(Self::Boolean),
            "bytes" => Some(Self::Bytes),
            "bytearray" => Some(Self::ByteArray),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.soft_name())
    }
}

// ------------- Complex -------------
/// A complex number, serialized as a two-element `[re, im]` sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Serialize for Complex {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(&self.re)?;
        seq.serialize_element(&self.im)?;
        seq.end()
    }
}

// ------------- Value -------------
/// A resolved, shape-validated property value.
///
/// `Sequence` levels correspond one-to-one to the property's `shape` entries,
/// outermost first. `Model` carries the snapshot of a nested entity-typed
/// (`ref`) property. `Null` marks a property that was legitimately absent
/// from a mapping and therefore skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Float(f64),
    Int(i64),
    Complex(Complex),
    Boolean(bool),
    Bytes(Vec<u8>),
    Dict(serde_json::Map<String, Json>),
    Sequence(Vec<Value>),
    Model(Box<Snapshot>),
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::String(v) => serializer.serialize_str(v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Complex(v) => v.serialize(serializer),
            Self::Boolean(v) => serializer.serialize_bool(*v),
            Self::Bytes(v) => {
                let mut seq = serializer.serialize_seq(Some(v.len()))?;
                for byte in v {
                    seq.serialize_element(byte)?;
                }
                seq.end()
            }
            Self::Dict(v) => v.serialize(serializer),
            Self::Sequence(v) => v.serialize(serializer),
            Self::Model(v) => v.serialize(serializer),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(text) => write!(f, "{}", text),
            Err(_) => write!(f, "?"),
        }
    }
}

// ------------- Coercion -------------
/// Coerce a raw datum into a scalar of the declared type.
///
/// The error value is a bare reason; callers wrap it into an attribute-level
/// error naming the failing field.
pub fn coerce_scalar(raw: &Json, scalar: ScalarType) -> std::result::Result<Value, String> {
    match scalar {
        ScalarType::String => match raw {
            Json::String(v) => Ok(Value::String(v.clone())),
            other => Err(mismatch("a string", other)),
        },
        ScalarType::Float => match raw.as_f64() {
            Some(v) => Ok(Value::Float(v)),
            None => Err(mismatch("a number", raw)),
        },
        ScalarType::Int => match raw.as_i64() {
            Some(v) => Ok(Value::Int(v)),
            None => Err(mismatch("an integer", raw)),
        },
        ScalarType::Boolean => match raw {
            Json::Bool(v) => Ok(Value::Boolean(*v)),
            other => Err(mismatch("a boolean", other)),
        },
        ScalarType::Dict => match raw {
            Json::Object(map) => Ok(Value::Dict(map.clone())),
            other => Err(mismatch("a mapping", other)),
        },
        ScalarType::Complex => coerce_complex(raw),
        ScalarType::Bytes | ScalarType::ByteArray => coerce_bytes(raw),
    }
}

/// A complex datum is either a `[re, im]` pair of numbers or a mapping with
/// `re` and `im` entries.
fn coerce_complex(raw: &Json) -> std::result::Result<Value, String> {
    if let Json::Array(items) = raw {
        if let [re, im] = items.as_slice() {
            if let (Some(re), Some(im)) = (re.as_f64(), im.as_f64()) {
                return Ok(Value::Complex(Complex { re, im }));
            }
        }
        return Err(mismatch("a [re, im] pair of numbers", raw));
    }
    if let Json::Object(map) = raw {
        if let (Some(re), Some(im)) = (
            map.get("re").and_then(Json::as_f64),
            map.get("im").and_then(Json::as_f64),
        ) {
            return Ok(Value::Complex(Complex { re, im }));
        }
    }
    Err(mismatch("a complex number", raw))
}

/// Byte data arrives either as a UTF-8 string or as a sequence of integers in
/// the 0..=255 range.
fn coerce_bytes(raw: &Json) -> std::result::Result<Value, String> {
    match raw {
        Json::String(text) => Ok(Value::Bytes(text.clone().into_bytes())),
        Json::Array(items) => {
            let mut bytes = Vec::with_capacity(items.len());
            for item in items {
                match item.as_u64() {
                    Some(byte) if byte <= u8::MAX as u64 => bytes.push(byte as u8),
                    _ => return Err(mismatch("a sequence of bytes (integers 0..=255)", raw)),
                }
            }
            Ok(Value::Bytes(bytes))
        }
        other => Err(mismatch("a string or sequence of bytes", other)),
    }
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "a sequence",
        Json::Object(_) => "a mapping",
    }
}

fn mismatch(expected: &str, got: &Json) -> String {
    format!("expected {}, got {}", expected, json_kind(got))
}

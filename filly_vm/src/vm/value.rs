//! Value - the runtime value type for the FILLY VM.
//!
//! This module contains:
//! - `Value`: the tagged union representing all FILLY values at runtime
//! - `ValueKind`: a simplified type tag for Value variants
//! - `HostObject`: an opaque host-supplied value compared by identity
//!
//! Coercion between kinds is explicit: the interpreter calls `coerce_i64`,
//! `coerce_f64`, `to_text`, or `truthy` at operator and builtin boundaries.
//! Nothing converts ambiently.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::array::ArrayRef;

/// An opaque value owned by the host (a picture, a window, a sprite, ...).
///
/// The core never inspects the payload; equality is identity of the
/// underlying allocation. Hosts downcast with [`HostObject::downcast`].
#[derive(Clone)]
pub struct HostObject(Arc<dyn Any + Send + Sync>);

impl HostObject {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Identity comparison: two handles are equal iff they share the
    /// same underlying allocation.
    pub fn same_identity(&self, other: &HostObject) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostObject({:p})", Arc::as_ptr(&self.0))
    }
}

impl PartialEq for HostObject {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity(other)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => std::sync::Arc::ptr_eq(a, b),
            (Value::Host(a), Value::Host(b)) => a == b,
            (Value::Nothing, Value::Nothing) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    /// 64-bit signed integer. Arithmetic wraps on overflow.
    I64(i64),
    /// IEEE-754 binary64 floating point.
    F64(f64),
    /// Immutable Unicode text.
    Str(String),
    /// Shared handle to an array. The only reference-semantic variant:
    /// assignment and argument passing share the container.
    Array(ArrayRef),
    /// Opaque host object, compared by identity.
    Host(HostObject),
    /// The absent value.
    Nothing,
}

impl Default for Value {
    /// The default value used when a read has no answer.
    fn default() -> Self {
        Value::I64(0)
    }
}

/// Type tag for `Value` variants, used in diagnostics and dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Float,
    Text,
    Array,
    Host,
    Unit,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Text => "text",
            ValueKind::Array => "array",
            ValueKind::Host => "host object",
            ValueKind::Unit => "nothing",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::I64(_) => ValueKind::Int,
            Value::F64(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Text,
            Value::Array(_) => ValueKind::Array,
            Value::Host(_) => ValueKind::Host,
            Value::Nothing => ValueKind::Unit,
        }
    }

    /// Encode a boolean the way user programs observe it.
    pub fn from_bool(b: bool) -> Value {
        Value::I64(i64::from(b))
    }

    /// Coerce to integer. `F64` truncates toward zero; text parses a signed
    /// decimal, falling back to 0 on a malformed number. Arrays, host
    /// objects, and `Nothing` do not coerce.
    pub fn coerce_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            Value::F64(v) => Some(*v as i64),
            Value::Str(s) => Some(parse_i64(s)),
            Value::Array(_) | Value::Host(_) | Value::Nothing => None,
        }
    }

    /// Coerce to floating point. Text parses, falling back to 0.
    pub fn coerce_f64(&self) -> Option<f64> {
        match self {
            Value::I64(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            Value::Str(s) => Some(s.trim().parse::<f64>().unwrap_or(0.0)),
            Value::Array(_) | Value::Host(_) | Value::Nothing => None,
        }
    }

    /// Stringify. Every variant has a text form; arrays and host objects
    /// stringify opaquely.
    pub fn to_text(&self) -> String {
        match self {
            Value::I64(v) => v.to_string(),
            Value::F64(v) => format_f64(*v),
            Value::Str(s) => s.clone(),
            Value::Array(arr) => {
                let len = arr.read().map(|a| a.len()).unwrap_or(0);
                format!("<array:{}>", len)
            }
            Value::Host(h) => format!("<{:?}>", h),
            Value::Nothing => String::new(),
        }
    }

    /// Truth test: non-zero numerics, non-empty text, and host objects are
    /// true; `I64(0)`, `F64(0)`, empty text, and `Nothing` are false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::I64(v) => *v != 0,
            Value::F64(v) => *v != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) => true,
            Value::Host(_) => true,
            Value::Nothing => false,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::I64(_) | Value::F64(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Parse a signed decimal integer, tolerating surrounding whitespace.
/// A malformed number parses to 0, matching the platform's permissive reads.
fn parse_i64(s: &str) -> i64 {
    let t = s.trim();
    if let Ok(v) = t.parse::<i64>() {
        return v;
    }
    // A float-shaped literal still has an integral reading ("3.7" -> 3).
    t.parse::<f64>().map(|f| f as i64).unwrap_or(0)
}

/// Format a float the way the platform prints numbers: shortest decimal
/// form, integral values without a trailing ".0".
fn format_f64(v: f64) -> String {
    if v.is_finite() && v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Helper enum for serializing the subset of Value variants that appear as
/// literals in compiled programs. Array handles and host objects never occur
/// in an opcode tree, so serializing one is an error rather than a silent
/// lossy conversion.
#[derive(serde::Serialize, serde::Deserialize)]
enum SerializableValue {
    Nothing,
    I64(i64),
    F64(f64),
    Str(String),
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let sv = match self {
            Value::Nothing => SerializableValue::Nothing,
            Value::I64(v) => SerializableValue::I64(*v),
            Value::F64(v) => SerializableValue::F64(*v),
            Value::Str(s) => SerializableValue::Str(s.clone()),
            other => {
                return Err(serde::ser::Error::custom(format!(
                    "cannot serialize Value variant: {}",
                    other.kind()
                )));
            }
        };
        sv.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let sv = SerializableValue::deserialize(deserializer)?;
        Ok(match sv {
            SerializableValue::Nothing => Value::Nothing,
            SerializableValue::I64(v) => Value::I64(v),
            SerializableValue::F64(v) => Value::F64(v),
            SerializableValue::Str(s) => Value::Str(s),
        })
    }
}

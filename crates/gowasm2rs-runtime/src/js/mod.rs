//! JavaScript host emulation for Go `js/wasm` modules.
//!
//! A Go program compiled for `GOOS=js` talks to its embedder through
//! `syscall/js`: it reads properties of a global object, calls functions,
//! constructs typed arrays and exchanges byte buffers. This module provides
//! the value model those host calls operate on:
//!
//! - [`Value`]: a tagged value (undefined, null, bool, number, string,
//!   object, array)
//! - [`Object`]: the capability set every host object implements, with
//!   failing defaults
//! - [`reflect`]: `Reflect.get/set/deleteProperty/construct/apply`
//! - [`HostContext`]: one global object per module instance, plus the fault
//!   path that replaces JavaScript exceptions
//!
//! Narrowing conversions return [`HostResult`]; a mismatch is a host-contract
//! violation that the call boundary hands to [`HostContext::fault`].

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;

mod context;
mod object;
pub mod reflect;
mod shim;
mod typed_array;
mod writer;

pub use context::{HostContext, HostContextBuilder, WeakHostContext};
pub use object::{ArrayBuffer, ByteView, Constructor, Dictionary, Enosys, Function, Object};
pub use typed_array::{TypedArray, TypedArrayKind};
pub use writer::LineWriter;

/// Shared handle to a host object.
pub type ObjectRef = Arc<dyn Object>;

/// Shared handle to a host array.
pub type ArrayRef = Arc<RwLock<Vec<Value>>>;

/// A violated host-call contract: wrong value kind, missing capability,
/// reflective access on null/undefined.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HostError(pub String);

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type HostResult<T> = Result<T, HostError>;

/// A JavaScript value as seen by the Go runtime.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Object(ObjectRef),
    Array(ArrayRef),
}

impl Value {
    /// Wrap a concrete host object.
    pub fn object(object: impl Object + 'static) -> Self {
        Value::Object(Arc::new(object))
    }

    /// A fresh array holding `items`.
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(RwLock::new(items)))
    }

    // ── predicates ──

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// True for objects that expose a byte view (array buffers, typed arrays).
    pub fn is_bytes(&self) -> bool {
        matches!(self, Value::Object(o) if o.bytes().is_some())
    }

    // ── narrowing ──

    pub fn to_bool(&self) -> HostResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => Err(self.mismatch("to_bool", "Bool")),
        }
    }

    pub fn to_number(&self) -> HostResult<f64> {
        match self {
            Value::Number(n) => Ok(*n),
            _ => Err(self.mismatch("to_number", "Number")),
        }
    }

    pub fn to_str(&self) -> HostResult<&str> {
        match self {
            Value::String(s) => Ok(&**s),
            _ => Err(self.mismatch("to_str", "String")),
        }
    }

    pub fn to_bytes(&self) -> HostResult<ByteView> {
        match self {
            Value::Object(o) => o
                .bytes()
                .ok_or_else(|| HostError::new(format!("Value::to_bytes: {} has no bytes", o.inspect()))),
            _ => Err(self.mismatch("to_bytes", "Object")),
        }
    }

    pub fn to_object(&self) -> HostResult<&ObjectRef> {
        match self {
            Value::Object(o) => Ok(o),
            _ => Err(self.mismatch("to_object", "Object")),
        }
    }

    pub fn to_array(&self) -> HostResult<&ArrayRef> {
        match self {
            Value::Array(a) => Ok(a),
            _ => Err(self.mismatch("to_array", "Array")),
        }
    }

    pub fn to_array_buffer(&self) -> HostResult<ArrayBuffer> {
        match self {
            Value::Object(o) => o.array_buffer().ok_or_else(|| {
                HostError::new(format!(
                    "Value::to_array_buffer: {} is not an ArrayBuffer",
                    o.inspect()
                ))
            }),
            _ => Err(self.mismatch("to_array_buffer", "Object")),
        }
    }

    fn mismatch(&self, conversion: &str, expected: &str) -> HostError {
        HostError::new(format!(
            "Value::{conversion}: the type must be {expected} but not: {}",
            self.inspect()
        ))
    }

    /// Human-readable rendering used by `console` and diagnostics.
    pub fn inspect(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Object(o) => o.inspect(),
            Value::Array(a) => {
                let items: Vec<String> = a.read().iter().map(Value::inspect).collect();
                format!("[{}]", items.join(" "))
            }
        }
    }
}

/// Render a number the way JavaScript's `String(n)` does for the common cases.
fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{n}")
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s:?}"),
            _ => f.write_str(&self.inspect()),
        }
    }
}

/// Tag plus payload identity. Numbers use SameValueZero (NaN equals NaN,
/// `+0` equals `-0`), which keeps `Eq` and `Hash` lawful.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Undefined | Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => {
                let canonical = if n.is_nan() {
                    f64::NAN.to_bits()
                } else if *n == 0.0 {
                    0
                } else {
                    n.to_bits()
                };
                canonical.hash(state);
            }
            Value::String(s) => s.hash(state),
            Value::Object(o) => (Arc::as_ptr(o) as *const () as usize).hash(state),
            Value::Array(a) => (Arc::as_ptr(a) as usize).hash(state),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

/// The `i`-th argument, or `undefined` when the caller passed fewer.
pub(crate) fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn narrowing_accepts_matching_tags() {
        assert_eq!(Value::from(true).to_bool(), Ok(true));
        assert_eq!(Value::from(2.5).to_number(), Ok(2.5));
        assert_eq!(Value::from("go").to_str(), Ok("go"));
        assert!(Value::array(vec![]).to_array().is_ok());
    }

    #[test]
    fn narrowing_faults_on_mismatch() {
        let err = Value::Null.to_number().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Value::to_number: the type must be Number but not: null"
        );
        assert!(Value::from(1.0).to_bool().is_err());
        assert!(Value::Undefined.to_str().is_err());
        assert!(Value::from("x").to_object().is_err());
        assert!(Value::from("x").to_bytes().is_err());
        assert!(Value::object(Dictionary::new()).to_bytes().is_err());
        assert!(Value::object(Dictionary::new())
            .to_array_buffer()
            .is_err());
    }

    #[test]
    fn equality_is_identity_for_references() {
        let a = Value::object(Dictionary::new());
        let b = Value::object(Dictionary::new());
        assert_eq!(a, a.clone());
        assert_ne!(a, b);

        let arr = Value::array(vec![Value::from(1.0)]);
        assert_eq!(arr, arr.clone());
        assert_ne!(arr, Value::array(vec![Value::from(1.0)]));
    }

    #[test]
    fn equality_for_scalars() {
        assert_eq!(Value::from("a"), Value::from("a".to_string()));
        assert_ne!(Value::from(1.0), Value::from(true));
        assert_eq!(Value::from(f64::NAN), Value::from(f64::NAN));
        assert_eq!(Value::from(0.0), Value::from(-0.0));
        assert_ne!(Value::Null, Value::Undefined);
    }

    #[test]
    fn values_work_as_set_keys() {
        let obj = Value::object(Dictionary::new());
        let mut set = HashSet::new();
        set.insert(Value::from(-0.0));
        set.insert(Value::from(0.0));
        set.insert(obj.clone());
        set.insert(obj.clone());
        set.insert(Value::from(f64::NAN));
        set.insert(Value::from(f64::NAN));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn inspect_renders_like_js() {
        assert_eq!(Value::Undefined.inspect(), "undefined");
        assert_eq!(Value::from(3.0).inspect(), "3");
        assert_eq!(Value::from(-0.5).inspect(), "-0.5");
        assert_eq!(Value::from(f64::NAN).inspect(), "NaN");
        assert_eq!(
            Value::array(vec![Value::from(1.0), Value::from("b"), Value::Null]).inspect(),
            "[1 b null]"
        );
        assert_eq!(Value::array(vec![]).inspect(), "[]");
    }

    #[test]
    fn missing_args_are_undefined() {
        let args = [Value::from(1.0)];
        assert_eq!(arg(&args, 0), Value::from(1.0));
        assert!(arg(&args, 3).is_undefined());
    }
}

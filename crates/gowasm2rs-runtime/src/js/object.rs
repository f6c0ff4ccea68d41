//! Host object capabilities and the concrete objects the shim is built from.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::{HostError, HostResult, Value};

/// Capability set of a host object.
///
/// Every capability has a failing default, so concrete objects implement only
/// what they support. Implementations must be `Send + Sync`; the same object
/// graph can be reached from timer threads.
pub trait Object: Send + Sync {
    /// Short class name used in diagnostics.
    fn class_name(&self) -> String;

    fn get(&self, key: &str) -> HostResult<Value> {
        Err(HostError::new(format!(
            "Object::get is not implemented: this: {}, key: {key}",
            self.inspect()
        )))
    }

    fn set(&self, key: &str, _value: Value) -> HostResult<()> {
        Err(HostError::new(format!(
            "Object::set is not implemented: this: {}, key: {key}",
            self.inspect()
        )))
    }

    fn delete(&self, key: &str) -> HostResult<()> {
        Err(HostError::new(format!(
            "Object::delete is not implemented: this: {}, key: {key}",
            self.inspect()
        )))
    }

    fn invoke(&self, _this: &Value, _args: &[Value]) -> HostResult<Value> {
        Err(HostError::new(format!(
            "Object::invoke is not implemented: this: {}",
            self.inspect()
        )))
    }

    fn construct(&self, _args: &[Value]) -> HostResult<Value> {
        Err(HostError::new(format!(
            "Object::construct is not implemented: this: {}",
            self.inspect()
        )))
    }

    /// Byte view for array buffers and typed arrays.
    fn bytes(&self) -> Option<ByteView> {
        None
    }

    /// The backing store when this object is an `ArrayBuffer`.
    fn array_buffer(&self) -> Option<ArrayBuffer> {
        None
    }

    fn is_function(&self) -> bool {
        false
    }

    fn is_constructor(&self) -> bool {
        false
    }

    fn inspect(&self) -> String {
        self.class_name()
    }
}

// ── ArrayBuffer ──────────────────────────────────────────────────────────────

/// Fixed-size byte store. Cloning yields another handle to the same bytes.
#[derive(Clone, Default)]
pub struct ArrayBuffer {
    data: Arc<Mutex<Vec<u8>>>,
}

impl ArrayBuffer {
    pub fn new(len: usize) -> Self {
        Self::from_vec(vec![0; len])
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(Mutex::new(data)),
        }
    }

    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn same_store(&self, other: &ArrayBuffer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// View over `[offset, offset + len)`.
    pub fn view(&self, offset: usize, len: usize) -> ByteView {
        ByteView {
            buffer: self.clone(),
            offset,
            len,
        }
    }
}

impl Object for ArrayBuffer {
    fn class_name(&self) -> String {
        "ArrayBuffer".to_string()
    }

    fn get(&self, key: &str) -> HostResult<Value> {
        match key {
            "byteLength" => Ok(Value::Number(self.len() as f64)),
            _ => Ok(Value::Undefined),
        }
    }

    fn bytes(&self) -> Option<ByteView> {
        Some(self.view(0, self.len()))
    }

    fn array_buffer(&self) -> Option<ArrayBuffer> {
        Some(self.clone())
    }

    fn inspect(&self) -> String {
        format!("ArrayBuffer {{ byteLength: {} }}", self.len())
    }
}

/// A window over an [`ArrayBuffer`]: the unit of byte exchange between Go
/// linear memory and host objects.
#[derive(Clone)]
pub struct ByteView {
    buffer: ArrayBuffer,
    offset: usize,
    len: usize,
}

impl ByteView {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn buffer(&self) -> &ArrayBuffer {
        &self.buffer
    }

    /// Run `f` over the viewed bytes, clipped to the end of the buffer.
    pub fn with<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let data = self.buffer.data.lock();
        let (start, end) = self.clip(data.len());
        f(&data[start..end])
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut data = self.buffer.data.lock();
        let (start, end) = self.clip(data.len());
        f(&mut data[start..end])
    }

    fn clip(&self, store_len: usize) -> (usize, usize) {
        let end = self.offset.saturating_add(self.len).min(store_len);
        (self.offset.min(end), end)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.with(<[u8]>::to_vec)
    }

    /// Copy as many bytes of `src` as fit; returns the count copied.
    pub fn copy_from(&self, src: &[u8]) -> usize {
        self.with_mut(|dst| {
            let n = dst.len().min(src.len());
            dst[..n].copy_from_slice(&src[..n]);
            n
        })
    }

    /// Copy as many viewed bytes as fit into `dst`; returns the count copied.
    pub fn copy_to(&self, dst: &mut [u8]) -> usize {
        self.with(|src| {
            let n = dst.len().min(src.len());
            dst[..n].copy_from_slice(&src[..n]);
            n
        })
    }
}

// ── Dictionary ───────────────────────────────────────────────────────────────

/// Plain key/value object (`new Object()`, the global object, namespaces).
#[derive(Default)]
pub struct Dictionary {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self {
            entries: RwLock::new(entries.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Object for Dictionary {
    fn class_name(&self) -> String {
        "Dictionary".to_string()
    }

    /// Missing keys read as `undefined`.
    fn get(&self, key: &str) -> HostResult<Value> {
        Ok(self.entries.read().get(key).cloned().unwrap_or_default())
    }

    fn set(&self, key: &str, value: Value) -> HostResult<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> HostResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn inspect(&self) -> String {
        let entries = self.entries.read();
        let items: Vec<String> = entries
            .iter()
            .map(|(k, v)| format!("{k}:{}", v.inspect()))
            .collect();
        format!("{{{}}}", items.join(" "))
    }
}

// ── Function / Constructor ───────────────────────────────────────────────────

type NativeFn = dyn Fn(&Value, &[Value]) -> HostResult<Value> + Send + Sync;
type NativeCtor = dyn Fn(&[Value]) -> HostResult<Value> + Send + Sync;

/// Callable host function.
pub struct Function {
    name: String,
    f: Box<NativeFn>,
}

impl Function {
    pub fn new(
        name: impl Into<String>,
        f: impl Fn(&Value, &[Value]) -> HostResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

impl Object for Function {
    fn class_name(&self) -> String {
        format!("Function {}", self.name)
    }

    fn invoke(&self, this: &Value, args: &[Value]) -> HostResult<Value> {
        (self.f)(this, args)
    }

    fn is_function(&self) -> bool {
        true
    }
}

/// Constructible host class (`new X(...)`).
pub struct Constructor {
    name: String,
    f: Box<NativeCtor>,
}

impl Constructor {
    pub fn new(
        name: impl Into<String>,
        f: impl Fn(&[Value]) -> HostResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

impl Object for Constructor {
    fn class_name(&self) -> String {
        format!("Constructor {}", self.name)
    }

    fn construct(&self, args: &[Value]) -> HostResult<Value> {
        (self.f)(args)
    }

    fn is_constructor(&self) -> bool {
        true
    }
}

// ── Enosys ───────────────────────────────────────────────────────────────────

/// Error object handed to Go callbacks for unsupported operations. Go's
/// `syscall` package maps `code == "ENOSYS"` to `syscall.ENOSYS`.
pub struct Enosys {
    name: String,
}

impl Enosys {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Object for Enosys {
    fn class_name(&self) -> String {
        format!("Enosys({})", self.name)
    }

    fn get(&self, key: &str) -> HostResult<Value> {
        match key {
            "message" => Ok(Value::from(format!("{} not implemented", self.name))),
            "code" => Ok(Value::from("ENOSYS")),
            _ => Ok(Value::Undefined),
        }
    }
}

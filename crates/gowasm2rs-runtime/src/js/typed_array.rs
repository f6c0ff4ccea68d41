//! `Uint8Array`, `Uint16Array` and `Float32Array` views over an `ArrayBuffer`.

use std::sync::Arc;

use parking_lot::RwLock;

use super::object::{ArrayBuffer, ByteView, Object};
use super::{HostError, HostResult, ObjectRef, Value};
use crate::MAX_MEMORY_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedArrayKind {
    Uint8,
    Uint16,
    Float32,
}

impl TypedArrayKind {
    pub fn element_size(self) -> usize {
        match self {
            TypedArrayKind::Uint8 => 1,
            TypedArrayKind::Uint16 => 2,
            TypedArrayKind::Float32 => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TypedArrayKind::Uint8 => "Uint8Array",
            TypedArrayKind::Uint16 => "Uint16Array",
            TypedArrayKind::Float32 => "Float32Array",
        }
    }
}

struct Window {
    /// The buffer as a host value, so `view.buffer` keeps its identity.
    buffer_value: ObjectRef,
    buffer: ArrayBuffer,
    byte_offset: usize,
    byte_length: usize,
}

/// Typed view over a shared `ArrayBuffer`. Offsets and lengths are stored in
/// bytes; the constructors scale element counts by the element size.
pub struct TypedArray {
    kind: TypedArrayKind,
    window: RwLock<Window>,
}

impl TypedArray {
    /// View `length` elements of `buffer` starting at element `offset`.
    pub fn new(kind: TypedArrayKind, buffer: &Value, offset: usize, length: usize) -> HostResult<Self> {
        let buffer_value = buffer.to_object()?.clone();
        let store = buffer.to_array_buffer()?;
        let size = kind.element_size();
        let out_of_range = || {
            HostError::new(format!(
                "{}: view of {length} elements at {offset} exceeds buffer of {} bytes",
                kind.name(),
                store.len()
            ))
        };
        let byte_offset = offset.checked_mul(size).ok_or_else(out_of_range)?;
        let byte_length = length.checked_mul(size).ok_or_else(out_of_range)?;
        let end = byte_offset.checked_add(byte_length).ok_or_else(out_of_range)?;
        if end > store.len() {
            return Err(out_of_range());
        }
        Ok(Self {
            kind,
            window: RwLock::new(Window {
                buffer_value,
                buffer: store,
                byte_offset,
                byte_length,
            }),
        })
    }

    /// A view over a fresh zeroed buffer of `length` elements, at most
    /// [`MAX_MEMORY_SIZE`] bytes.
    pub fn with_length(kind: TypedArrayKind, length: usize) -> HostResult<Self> {
        let byte_length = length
            .checked_mul(kind.element_size())
            .filter(|&n| n <= MAX_MEMORY_SIZE)
            .ok_or_else(|| HostError::new(format!("{}: invalid length: {length}", kind.name())))?;
        let store = ArrayBuffer::new(byte_length);
        let buffer_value: ObjectRef = Arc::new(store.clone());
        Ok(Self {
            kind,
            window: RwLock::new(Window {
                buffer_value,
                buffer: store,
                byte_offset: 0,
                byte_length,
            }),
        })
    }

    pub fn kind(&self) -> TypedArrayKind {
        self.kind
    }

    pub fn byte_length(&self) -> usize {
        self.window.read().byte_length
    }

    pub fn byte_offset(&self) -> usize {
        self.window.read().byte_offset
    }
}

impl Object for TypedArray {
    fn class_name(&self) -> String {
        self.kind.name().to_string()
    }

    fn get(&self, key: &str) -> HostResult<Value> {
        let window = self.window.read();
        Ok(match key {
            "byteLength" => Value::Number(window.byte_length as f64),
            "byteOffset" => Value::Number(window.byte_offset as f64),
            "buffer" => Value::Object(window.buffer_value.clone()),
            "length" => Value::Number((window.byte_length / self.kind.element_size()) as f64),
            _ => Value::Undefined,
        })
    }

    fn set(&self, key: &str, value: Value) -> HostResult<()> {
        let mut window = self.window.write();
        match key {
            "byteLength" => window.byte_length = value.to_number()? as usize,
            "byteOffset" => window.byte_offset = value.to_number()? as usize,
            "buffer" => {
                window.buffer = value.to_array_buffer()?;
                window.buffer_value = value.to_object()?.clone();
            }
            _ => {
                return Err(HostError::new(format!(
                    "TypedArray::set: invalid key: {key}"
                )))
            }
        }
        Ok(())
    }

    fn bytes(&self) -> Option<ByteView> {
        let window = self.window.read();
        Some(window.buffer.view(window.byte_offset, window.byte_length))
    }

    fn inspect(&self) -> String {
        let window = self.window.read();
        format!(
            "{} {{ byteOffset: {}, byteLength: {} }}",
            self.kind.name(),
            window.byte_offset,
            window.byte_length
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_value(len: usize) -> Value {
        Value::object(ArrayBuffer::new(len))
    }

    #[test]
    fn uint16_scales_offset_and_length() {
        let buf = buffer_value(16);
        let view = TypedArray::new(TypedArrayKind::Uint16, &buf, 2, 3).unwrap();
        assert_eq!(view.byte_offset(), 4);
        assert_eq!(view.byte_length(), 6);
        assert_eq!(view.get("length").unwrap(), Value::from(3.0));
        assert_eq!(view.get("buffer").unwrap(), buf);
    }

    #[test]
    fn float32_with_length_allocates_four_bytes_per_element() {
        let view = TypedArray::with_length(TypedArrayKind::Float32, 3).unwrap();
        let buffer = view.get("buffer").unwrap().to_array_buffer().unwrap();
        assert_eq!(buffer.len(), 12);
        assert_eq!(view.get("byteLength").unwrap(), Value::from(12.0));
    }

    #[test]
    fn view_past_buffer_end_is_rejected() {
        let buf = buffer_value(4);
        assert!(TypedArray::new(TypedArrayKind::Uint8, &buf, 2, 3).is_err());
        assert!(TypedArray::new(TypedArrayKind::Uint8, &Value::Null, 0, 0).is_err());
    }

    #[test]
    fn overflowing_windows_are_rejected() {
        let buf = buffer_value(16);
        let huge = usize::MAX / 2 + 1;
        assert!(TypedArray::new(TypedArrayKind::Uint16, &buf, huge, 1).is_err());
        assert!(TypedArray::new(TypedArrayKind::Float32, &buf, 0, huge).is_err());
        assert!(TypedArray::new(TypedArrayKind::Uint8, &buf, usize::MAX, 1).is_err());
        assert!(TypedArray::with_length(TypedArrayKind::Float32, usize::MAX / 2).is_err());
        assert!(TypedArray::with_length(TypedArrayKind::Uint8, MAX_MEMORY_SIZE + 1).is_err());
    }

    #[test]
    fn bytes_track_the_window() {
        let buf = buffer_value(8);
        let view = TypedArray::new(TypedArrayKind::Uint8, &buf, 1, 2).unwrap();
        view.bytes().unwrap().copy_from(&[7, 9]);
        assert_eq!(buf.to_bytes().unwrap().to_vec(), [0, 7, 9, 0, 0, 0, 0, 0]);

        view.set("byteOffset", Value::from(6.0)).unwrap();
        view.bytes().unwrap().copy_from(&[1, 1]);
        assert_eq!(buf.to_bytes().unwrap().to_vec(), [0, 7, 9, 0, 0, 0, 1, 1]);
    }

    #[test]
    fn set_rejects_unknown_keys() {
        let view = TypedArray::with_length(TypedArrayKind::Uint8, 1).unwrap();
        let err = view.set("length", Value::from(1.0)).unwrap_err();
        assert_eq!(err.to_string(), "TypedArray::set: invalid key: length");
        assert!(view.set("buffer", Value::from(1.0)).is_err());
    }

    #[test]
    fn set_buffer_replaces_store() {
        let view = TypedArray::with_length(TypedArrayKind::Uint8, 2).unwrap();
        let other = buffer_value(2);
        view.set("buffer", other.clone()).unwrap();
        assert_eq!(view.get("buffer").unwrap(), other);
        view.bytes().unwrap().copy_from(&[5, 6]);
        assert_eq!(other.to_bytes().unwrap().to_vec(), [5, 6]);
    }
}

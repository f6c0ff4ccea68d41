//! `Reflect.*` operations used by Go's `syscall/js` host calls.
//!
//! These are the only entry points the import glue uses to touch host values,
//! so every contract check (null/undefined targets, missing capabilities)
//! surfaces here as a [`HostError`].

use super::{HostError, HostResult, Value};

/// `Reflect.get(target, key)`.
///
/// Arrays accept a decimal index (out of range reads `undefined`) or
/// `"length"`. Other non-object targets fault.
pub fn get(target: &Value, key: &str) -> HostResult<Value> {
    match target {
        Value::Undefined | Value::Null => Err(forbidden("get", target, key)),
        Value::Object(o) => o.get(key),
        Value::Array(items) => {
            let items = items.read();
            if key == "length" {
                return Ok(Value::Number(items.len() as f64));
            }
            match key.parse::<usize>() {
                Ok(i) => Ok(items.get(i).cloned().unwrap_or_default()),
                Err(_) => Err(not_found(target, key)),
            }
        }
        _ => Err(not_found(target, key)),
    }
}

/// `Reflect.set(target, key, value)`.
///
/// Arrays accept a decimal index; writing one past the end appends and
/// writing further out pads with `undefined`.
pub fn set(target: &Value, key: &str, value: Value) -> HostResult<()> {
    match target {
        Value::Undefined | Value::Null => Err(forbidden("set", target, key)),
        Value::Object(o) => o.set(key, value),
        Value::Array(items) => {
            let i = key
                .parse::<usize>()
                .map_err(|_| HostError::new(format!("{}.{key} cannot be set", target.inspect())))?;
            let mut items = items.write();
            if i >= items.len() {
                items.resize(i + 1, Value::Undefined);
            }
            items[i] = value;
            Ok(())
        }
        _ => Err(HostError::new(format!(
            "{}.{key} cannot be set",
            target.inspect()
        ))),
    }
}

/// `Reflect.deleteProperty(target, key)`.
pub fn delete(target: &Value, key: &str) -> HostResult<()> {
    match target {
        Value::Undefined | Value::Null => Err(forbidden("delete", target, key)),
        Value::Object(o) => o.delete(key),
        _ => Err(HostError::new(format!(
            "{}.{key} cannot be deleted",
            target.inspect()
        ))),
    }
}

/// `Reflect.construct(target, args)`.
pub fn construct(target: &Value, args: &[Value]) -> HostResult<Value> {
    match target {
        Value::Object(o) if o.is_constructor() => o.construct(args),
        _ => Err(HostError::new(format!(
            "{} is not a constructor",
            target.inspect()
        ))),
    }
}

/// `Reflect.apply(target, this, args)`.
pub fn apply(target: &Value, this: &Value, args: &[Value]) -> HostResult<Value> {
    match target {
        Value::Object(o) if o.is_constructor() => Err(HostError::new(format!(
            "{} is a constructor",
            target.inspect()
        ))),
        Value::Object(o) if o.is_function() => o.invoke(this, args),
        _ => Err(HostError::new(format!(
            "{} is not a function",
            target.inspect()
        ))),
    }
}

fn forbidden(op: &str, target: &Value, key: &str) -> HostError {
    HostError::new(format!(
        "{op} on {} (key: {key}) is forbidden",
        target.inspect()
    ))
}

fn not_found(target: &Value, key: &str) -> HostError {
    HostError::new(format!("{}.{key} not found", target.inspect()))
}

//! The global object a Go `js/wasm` program expects to find.

use rand::RngCore;

use super::context::WeakHostContext;
use super::object::{ArrayBuffer, Constructor, Dictionary, Enosys, Function};
use super::typed_array::{TypedArray, TypedArrayKind};
use super::{arg, reflect, HostError, HostResult, Value};
use crate::MAX_MEMORY_SIZE;

/// Longest array `new Array(n)` will allocate.
const MAX_ARRAY_LENGTH: usize = 1 << 24;

pub(super) fn global_object(ctx: WeakHostContext) -> Value {
    Value::object(Dictionary::from_entries([
        ("Array", constructor("Array", new_array)),
        ("Object", constructor("Object", new_object)),
        ("ArrayBuffer", constructor("ArrayBuffer", new_array_buffer)),
        ("Uint8Array", constructor("Uint8Array", new_uint8_array)),
        ("Uint16Array", constructor("Uint16Array", new_uint16_array)),
        ("Float32Array", constructor("Float32Array", new_float32_array)),
        ("console", console(&ctx)),
        ("crypto", crypto()),
        ("fetch", function("fetch", |_, _| Ok(Value::Undefined))),
        ("fs", fs(ctx)),
        ("process", process()),
    ]))
}

fn constructor(
    name: &str,
    f: impl Fn(&[Value]) -> HostResult<Value> + Send + Sync + 'static,
) -> Value {
    Value::object(Constructor::new(name, f))
}

fn function(
    name: &str,
    f: impl Fn(&Value, &[Value]) -> HostResult<Value> + Send + Sync + 'static,
) -> Value {
    Value::object(Function::new(name, f))
}

/// A non-negative integral number usable as a length or offset. Values past
/// the memory ceiling are rejected rather than saturated.
fn to_index(value: &Value, what: &str) -> HostResult<usize> {
    let n = value.to_number()?;
    if n < 0.0 || n.fract() != 0.0 || !n.is_finite() || n > MAX_MEMORY_SIZE as f64 {
        return Err(HostError::new(format!("{what}: invalid length or offset: {n}")));
    }
    Ok(n as usize)
}

// ── constructors ──

fn new_array(args: &[Value]) -> HostResult<Value> {
    match args {
        [] => Ok(Value::array(Vec::new())),
        [len @ Value::Number(_)] => {
            let n = to_index(len, "new Array")?;
            if n > MAX_ARRAY_LENGTH {
                return Err(HostError::new(format!("new Array: invalid length: {n}")));
            }
            Ok(Value::array(vec![Value::Undefined; n]))
        }
        _ => Ok(Value::array(args.to_vec())),
    }
}

fn new_object(args: &[Value]) -> HostResult<Value> {
    match args {
        [] => Ok(Value::object(Dictionary::new())),
        [x, ..] => Err(HostError::new(format!(
            "new Object({}) is not implemented",
            x.inspect()
        ))),
    }
}

fn new_array_buffer(args: &[Value]) -> HostResult<Value> {
    match args {
        [len, ..] => Ok(Value::object(ArrayBuffer::new(to_index(len, "new ArrayBuffer")?))),
        [] => Err(HostError::new("new ArrayBuffer() requires a length")),
    }
}

fn typed_view(kind: TypedArrayKind, args: &[Value]) -> HostResult<Value> {
    let [buffer, offset, length] = args else {
        return Err(arity_error(kind, args));
    };
    let what = kind.name();
    Ok(Value::object(TypedArray::new(
        kind,
        buffer,
        to_index(offset, what)?,
        to_index(length, what)?,
    )?))
}

fn arity_error(kind: TypedArrayKind, args: &[Value]) -> HostError {
    let shown: Vec<String> = args.iter().map(Value::inspect).collect();
    HostError::new(format!(
        "new {}({}) is not implemented",
        kind.name(),
        shown.join(", ")
    ))
}

fn new_uint8_array(args: &[Value]) -> HostResult<Value> {
    let kind = TypedArrayKind::Uint8;
    match args {
        [] => Ok(Value::object(TypedArray::with_length(kind, 0)?)),
        [len @ Value::Number(_)] => Ok(Value::object(TypedArray::with_length(
            kind,
            to_index(len, kind.name())?,
        )?)),
        _ => typed_view(kind, args),
    }
}

fn new_uint16_array(args: &[Value]) -> HostResult<Value> {
    typed_view(TypedArrayKind::Uint16, args)
}

fn new_float32_array(args: &[Value]) -> HostResult<Value> {
    let kind = TypedArrayKind::Float32;
    match args {
        [] => Ok(Value::object(TypedArray::with_length(kind, 0)?)),
        [len @ Value::Number(_)] => Ok(Value::object(TypedArray::with_length(
            kind,
            to_index(len, kind.name())?,
        )?)),
        _ => typed_view(kind, args),
    }
}

// ── console ──

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

fn console(ctx: &WeakHostContext) -> Value {
    let method = |name: &str, stream: Stream| {
        let ctx = ctx.clone();
        function(name, move |_, args| {
            let ctx = ctx.require()?;
            let items: Vec<String> = args.iter().map(Value::inspect).collect();
            let line = format!("{}\n", items.join(", "));
            let writer = match stream {
                Stream::Stdout => ctx.stdout(),
                Stream::Stderr => ctx.stderr(),
            };
            writer
                .write(line.as_bytes())
                .map_err(|e| HostError::new(format!("console: {e}")))?;
            Ok(Value::Undefined)
        })
    };
    Value::object(Dictionary::from_entries([
        ("log", method("log", Stream::Stdout)),
        ("info", method("info", Stream::Stdout)),
        ("error", method("error", Stream::Stderr)),
        ("debug", method("debug", Stream::Stderr)),
        ("warn", method("warn", Stream::Stderr)),
    ]))
}

// ── crypto ──

fn crypto() -> Value {
    Value::object(Dictionary::from_entries([(
        "getRandomValues",
        function("getRandomValues", |_, args| {
            let view = arg(args, 0).to_bytes()?;
            view.with_mut(|bytes| rand::rng().fill_bytes(bytes));
            Ok(Value::Undefined)
        }),
    )]))
}

// ── fs ──

fn fs(ctx: WeakHostContext) -> Value {
    let constants = Value::object(Dictionary::from_entries(
        ["O_WRONLY", "O_RDWR", "O_CREAT", "O_TRUNC", "O_APPEND", "O_EXCL"]
            .map(|name| (name, Value::from(-1))),
    ));
    Value::object(Dictionary::from_entries([
        ("constants", constants),
        ("write", function("write", move |_, args| fs_write(&ctx, args))),
    ]))
}

/// `fs.write(fd, buf, offset, length, position, callback)`.
///
/// Only whole-buffer writes to fd 1 or 2 at the current position are
/// supported; anything else reports ENOSYS through the callback.
fn fs_write(ctx: &WeakHostContext, args: &[Value]) -> HostResult<Value> {
    let fd = arg(args, 0).to_number()? as i64;
    let buf = arg(args, 1).to_bytes()?;
    let offset = arg(args, 2).to_number()?;
    let length = arg(args, 3).to_number()?;
    let position = arg(args, 4);
    let callback = arg(args, 5);

    let ctx = ctx.require()?;
    let writer = match ctx.writer_for(fd) {
        Some(writer) if offset == 0.0 && length == buf.len() as f64 && position.is_null() => writer,
        _ => {
            log::trace!("fs.write: ENOSYS (fd {fd}, offset {offset}, length {length})");
            reflect::apply(&callback, &Value::Undefined, &[Value::object(Enosys::new("write"))])?;
            return Ok(Value::Undefined);
        }
    };

    log::trace!("fs.write: {} bytes to fd {fd}", buf.len());
    buf.with(|bytes| writer.write(bytes))
        .map_err(|e| HostError::new(format!("fs.write: {e}")))?;
    reflect::apply(&callback, &Value::Undefined, &[Value::Null, Value::from(length)])?;
    Ok(Value::Undefined)
}

// ── process ──

fn process() -> Value {
    Value::object(Dictionary::from_entries([
        ("pid", Value::from(-1)),
        ("ppid", Value::from(-1)),
    ]))
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::js::{reflect, Function, HostContext, Value};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Harness {
        ctx: HostContext,
        out: Capture,
        err: Capture,
    }

    fn harness() -> Harness {
        let out = Capture::default();
        let err = Capture::default();
        let ctx = HostContext::builder()
            .stdout(out.clone())
            .stderr(err.clone())
            .build();
        Harness { ctx, out, err }
    }

    impl Harness {
        fn global(&self, path: &[&str]) -> Value {
            path.iter().fold(self.ctx.global().clone(), |v, key| {
                reflect::get(&v, key).unwrap()
            })
        }

        fn construct(&self, class: &str, args: &[Value]) -> Result<Value, String> {
            reflect::construct(&self.global(&[class]), args).map_err(|e| e.to_string())
        }
    }

    /// A callback recording the arguments of every call.
    fn recorder() -> (Value, Arc<Mutex<Vec<Vec<Value>>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let cb = Value::object(Function::new("cb", move |_, args| {
            sink.lock().push(args.to_vec());
            Ok(Value::Undefined)
        }));
        (cb, calls)
    }

    fn bytes(h: &Harness, data: &[u8], len: usize) -> Value {
        let buf = h.construct("ArrayBuffer", &[Value::from(data.len() as f64)]).unwrap();
        buf.to_bytes().unwrap().copy_from(data);
        h.construct(
            "Uint8Array",
            &[buf, Value::from(0.0), Value::from(len as f64)],
        )
        .unwrap()
    }

    fn write_args(fd: f64, buf: &Value, offset: f64, length: f64, position: Value, cb: &Value) -> Vec<Value> {
        vec![
            Value::from(fd),
            buf.clone(),
            Value::from(offset),
            Value::from(length),
            position,
            cb.clone(),
        ]
    }

    #[test]
    fn global_exposes_expected_keys() {
        let h = harness();
        for key in [
            "Array",
            "Object",
            "ArrayBuffer",
            "Uint8Array",
            "Uint16Array",
            "Float32Array",
            "console",
            "crypto",
            "fetch",
            "fs",
            "process",
        ] {
            assert!(!h.global(&[key]).is_undefined(), "missing global {key}");
        }
        assert_eq!(h.global(&["process", "pid"]), Value::from(-1));
        assert_eq!(h.global(&["process", "ppid"]), Value::from(-1));
        assert_eq!(h.global(&["fs", "constants", "O_WRONLY"]), Value::from(-1));
        assert_eq!(h.global(&["fs", "constants", "O_EXCL"]), Value::from(-1));
    }

    #[test]
    fn fs_write_success_buffers_until_newline() {
        let h = harness();
        let write = h.global(&["fs", "write"]);
        let (cb, calls) = recorder();

        let buf = bytes(&h, b"hi\n", 2);
        reflect::apply(&write, &Value::Undefined, &write_args(1.0, &buf, 0.0, 2.0, Value::Null, &cb)).unwrap();
        assert_eq!(h.out.text(), "");
        assert_eq!(*calls.lock(), vec![vec![Value::Null, Value::from(2.0)]]);

        let newline = bytes(&h, b"\n", 1);
        reflect::apply(&write, &Value::Undefined, &write_args(1.0, &newline, 0.0, 1.0, Value::Null, &cb)).unwrap();
        assert_eq!(h.out.text(), "hi\n");
    }

    #[test]
    fn fs_write_unsupported_ranges_report_enosys_once() {
        let h = harness();
        let write = h.global(&["fs", "write"]);
        let buf = bytes(&h, b"hi\n", 3);

        for (fd, offset, length, position) in [
            (1.0, 1.0, 2.0, Value::Null),
            (1.0, 0.0, 2.0, Value::Null),
            (1.0, 0.0, 3.0, Value::from(0.0)),
            (3.0, 0.0, 3.0, Value::Null),
        ] {
            let (cb, calls) = recorder();
            reflect::apply(&write, &Value::Undefined, &write_args(fd, &buf, offset, length, position, &cb)).unwrap();
            let calls = calls.lock();
            assert_eq!(calls.len(), 1);
            let err = &calls[0][0];
            assert_eq!(reflect::get(err, "code").unwrap(), Value::from("ENOSYS"));
            assert_eq!(
                reflect::get(err, "message").unwrap(),
                Value::from("write not implemented")
            );
        }
        assert_eq!(h.out.text(), "");
        assert_eq!(h.ctx.stdout().pending_len(), 0);
    }

    #[test]
    fn fs_write_to_stderr() {
        let h = harness();
        let write = h.global(&["fs", "write"]);
        let (cb, _) = recorder();
        let buf = bytes(&h, b"oops\n", 5);
        reflect::apply(&write, &Value::Undefined, &write_args(2.0, &buf, 0.0, 5.0, Value::Null, &cb)).unwrap();
        assert_eq!(h.err.text(), "oops\n");
        assert_eq!(h.out.text(), "");
    }

    #[test]
    fn console_routes_streams() {
        let h = harness();
        let log = h.global(&["console", "log"]);
        let warn = h.global(&["console", "warn"]);
        reflect::apply(&log, &Value::Undefined, &[Value::from("a"), Value::from(1.0)]).unwrap();
        reflect::apply(&warn, &Value::Undefined, &[Value::from(true)]).unwrap();
        assert_eq!(h.out.text(), "a, 1\n");
        assert_eq!(h.err.text(), "true\n");
    }

    #[test]
    fn get_random_values_fills_the_view() {
        let h = harness();
        let view = h.construct("Uint8Array", &[Value::from(64.0)]).unwrap();
        let get_random = h.global(&["crypto", "getRandomValues"]);
        let out = reflect::apply(&get_random, &Value::Undefined, &[view.clone()]).unwrap();
        assert!(out.is_undefined());
        // 64 zero bytes from a uniform source is vanishingly unlikely.
        assert!(view.to_bytes().unwrap().to_vec().iter().any(|&b| b != 0));
        assert!(reflect::apply(&get_random, &Value::Undefined, &[]).is_err());
    }

    #[test]
    fn array_constructor_forms() {
        let h = harness();
        let empty = h.construct("Array", &[]).unwrap();
        assert_eq!(reflect::get(&empty, "length").unwrap(), Value::from(0.0));

        let sized = h.construct("Array", &[Value::from(3.0)]).unwrap();
        assert_eq!(sized.inspect(), "[undefined undefined undefined]");

        let listed = h.construct("Array", &[Value::from("x"), Value::from(2.0)]).unwrap();
        assert_eq!(listed.inspect(), "[x 2]");
    }

    #[test]
    fn object_constructor_rejects_arguments() {
        let h = harness();
        assert!(h.construct("Object", &[]).unwrap().is_object());
        assert_eq!(
            h.construct("Object", &[Value::from(1.0)]).unwrap_err(),
            "new Object(1) is not implemented"
        );
    }

    #[test]
    fn typed_array_constructor_forms() {
        let h = harness();
        let buf = h.construct("ArrayBuffer", &[Value::from(16.0)]).unwrap();
        assert_eq!(reflect::get(&buf, "byteLength").unwrap(), Value::from(16.0));
        assert!(h.construct("ArrayBuffer", &[]).is_err());

        let u16 = h
            .construct("Uint16Array", &[buf.clone(), Value::from(1.0), Value::from(2.0)])
            .unwrap();
        assert_eq!(reflect::get(&u16, "byteOffset").unwrap(), Value::from(2.0));
        assert_eq!(reflect::get(&u16, "byteLength").unwrap(), Value::from(4.0));
        assert!(h.construct("Uint16Array", &[Value::from(2.0)]).is_err());

        let f32s = h.construct("Float32Array", &[Value::from(2.0)]).unwrap();
        assert_eq!(reflect::get(&f32s, "byteLength").unwrap(), Value::from(8.0));
        assert!(h.construct("Float32Array", &[]).is_ok());

        let u8s = h.construct("Uint8Array", &[]).unwrap();
        assert_eq!(reflect::get(&u8s, "length").unwrap(), Value::from(0.0));
        assert!(h.construct("Uint8Array", &[Value::from("x"), Value::Null]).is_err());
    }

    #[test]
    fn oversized_lengths_and_offsets_fault() {
        let h = harness();
        let buf = h.construct("ArrayBuffer", &[Value::from(16.0)]).unwrap();
        for (offset, length) in [(1e300, 1.0), (9.223372036854776e18, 1.0), (0.0, 1e300)] {
            let err = h
                .construct("Uint16Array", &[buf.clone(), Value::from(offset), Value::from(length)])
                .unwrap_err();
            assert!(err.contains("invalid length or offset"), "{err}");
        }
        // In range of the ceiling but past the buffer.
        let err = h
            .construct("Uint16Array", &[buf.clone(), Value::from(1e9), Value::from(1.0)])
            .unwrap_err();
        assert!(err.contains("exceeds buffer of 16 bytes"), "{err}");

        assert!(h.construct("Float32Array", &[Value::from(1e300)]).is_err());
        assert!(h.construct("Uint8Array", &[Value::from(4294967296.0)]).is_err());
        assert!(h.construct("ArrayBuffer", &[Value::from(1e300)]).is_err());
        assert!(h.construct("Array", &[Value::from(1e300)]).is_err());
        assert!(h.construct("Array", &[Value::from(4294967295.0)]).is_err());
    }

    #[test]
    fn fetch_is_stubbed() {
        let h = harness();
        let fetch = h.global(&["fetch"]);
        assert!(reflect::apply(&fetch, &Value::Undefined, &[Value::from("https://example.com")])
            .unwrap()
            .is_undefined());
    }
}

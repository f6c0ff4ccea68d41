//! Per-instance host context: the global object and the fault path.

use std::io::{self, Write};
use std::sync::{Arc, Weak};

use super::writer::LineWriter;
use super::{reflect, shim, HostError, HostResult, Value};

pub(crate) struct ContextInner {
    global: Value,
    stdout: LineWriter,
    stderr: LineWriter,
}

/// Handle to one module instance's host environment.
///
/// Cloning is cheap and yields the same environment. Host functions stored in
/// the global object hold a [`WeakHostContext`] instead, so dropping the last
/// `HostContext` frees the whole object graph.
#[derive(Clone)]
pub struct HostContext {
    inner: Arc<ContextInner>,
}

/// Non-owning reference to a [`HostContext`].
#[derive(Clone)]
pub struct WeakHostContext {
    inner: Weak<ContextInner>,
}

impl WeakHostContext {
    pub fn upgrade(&self) -> Option<HostContext> {
        self.inner.upgrade().map(|inner| HostContext { inner })
    }

    /// Like [`upgrade`](Self::upgrade), but as a host fault for use inside
    /// host functions.
    pub(crate) fn require(&self) -> HostResult<HostContext> {
        self.upgrade()
            .ok_or_else(|| HostError::new("host context has been dropped"))
    }
}

/// Configures the output sinks of a [`HostContext`].
pub struct HostContextBuilder {
    stdout: Box<dyn Write + Send>,
    stderr: Box<dyn Write + Send>,
}

impl Default for HostContextBuilder {
    fn default() -> Self {
        Self {
            stdout: Box::new(io::stdout()),
            stderr: Box::new(io::stderr()),
        }
    }
}

impl HostContextBuilder {
    pub fn stdout(mut self, sink: impl Write + Send + 'static) -> Self {
        self.stdout = Box::new(sink);
        self
    }

    pub fn stderr(mut self, sink: impl Write + Send + 'static) -> Self {
        self.stderr = Box::new(sink);
        self
    }

    pub fn build(self) -> HostContext {
        let Self { stdout, stderr } = self;
        let inner = Arc::new_cyclic(|weak| ContextInner {
            global: shim::global_object(WeakHostContext {
                inner: weak.clone(),
            }),
            stdout: LineWriter::new(stdout),
            stderr: LineWriter::new(stderr),
        });
        HostContext { inner }
    }
}

impl Default for HostContext {
    fn default() -> Self {
        Self::new()
    }
}

impl HostContext {
    /// A context writing to the process's stdout and stderr.
    pub fn new() -> Self {
        HostContextBuilder::default().build()
    }

    pub fn builder() -> HostContextBuilder {
        HostContextBuilder::default()
    }

    /// The global object (`globalThis`).
    pub fn global(&self) -> &Value {
        &self.inner.global
    }

    pub fn stdout(&self) -> &LineWriter {
        &self.inner.stdout
    }

    pub fn stderr(&self) -> &LineWriter {
        &self.inner.stderr
    }

    /// Writer for a file descriptor, if the host supports it.
    pub(crate) fn writer_for(&self, fd: i64) -> Option<&LineWriter> {
        match fd {
            1 => Some(&self.inner.stdout),
            2 => Some(&self.inner.stderr),
            _ => None,
        }
    }

    pub fn downgrade(&self) -> WeakHostContext {
        WeakHostContext {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Emit any partial lines still buffered in stdout and stderr.
    pub fn flush(&self) -> io::Result<()> {
        self.inner.stdout.flush()?;
        self.inner.stderr.flush()
    }

    /// Report a violated host contract.
    ///
    /// If the guest installed a `_panic` function on the global object it is
    /// called with the diagnostic and `fault` returns. Otherwise the
    /// diagnostic goes to the log and stderr and the process exits with
    /// status 1.
    pub fn fault(&self, err: &HostError) {
        let handler = reflect::get(&self.inner.global, "_panic").unwrap_or_default();
        if matches!(&handler, Value::Object(o) if o.is_function()) {
            log::debug!("host fault delivered to _panic: {err}");
            match reflect::apply(&handler, &Value::Undefined, &[Value::from(err.to_string())]) {
                Ok(_) => return,
                Err(nested) => log::error!("_panic handler failed: {nested}"),
            }
        }
        log::error!("host fault: {err}");
        let _ = self.flush();
        let _ = self.inner.stderr.write(format!("{err}\n").as_bytes());
        std::process::exit(1);
    }

    /// Run a host-call body, routing a [`HostError`] through [`fault`](Self::fault).
    pub fn call(&self, body: impl FnOnce(&HostContext) -> HostResult<Value>) -> Value {
        match body(self) {
            Ok(value) => value,
            Err(err) => {
                self.fault(&err);
                Value::Undefined
            }
        }
    }
}

//! Line-buffered output sinks behind `fs.write` and `console`.

use std::io::{self, Write};

use parking_lot::Mutex;

/// Line-buffered output sink shared by `fs.write` and `console`.
///
/// Bytes accumulate until a newline arrives; every complete line is forwarded
/// to the sink and flushed. The trailing partial line stays pending until more
/// bytes complete it or [`LineWriter::flush`] is called.
pub struct LineWriter {
    inner: Mutex<Inner>,
}

struct Inner {
    sink: Box<dyn Write + Send>,
    pending: Vec<u8>,
}

impl LineWriter {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                sink,
                pending: Vec::new(),
            }),
        }
    }

    pub fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let mut inner = self.inner.lock();
        inner.pending.extend_from_slice(bytes);
        let Some(last_newline) = inner.pending.iter().rposition(|&b| b == b'\n') else {
            return Ok(());
        };
        let lines: Vec<u8> = inner.pending.drain(..=last_newline).collect();
        inner.sink.write_all(&lines)?;
        inner.sink.flush()
    }

    /// Emit whatever is pending, even without a trailing newline.
    pub fn flush(&self) -> io::Result<()> {
        let mut inner = self.inner.lock();
        let pending = std::mem::take(&mut inner.pending);
        inner.sink.write_all(&pending)?;
        inner.sink.flush()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }
}

impl Drop for LineWriter {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if !inner.pending.is_empty() {
            let _ = inner.sink.write_all(&inner.pending);
            let _ = inner.sink.flush();
        }
    }
}

//! Where task dumps go: stderr, or a buffer published as a report entry.

use crate::report::{ReportError, TestContext, CAPTURE_DUMP, DUMP_ENTRY_KEY};
use async_test_timeout_probes::DiagnosticSnapshot;
use std::io::{self, Write};

/// Where task dumps are written during one invocation.
#[derive(Debug)]
pub enum DumpSink {
    /// Straight to the process's stderr.
    Stderr,
    /// Into memory, published as a report entry when the sink is closed.
    Buffer(Vec<u8>),
}

impl DumpSink {
    /// Buffers when the context sets [`CAPTURE_DUMP`], otherwise stderr.
    pub fn for_context(ctx: &dyn TestContext) -> Self {
        if ctx.configuration_parameter(CAPTURE_DUMP).is_some() {
            DumpSink::Buffer(Vec::new())
        } else {
            DumpSink::Stderr
        }
    }

    /// Returns true if dumps are captured for the report.
    pub fn is_capturing(&self) -> bool {
        matches!(self, DumpSink::Buffer(_))
    }

    /// The bytes captured so far.
    pub fn captured(&self) -> &[u8] {
        match self {
            DumpSink::Buffer(buf) => buf,
            DumpSink::Stderr => &[],
        }
    }

    /// Writes the text dump of a snapshot.
    pub fn write_snapshot(&mut self, snapshot: &DiagnosticSnapshot) -> io::Result<()> {
        snapshot.write_to(self)
    }

    /// Ends the sink, publishing a non-empty buffer under `"dump"`.
    ///
    /// Nothing is published when nothing was captured.
    pub fn close(self, ctx: &mut dyn TestContext) -> Result<(), ReportError> {
        match self {
            DumpSink::Buffer(buf) if !buf.is_empty() => {
                let value = String::from_utf8_lossy(&buf);
                ctx.publish_report_entry(DUMP_ENTRY_KEY, &value)
            }
            _ => Ok(()),
        }
    }
}

impl Write for DumpSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match self {
            DumpSink::Stderr => io::stderr().write(data),
            DumpSink::Buffer(buf) => buf.write(data),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            DumpSink::Stderr => io::stderr().flush(),
            DumpSink::Buffer(_) => Ok(()),
        }
    }
}

//! JSON event output.
//!
//! Every observable state change is written to stdout as exactly one
//! JSON object per line. stdout carries nothing else; diagnostics go
//! to stderr via `tracing`.

use std::io::Write;

use meshchat_types::Event;

/// Writes [`Event`]s to stdout, one JSON object per line.
#[derive(Clone, Copy, Debug, Default)]
pub struct Emitter;

impl Emitter {
    /// Serializes `event` and writes it as a single line.
    ///
    /// The stdout handle is locked for the duration of the write so
    /// concurrent emissions never interleave within a line. Output
    /// errors (closed pipe) are logged, not propagated; losing the
    /// consumer must not crash the node.
    pub fn emit(&self, event: &Event) {
        let line = match render(event) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(%e, "failed to serialize event");
                return;
            }
        };

        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        if let Err(e) = writeln!(handle, "{line}") {
            tracing::warn!(%e, "failed to write event to stdout");
        }
    }
}

/// Serializes an event to its single-line JSON form.
pub fn render(event: &Event) -> serde_json::Result<String> {
    serde_json::to_string(event)
}

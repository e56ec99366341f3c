//! Debug tracing of raw payloads.

/// Receives the last raw request and response when debug tracing is enabled.
///
/// Implementations must not fail the call they are tracing; there is no
/// error channel back to the client.
pub trait TraceLog: Send + Sync {
    fn record(&self, content: &str, label: &str);
}

/// Writes traced payloads through `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTraceLog;

impl TraceLog for TracingTraceLog {
    fn record(&self, content: &str, label: &str) {
        tracing::debug!(target: "mktows_client::trace", "{}: {}", label, content);
    }
}

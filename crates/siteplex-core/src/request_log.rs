//! Per-site request log formatting

use std::time::Duration;

use http::{Method, StatusCode, Uri};

/// One completed request, as seen by the request logging middleware
#[derive(Debug, Clone)]
pub struct RequestLogEntry<'a> {
    pub site: &'a str,
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub status: StatusCode,
    pub latency: Duration,
}

/// Formats access log lines for a site
///
/// Sites may provide their own formatter; the routing layer falls back to
/// a default `tracing` based one.
pub trait RequestLogFormatter: Send + Sync {
    fn log(&self, entry: &RequestLogEntry<'_>);
}

impl<F> RequestLogFormatter for F
where
    F: Fn(&RequestLogEntry<'_>) + Send + Sync,
{
    fn log(&self, entry: &RequestLogEntry<'_>) {
        self(entry)
    }
}

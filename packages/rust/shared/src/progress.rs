//! Progress callbacks for long-running crawl and build operations.

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a document has been fetched or skipped during a crawl.
    fn doc_fetched(&self, title: &str, current: usize, total: usize);
    /// Called when a document has been converted during a build.
    fn doc_converted(&self, path: &str, current: usize, total: usize);
    /// Called when the operation completes.
    fn done(&self);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn doc_fetched(&self, _title: &str, _current: usize, _total: usize) {}
    fn doc_converted(&self, _path: &str, _current: usize, _total: usize) {}
    fn done(&self) {}
}

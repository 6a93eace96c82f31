pub mod database;
pub mod file;

pub use database::DatabaseSink;
pub use file::FileSink;

use async_trait::async_trait;

/// A durable destination for fetched log text.
///
/// `record` must never propagate an error to the caller: a failing sink is a
/// local problem, logged with server context, and polling continues. Sinks
/// are shared across all workers, so implementations synchronize internally.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn record(&self, server: &str, filter: &str, content: &str);

    /// Short name used in log lines ("database", "file").
    fn name(&self) -> &'static str;
}

/// Display form of a filter for sink tagging: the empty (unfiltered) filter
/// records as "all".
pub fn filter_label(filter: &str) -> &str {
    if filter.is_empty() {
        "all"
    } else {
        filter
    }
}

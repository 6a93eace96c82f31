use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use super::{filter_label, LogSink};

/// Append-only file sink with one destination per (server, filter) pair:
/// `<server>_<filter-or-all>_<basename>` in the directory of the configured
/// base path. Server names cannot contain '_' (enforced at config load), so
/// distinct pairs never collide onto the same file.
pub struct FileSink {
    dir: PathBuf,
    basename: String,
}

impl FileSink {
    pub fn new(base_path: &Path) -> Self {
        let dir = match base_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let basename = base_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "rcon.log".to_string());
        Self { dir, basename }
    }

    /// The file a given (server, filter) pair appends to.
    pub fn destination(&self, server: &str, filter: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}_{}", server, filter_label(filter), self.basename))
    }

    fn try_record(&self, server: &str, filter: &str, content: &str) -> std::io::Result<()> {
        let path = self.destination(server, filter);
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        write!(file, "--- Log fetched at {} ---\n{}\n\n", timestamp, content)?;
        Ok(())
    }
}

#[async_trait]
impl LogSink for FileSink {
    async fn record(&self, server: &str, filter: &str, content: &str) {
        if let Err(e) = self.try_record(server, filter, content) {
            warn!(
                server = %server,
                filter = %filter_label(filter),
                path = %self.destination(server, filter).display(),
                error = %e,
                "File append failed"
            );
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rcontail-sink-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_destination_mapping() {
        let sink = FileSink::new(Path::new("/var/log/rcon.log"));
        assert_eq!(
            sink.destination("alpha", "KILL"),
            PathBuf::from("/var/log/alpha_KILL_rcon.log")
        );
        assert_eq!(
            sink.destination("alpha", ""),
            PathBuf::from("/var/log/alpha_all_rcon.log")
        );
    }

    #[test]
    fn test_bare_basename_maps_into_current_dir() {
        let sink = FileSink::new(Path::new("rcon.log"));
        assert_eq!(
            sink.destination("alpha", "CHAT"),
            PathBuf::from("./alpha_CHAT_rcon.log")
        );
    }

    #[test]
    fn test_distinct_pairs_get_distinct_destinations() {
        let sink = FileSink::new(Path::new("out.log"));
        let pairs = [("a", "x"), ("a", "y"), ("b", "x"), ("a", ""), ("b", "")];
        let mut seen = std::collections::HashSet::new();
        for (server, filter) in pairs {
            assert!(seen.insert(sink.destination(server, filter)));
        }
    }

    #[tokio::test]
    async fn test_record_appends_timestamped_entries() {
        let dir = temp_dir();
        let sink = FileSink::new(&dir.join("rcon.log"));

        sink.record("alpha", "KILL", "first batch").await;
        sink.record("alpha", "KILL", "second batch").await;

        let content = std::fs::read_to_string(sink.destination("alpha", "KILL")).unwrap();
        let first = content.find("first batch").unwrap();
        let second = content.find("second batch").unwrap();
        assert!(first < second, "entries out of order");
        assert_eq!(content.matches("--- Log fetched at ").count(), 2);
        assert!(content.ends_with("\n\n"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_record_failure_does_not_panic_or_stick() {
        let missing = std::env::temp_dir()
            .join(format!("rcontail-absent-{}", uuid::Uuid::new_v4()))
            .join("rcon.log");
        let sink = FileSink::new(&missing);

        // Directory does not exist: both appends fail, neither propagates.
        sink.record("alpha", "", "lost").await;
        sink.record("alpha", "", "also lost").await;
    }
}

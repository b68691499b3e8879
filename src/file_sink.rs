use crate::config::FileConfig;
use crate::error::SinkError;
use crate::format::format_line;
use crate::record::LogRecord;
use crate::sink::LogSink;
use async_trait::async_trait;
use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, OnceLock, PoisonError};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// Appends rendered records to a file, rotating it once it grows past a
/// size limit.
///
/// Backups follow the `path`, `path.1`, ..., `path.N` convention, `path.1`
/// being the most recent. The size check, the rotation and the append run
/// under one lock shared by every `FileSink` in the process that points at
/// the same path. The file is opened for each write and closed before
/// `write` returns, so external tools may move or delete it at any time.
pub struct FileSink {
    path: PathBuf,
    max_bytes: u64,
    max_backups: u32,
    lock: Arc<Mutex<()>>,
}

impl FileSink {
    /// **Parameters**
    /// - `path`: target file; parent directories are created on first write.
    /// - `max_size_kb`: rotate once the file is larger than this many KiB.
    /// - `max_backups`: number of numbered backups to keep; `0` discards the
    ///   full file instead of keeping a backup.
    pub fn new(path: impl Into<PathBuf>, max_size_kb: u64, max_backups: u32) -> Self {
        let path = path.into();
        let lock = path_lock(&path);
        FileSink {
            path,
            max_bytes: max_size_kb.saturating_mul(1024),
            max_backups,
            lock,
        }
    }

    pub fn from_config(config: &FileConfig) -> Self {
        Self::new(&config.path, config.max_size_kb, config.max_backup_files)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the `index`-th backup (`path.index`).
    pub fn backup_path(&self, index: u32) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    async fn exceeds_limit(&self) -> bool {
        match fs::metadata(&self.path).await {
            Ok(meta) => meta.len() > self.max_bytes,
            Err(_) => false,
        }
    }

    async fn rotate(&self) -> io::Result<()> {
        if self.max_backups == 0 {
            return ignore_missing(fs::remove_file(&self.path).await);
        }

        ignore_missing(fs::remove_file(self.backup_path(self.max_backups)).await)?;
        for index in (1..self.max_backups).rev() {
            ignore_missing(fs::rename(self.backup_path(index), self.backup_path(index + 1)).await)?;
        }
        fs::rename(&self.path, self.backup_path(1)).await
    }

    async fn append(&self, line: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        file.write_all(buf.as_bytes()).await?;
        file.flush().await
    }
}

#[async_trait]
impl LogSink for FileSink {
    async fn write(&self, record: &LogRecord) -> Result<(), SinkError> {
        let line = format_line(record);

        let _guard = self.lock.lock().await;
        if self.exceeds_limit().await {
            if let Err(e) = self.rotate().await {
                debug!(path = %self.path.display(), error = %e, "log file rotation failed, appending to current file");
            }
        }
        self.append(&line).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

fn ignore_missing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Process-wide lock for a file path, shared by every sink writing to it.
fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<StdMutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

    let key = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|dir| dir.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut locks = LOCKS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(key).or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogLevel;
    use tempfile::tempdir;

    fn record(message: String) -> LogRecord {
        LogRecord::new(LogLevel::Information, "Tests.File", message)
    }

    async fn read(path: &Path) -> String {
        fs::read_to_string(path).await.unwrap_or_default()
    }

    #[tokio::test]
    async fn appends_lines_and_creates_parent_dirs() {
        let dir = tempdir().expect("tempdir");
        let sink = FileSink::new(dir.path().join("nested/app.log"), 1024, 5);

        sink.write(&record("first".into())).await.expect("write");
        sink.write(&record("second".into())).await.expect("write");

        let content = read(sink.path()).await;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("Tests.File[0]: first"));
        assert!(lines[1].ends_with("Tests.File[0]: second"));
        assert!(content.ends_with('\n'));
    }

    #[tokio::test]
    async fn rotation_keeps_configured_backups_and_evicts_oldest() {
        let dir = tempdir().expect("tempdir");
        let sink = FileSink::new(dir.path().join("app.log"), 1, 2);
        let padding = "x".repeat(600);

        // Two ~650 byte lines push the file over 1 KiB, so writes 3, 5 and 7
        // each rotate first.
        for i in 1..=7 {
            sink.write(&record(format!("msg-{i} {padding}"))).await.expect("write");
        }

        let current = read(sink.path()).await;
        let first = read(&sink.backup_path(1)).await;
        let second = read(&sink.backup_path(2)).await;

        assert!(current.contains("msg-7"));
        assert!(first.contains("msg-5") && first.contains("msg-6"));
        assert!(second.contains("msg-3") && second.contains("msg-4"));
        assert!(!sink.backup_path(3).exists());

        let all = format!("{current}{first}{second}");
        assert!(!all.contains("msg-1 "));
        assert!(!all.contains("msg-2 "));
    }

    #[tokio::test]
    async fn zero_backups_discards_full_file() {
        let dir = tempdir().expect("tempdir");
        let sink = FileSink::new(dir.path().join("app.log"), 1, 0);
        let padding = "y".repeat(1100);

        sink.write(&record(format!("old {padding}"))).await.expect("write");
        sink.write(&record("new".into())).await.expect("write");

        let current = read(sink.path()).await;
        assert!(!current.contains("old"));
        assert!(current.contains("new"));
        assert!(!sink.backup_path(1).exists());
    }

    #[tokio::test]
    async fn failed_rotation_still_appends() {
        let dir = tempdir().expect("tempdir");
        let sink = FileSink::new(dir.path().join("app.log"), 1, 1);

        // A non-empty directory squatting on `app.log.1` makes rotation fail.
        let blocker = sink.backup_path(1);
        std::fs::create_dir(&blocker).expect("mkdir");
        std::fs::write(blocker.join("keep"), b"x").expect("write blocker");

        let padding = "z".repeat(1100);
        sink.write(&record(format!("before {padding}"))).await.expect("write");
        sink.write(&record("after".into())).await.expect("write");

        let current = read(sink.path()).await;
        assert!(current.contains("before"));
        assert!(current.contains("after"));
    }

    #[tokio::test]
    async fn unwritable_path_reports_error() {
        let dir = tempdir().expect("tempdir");
        let not_a_dir = dir.path().join("plain-file");
        std::fs::write(&not_a_dir, b"").expect("write");

        let sink = FileSink::new(not_a_dir.join("app.log"), 1024, 5);
        assert!(matches!(
            sink.write(&record("lost".into())).await,
            Err(SinkError::Io(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_never_interleave_or_lose_lines() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("shared.log");
        let sinks = [
            Arc::new(FileSink::new(&path, 1, 200)),
            Arc::new(FileSink::new(&path, 1, 200)),
        ];

        let mut handles = Vec::new();
        for task in 0..8 {
            let sink = Arc::clone(&sinks[task % 2]);
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    sink.write(&record(format!("task-{task} line-{i} end")))
                        .await
                        .expect("write");
                }
            }));
        }
        for handle in handles {
            handle.await.expect("join");
        }

        let mut total = 0;
        let mut files = vec![path.clone()];
        files.extend((1..=200).map(|i| sinks[0].backup_path(i)));
        for file in files {
            for line in read(&file).await.lines() {
                assert!(line.ends_with(" end"), "corrupted line: {line}");
                total += 1;
            }
        }
        assert_eq!(total, 400);
    }
}

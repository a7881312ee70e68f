//! Hybrid size+time rotating file sink: the piece
//! `tracing-subscriber`'s built-in `fmt` layer doesn't provide on its own.
use chrono::{Datelike, Local, NaiveDate};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPolicy {
    Daily,
    Weekly,
    Monthly,
}

impl RotationPolicy {
    fn due(&self, opened_on: NaiveDate, today: NaiveDate) -> bool {
        match self {
            RotationPolicy::Daily => today > opened_on,
            RotationPolicy::Weekly => (today - opened_on).num_days() >= 7,
            RotationPolicy::Monthly => {
                today.year() != opened_on.year() || today.month() != opened_on.month()
            }
        }
    }
}

/// A single rotating log file. Not `Sync` — owned exclusively by the
/// background worker task so only one writer ever touches it.
pub struct RotatingSink {
    path: PathBuf,
    max_bytes: u64,
    policy: RotationPolicy,
    backup_count: usize,
    file: File,
    current_bytes: u64,
    opened_on: NaiveDate,
}

impl RotatingSink {
    pub fn new(
        path: impl Into<PathBuf>,
        max_bytes: u64,
        policy: RotationPolicy,
        backup_count: usize,
        retention_days: u32,
    ) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        cleanup_old_logs(&path, retention_days)?;

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let current_bytes = file.metadata()?.len();
        Ok(Self {
            path,
            max_bytes,
            policy,
            backup_count,
            file,
            current_bytes,
            opened_on: Local::now().date_naive(),
        })
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.maybe_rotate()?;
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.current_bytes += line.len() as u64 + 1;
        Ok(())
    }

    fn maybe_rotate(&mut self) -> io::Result<()> {
        let today = Local::now().date_naive();
        if self.current_bytes >= self.max_bytes || self.policy.due(self.opened_on, today) {
            self.rotate()?;
        }
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let rotated = self.dated_path();
        if self.path.exists() {
            fs::rename(&self.path, &rotated)?;
        }
        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.current_bytes = 0;
        self.opened_on = Local::now().date_naive();
        self.enforce_backup_count()?;
        Ok(())
    }

    fn dated_path(&self) -> PathBuf {
        let suffix = Local::now().format("%Y-%m-%d").to_string();
        let stem = self.path.file_stem().and_then(|s| s.to_str()).unwrap_or("app");
        let name = match self.path.extension().and_then(|s| s.to_str()) {
            Some(ext) => format!("{stem}.{suffix}.{ext}"),
            None => format!("{stem}.{suffix}"),
        };
        self.path.with_file_name(name)
    }

    fn enforce_backup_count(&self) -> io::Result<()> {
        let Some(dir) = self.path.parent() else {
            return Ok(());
        };
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("app")
            .to_string();
        let prefix = format!("{stem}.");

        let mut rotated: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| {
                p.file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.starts_with(&prefix))
                    .unwrap_or(false)
            })
            .collect();
        rotated.sort();

        while rotated.len() > self.backup_count {
            let oldest = rotated.remove(0);
            let _ = fs::remove_file(oldest);
        }
        Ok(())
    }
}

fn cleanup_old_logs(path: &Path, retention_days: u32) -> io::Result<()> {
    let Some(dir) = path.parent() else {
        return Ok(());
    };
    if !dir.exists() {
        return Ok(());
    }
    let cutoff = SystemTime::now()
        .checked_sub(Duration::from_secs(retention_days as u64 * 86_400))
        .unwrap_or(SystemTime::UNIX_EPOCH);

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let Ok(metadata) = entry.metadata() else { continue };
        let Ok(modified) = metadata.modified() else { continue };
        if modified < cutoff {
            let _ = fs::remove_file(entry.path());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    /// A fresh scratch directory under the OS temp dir, removed on drop.
    struct ScratchDir(PathBuf);

    impl ScratchDir {
        fn new() -> Self {
            let n = COUNTER.fetch_add(1, Ordering::Relaxed);
            let dir = std::env::temp_dir().join(format!("wbe-logging-test-{}-{n}", std::process::id()));
            fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }

        fn path(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for ScratchDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn rotates_on_size_threshold() {
        let dir = ScratchDir::new();
        let path = dir.path().join("app.log");
        let mut sink = RotatingSink::new(&path, 10, RotationPolicy::Monthly, 5, 90).unwrap();
        sink.write_line("0123456789").unwrap();
        sink.write_line("triggers rotation").unwrap();

        let rotated_count = fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with("app.")
            })
            .count();
        assert!(rotated_count >= 1);
    }

    #[test]
    fn enforces_backup_count() {
        let dir = ScratchDir::new();
        let path = dir.path().join("app.log");
        for day in 1..=5 {
            let rotated = dir.path().join(format!("app.2026-01-0{day}.log"));
            File::create(&rotated).unwrap();
        }
        let sink = RotatingSink::new(&path, 1_000_000, RotationPolicy::Daily, 2, 90).unwrap();
        sink.enforce_backup_count().unwrap();

        let remaining: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("app.2026"))
            .collect();
        assert_eq!(remaining.len(), 2);
    }
}

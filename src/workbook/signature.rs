use std::path::Path;

/// `"<mtime_ns>:<size_bytes>"` of the workbook file. Any change to either
/// component invalidates every cache keyed on it.
pub fn excel_signature(path: impl AsRef<Path>) -> std::io::Result<String> {
    let meta = std::fs::metadata(path.as_ref())?;
    let modified = meta.modified()?;
    let mtime_ns = modified
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    Ok(format!("{mtime_ns}:{}", meta.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn signature_changes_when_file_content_changes() {
        let mut file = tempfile_for_test();
        write!(file, "abc").unwrap();
        file.flush().unwrap();
        let path = file.path().to_path_buf();
        let sig1 = excel_signature(&path).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        let mut file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        write!(file, "abcdef").unwrap();
        file.flush().unwrap();
        let sig2 = excel_signature(&path).unwrap();

        assert_ne!(sig1, sig2);
    }

    #[test]
    fn missing_file_errors() {
        assert!(excel_signature("/nonexistent/path/workbook.xlsx").is_err());
    }

    fn tempfile_for_test() -> std::fs::File {
        let dir = std::env::temp_dir();
        let path = dir.join(format!(
            "wbe-sig-test-{}.tmp",
            std::process::id()
        ));
        std::fs::File::create(path).unwrap()
    }
}

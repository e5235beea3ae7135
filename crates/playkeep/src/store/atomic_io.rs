use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Replaces `path` with `text` through a synced sibling staging file. A reader racing the write
/// sees either the previous records or the new ones, never a prefix.
pub(crate) fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    let staging = staging_path(path);
    let result = write_synced(&staging, text).and_then(|()| fs::rename(&staging, path));
    if result.is_err() {
        let _ = fs::remove_file(&staging);
    }
    result
}

fn write_synced(path: &Path, text: &str) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(text.as_bytes())?;
    file.sync_all()
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("playkeep"));
    name.push(format!(".{}.staging", std::process::id()));
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn creates_parents_and_replaces_previous_contents() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("nested").join("transform_diffs.json");

        write_text_atomic(&path, "first").expect("first write");
        write_text_atomic(&path, "second").expect("second write");

        assert_eq!(fs::read_to_string(&path).expect("read"), "second");
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn failed_rename_cleans_up_the_staging_file() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("occupied");
        fs::create_dir(&path).expect("dir in the way");
        fs::write(path.join("keep"), "x").expect("non-empty dir");

        assert!(write_text_atomic(&path, "records").is_err());
        assert!(!staging_path(&path).exists());
    }
}

//! Durable JSON-backed stores.
//!
//! Both the key table and the resource-strategy settings persist as single
//! JSON files replaced atomically on every mutation: the new contents are
//! fully written to a temporary file in the same directory, then renamed
//! over the previous file. A failed write never touches the previously
//! durable state, and readers never observe a partially written file.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;

/// API key table with its admin master key
pub mod keys;
/// Resource-strategy settings store
pub mod settings;

pub use keys::KeyStore;
pub use settings::SettingsStore;

/// Serialize `value` and atomically replace the file at `path` with it.
///
/// The temporary file lives in the target's directory so the final rename
/// stays on one filesystem.
///
/// # Errors
///
/// Returns an error if the directory cannot be created, the temporary file
/// cannot be written, or the rename fails. The previous file at `path` is
/// left intact in every failure case.
pub(crate) fn replace_json_file<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let bytes = serde_json::to_vec_pretty(value)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);

    fs::write(tmp, &bytes)?;
    fs::rename(tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replace_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state.json");

        replace_json_file(&path, &json!({"a": 1})).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"a\""));
    }

    #[test]
    fn replace_leaves_no_temporary_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        replace_json_file(&path, &json!({"a": 1})).unwrap();
        replace_json_file(&path, &json!({"a": 2})).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("state.json")]);
    }
}

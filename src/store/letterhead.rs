// Letterhead blob store: <root>/<name>_letterhead.pdf, versioned by content hash
//
// Writes go to a temporary file that is renamed over the final path, so a
// concurrent reader sees either the old or the new file, never a partial one.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;

use super::version::compute_version;
use crate::error::DocMergeError;

const FILE_SUFFIX: &str = "_letterhead.pdf";
const MAX_NAME_LEN: usize = 64;

/// Condition a write or delete must satisfy against the stored version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// Unconditional.
    None,
    /// The stored version must equal this tag.
    Matches(String),
    /// Nothing may be stored under the name yet.
    Absent,
}

/// A stored letterhead and its version.
#[derive(Debug, Clone)]
pub struct Letterhead {
    pub bytes: Vec<u8>,
    pub version: String,
}

/// Metadata of a stored letterhead, as reported by `GET /api/letterhead`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LetterheadInfo {
    pub name: String,
    pub size: u64,
    pub version: String,
    /// File name relative to the store root.
    pub path: String,
}

/// Named, versioned letterhead storage on the local file system.
#[derive(Debug)]
pub struct LetterheadStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

/// Names are `[A-Za-z0-9_-]{1,64}`; anything else could escape the root.
fn validate_name(name: &str) -> crate::error::Result<()> {
    let ok = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(DocMergeError::store(format!("invalid letterhead name: '{}'", name)))
    }
}

fn check_precondition(current: Option<&str>, precondition: &Precondition) -> crate::error::Result<()> {
    match (precondition, current) {
        (Precondition::None, _) => Ok(()),
        (Precondition::Matches(expected), Some(actual)) if expected == actual => Ok(()),
        (Precondition::Matches(expected), Some(actual)) => Err(DocMergeError::version_conflict(
            format!("expected version {expected}, stored version is {actual}"),
        )),
        (Precondition::Matches(expected), None) => Err(DocMergeError::version_conflict(format!(
            "expected version {expected}, nothing is stored"
        ))),
        (Precondition::Absent, None) => Ok(()),
        (Precondition::Absent, Some(actual)) => Err(DocMergeError::version_conflict(format!(
            "a letterhead already exists (version {actual})"
        ))),
    }
}

/// Read a file, mapping "not found" to `None`.
fn read_optional(path: &Path) -> crate::error::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DocMergeError::store(format!("{}: {e}", path.display()))),
    }
}

impl LetterheadStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn file_name(name: &str) -> String {
        format!("{name}{FILE_SUFFIX}")
    }

    fn file_path(&self, name: &str) -> crate::error::Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(Self::file_name(name)))
    }

    fn info_for(name: &str, bytes: &[u8]) -> LetterheadInfo {
        LetterheadInfo {
            name: name.to_string(),
            size: bytes.len() as u64,
            version: compute_version(bytes),
            path: Self::file_name(name),
        }
    }

    /// Store `bytes` under `name`, replacing any previous letterhead.
    pub fn put(
        &self,
        name: &str,
        bytes: &[u8],
        precondition: &Precondition,
    ) -> crate::error::Result<LetterheadInfo> {
        let path = self.file_path(name)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let current = read_optional(&path)?.map(|b| compute_version(&b));
        check_precondition(current.as_deref(), precondition)?;

        fs::create_dir_all(&self.root).map_err(|e| DocMergeError::store(e.to_string()))?;
        let tmp_path = path.with_extension("pdf.tmp");
        fs::write(&tmp_path, bytes).map_err(|e| DocMergeError::store(e.to_string()))?;
        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(DocMergeError::store(e.to_string()));
        }

        Ok(Self::info_for(name, bytes))
    }

    /// Fetch the letterhead stored under `name`.
    pub fn get(&self, name: &str) -> crate::error::Result<Option<Letterhead>> {
        let path = self.file_path(name)?;
        Ok(read_optional(&path)?.map(|bytes| {
            let version = compute_version(&bytes);
            Letterhead { bytes, version }
        }))
    }

    pub fn info(&self, name: &str) -> crate::error::Result<Option<LetterheadInfo>> {
        let path = self.file_path(name)?;
        Ok(read_optional(&path)?.map(|bytes| Self::info_for(name, &bytes)))
    }

    /// Remove the letterhead stored under `name`. Returns `false` if there was none.
    pub fn delete(&self, name: &str, precondition: &Precondition) -> crate::error::Result<bool> {
        let path = self.file_path(name)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let current = read_optional(&path)?.map(|b| compute_version(&b));
        check_precondition(current.as_deref(), precondition)?;
        if current.is_none() {
            return Ok(false);
        }

        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DocMergeError::store(e.to_string())),
        }
    }
}

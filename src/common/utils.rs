use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

const FALLBACK_FILE_NAME: &str = "object";

/// Decodes an S3 event key: `+` stands for a space, everything else is percent-encoded.
pub fn decode_object_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    let bytes = urlencoding::decode_binary(spaced.as_bytes());
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Last path segment of a key, used to name the local copy.
pub fn file_name_for(key: &str) -> &str {
    match key.rsplit('/').next() {
        Some(name) if !name.is_empty() && name != "." && name != ".." => name,
        _ => FALLBACK_FILE_NAME,
    }
}

/// Local copy of an object, removed together with its directory on drop.
#[derive(Debug)]
pub struct ScratchFile {
    dir: TempDir,
    path: PathBuf,
}

impl ScratchFile {
    pub fn create(root: &Path, key: &str) -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("scan-").tempdir_in(root)?;
        let path = dir.path().join(file_name_for(key));

        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

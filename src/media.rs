use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::AppError;

/// Filesystem facts about one media file, captured once when the file is
/// reached in the walk.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub path: PathBuf,
    /// Lower-cased, without the dot.
    pub extension: Option<String>,
    /// None where the platform or filesystem does not record a birth time.
    pub created: Option<SystemTime>,
    pub modified: SystemTime,
    pub accessed: Option<SystemTime>,
}

impl MediaFile {
    pub fn snapshot(path: &Path) -> Result<Self, AppError> {
        let metadata = std::fs::metadata(path)?;
        let modified = metadata.modified()?;
        let created = match metadata.created() {
            Ok(t) => Some(t),
            Err(e) => {
                log::trace!("No creation time for {:?}: {}", path, e);
                None
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            extension: path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase()),
            created,
            modified,
            accessed: metadata.accessed().ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_lowercases_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("IMG_0001.JPG");
        std::fs::write(&path, b"x").unwrap();

        let file = MediaFile::snapshot(&path).unwrap();
        assert_eq!(file.extension.as_deref(), Some("jpg"));
        assert_eq!(file.path, path);
    }

    #[test]
    fn snapshot_of_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MediaFile::snapshot(&dir.path().join("nope.png")).is_err());
    }
}

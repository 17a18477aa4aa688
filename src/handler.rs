use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::date::ResolvedDate;
use crate::error::AppError;
use crate::media::MediaFile;

/// Where originals go when a write replaces the file instead of patching it.
#[derive(Debug, Clone)]
pub struct WriteContext {
    pub media_root: PathBuf,
    pub backup_dir: PathBuf,
    pub preserve_mtime: bool,
}

impl WriteContext {
    /// Mirrors the file's position under the media root.
    pub fn backup_path(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.media_root) {
            Ok(rel) => self.backup_dir.join(rel),
            Err(_) => self
                .backup_dir
                .join(path.file_name().unwrap_or(path.as_os_str())),
        }
    }

    pub fn move_to_backup(&self, path: &Path) -> Result<PathBuf, AppError> {
        let dest = self.backup_path(path);
        if dest.exists() {
            return Err(AppError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("backup {:?} already exists", dest),
            )));
        }
        if let Some(parent) = dest.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
                log::debug!("Created backup directory: {:?}", parent);
            }
        }
        std::fs::rename(path, &dest)?;
        log::debug!("Moved {:?} to {:?}", path, dest);
        Ok(dest)
    }
}

/// Reads and writes the capture-date field of one container format.
pub trait MetadataHandler: Sync {
    /// Human-readable name of the field, used in log lines.
    fn field(&self) -> &'static str;

    /// The existing capture date as stored, or None when absent or blank.
    fn capture_date(&self, path: &Path) -> Result<Option<String>, AppError>;

    /// Everything a write would fail on, checked without touching the file.
    /// Returns the file that will hold the date, which differs from the
    /// source only for formats that are converted.
    fn check(
        &self,
        file: &MediaFile,
        _date: &ResolvedDate,
        _ctx: &WriteContext,
    ) -> Result<PathBuf, AppError> {
        ensure_writable(&file.path)?;
        Ok(file.path.clone())
    }

    fn write_capture_date(
        &self,
        file: &MediaFile,
        date: &ResolvedDate,
        ctx: &WriteContext,
    ) -> Result<PathBuf, AppError>;
}

/// Read-only files are reported, not replaced behind the owner's back.
pub fn ensure_writable(path: &Path) -> Result<(), AppError> {
    if std::fs::metadata(path)?.permissions().readonly() {
        return Err(AppError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            format!("{:?} is read-only", path),
        )));
    }
    Ok(())
}

/// Writes `bytes` to a temporary file beside `path` and renames it over the
/// original, so a failed write never leaves a truncated file behind.
pub fn replace_contents(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    ensure_writable(path)?;
    let permissions = std::fs::metadata(path)?.permissions();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    std::fs::set_permissions(tmp.path(), permissions)?;
    tmp.persist(path).map_err(|e| AppError::Io(e.error))?;
    Ok(())
}

/// True for values that carry no date: EXIF's blank filler, all zeros, NULs.
pub fn is_blank_date(value: &str) -> bool {
    value
        .chars()
        .all(|c| matches!(c, ' ' | ':' | '-' | '0' | '\0'))
}

use std::fmt;
use std::io::ErrorKind;

use exif::Error as ExifError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Walkdir error: {0}")]
    Walkdir(#[from] walkdir::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("EXIF error: {0}")]
    Exif(#[from] ExifError),

    #[error("MP4 error: {0}")]
    Mp4(#[from] mp4::Error),

    #[error("Corrupt container: {0}")]
    Corrupt(String),

    #[error("Unsupported format: {0}")]
    Unsupported(String),

    #[error("Invalid media directory: {0}")]
    InvalidMediaDir(String),
}

/// How a per-file error is reported in the run log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    Unreadable,
    CorruptContainer,
    PermissionDenied,
    Conflict,
    Unsupported,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::Unreadable => "unreadable file",
            FailureReason::CorruptContainer => "corrupt metadata container",
            FailureReason::PermissionDenied => "permission denied",
            FailureReason::Conflict => "target already exists",
            FailureReason::Unsupported => "unsupported format",
        };
        f.write_str(s)
    }
}

impl AppError {
    pub fn reason(&self) -> FailureReason {
        match self {
            AppError::Io(e) if e.kind() == ErrorKind::PermissionDenied => {
                FailureReason::PermissionDenied
            }
            AppError::Io(e) if e.kind() == ErrorKind::AlreadyExists => FailureReason::Conflict,
            AppError::Walkdir(e)
                if e.io_error().map(|io| io.kind()) == Some(ErrorKind::PermissionDenied) =>
            {
                FailureReason::PermissionDenied
            }
            AppError::Io(_) | AppError::Walkdir(_) | AppError::Config(_) => {
                FailureReason::Unreadable
            }
            AppError::InvalidMediaDir(_) => FailureReason::Unreadable,
            AppError::Unsupported(_) => FailureReason::Unsupported,
            AppError::Image(image::ImageError::IoError(e))
                if e.kind() == ErrorKind::PermissionDenied =>
            {
                FailureReason::PermissionDenied
            }
            AppError::Exif(ExifError::Io(e)) if e.kind() == ErrorKind::PermissionDenied => {
                FailureReason::PermissionDenied
            }
            AppError::Image(_) | AppError::Exif(_) | AppError::Mp4(_) | AppError::Corrupt(_) => {
                FailureReason::CorruptContainer
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_errors_are_reported_as_such() {
        let err = AppError::Io(std::io::Error::new(ErrorKind::PermissionDenied, "ro"));
        assert_eq!(err.reason(), FailureReason::PermissionDenied);
    }

    #[test]
    fn other_io_errors_are_unreadable() {
        let err = AppError::Io(std::io::Error::new(ErrorKind::NotFound, "gone"));
        assert_eq!(err.reason(), FailureReason::Unreadable);
    }

    #[test]
    fn existing_targets_are_conflicts() {
        let err = AppError::Io(std::io::Error::new(ErrorKind::AlreadyExists, "scan_bmp.png"));
        assert_eq!(err.reason(), FailureReason::Conflict);
        assert_eq!(err.reason().to_string(), "target already exists");
    }

    #[test]
    fn container_errors_are_corrupt() {
        let err = AppError::Corrupt("truncated box".into());
        assert_eq!(err.reason(), FailureReason::CorruptContainer);
        assert_eq!(err.reason().to_string(), "corrupt metadata container");
    }
}

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use sha2::{Digest, Sha256};

use crate::date::ResolvedDate;
use crate::error::AppError;
use crate::handler::{MetadataHandler, WriteContext};
use crate::handlers::png;
use crate::media::MediaFile;

/// BMP carries no metadata. The bitmap is converted to a lossless PNG next
/// to it, the PNG receives the date, and the original moves to the backup
/// directory.
pub struct BmpHandler;

impl MetadataHandler for BmpHandler {
    fn field(&self) -> &'static str {
        "PNG text \"Creation Time\""
    }

    fn capture_date(&self, _path: &Path) -> Result<Option<String>, AppError> {
        Ok(None)
    }

    fn check(
        &self,
        file: &MediaFile,
        _date: &ResolvedDate,
        ctx: &WriteContext,
    ) -> Result<PathBuf, AppError> {
        let target = converted_path(&file.path);
        if target.exists() {
            return Err(conflict(format!("conversion target {:?} already exists", target)));
        }
        let backup = ctx.backup_path(&file.path);
        if backup.exists() {
            return Err(conflict(format!("backup {:?} already exists", backup)));
        }
        image::image_dimensions(&file.path)?;
        Ok(target)
    }

    fn write_capture_date(
        &self,
        file: &MediaFile,
        date: &ResolvedDate,
        ctx: &WriteContext,
    ) -> Result<PathBuf, AppError> {
        let target = self.check(file, date, ctx)?;

        let bitmap = image::open(&file.path)?;
        let result = convert(&bitmap, &target, date).and_then(|_| ctx.move_to_backup(&file.path));
        if let Err(e) = result {
            if let Err(cleanup) = std::fs::remove_file(&target) {
                log::debug!("Could not remove partial {:?}: {}", target, cleanup);
            }
            return Err(e);
        }

        log::debug!("Converted {:?} to {:?}", file.path, target);
        Ok(target)
    }
}

fn conflict(msg: String) -> AppError {
    AppError::Io(std::io::Error::new(std::io::ErrorKind::AlreadyExists, msg))
}

fn convert(bitmap: &DynamicImage, target: &Path, date: &ResolvedDate) -> Result<(), AppError> {
    bitmap.save_with_format(target, ImageFormat::Png)?;

    let converted = image::open(target)?;
    if pixel_digest(bitmap) != pixel_digest(&converted) {
        return Err(AppError::Corrupt(format!(
            "pixel data of {:?} differs from the bitmap",
            target
        )));
    }

    png::write_text_date(target, date)
}

/// `<stem>_bmp.png` beside the original, so a `photo.bmp` never clobbers a
/// `photo.png`.
pub fn converted_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}_bmp.png", stem))
}

fn pixel_digest(img: &DynamicImage) -> String {
    let rgba = img.to_rgba8();
    let mut hasher = Sha256::new();
    hasher.update(rgba.width().to_be_bytes());
    hasher.update(rgba.height().to_be_bytes());
    hasher.update(rgba.as_raw());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::date;
    use crate::handlers::png::PngHandler;

    pub(crate) fn write_plain_bmp(path: &Path) {
        let img = image::RgbImage::from_fn(5, 3, |x, y| image::Rgb([x as u8 * 50, 200, y as u8 * 70]));
        img.save(path).unwrap();
    }

    fn ctx(root: &Path) -> WriteContext {
        WriteContext {
            media_root: root.to_path_buf(),
            backup_dir: root.join("backup_original"),
            preserve_mtime: false,
        }
    }

    #[test]
    fn converted_name_keeps_stem() {
        assert_eq!(
            converted_path(Path::new("/m/scan 01.BMP")),
            PathBuf::from("/m/scan 01_bmp.png")
        );
    }

    #[test]
    fn bitmap_is_converted_dated_and_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.bmp");
        write_plain_bmp(&path);
        let original = image::open(&path).unwrap();

        let file = MediaFile::snapshot(&path).unwrap();
        let date = date::parse_exif("2015:11:30 21:00:00").unwrap();
        let target = BmpHandler.write_capture_date(&file, &date, &ctx(dir.path())).unwrap();

        assert_eq!(target, dir.path().join("scan_bmp.png"));
        assert!(!path.exists());
        assert!(dir.path().join("backup_original").join("scan.bmp").exists());
        assert_eq!(pixel_digest(&image::open(&target).unwrap()), pixel_digest(&original));

        let stored = PngHandler.capture_date(&target).unwrap().unwrap();
        assert_eq!(date::parse_exif(&stored), Some(date));
    }

    #[test]
    fn existing_target_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.bmp");
        write_plain_bmp(&path);
        std::fs::write(dir.path().join("scan_bmp.png"), b"keep me").unwrap();

        let file = MediaFile::snapshot(&path).unwrap();
        let date = date::parse_exif("2015:11:30 21:00:00").unwrap();
        let err = BmpHandler.check(&file, &date, &ctx(dir.path())).unwrap_err();
        assert_eq!(err.reason(), crate::error::FailureReason::Conflict);
        assert!(BmpHandler.write_capture_date(&file, &date, &ctx(dir.path())).is_err());
        assert!(path.exists());
        assert_eq!(std::fs::read(dir.path().join("scan_bmp.png")).unwrap(), b"keep me");
    }
}

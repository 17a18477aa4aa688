use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::{Path, PathBuf};

use exif::experimental::Writer;
use exif::{Exif, Field, In, Reader, Tag, Value};
use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};

use crate::date::ResolvedDate;
use crate::error::AppError;
use crate::handler::{ensure_writable, is_blank_date, replace_contents, MetadataHandler, WriteContext};
use crate::media::MediaFile;

pub struct JpegHandler;

impl MetadataHandler for JpegHandler {
    fn field(&self) -> &'static str {
        "EXIF DateTimeOriginal"
    }

    fn capture_date(&self, path: &Path) -> Result<Option<String>, AppError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        match Reader::new().read_from_container(&mut reader) {
            Ok(exif) => Ok(exif
                .get_field(Tag::DateTimeOriginal, In::PRIMARY)
                .and_then(|field| ascii_value(&field.value))),
            Err(exif::Error::NotFound(_)) => {
                log::trace!("No EXIF segment in {:?}", path);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn check(
        &self,
        file: &MediaFile,
        date: &ResolvedDate,
        _ctx: &WriteContext,
    ) -> Result<PathBuf, AppError> {
        ensure_writable(&file.path)?;
        let jpeg = load(&file.path)?;
        build_exif(jpeg.exif().as_deref(), date)?;
        Ok(file.path.clone())
    }

    fn write_capture_date(
        &self,
        file: &MediaFile,
        date: &ResolvedDate,
        _ctx: &WriteContext,
    ) -> Result<PathBuf, AppError> {
        let mut jpeg = load(&file.path)?;
        let tiff = build_exif(jpeg.exif().as_deref(), date)?;
        jpeg.set_exif(Some(Bytes::from(tiff)));

        // Only the APP1 segment differs; scan data is copied through untouched.
        let output = jpeg.encoder().bytes();
        replace_contents(&file.path, &output)?;
        log::debug!("Set DateTimeOriginal={} on {:?}", date.exif_string(), file.path);
        Ok(file.path.clone())
    }
}

fn load(path: &Path) -> Result<Jpeg, AppError> {
    let bytes = std::fs::read(path)?;
    Jpeg::from_bytes(Bytes::from(bytes)).map_err(|e| AppError::Corrupt(format!("JPEG structure: {}", e)))
}

/// TIFF structure for the APP1 segment: every existing field of the main and
/// thumbnail IFDs plus the new `DateTimeOriginal`. IFD pointers and
/// thumbnail offsets are regenerated by the writer.
fn build_exif(existing: Option<&[u8]>, date: &ResolvedDate) -> Result<Vec<u8>, AppError> {
    let parsed = existing
        .map(|raw| Reader::new().read_raw(raw.to_vec()))
        .transpose()
        .map_err(|e| AppError::Corrupt(format!("existing EXIF: {}", e)))?;
    let dated = Field {
        tag: Tag::DateTimeOriginal,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![date.exif_string().into_bytes()]),
    };

    let mut writer = Writer::new();
    let mut little_endian = false;
    if let Some(exif) = &parsed {
        little_endian = exif.little_endian();
        for field in exif.fields() {
            if field.tag == Tag::DateTimeOriginal || field.ifd_num.index() > 1 {
                continue;
            }
            writer.push_field(field);
        }
        if let Some(thumbnail) = thumbnail(exif) {
            writer.set_jpeg(thumbnail, In::THUMBNAIL);
        }
    }
    writer.push_field(&dated);

    let mut out = Cursor::new(Vec::new());
    writer
        .write(&mut out, little_endian)
        .map_err(|e| AppError::Corrupt(format!("EXIF could not be rebuilt: {}", e)))?;
    Ok(out.into_inner())
}

fn thumbnail(exif: &Exif) -> Option<&[u8]> {
    let offset = exif
        .get_field(Tag::JPEGInterchangeFormat, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    let len = exif
        .get_field(Tag::JPEGInterchangeFormatLength, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    exif.buf().get(offset..offset.checked_add(len)?)
}

fn ascii_value(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => parts
            .iter()
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .find(|s| !is_blank_date(s)),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::date;

    pub(crate) fn write_plain_jpeg(path: &Path) {
        let img = image::RgbImage::from_fn(8, 8, |x, y| image::Rgb([(x * 30) as u8, (y * 30) as u8, 90]));
        img.save(path).unwrap();
    }

    fn ctx(root: &Path) -> WriteContext {
        WriteContext {
            media_root: root.to_path_buf(),
            backup_dir: root.join("backup_original"),
            preserve_mtime: false,
        }
    }

    fn scan_data(path: &Path) -> Vec<u8> {
        let jpeg = Jpeg::from_bytes(Bytes::from(std::fs::read(path).unwrap())).unwrap();
        jpeg.segments()
            .iter()
            .filter(|s| s.marker() != 0xE1)
            .flat_map(|s| s.contents().to_vec())
            .collect()
    }

    #[test]
    fn plain_jpeg_has_no_capture_date() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.jpg");
        write_plain_jpeg(&path);

        assert_eq!(JpegHandler.capture_date(&path).unwrap(), None);
    }

    fn with_exif(path: &Path, fields: &[Field]) {
        let mut writer = Writer::new();
        for field in fields {
            writer.push_field(field);
        }
        let mut tiff = Cursor::new(Vec::new());
        writer.write(&mut tiff, false).unwrap();

        let mut jpeg = load(path).unwrap();
        jpeg.set_exif(Some(Bytes::from(tiff.into_inner())));
        std::fs::write(path, jpeg.encoder().bytes()).unwrap();
    }

    fn ascii(tag: Tag, text: &str) -> Field {
        Field {
            tag,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![text.as_bytes().to_vec()]),
        }
    }

    #[test]
    fn written_date_reads_back_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        write_plain_jpeg(&path);
        let before = scan_data(&path);

        let file = MediaFile::snapshot(&path).unwrap();
        let date = date::parse_exif("2024:01:03 08:00:00").unwrap();
        JpegHandler.write_capture_date(&file, &date, &ctx(dir.path())).unwrap();

        let stored = JpegHandler.capture_date(&path).unwrap().unwrap();
        assert_eq!(stored, "2024:01:03 08:00:00");
        assert_eq!(date::parse_exif(&stored), Some(date));
        assert_eq!(scan_data(&path), before);
        assert!(image::open(&path).is_ok());
    }

    #[test]
    fn existing_tags_survive_and_blank_date_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera.jpg");
        write_plain_jpeg(&path);
        with_exif(
            &path,
            &[
                ascii(Tag::Make, "Acme"),
                ascii(Tag::DateTimeOriginal, "    :  :     :  :  "),
            ],
        );
        assert_eq!(JpegHandler.capture_date(&path).unwrap(), None);

        let file = MediaFile::snapshot(&path).unwrap();
        let date = date::parse_exif("2011:11:11 11:11:11").unwrap();
        JpegHandler.write_capture_date(&file, &date, &ctx(dir.path())).unwrap();

        let exif = Reader::new()
            .read_from_container(&mut BufReader::new(File::open(&path).unwrap()))
            .unwrap();
        let make = exif.get_field(Tag::Make, In::PRIMARY).unwrap();
        assert_eq!(ascii_value(&make.value).as_deref(), Some("Acme"));
        let originals = exif
            .fields()
            .filter(|f| f.tag == Tag::DateTimeOriginal)
            .count();
        assert_eq!(originals, 1);
        assert_eq!(
            JpegHandler.capture_date(&path).unwrap().as_deref(),
            Some("2011:11:11 11:11:11")
        );
    }

    #[test]
    fn unparseable_exif_fails_the_check_and_keeps_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.jpg");
        write_plain_jpeg(&path);
        let mut jpeg = load(&path).unwrap();
        jpeg.set_exif(Some(Bytes::from_static(b"II*\0\xff\xff\xff\x7fjunk")));
        std::fs::write(&path, jpeg.encoder().bytes()).unwrap();
        let before = std::fs::read(&path).unwrap();

        let file = MediaFile::snapshot(&path).unwrap();
        let date = date::parse_exif("2011:11:11 11:11:11").unwrap();
        let err = JpegHandler.check(&file, &date, &ctx(dir.path())).unwrap_err();
        assert_eq!(err.reason(), crate::error::FailureReason::CorruptContainer);
        assert!(JpegHandler.write_capture_date(&file, &date, &ctx(dir.path())).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn not_a_jpeg_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        assert!(JpegHandler.capture_date(&path).is_err());
    }
}

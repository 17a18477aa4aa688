pub mod bmp;
pub mod gif;
pub mod jpeg;
pub mod mp4;
pub mod png;

use std::path::PathBuf;

use filetime::FileTime;

use crate::date::ResolvedDate;
use crate::error::AppError;
use crate::format::{FormatKind, Raster};
use crate::handler::{MetadataHandler, WriteContext};
use crate::media::MediaFile;

static JPEG: jpeg::JpegHandler = jpeg::JpegHandler;
static PNG: png::PngHandler = png::PngHandler;
static BMP: bmp::BmpHandler = bmp::BmpHandler;
static GIF: gif::GifHandler = gif::GifHandler;
static MP4: mp4::Mp4Handler = mp4::Mp4Handler;

pub fn handler_for(kind: FormatKind) -> Option<&'static dyn MetadataHandler> {
    match kind {
        FormatKind::Jpeg => Some(&JPEG),
        FormatKind::Raster(Raster::Png) => Some(&PNG),
        FormatKind::Raster(Raster::Bmp) => Some(&BMP),
        FormatKind::Gif => Some(&GIF),
        FormatKind::Mp4 => Some(&MP4),
        FormatKind::Unsupported => None,
    }
}

fn require(file: &MediaFile, kind: FormatKind) -> Result<&'static dyn MetadataHandler, AppError> {
    handler_for(kind).ok_or_else(|| AppError::Unsupported(format!("{:?}", file.path)))
}

/// The existing, non-blank capture date of the file.
pub fn existing_capture_date(file: &MediaFile, kind: FormatKind) -> Result<Option<String>, AppError> {
    require(file, kind)?.capture_date(&file.path)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Dry run: nothing touched.
    Planned { target: PathBuf, field: &'static str },
    Written { target: PathBuf, field: &'static str },
}

pub fn write(
    file: &MediaFile,
    kind: FormatKind,
    date: &ResolvedDate,
    dry_run: bool,
    ctx: &WriteContext,
) -> Result<WriteOutcome, AppError> {
    let handler = require(file, kind)?;
    let field = handler.field();

    // Checked in both modes.
    let target = handler.check(file, date, ctx)?;
    if dry_run {
        return Ok(WriteOutcome::Planned { target, field });
    }

    let target = handler.write_capture_date(file, date, ctx)?;
    if ctx.preserve_mtime {
        let mtime = FileTime::from_system_time(file.modified);
        let atime = file.accessed.map(FileTime::from_system_time).unwrap_or(mtime);
        if let Err(e) = filetime::set_file_times(&target, atime, mtime) {
            log::warn!("Could not restore modification time of {:?}: {}", target, e);
        }
    }
    Ok(WriteOutcome::Written { target, field })
}

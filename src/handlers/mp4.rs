use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::date::ResolvedDate;
use crate::error::AppError;
use crate::handler::{ensure_writable, MetadataHandler, WriteContext};
use crate::media::MediaFile;

/// "Media created" lives in the movie header. Track and media headers carry
/// their own creation time, and a file only counts as dated when all of
/// them are set.
pub struct Mp4Handler;

impl MetadataHandler for Mp4Handler {
    fn field(&self) -> &'static str {
        "MP4 mvhd/tkhd/mdhd creation_time"
    }

    fn capture_date(&self, path: &Path) -> Result<Option<String>, AppError> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        let mp4 = mp4::Mp4Reader::read_header(BufReader::new(file), size)?;

        let movie = mp4.moov.mvhd.creation_time;
        let tracks_dated = mp4
            .moov
            .traks
            .iter()
            .all(|t| t.tkhd.creation_time != 0 && t.mdia.mdhd.creation_time != 0);
        if movie == 0 || !tracks_dated {
            log::trace!("Undated header in {:?} (mvhd={})", path, movie);
            return Ok(None);
        }

        Ok(Some(
            ResolvedDate::from_mp4_seconds(movie)
                .map(|d| d.to_string())
                .unwrap_or_else(|| movie.to_string()),
        ))
    }

    fn check(
        &self,
        file: &MediaFile,
        date: &ResolvedDate,
        _ctx: &WriteContext,
    ) -> Result<PathBuf, AppError> {
        ensure_writable(&file.path)?;
        plan(&mut File::open(&file.path)?, date)?;
        Ok(file.path.clone())
    }

    fn write_capture_date(
        &self,
        file: &MediaFile,
        date: &ResolvedDate,
        _ctx: &WriteContext,
    ) -> Result<PathBuf, AppError> {
        ensure_writable(&file.path)?;
        let mut handle = OpenOptions::new().read(true).write(true).open(&file.path)?;
        let patches = plan(&mut handle, date)?;

        // Each patch overwrites a fixed-width field; the file never changes length.
        for (offset, value) in &patches {
            handle.seek(SeekFrom::Start(*offset))?;
            handle.write_all(value)?;
        }
        handle.flush()?;

        log::debug!("Patched {} creation_time field(s) in {:?}", patches.len(), file.path);
        Ok(file.path.clone())
    }
}

/// Offsets and encoded values of every zero `creation_time`.
fn plan<R: Read + Seek>(reader: &mut R, date: &ResolvedDate) -> Result<Vec<(u64, Vec<u8>)>, AppError> {
    let seconds = date
        .mp4_seconds()
        .ok_or_else(|| AppError::Corrupt(format!("{} predates the MP4 epoch", date)))?;

    let fields = locate_time_fields(reader)?;
    if !fields.iter().any(|f| f.kind == *b"mvhd") {
        return Err(AppError::Corrupt("MP4 without movie header".into()));
    }

    fields
        .iter()
        .filter(|f| f.current == 0)
        .map(|field| {
            let value = if field.wide {
                seconds.to_be_bytes().to_vec()
            } else {
                u32::try_from(seconds)
                    .map_err(|_| {
                        AppError::Corrupt(format!(
                            "{} does not fit a version 0 {} box",
                            date,
                            kind_name(&field.kind)
                        ))
                    })?
                    .to_be_bytes()
                    .to_vec()
            };
            Ok::<_, AppError>((field.offset, value))
        })
        .collect()
}

/// A `creation_time` inside a full box header.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TimeField {
    kind: [u8; 4],
    /// Absolute file offset of the value.
    offset: u64,
    /// Version 1 boxes store 64-bit times.
    wide: bool,
    current: u64,
}

fn kind_name(kind: &[u8; 4]) -> String {
    String::from_utf8_lossy(kind).into_owned()
}

fn corrupt(msg: &str) -> AppError {
    AppError::Corrupt(format!("MP4: {}", msg))
}

/// Size, type and header length of the box at the start of `header`.
/// `remaining` bounds boxes whose size field is 0 (extends to the end).
fn parse_header(header: &[u8], remaining: u64) -> Result<(u64, [u8; 4], u64), AppError> {
    if header.len() < 8 {
        return Err(corrupt("truncated box header"));
    }
    let size32 = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    let kind = [header[4], header[5], header[6], header[7]];

    let (size, header_len) = match size32 {
        0 => (remaining, 8),
        1 => {
            let ext = header.get(8..16).ok_or_else(|| corrupt("truncated 64-bit box size"))?;
            let mut large = [0u8; 8];
            large.copy_from_slice(ext);
            (u64::from_be_bytes(large), 16)
        }
        n => (n as u64, 8),
    };
    if size < header_len || size > remaining {
        return Err(corrupt(&format!("bad size {} for box {}", size, kind_name(&kind))));
    }
    Ok((size, kind, header_len))
}

/// Walks the top level by seeking past payloads, so `mdat` is never read.
fn locate_time_fields<R: Read + Seek>(reader: &mut R) -> Result<Vec<TimeField>, AppError> {
    let total = reader.seek(SeekFrom::End(0))?;
    let mut fields = Vec::new();
    let mut pos = 0u64;

    while pos + 8 <= total {
        reader.seek(SeekFrom::Start(pos))?;
        let mut header = [0u8; 16];
        let available = (total - pos).min(16) as usize;
        reader.read_exact(&mut header[..available])?;
        let (size, kind, header_len) = parse_header(&header[..available], total - pos)?;

        if &kind == b"moov" {
            let mut body = vec![0u8; (size - header_len) as usize];
            reader.seek(SeekFrom::Start(pos + header_len))?;
            reader.read_exact(&mut body)?;
            walk(&body, pos + header_len, &mut fields)?;
        }
        pos += size;
    }
    Ok(fields)
}

fn walk(buf: &[u8], base: u64, fields: &mut Vec<TimeField>) -> Result<(), AppError> {
    let mut pos = 0usize;
    while pos + 8 <= buf.len() {
        let (size, kind, header_len) = parse_header(&buf[pos..], (buf.len() - pos) as u64)?;
        let body_start = pos + header_len as usize;
        let end = pos + size as usize;
        let body = &buf[body_start..end];

        match &kind {
            b"trak" | b"mdia" => walk(body, base + body_start as u64, fields)?,
            b"mvhd" | b"tkhd" | b"mdhd" => {
                let version = *body.first().ok_or_else(|| corrupt("empty full box"))?;
                let wide = version == 1;
                let width = if wide { 8 } else { 4 };
                let raw = body
                    .get(4..4 + width)
                    .ok_or_else(|| corrupt(&format!("truncated {} box", kind_name(&kind))))?;
                let current = raw.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64);
                fields.push(TimeField {
                    kind,
                    offset: base + body_start as u64 + 4,
                    wide,
                    current,
                });
            }
            _ => {}
        }
        pos = end;
    }
    Ok(())
}

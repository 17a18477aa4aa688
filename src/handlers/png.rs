use std::path::{Path, PathBuf};

use img_parts::png::{Png, PngChunk};
use img_parts::Bytes;

use crate::date::ResolvedDate;
use crate::error::AppError;
use crate::handler::{ensure_writable, is_blank_date, replace_contents, MetadataHandler, WriteContext};
use crate::media::MediaFile;

/// Keyword Windows shows as "Date taken".
pub const CREATION_TIME: &str = "Creation Time";
/// Keyword read by photo libraries that ignore `Creation Time`.
pub const DATE_TIME_ORIGINAL: &str = "Date Time Original";

const TEXT: [u8; 4] = *b"tEXt";
const ZTXT: [u8; 4] = *b"zTXt";
const ITXT: [u8; 4] = *b"iTXt";
const IEND: [u8; 4] = *b"IEND";

pub struct PngHandler;

impl MetadataHandler for PngHandler {
    fn field(&self) -> &'static str {
        "PNG text \"Creation Time\""
    }

    fn capture_date(&self, path: &Path) -> Result<Option<String>, AppError> {
        let png = load(path)?;
        Ok(text_value(&png, CREATION_TIME))
    }

    fn check(
        &self,
        file: &MediaFile,
        date: &ResolvedDate,
        _ctx: &WriteContext,
    ) -> Result<PathBuf, AppError> {
        ensure_writable(&file.path)?;
        dated(&file.path, date)?;
        Ok(file.path.clone())
    }

    fn write_capture_date(
        &self,
        file: &MediaFile,
        date: &ResolvedDate,
        _ctx: &WriteContext,
    ) -> Result<PathBuf, AppError> {
        write_text_date(&file.path, date)?;
        Ok(file.path.clone())
    }
}

/// Inserts the date text chunks before `IEND`. Image data chunks are copied
/// through as they are.
pub fn write_text_date(path: &Path, date: &ResolvedDate) -> Result<(), AppError> {
    let png = dated(path, date)?;
    replace_contents(path, &png.encoder().bytes())?;
    log::debug!("Set PNG \"{}\"={} on {:?}", CREATION_TIME, date.exif_string(), path);
    Ok(())
}

fn dated(path: &Path, date: &ResolvedDate) -> Result<Png, AppError> {
    let mut png = load(path)?;
    let value = date.exif_string();
    let has_original = text_value(&png, DATE_TIME_ORIGINAL).is_some();

    let iend = png
        .chunks()
        .iter()
        .position(|c| c.kind() == IEND)
        .ok_or_else(|| AppError::Corrupt("PNG without IEND chunk".into()))?;

    let chunks = png.chunks_mut();
    if !has_original {
        chunks.insert(iend, text_chunk(DATE_TIME_ORIGINAL, &value));
    }
    chunks.insert(iend, text_chunk(CREATION_TIME, &value));
    Ok(png)
}

fn load(path: &Path) -> Result<Png, AppError> {
    let bytes = std::fs::read(path)?;
    Png::from_bytes(Bytes::from(bytes)).map_err(|e| AppError::Corrupt(format!("PNG structure: {}", e)))
}

fn text_chunk(keyword: &str, value: &str) -> PngChunk {
    let mut contents = Vec::with_capacity(keyword.len() + 1 + value.len());
    contents.extend_from_slice(keyword.as_bytes());
    contents.push(0);
    contents.extend_from_slice(value.as_bytes());
    PngChunk::new(TEXT, Bytes::from(contents))
}

fn text_value(png: &Png, keyword: &str) -> Option<String> {
    png.chunks()
        .iter()
        .filter_map(text_entry)
        .find(|(k, v)| k == keyword && !is_blank_date(v))
        .map(|(_, v)| v)
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Keyword and value of a text chunk. Compressed values are not inflated;
/// a non-empty payload is reported as `<compressed>`.
fn text_entry(chunk: &PngChunk) -> Option<(String, String)> {
    let data = chunk.contents();
    let nul = data.iter().position(|&b| b == 0)?;
    let keyword = latin1(&data[..nul]);
    let rest = &data[nul + 1..];

    let value = match chunk.kind() {
        TEXT => latin1(rest),
        ZTXT => compressed_marker(rest.get(1..).unwrap_or_default()),
        ITXT => {
            let compressed = *rest.first()? != 0;
            let rest = rest.get(2..)?;
            let lang_end = rest.iter().position(|&b| b == 0)?;
            let rest = &rest[lang_end + 1..];
            let translated_end = rest.iter().position(|&b| b == 0)?;
            let text = &rest[translated_end + 1..];
            if compressed {
                compressed_marker(text)
            } else {
                String::from_utf8_lossy(text).into_owned()
            }
        }
        _ => return None,
    };
    Some((keyword, value))
}

fn compressed_marker(payload: &[u8]) -> String {
    if payload.is_empty() {
        String::new()
    } else {
        "<compressed>".to_string()
    }
}

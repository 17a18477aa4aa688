use std::path::{Path, PathBuf};

use crate::date::ResolvedDate;
use crate::error::AppError;
use crate::handler::{ensure_writable, is_blank_date, replace_contents, MetadataHandler, WriteContext};
use crate::media::MediaFile;

const XMP_APP_ID: &[u8; 11] = b"XMP DataXMP";
const EXIF_NS: &str = "http://ns.adobe.com/exif/1.0/";
const RDF_CLOSE: &str = "</rdf:RDF>";
/// Magic trailer that lets sub-block readers skip raw XMP text: 0x01,
/// 0xFF down to 0x00, then the block terminator.
const TRAILER_LEN: usize = 258;

/// GIF has no native date. The date goes into an XMP packet carried by the
/// `XMP DataXMP` application extension, as `exif:DateTimeOriginal`.
pub struct GifHandler;

impl MetadataHandler for GifHandler {
    fn field(&self) -> &'static str {
        "XMP exif:DateTimeOriginal"
    }

    fn capture_date(&self, path: &Path) -> Result<Option<String>, AppError> {
        let bytes = std::fs::read(path)?;
        let layout = scan(&bytes)?;
        Ok(layout.xmp.and_then(|x| date_in_packet(&x.packet)))
    }

    fn check(
        &self,
        file: &MediaFile,
        date: &ResolvedDate,
        _ctx: &WriteContext,
    ) -> Result<PathBuf, AppError> {
        ensure_writable(&file.path)?;
        rewritten(&std::fs::read(&file.path)?, date)?;
        Ok(file.path.clone())
    }

    fn write_capture_date(
        &self,
        file: &MediaFile,
        date: &ResolvedDate,
        _ctx: &WriteContext,
    ) -> Result<PathBuf, AppError> {
        let out = rewritten(&std::fs::read(&file.path)?, date)?;
        replace_contents(&file.path, &out)?;
        log::debug!("Set XMP DateTimeOriginal={} on {:?}", date.iso_string(), file.path);
        Ok(file.path.clone())
    }
}

/// The file with the dated XMP extension in place of, or ahead of, the
/// first block after the global color table.
fn rewritten(bytes: &[u8], date: &ResolvedDate) -> Result<Vec<u8>, AppError> {
    let layout = scan(bytes)?;

    let mut out = Vec::with_capacity(bytes.len() + 1024);
    match layout.xmp {
        None => {
            out.extend_from_slice(&bytes[..layout.header_end]);
            out.extend_from_slice(&xmp_extension(&new_packet(date)));
            out.extend_from_slice(&bytes[layout.header_end..]);
        }
        Some(block) => {
            let merged = merge_packet(&block.packet, date)?;
            out.extend_from_slice(&bytes[..block.start]);
            out.extend_from_slice(&xmp_extension(&merged));
            out.extend_from_slice(&bytes[block.end..]);
        }
    }
    // Extensions need the 89a header.
    if out.starts_with(b"GIF87a") {
        out[..6].copy_from_slice(b"GIF89a");
    }
    Ok(out)
}

#[derive(Debug)]
struct XmpBlock {
    /// Offset of the 0x21 introducer.
    start: usize,
    /// Offset just past the block terminator.
    end: usize,
    packet: String,
}

#[derive(Debug)]
struct GifLayout {
    /// End of header, screen descriptor and global color table.
    header_end: usize,
    xmp: Option<XmpBlock>,
}

fn corrupt(msg: &str) -> AppError {
    AppError::Corrupt(format!("GIF: {}", msg))
}

fn color_table_len(packed: u8) -> usize {
    if packed & 0x80 != 0 {
        3 * (1 << ((packed & 0x07) + 1))
    } else {
        0
    }
}

fn skip_sub_blocks(bytes: &[u8], mut pos: usize) -> Result<usize, AppError> {
    loop {
        let len = *bytes.get(pos).ok_or_else(|| corrupt("truncated data sub-blocks"))? as usize;
        pos += 1;
        if len == 0 {
            return Ok(pos);
        }
        pos += len;
    }
}

fn scan(bytes: &[u8]) -> Result<GifLayout, AppError> {
    if bytes.len() < 13 || !(bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a")) {
        return Err(corrupt("missing GIF header"));
    }
    let header_end = 13 + color_table_len(bytes[10]);
    let mut pos = header_end;

    loop {
        match bytes.get(pos) {
            Some(0x21) => {
                let label = *bytes.get(pos + 1).ok_or_else(|| corrupt("truncated extension"))?;
                let data = pos + 2;
                let end = skip_sub_blocks(bytes, data)?;
                let is_xmp = label == 0xFF
                    && bytes.get(data) == Some(&11)
                    && bytes.get(data + 1..data + 12) == Some(&XMP_APP_ID[..]);
                if is_xmp {
                    let raw = &bytes[data + 12..end];
                    if raw.len() < TRAILER_LEN || raw[raw.len() - TRAILER_LEN..] != magic_trailer()[..] {
                        return Err(corrupt("XMP extension without magic trailer"));
                    }
                    let packet = String::from_utf8_lossy(&raw[..raw.len() - TRAILER_LEN]).into_owned();
                    return Ok(GifLayout {
                        header_end,
                        xmp: Some(XmpBlock { start: pos, end, packet }),
                    });
                }
                pos = end;
            }
            Some(0x2C) => {
                let descriptor = bytes.get(pos + 1..pos + 10).ok_or_else(|| corrupt("truncated image descriptor"))?;
                pos += 10 + color_table_len(descriptor[8]);
                // LZW minimum code size precedes the image data.
                pos = skip_sub_blocks(bytes, pos + 1)?;
            }
            Some(0x3B) => return Ok(GifLayout { header_end, xmp: None }),
            Some(other) => {
                return Err(corrupt(&format!("unexpected block 0x{:02x} at offset {}", other, pos)))
            }
            None => return Err(corrupt("missing trailer")),
        }
    }
}

fn magic_trailer() -> Vec<u8> {
    let mut trailer = Vec::with_capacity(TRAILER_LEN);
    trailer.push(0x01);
    trailer.extend((0..=0xFFu8).rev());
    trailer.push(0x00);
    trailer
}

fn xmp_extension(packet: &str) -> Vec<u8> {
    let mut ext = Vec::with_capacity(14 + packet.len() + TRAILER_LEN);
    ext.extend_from_slice(&[0x21, 0xFF, 0x0B]);
    ext.extend_from_slice(XMP_APP_ID);
    ext.extend_from_slice(packet.as_bytes());
    ext.extend_from_slice(&magic_trailer());
    ext
}

fn description(date: &ResolvedDate) -> String {
    format!(
        "<rdf:Description rdf:about=\"\" xmlns:exif=\"{}\" exif:DateTimeOriginal=\"{}\"/>",
        EXIF_NS,
        date.iso_string()
    )
}

fn new_packet(date: &ResolvedDate) -> String {
    format!(
        "<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\
         <x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\
         <rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\
         {}{}</x:xmpmeta><?xpacket end=\"w\"?>",
        description(date),
        RDF_CLOSE
    )
}

/// Adds a separate `rdf:Description` so existing properties stay as written.
fn merge_packet(packet: &str, date: &ResolvedDate) -> Result<String, AppError> {
    let at = packet
        .rfind(RDF_CLOSE)
        .ok_or_else(|| corrupt("XMP packet without rdf:RDF"))?;
    let mut merged = String::with_capacity(packet.len() + 160);
    merged.push_str(&packet[..at]);
    merged.push_str(&description(date));
    merged.push_str(&packet[at..]);
    Ok(merged)
}

/// Handles both the attribute and the element form of the property.
fn date_in_packet(packet: &str) -> Option<String> {
    packet.match_indices("DateTimeOriginal").find_map(|(i, m)| {
        let rest = &packet[i + m.len()..];
        let value = if let Some(attr) = rest.strip_prefix('=') {
            let quote = attr.chars().next().filter(|c| *c == '"' || *c == '\'')?;
            let body = &attr[1..];
            &body[..body.find(quote)?]
        } else if let Some(elem) = rest.strip_prefix('>') {
            &elem[..elem.find('<')?]
        } else {
            return None;
        };
        let value = value.trim();
        (!is_blank_date(value)).then(|| value.to_string())
    })
}

use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Raster {
    Png,
    /// Has no metadata field; converted to PNG before writing.
    Bmp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Jpeg,
    Raster(Raster),
    Gif,
    Mp4,
    Unsupported,
}

impl FormatKind {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => FormatKind::Jpeg,
            "png" => FormatKind::Raster(Raster::Png),
            "bmp" => FormatKind::Raster(Raster::Bmp),
            "gif" => FormatKind::Gif,
            "mp4" | "m4v" => FormatKind::Mp4,
            _ => FormatKind::Unsupported,
        }
    }

    pub fn classify(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(FormatKind::Unsupported)
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FormatKind::Jpeg => "JPEG",
            FormatKind::Raster(Raster::Png) => "PNG",
            FormatKind::Raster(Raster::Bmp) => "BMP",
            FormatKind::Gif => "GIF",
            FormatKind::Mp4 => "MP4",
            FormatKind::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

/// Containers that already record a capture date on their own. They are
/// skipped like any other unsupported file, only the log wording differs.
pub fn carries_native_date(ext: &str) -> bool {
    matches!(
        ext.to_ascii_lowercase().as_str(),
        "mov" | "tif" | "tiff" | "heic" | "webp"
    )
}

use std::collections::BTreeMap;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::AppError;
use crate::format::{self, FormatKind};

const NO_EXTENSION: &str = "(none)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixStat {
    pub extension: String,
    pub count: usize,
}

/// Distinct lower-cased extensions under `dir` with how often each occurs.
pub fn collect(dir: &Path) -> Result<Vec<SuffixStat>, AppError> {
    if !dir.is_dir() {
        return Err(AppError::InvalidMediaDir(format!("{:?} is not a directory", dir)));
    }

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = entry
            .path()
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| NO_EXTENSION.to_string());
        *counts.entry(ext).or_insert(0) += 1;
    }

    Ok(counts
        .into_iter()
        .map(|(extension, count)| SuffixStat { extension, count })
        .collect())
}

fn status(ext: &str) -> &'static str {
    if ext == NO_EXTENSION {
        "unsupported"
    } else if FormatKind::from_extension(ext) != FormatKind::Unsupported {
        "handled"
    } else if format::carries_native_date(ext) {
        "native date"
    } else {
        "unsupported"
    }
}

pub fn render(stat: &SuffixStat) -> String {
    let mime = if stat.extension == NO_EXTENSION {
        None
    } else {
        mime_guess::from_ext(&stat.extension).first()
    };
    let mime = mime
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<10} {:>6}  {:<28} {}",
        stat.extension,
        stat.count,
        mime,
        status(&stat.extension)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn counts_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.JPG"), b"x").unwrap();
        fs::write(dir.path().join("sub").join("b.jpg"), b"x").unwrap();
        fs::write(dir.path().join("c.mov"), b"x").unwrap();
        fs::write(dir.path().join("README"), b"x").unwrap();

        let stats = collect(dir.path()).unwrap();
        assert_eq!(
            stats,
            vec![
                SuffixStat { extension: "(none)".into(), count: 1 },
                SuffixStat { extension: "jpg".into(), count: 2 },
                SuffixStat { extension: "mov".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn rendered_lines_carry_mime_and_status() {
        let jpg = render(&SuffixStat { extension: "jpg".into(), count: 2 });
        assert!(jpg.contains("image/jpeg"), "{}", jpg);
        assert!(jpg.ends_with("handled"));

        let mov = render(&SuffixStat { extension: "mov".into(), count: 1 });
        assert!(mov.ends_with("native date"), "{}", mov);

        let none = render(&SuffixStat { extension: "(none)".into(), count: 1 });
        assert!(none.ends_with("unsupported"));
    }

    #[test]
    fn not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect(&dir.path().join("missing")).is_err());
    }
}

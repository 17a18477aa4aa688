use crate::error::AppError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every regular file under `root`, sorted by name within each directory.
/// The backup directory is never entered. Any walk error aborts discovery.
pub fn discover(root: &Path, backup_dir: &Path, follow_links: bool) -> Result<Vec<PathBuf>, AppError> {
    log::info!("Starting file discovery in {:?}", root);
    log::debug!("Following symlinks: {}", follow_links);

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(follow_links)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.path() != backup_dir);

    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() {
            log::trace!("Discovered file: {:?}", entry.path());
            files.push(entry.into_path());
        } else {
            log::trace!("Skipping non-file entry: {:?}", entry.path());
        }
    }

    log::info!("File discovery complete: {} files.", files.len());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn sorted_and_skips_backup() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("b_sub")).unwrap();
        fs::create_dir_all(root.join("backup_original")).unwrap();
        fs::write(root.join("c.jpg"), b"x").unwrap();
        fs::write(root.join("a.png"), b"x").unwrap();
        fs::write(root.join("b_sub").join("z.gif"), b"x").unwrap();
        fs::write(root.join("backup_original").join("old.bmp"), b"x").unwrap();

        let files = discover(root, &root.join("backup_original"), false).unwrap();
        assert_eq!(
            files,
            vec![
                root.join("a.png"),
                root.join("b_sub").join("z.gif"),
                root.join("c.jpg"),
            ]
        );
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("absent");
        assert!(discover(&root, &root.join("backup_original"), false).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_followed_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("media");
        let outside = dir.path().join("outside");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("far.jpg"), b"x").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        let backup = root.join("backup_original");
        assert!(discover(&root, &backup, false).unwrap().is_empty());
        assert_eq!(
            discover(&root, &backup, true).unwrap(),
            vec![root.join("link").join("far.jpg")]
        );
    }
}

use std::path::{Path, PathBuf};

use crate::config::AppConfig;
use crate::date;
use crate::error::AppError;
use crate::format::{self, FormatKind};
use crate::handler::WriteContext;
use crate::handlers::{self, WriteOutcome};
use crate::media::MediaFile;
use crate::report::{Outcome, Reporter};
use crate::walker;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub media_dir: PathBuf,
    pub real_run: bool,
    pub backup_dir_name: String,
    pub follow_links: bool,
    pub preserve_mtime: bool,
}

impl RunOptions {
    pub fn new(media_dir: PathBuf, real_run: bool, config: &AppConfig) -> Self {
        Self {
            media_dir,
            real_run,
            backup_dir_name: config.backup_dir_name.clone(),
            follow_links: config.follow_links,
            preserve_mtime: config.preserve_mtime,
        }
    }

    fn write_context(&self) -> WriteContext {
        WriteContext {
            media_root: self.media_dir.clone(),
            backup_dir: self.media_dir.join(&self.backup_dir_name),
            preserve_mtime: self.preserve_mtime,
        }
    }
}

/// Processes every file under the media directory once. Only an invalid
/// media directory or a failed walk ends the run early; per-file problems
/// are recorded and the batch carries on.
pub fn run(opts: &RunOptions, reporter: &mut Reporter) -> Result<(), AppError> {
    if !opts.media_dir.is_dir() {
        return Err(AppError::InvalidMediaDir(format!(
            "{:?} is not a directory",
            opts.media_dir
        )));
    }

    let ctx = opts.write_context();
    // Listed up front so files produced during the run are not revisited.
    let files = walker::discover(&opts.media_dir, &ctx.backup_dir, opts.follow_links)?;

    for path in files {
        log::trace!("Processing {:?}", path);
        let outcome = process_file(&path, &ctx, opts.real_run);
        reporter.record(&path, outcome);
    }
    Ok(())
}

pub fn process_file(path: &Path, ctx: &WriteContext, real_run: bool) -> Outcome {
    let kind = FormatKind::classify(path);
    if kind == FormatKind::Unsupported {
        let native_date = path
            .extension()
            .and_then(|e| e.to_str())
            .map(format::carries_native_date)
            .unwrap_or(false);
        return Outcome::Unsupported { native_date };
    }

    let file = match MediaFile::snapshot(path) {
        Ok(file) => file,
        Err(e) => return unreadable(e),
    };

    match handlers::existing_capture_date(&file, kind) {
        Ok(Some(value)) => return Outcome::AlreadyDated { value },
        Ok(None) => log::trace!(
            "{:?} ({} .{}) has no capture date",
            path,
            kind,
            file.extension.as_deref().unwrap_or_default()
        ),
        Err(e) => return unreadable(e),
    }

    let date = date::resolve(&file);
    match handlers::write(&file, kind, &date, !real_run, ctx) {
        Ok(WriteOutcome::Planned { target, field }) => Outcome::WouldWrite { date, field, target },
        Ok(WriteOutcome::Written { target, field }) => Outcome::Written { date, field, target },
        Err(e) => Outcome::Failed {
            reason: e.reason(),
            detail: e.to_string(),
        },
    }
}

fn unreadable(e: AppError) -> Outcome {
    Outcome::Unreadable {
        reason: e.reason(),
        detail: e.to_string(),
    }
}

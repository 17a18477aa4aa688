use std::fmt;
use std::path::{Path, PathBuf};

use log::Level;

use crate::date::ResolvedDate;
use crate::error::FailureReason;

/// Terminal state of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Unsupported { native_date: bool },
    AlreadyDated { value: String },
    Unreadable { reason: FailureReason, detail: String },
    WouldWrite { date: ResolvedDate, field: &'static str, target: PathBuf },
    Written { date: ResolvedDate, field: &'static str, target: PathBuf },
    Failed { reason: FailureReason, detail: String },
}

impl Outcome {
    pub fn level(&self) -> Level {
        match self {
            Outcome::AlreadyDated { .. } => Level::Debug,
            Outcome::Unsupported { .. } | Outcome::WouldWrite { .. } | Outcome::Written { .. } => {
                Level::Info
            }
            Outcome::Unreadable { .. } => Level::Warn,
            Outcome::Failed { .. } => Level::Error,
        }
    }
}

/// The single log line for a file.
pub fn format_line(path: &Path, outcome: &Outcome) -> String {
    let decision = match outcome {
        Outcome::Unsupported { native_date: true } => {
            "skipped, unsupported format (carries its own capture date)".to_string()
        }
        Outcome::Unsupported { native_date: false } => "skipped, unsupported format".to_string(),
        Outcome::AlreadyDated { value } => format!("skipped, already has capture date {}", value),
        Outcome::Unreadable { reason, detail } => format!("skipped, {}: {}", reason, detail),
        Outcome::WouldWrite { date, field, target } => {
            format!("would write {} to {}{}", date, field, converted(path, target))
        }
        Outcome::Written { date, field, target } => {
            format!("wrote {} to {}{}", date, field, converted(path, target))
        }
        Outcome::Failed { reason, detail } => format!("failed, {}: {}", reason, detail),
    };
    format!("{}: {}", path.display(), decision)
}

fn converted(path: &Path, target: &Path) -> String {
    if path == target {
        String::new()
    } else {
        format!(" (as {})", target.display())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub unsupported: usize,
    pub already_dated: usize,
    pub unreadable: usize,
    pub planned: usize,
    pub written: usize,
    pub failed: usize,
}

impl Summary {
    fn count(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Unsupported { .. } => self.unsupported += 1,
            Outcome::AlreadyDated { .. } => self.already_dated += 1,
            Outcome::Unreadable { .. } => self.unreadable += 1,
            Outcome::WouldWrite { .. } => self.planned += 1,
            Outcome::Written { .. } => self.written += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.unsupported + self.already_dated + self.unreadable + self.planned + self.written + self.failed
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files: {} would write, {} written, {} already dated, {} unsupported, {} unreadable, {} failed",
            self.total(),
            self.planned,
            self.written,
            self.already_dated,
            self.unsupported,
            self.unreadable,
            self.failed
        )
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub records: Vec<(PathBuf, Outcome)>,
    pub summary: Summary,
}

impl RunReport {
    /// Files that were meant to be written but were not.
    pub fn failed(&self) -> impl Iterator<Item = &Path> {
        self.records
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::Failed { .. }))
            .map(|(p, _)| p.as_path())
    }

    #[cfg(test)]
    pub fn outcome(&self, path: &Path) -> Option<&Outcome> {
        self.records.iter().find(|(p, _)| p == path).map(|(_, o)| o)
    }
}

/// Logging context for one run. Emits one line per file in the order files
/// are recorded and keeps the tally for the closing summary.
pub struct Reporter {
    real_run: bool,
    records: Vec<(PathBuf, Outcome)>,
    summary: Summary,
}

impl Reporter {
    pub fn new(real_run: bool) -> Self {
        if !real_run {
            log::info!("Dry run: no file will be modified. Pass --real-run to write.");
        }
        Self {
            real_run,
            records: Vec::new(),
            summary: Summary::default(),
        }
    }

    pub fn record(&mut self, path: &Path, outcome: Outcome) {
        log::log!(outcome.level(), "{}", format_line(path, &outcome));
        self.summary.count(&outcome);
        self.records.push((path.to_path_buf(), outcome));
    }

    pub fn finish(self) -> RunReport {
        let mode = if self.real_run { "Run" } else { "Dry run" };
        log::info!("{} complete. {}", mode, self.summary);
        log::logger().flush();
        RunReport {
            records: self.records,
            summary: self.summary,
        }
    }
}

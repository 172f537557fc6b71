//! `ErrorReport` persistence and the apport integration (spec.md §3
//! "ErrorReport", §7 "Apport integration", §11 "Crash report lifecycle
//! markers").

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::error;
use serde::{Deserialize, Serialize};
use subiquity_core::types::{ErrorReportKind, ErrorReportRef, Timestamp};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub base: String,
    pub kind: ErrorReportKind,
    pub seen: bool,
    pub created: Timestamp,
    pub summary: String,
    #[serde(default)]
    files: BTreeMap<String, PathBuf>,
    #[serde(default)]
    data: BTreeMap<String, String>,
}

impl ErrorReport {
    pub fn new(kind: ErrorReportKind, summary: impl Into<String>) -> Self {
        let base = format!("{:?}_{}", kind, Timestamp::now().0.format("%Y%m%d-%H%M%S"));
        Self {
            base,
            kind,
            seen: false,
            created: Timestamp::now(),
            summary: summary.into(),
            files: BTreeMap::new(),
            data: BTreeMap::new(),
        }
    }

    pub fn reference(&self) -> ErrorReportRef {
        ErrorReportRef {
            base: self.base.clone(),
        }
    }

    /// Attaches a file to this report by key (spec.md §7
    /// `note_file_for_apport`).
    pub fn note_file_for_apport(&mut self, key: impl Into<String>, path: PathBuf) {
        self.files.insert(key.into(), path);
    }

    /// Attaches a key/value pair to this report (spec.md §7
    /// `note_data_for_apport`).
    pub fn note_data_for_apport(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), value.into());
    }

    fn crash_path(&self, crash_dir: &Path) -> PathBuf {
        crash_dir.join(format!("{}.crash", self.base))
    }

    /// Materializes the report synchronously so it is complete by the time
    /// its path is printed (spec.md §7).
    pub fn save(&self, crash_dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(crash_dir)?;
        let path = self.crash_path(crash_dir);
        let json = serde_json::to_string_pretty(self).expect("ErrorReport always serializes");
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// Touches the `.seen` marker sibling file (spec.md §11).
    pub fn mark_seen(&mut self, crash_dir: &Path) -> std::io::Result<()> {
        self.seen = true;
        std::fs::write(self.marker_path(crash_dir, "seen"), b"")
    }

    /// Touches the `.upload`/`.uploaded` marker sibling files once a report
    /// has been accepted for (and then completed) upload (spec.md §11).
    pub fn mark_upload_started(&self, crash_dir: &Path) -> std::io::Result<()> {
        std::fs::write(self.marker_path(crash_dir, "upload"), b"")
    }

    pub fn mark_uploaded(&self, crash_dir: &Path) -> std::io::Result<()> {
        std::fs::write(self.marker_path(crash_dir, "uploaded"), b"")
    }

    fn marker_path(&self, crash_dir: &Path, suffix: &str) -> PathBuf {
        crash_dir.join(format!("{}.crash.{}", self.base, suffix))
    }
}

/// Generates and persists `ErrorReport`s, and recovers pending ones from
/// disk at startup (spec.md §3: "Reports may be ... recovered from disk at
/// startup").
pub struct ErrorReporter {
    crash_dir: PathBuf,
    pending: Mutex<Vec<ErrorReport>>,
}

impl ErrorReporter {
    pub fn new(crash_dir: PathBuf) -> Self {
        Self {
            crash_dir,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Scans `crash_dir` for `*.crash` files lacking a `.uploaded` marker
    /// and loads them back into memory.
    pub fn recover(&self) -> std::io::Result<usize> {
        if !self.crash_dir.exists() {
            return Ok(0);
        }
        let mut recovered = 0;
        for entry in std::fs::read_dir(&self.crash_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("crash") {
                continue;
            }
            match std::fs::read_to_string(&path)
                .ok()
                .and_then(|raw| serde_json::from_str::<ErrorReport>(&raw).ok())
            {
                Some(report) => {
                    self.pending.lock().unwrap().push(report);
                    recovered += 1;
                }
                None => error!("failed to parse crash report at {:?}", path),
            }
        }
        Ok(recovered)
    }

    pub fn make_report(&self, kind: ErrorReportKind, summary: impl Into<String>) -> ErrorReportRef {
        let report = ErrorReport::new(kind, summary);
        let reference = report.reference();
        if let Err(e) = report.save(&self.crash_dir) {
            error!("failed to persist error report {}: {e}", report.base);
        }
        self.pending.lock().unwrap().push(report);
        reference
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_recover_round_trips_a_report() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = ErrorReporter::new(dir.path().to_path_buf());
        let reference = reporter.make_report(ErrorReportKind::INSTALL_FAIL, "curtin failed");
        assert!(!reference.base.is_empty());

        let reporter2 = ErrorReporter::new(dir.path().to_path_buf());
        let recovered = reporter2.recover().unwrap();
        assert_eq!(recovered, 1);
    }

    #[test]
    fn mark_seen_touches_the_sibling_marker() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = ErrorReport::new(ErrorReportKind::UI, "oops");
        report.save(dir.path()).unwrap();
        report.mark_seen(dir.path()).unwrap();
        assert!(
            dir.path()
                .join(format!("{}.crash.seen", report.base))
                .exists()
        );
    }
}

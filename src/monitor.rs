//! The scan, compare, report, persist cycle.
//!
//! A [`Session`] validates the watched root and loads the ignore rules once.
//! [`init_baseline`] records a fresh baseline from one scan. [`Monitor`]
//! repeats cycles on an interval until cancelled, each cycle moving through
//! `Scanning -> Diffing -> Reporting -> Persisting -> Sleeping -> Idle`.

use crate::algorithm::HashAlgorithm;
use crate::baseline::{BaselineError, BaselineStore};
use crate::diff::{ChangeKind, DiffReport, diff};
use crate::ignore_rules::{IgnoreRules, IgnoreRulesError};
use crate::scanner::{ScanResult, Scanner, SkippedPath};
use crate::shutdown::ShutdownSignal;
use crate::snapshot::Snapshot;
use chrono::{DateTime, Local};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Watched directory does not exist: {0}")]
    RootMissing(PathBuf),
    #[error("Watched path is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Cannot access watched directory {path}: {source}")]
    RootIo {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Ignore file error: {0}")]
    IgnoreRules(#[from] IgnoreRulesError),
    #[error("Failed to save baseline: {0}")]
    Save(#[from] BaselineError),
    #[error("Giving up after {failures} consecutive baseline save failures: {last}")]
    SaveFailuresExhausted { failures: u32, last: BaselineError },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Scanning,
    Diffing,
    Reporting,
    Persisting,
    Sleeping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaselineMode {
    /// Every cycle's snapshot becomes the baseline for the next cycle, so
    /// changes are always reported relative to the previous observation.
    #[default]
    Rolling,
    /// The baseline present when monitoring starts is kept for the whole
    /// session. It is only written if none existed or if it was recorded
    /// with a different algorithm, in which case the first cycle replaces it.
    Fixed,
}

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub interval: Duration,
    pub mode: BaselineMode,
    /// Consecutive failed saves tolerated before monitoring aborts.
    pub max_save_failures: u32,
    /// Stop after this many cycles; run until cancelled when `None`.
    pub max_cycles: Option<u64>,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        MonitorOptions {
            interval: Duration::from_secs(10),
            mode: BaselineMode::Rolling,
            max_save_failures: 3,
            max_cycles: None,
        }
    }
}

/// Validated, session-wide inputs shared by init and monitor mode.
#[derive(Debug)]
pub struct Session {
    root: PathBuf,
    rules: IgnoreRules,
    algorithm: HashAlgorithm,
    store: BaselineStore,
}

impl Session {
    /// Validate `root` and load its ignore rules.
    ///
    /// Fails for a missing, non-directory or unreadable root. Those are
    /// configuration errors; nothing should be scanned in that case.
    pub fn open(
        root: &Path,
        algorithm: HashAlgorithm,
        store: BaselineStore,
    ) -> Result<Self, MonitorError> {
        let metadata = std::fs::metadata(root).map_err(|e| root_error(root, e))?;
        if !metadata.is_dir() {
            return Err(MonitorError::NotADirectory(root.to_path_buf()));
        }

        let root = root.canonicalize().map_err(|e| root_error(root, e))?;
        std::fs::read_dir(&root).map_err(|e| root_error(&root, e))?;

        let rules = IgnoreRules::load(&root)?;
        debug!(
            "Loaded {} ignore rules for {} ({} malformed lines skipped)",
            rules.len(),
            root.display(),
            rules.skipped_lines().len()
        );

        Ok(Session {
            root,
            rules,
            algorithm,
            store,
        })
    }

    fn scan(&self) -> ScanResult {
        let mut scanner = Scanner::new(&self.root, &self.rules, self.algorithm);
        if let Some(baseline_path) = self.store.absolute_path() {
            scanner = scanner.skip_internal_file(baseline_path);
        }
        scanner.scan()
    }
}

fn root_error(root: &Path, e: std::io::Error) -> MonitorError {
    match e.kind() {
        ErrorKind::NotFound => MonitorError::RootMissing(root.to_path_buf()),
        ErrorKind::PermissionDenied => MonitorError::PermissionDenied(root.to_path_buf()),
        _ => MonitorError::RootIo {
            path: root.to_path_buf(),
            source: e,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitResult {
    pub files: usize,
    pub skipped: usize,
}

/// Scan once and store the result as the baseline, replacing any previous one.
///
/// No diff is computed.
pub fn init_baseline(session: &Session) -> Result<InitResult, MonitorError> {
    info!(
        "Initializing baseline for {} using {}",
        session.root.display(),
        session.algorithm
    );

    let result = session.scan();
    session.store.save(&result.snapshot)?;

    debug!("Baseline written to {}", session.store.path().display());

    Ok(InitResult {
        files: result.snapshot.len(),
        skipped: result.skipped.len(),
    })
}

/// Everything observed during one cycle, handed to the report sink.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Local>,
    pub report: DiffReport,
    pub skipped: Vec<SkippedPath>,
    /// The baseline this cycle was compared against.
    pub previous: Option<Arc<Snapshot>>,
    pub current: Arc<Snapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    pub persisted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub interrupted: bool,
}

pub struct Monitor<'a> {
    session: &'a Session,
    options: MonitorOptions,
    state: MonitorState,
    baseline: Option<Arc<Snapshot>>,
    consecutive_save_failures: u32,
    cycles_completed: u64,
}

impl<'a> Monitor<'a> {
    /// Prepare a monitor, loading whatever baseline the store holds.
    pub fn new(session: &'a Session, options: MonitorOptions) -> Self {
        let baseline = session.store.load();

        match &baseline {
            None => info!("No usable baseline found; the first cycle will report every file as added"),
            Some(b) if b.algorithm() != session.algorithm => warn!(
                "Baseline was recorded with {} but {} was requested; every file will appear modified",
                b.algorithm(),
                session.algorithm
            ),
            Some(b) => debug!("Loaded baseline with {} files", b.len()),
        }

        Monitor {
            session,
            options,
            state: MonitorState::Idle,
            baseline: baseline.map(Arc::new),
            consecutive_save_failures: 0,
            cycles_completed: 0,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> MonitorState {
        self.state
    }

    #[cfg(test)]
    pub fn baseline(&self) -> Option<&Snapshot> {
        self.baseline.as_deref()
    }

    fn transition(&mut self, next: MonitorState) {
        debug!("Monitor state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run one full cycle: scan, diff, report, persist.
    ///
    /// Reporting always completes before the new baseline is persisted. A
    /// failed save only becomes an error once `max_save_failures` saves in a
    /// row have failed.
    pub fn run_cycle<F>(&mut self, on_report: &mut F) -> Result<CycleOutcome, MonitorError>
    where
        F: FnMut(&CycleReport),
    {
        let cycle = self.cycles_completed + 1;
        let started_at = Local::now();
        info!("Cycle {} started", cycle);

        self.transition(MonitorState::Scanning);
        let ScanResult { snapshot, skipped } = self.session.scan();
        let current = Arc::new(snapshot);

        self.transition(MonitorState::Diffing);
        let previous = self.baseline.clone();
        let report = diff(previous.as_deref(), &current);

        self.transition(MonitorState::Reporting);
        log_report(cycle, &report);
        let cycle_report = CycleReport {
            cycle,
            started_at,
            report,
            skipped,
            previous,
            current: Arc::clone(&current),
        };
        on_report(&cycle_report);

        self.transition(MonitorState::Persisting);
        let persisted = self.persist(current)?;

        self.cycles_completed = cycle;

        Ok(CycleOutcome { persisted })
    }

    fn persist(&mut self, current: Arc<Snapshot>) -> Result<bool, MonitorError> {
        let baseline_usable = self
            .baseline
            .as_ref()
            .is_some_and(|b| b.algorithm() == current.algorithm());
        if self.options.mode == BaselineMode::Fixed && baseline_usable {
            return Ok(false);
        }

        let result = self.session.store.save(&current);
        self.baseline = Some(current);

        match result {
            Ok(()) => {
                self.consecutive_save_failures = 0;
                Ok(true)
            }
            Err(e) => {
                self.consecutive_save_failures += 1;
                error!(
                    "Failed to save baseline to {} ({} of {} allowed consecutive failures): {}",
                    self.session.store.path().display(),
                    self.consecutive_save_failures,
                    self.options.max_save_failures,
                    e
                );
                if self.consecutive_save_failures >= self.options.max_save_failures {
                    return Err(MonitorError::SaveFailuresExhausted {
                        failures: self.consecutive_save_failures,
                        last: e,
                    });
                }
                Ok(false)
            }
        }
    }

    /// Repeat cycles until `shutdown` is triggered or `max_cycles` is reached.
    pub fn run<F>(&mut self, shutdown: &ShutdownSignal, mut on_report: F) -> Result<RunSummary, MonitorError>
    where
        F: FnMut(&CycleReport),
    {
        info!(
            "Monitoring {} every {}s using {}",
            self.session.root.display(),
            self.options.interval.as_secs(),
            self.session.algorithm
        );

        let mut interrupted = false;

        loop {
            if shutdown.is_triggered() {
                interrupted = true;
                break;
            }

            let outcome = self.run_cycle(&mut on_report)?;
            if !outcome.persisted {
                debug!("Baseline not written in cycle {}", self.cycles_completed);
            }

            if self
                .options
                .max_cycles
                .is_some_and(|max| self.cycles_completed >= max)
            {
                break;
            }

            self.transition(MonitorState::Sleeping);
            if shutdown.wait_timeout(self.options.interval) {
                interrupted = true;
                break;
            }
            self.transition(MonitorState::Idle);
        }

        self.transition(MonitorState::Idle);
        if interrupted {
            info!("Shutdown requested; stopping after {} cycles", self.cycles_completed);
        }

        Ok(RunSummary {
            cycles: self.cycles_completed,
            interrupted,
        })
    }
}

fn log_report(cycle: u64, report: &DiffReport) {
    for (kind, path) in report.entries() {
        match kind {
            ChangeKind::Unchanged => debug!("{}: {}", kind.label(), path),
            _ => info!("{}: {}", kind.label(), path),
        }
    }

    info!(
        "Cycle {}: {} added, {} removed, {} modified, {} unchanged",
        cycle,
        report.added.len(),
        report.removed.len(),
        report.modified.len(),
        report.unchanged.len()
    );
}

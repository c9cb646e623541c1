//! Transfer execution: one terminal outcome per task, failures recorded
//! rather than propagated.

use std::fmt;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{TransferMode, TransferTask};
use crate::error::{ErrorKind, SyncError};

pub const CANCELLED_DETAIL: &str = "cancelled before transfer";
pub const FLAT_FOLDER: &str = "(flat)";

/// An open download. The body is read by the sink as it uploads, so a
/// file is never held in memory as a whole.
pub struct FetchedObject {
    pub body: Box<dyn Read + Send>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

impl FetchedObject {
    pub fn from_bytes(bytes: impl Into<Bytes>, content_type: Option<String>) -> Self {
        let bytes = bytes.into();
        Self {
            content_length: Some(bytes.len() as u64),
            body: Box::new(Cursor::new(bytes)),
            content_type,
        }
    }
}

impl fmt::Debug for FetchedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchedObject")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

pub trait ContentSource: Send + Sync {
    fn fetch(&self, url: &str) -> Result<FetchedObject, SyncError>;
}

pub trait ObjectSink: Send + Sync {
    /// Stores the body unmodified under `key` and returns the number of
    /// bytes written. Errors reading the body are `SyncError::Network`.
    fn put(&self, key: &str, object: FetchedObject) -> Result<u64, SyncError>;
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink: Sync {
    fn event(&self, event: ProgressEvent);
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn event(&self, _event: ProgressEvent) {}
}

/// Shared between the caller and the executor; checked before each live task.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    WouldTransfer,
    Transferred,
    Failed,
    Skipped,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::WouldTransfer => "would_transfer",
            TransferStatus::Transferred => "transferred",
            TransferStatus::Failed => "failed",
            TransferStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub task: TransferTask,
    pub status: TransferStatus,
    pub detail: Option<String>,
    pub bytes: Option<u64>,
}

impl TransferOutcome {
    pub fn would_transfer(task: TransferTask) -> Self {
        Self {
            task,
            status: TransferStatus::WouldTransfer,
            detail: None,
            bytes: None,
        }
    }

    pub fn transferred(task: TransferTask, bytes: u64) -> Self {
        Self {
            task,
            status: TransferStatus::Transferred,
            detail: None,
            bytes: Some(bytes),
        }
    }

    pub fn failed(task: TransferTask, detail: String) -> Self {
        Self {
            task,
            status: TransferStatus::Failed,
            detail: Some(detail),
            bytes: None,
        }
    }

    pub fn skipped(task: TransferTask, detail: &str) -> Self {
        Self {
            task,
            status: TransferStatus::Skipped,
            detail: Some(detail.to_string()),
            bytes: None,
        }
    }

    pub fn folder(&self) -> &str {
        self.task.identifiers.bank_id().unwrap_or(FLAT_FOLDER)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub would_transfer: usize,
    pub transferred: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub mode: TransferMode,
    pub started_at: String,
    pub finished_at: String,
    pub counts: StatusCounts,
    pub total_bytes: u64,
    pub outcomes: Vec<TransferOutcome>,
}

impl RunSummary {
    fn new(mode: TransferMode) -> Self {
        Self {
            mode,
            started_at: now_rfc3339(),
            finished_at: String::new(),
            counts: StatusCounts::default(),
            total_bytes: 0,
            outcomes: Vec::new(),
        }
    }

    fn record(mut self, outcome: TransferOutcome) -> Self {
        match outcome.status {
            TransferStatus::WouldTransfer => self.counts.would_transfer += 1,
            TransferStatus::Transferred => self.counts.transferred += 1,
            TransferStatus::Failed => self.counts.failed += 1,
            TransferStatus::Skipped => self.counts.skipped += 1,
        }
        self.total_bytes += outcome.bytes.unwrap_or(0);
        self.outcomes.push(outcome);
        self
    }

    fn finish(mut self) -> Self {
        self.finished_at = now_rfc3339();
        self
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn has_failures(&self) -> bool {
        self.counts.failed > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &TransferOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == TransferStatus::Failed)
    }

    /// Outcomes grouped by bank folder, in order of first appearance.
    pub fn by_folder(&self) -> Vec<(&str, Vec<&TransferOutcome>)> {
        let mut groups: Vec<(&str, Vec<&TransferOutcome>)> = Vec::new();
        for outcome in &self.outcomes {
            let folder = outcome.folder();
            match groups.iter_mut().find(|(name, _)| *name == folder) {
                Some((_, items)) => items.push(outcome),
                None => groups.push((folder, vec![outcome])),
            }
        }
        groups
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub mode: TransferMode,
    pub workers: usize,
    pub cancel: CancelFlag,
}

impl ExecuteOptions {
    pub fn new(mode: TransferMode) -> Self {
        Self {
            mode,
            workers: 1,
            cancel: CancelFlag::default(),
        }
    }
}

pub fn execute(
    tasks: &[TransferTask],
    mode: TransferMode,
    source: &dyn ContentSource,
    sink: &dyn ObjectSink,
) -> RunSummary {
    execute_with(tasks, &ExecuteOptions::new(mode), source, sink, &NoProgress)
}

pub fn execute_with(
    tasks: &[TransferTask],
    options: &ExecuteOptions,
    source: &dyn ContentSource,
    sink: &dyn ObjectSink,
    progress: &dyn ProgressSink,
) -> RunSummary {
    let summary = RunSummary::new(options.mode);
    let outcomes = match options.mode {
        TransferMode::DryRun => tasks
            .iter()
            .map(|task| {
                let outcome = TransferOutcome::would_transfer(task.clone());
                report(progress, &outcome, None);
                outcome
            })
            .collect::<Vec<_>>(),
        TransferMode::Live if options.workers > 1 && tasks.len() > 1 => {
            run_pooled(tasks, options, source, sink, progress)
        }
        TransferMode::Live => tasks
            .iter()
            .map(|task| run_live(task, &options.cancel, source, sink, progress))
            .collect(),
    };

    let summary = outcomes
        .into_iter()
        .fold(summary, RunSummary::record)
        .finish();
    info!(
        mode = %summary.mode,
        total = summary.total(),
        transferred = summary.counts.transferred,
        failed = summary.counts.failed,
        skipped = summary.counts.skipped,
        "run finished"
    );
    summary
}

fn run_pooled(
    tasks: &[TransferTask],
    options: &ExecuteOptions,
    source: &dyn ContentSource,
    sink: &dyn ObjectSink,
    progress: &dyn ProgressSink,
) -> Vec<TransferOutcome> {
    let next = AtomicUsize::new(0);
    let finished = Mutex::new(Vec::with_capacity(tasks.len()));

    thread::scope(|scope| {
        for _ in 0..options.workers.min(tasks.len()) {
            scope.spawn(|| {
                loop {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(task) = tasks.get(index) else {
                        break;
                    };
                    let outcome = run_live(task, &options.cancel, source, sink, progress);
                    finished
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push((index, outcome));
                }
            });
        }
    });

    let mut finished = finished
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);
    finished.sort_by_key(|(index, _)| *index);
    finished.into_iter().map(|(_, outcome)| outcome).collect()
}

fn run_live(
    task: &TransferTask,
    cancel: &CancelFlag,
    source: &dyn ContentSource,
    sink: &dyn ObjectSink,
    progress: &dyn ProgressSink,
) -> TransferOutcome {
    if cancel.is_cancelled() {
        let outcome = TransferOutcome::skipped(task.clone(), CANCELLED_DETAIL);
        report(progress, &outcome, None);
        return outcome;
    }

    let started = Instant::now();
    let outcome = transfer_one(task, source, sink);
    report(progress, &outcome, Some(started.elapsed()));
    outcome
}

fn transfer_one(
    task: &TransferTask,
    source: &dyn ContentSource,
    sink: &dyn ObjectSink,
) -> TransferOutcome {
    let object = match source.fetch(&task.source_url) {
        Ok(object) => object,
        Err(err) => {
            return TransferOutcome::failed(
                task.clone(),
                format!("fetch {}: {err}", task.source_url),
            );
        }
    };

    match sink.put(&task.destination_key, object) {
        Ok(size) => TransferOutcome::transferred(task.clone(), size),
        Err(err) if err.kind() == ErrorKind::Network => TransferOutcome::failed(
            task.clone(),
            format!("fetch {}: {err}", task.source_url),
        ),
        Err(err) => TransferOutcome::failed(
            task.clone(),
            format!("upload {}: {err}", task.destination_key),
        ),
    }
}

fn report(progress: &dyn ProgressSink, outcome: &TransferOutcome, elapsed: Option<Duration>) {
    match &outcome.detail {
        Some(detail) if outcome.status == TransferStatus::Failed => {
            warn!(file = %outcome.task.filename, %detail, "transfer failed");
        }
        _ => info!(
            file = %outcome.task.filename,
            key = %outcome.task.destination_key,
            status = outcome.status.as_str(),
            "task finished"
        ),
    }
    progress.event(ProgressEvent {
        message: format!(
            "status={}; file={}; key={}",
            outcome.status.as_str(),
            outcome.task.filename,
            outcome.task.destination_key
        ),
        elapsed,
    });
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

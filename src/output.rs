use std::fmt;
use std::io::{self, Write};

use serde::Serialize;

use crate::app::SyncReport;
use crate::domain::TransferMode;
use crate::transfer::{ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &SyncReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Prints one line per finished task to stderr.
pub struct TextProgress;

impl ProgressSink for TextProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => eprintln!("{}", event.message),
        }
    }
}

/// Human-readable run report, grouped by bank folder.
pub struct TextReport<'a>(pub &'a SyncReport);

impl TextReport<'_> {
    pub fn print(report: &SyncReport) -> io::Result<()> {
        let mut stdout = io::stdout();
        write!(stdout, "{}", TextReport(report))
    }

    pub fn render(report: &SyncReport) -> String {
        TextReport(report).to_string()
    }
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let summary = &report.summary;
        let title = match summary.mode {
            TransferMode::DryRun => "DRY RUN",
            TransferMode::Live => "LIVE RUN",
        };

        writeln!(f, "=== {title} ===")?;
        writeln!(f, "Source page: {}", report.page_url)?;
        writeln!(f, "Destination: {}", report.destination)?;
        writeln!(f)?;

        for (folder, outcomes) in summary.by_folder() {
            writeln!(f, "{folder}: {} file(s)", outcomes.len())?;
            for outcome in outcomes {
                let size = outcome
                    .bytes
                    .map(|bytes| format!(" ({})", format_size(bytes)))
                    .unwrap_or_default();
                writeln!(
                    f,
                    "  [{}] {}{size}",
                    outcome.status.as_str(),
                    outcome.task.filename
                )?;
                writeln!(f, "      -> {}", outcome.task.destination_key)?;
                if let Some(detail) = &outcome.detail {
                    writeln!(f, "      !! {detail}")?;
                }
            }
        }

        let counts = &summary.counts;
        writeln!(f)?;
        writeln!(f, "=== Summary ===")?;
        writeln!(f, "Files found: {}", summary.total())?;
        match summary.mode {
            TransferMode::DryRun => writeln!(f, "Would transfer: {}", counts.would_transfer)?,
            TransferMode::Live => {
                writeln!(f, "Transferred: {}", counts.transferred)?;
                writeln!(f, "Failed: {}", counts.failed)?;
                writeln!(f, "Skipped: {}", counts.skipped)?;
                writeln!(f, "Total size: {}", format_size(summary.total_bytes))?;
            }
        }

        let mut failures = summary.failures().peekable();
        if failures.peek().is_some() {
            writeln!(f)?;
            writeln!(f, "Failures:")?;
            for outcome in failures {
                writeln!(
                    f,
                    "  {}: {}",
                    outcome.task.filename,
                    outcome.detail.as_deref().unwrap_or_default()
                )?;
            }
        }
        Ok(())
    }
}

pub fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let value = bytes as f64;
    if value >= KIB * KIB * KIB {
        format!("{:.2} GB", value / (KIB * KIB * KIB))
    } else if value >= KIB * KIB {
        format!("{:.2} MB", value / (KIB * KIB))
    } else if value >= KIB {
        format!("{:.2} KB", value / KIB)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Identifiers, TransferTask};
    use crate::transfer::{RunSummary, StatusCounts, TransferOutcome};

    fn live_report() -> SyncReport {
        let task = |name: &str| TransferTask {
            source_url: format!("https://site/files/{name}"),
            destination_key: format!("s3://bucket/{name}"),
            filename: name.to_string(),
            identifiers: Identifiers::Absent,
        };
        SyncReport {
            page_url: "https://site/files/".to_string(),
            destination: "s3://bucket".to_string(),
            summary: RunSummary {
                mode: TransferMode::Live,
                started_at: String::new(),
                finished_at: String::new(),
                counts: StatusCounts {
                    transferred: 1,
                    failed: 1,
                    ..StatusCounts::default()
                },
                total_bytes: 2048,
                outcomes: vec![
                    TransferOutcome::transferred(task("a.txt"), 2048),
                    TransferOutcome::failed(task("b.txt"), "fetch boom".to_string()),
                ],
            },
        }
    }

    #[test]
    fn live_report_lists_sizes_and_failures() {
        let rendered = TextReport::render(&live_report());
        assert!(rendered.starts_with("=== LIVE RUN ===\n"));
        assert!(rendered.contains("(flat): 2 file(s)"));
        assert!(rendered.contains("  [transferred] a.txt (2.00 KB)\n"));
        assert!(rendered.contains("      !! fetch boom\n"));
        assert!(rendered.contains("Total size: 2.00 KB"));
        assert!(rendered.ends_with("Failures:\n  b.txt: fetch boom\n"));
    }

    #[test]
    fn display_and_render_agree() {
        let report = live_report();
        assert_eq!(format!("{}", TextReport(&report)), TextReport::render(&report));
    }

    #[test]
    fn sizes_use_binary_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.00 GB");
    }
}

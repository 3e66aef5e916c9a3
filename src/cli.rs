//! Command line surface and console report
//!
//! Progress goes to stdout as a boxed step table; diagnostics go through
//! `tracing`.

use crate::config::{OcrMethod, PipelineMode};
use crate::pipeline::{Categorizer, PipelineEvent, Stage};
use crate::placement::FileMover;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

pub const DIVIDER_WIDTH: usize = 80;
const TIME_WIDTH: usize = 7;
const ACTION_WIDTH: usize = 20;
const DETAILS_WIDTH: usize = 30;

/// Files per directory shown by `--show-tree`
pub const SHOW_TREE_FILES: usize = 5;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Rename and file scanned documents following an existing archive",
    long_about = None
)]
pub struct Cli {
    /// Files or directories to categorize (directories are walked recursively)
    pub paths: Vec<PathBuf>,

    /// Pipeline variant, overrides PIPELINE_MODE
    #[arg(long, value_parser = PipelineMode::parse)]
    pub mode: Option<PipelineMode>,

    /// Image-to-text method, overrides OCR_METHOD
    #[arg(long, value_parser = OcrMethod::parse)]
    pub ocr: Option<OcrMethod>,

    /// Print the reference tree and exit
    #[arg(long)]
    pub show_tree: bool,
}

/// Expand arguments into files; returns `(files, missing)`
pub fn expand_paths(paths: &[PathBuf]) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut files = Vec::new();
    let mut missing = Vec::new();

    for path in paths {
        if !path.exists() {
            missing.push(path.clone());
        } else if path.is_dir() {
            files.extend(
                WalkDir::new(path)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .map(|e| e.into_path()),
            );
        } else {
            files.push(path.clone());
        }
    }

    (files, missing)
}

/// Outcome counts of one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub moved: usize,
    pub failed: usize,
}

/// Categorize and move `files` one after another
///
/// A failure is reported and the batch moves on to the next file.
pub async fn run_batch(categorizer: &Categorizer, mover: &FileMover, files: &[PathBuf]) -> BatchSummary {
    let total_started = Instant::now();
    let ocr_label = categorizer.extractor().strategy_name();
    let mut summary = BatchSummary::default();

    println!(
        "DOCUMENT CLASSIFIER - {} - ocr={}\n",
        files_label(files.len()),
        ocr_label
    );

    for (index, file) in files.iter().enumerate() {
        let file_started = Instant::now();
        println!(
            "{}",
            horizontal_line(&format!("┌── [{:02} / {:02}] ", index + 1, files.len()))
        );
        println!("│ {}", display_name(file));

        let result = categorizer
            .categorize_with(file, &mut |event| print_event(&event, ocr_label))
            .await
            .and_then(|categorization| {
                mover
                    .move_file(file, &categorization)
                    .map(|_| categorization)
            });

        match result {
            Ok(categorization) => {
                summary.moved += 1;
                print_step("Moved file", &categorization.to_string(), Some(file_started.elapsed()));
            }
            Err(e) => {
                summary.failed += 1;
                tracing::error!("[Batch] {} failed: {}", file.display(), e);
                print_error_box(&format!("Processing failed: {}", e));
            }
        }

        println!("{}", horizontal_line("└"));
    }

    println!("{}", horizontal_line("┌"));
    print_step(
        "Finished classification",
        &format!("{} processed", files_label(files.len())),
        Some(total_started.elapsed()),
    );
    print_step(
        "Outcome",
        &format!("{} moved, {} failed", summary.moved, summary.failed),
        None,
    );
    println!("{}", horizontal_line("└"));

    summary
}

fn print_event(event: &PipelineEvent, ocr_label: &str) {
    match event {
        PipelineEvent::StageFinished {
            stage,
            details,
            elapsed,
        } => {
            let action = match stage {
                Stage::Extract => format!("{} OCR", ocr_label),
                Stage::Summarize => "Document summarized".to_string(),
                Stage::Filename => "Filename generated".to_string(),
                Stage::Path => "Path generated".to_string(),
                Stage::Classify => "Document classified".to_string(),
            };
            print_step(&action, details, Some(*elapsed));
        }
        PipelineEvent::AttemptFailed {
            attempt,
            attempts,
            message,
            ..
        } => {
            println!("│ Attempt {} of {} failed: {}", attempt, attempts, message);
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn files_label(count: usize) -> String {
    format!("{} file{}", count, if count == 1 { "" } else { "s" })
}

/// `prefix` followed by `─` up to the divider width
pub fn horizontal_line(prefix: &str) -> String {
    let fill = DIVIDER_WIDTH.saturating_sub(prefix.chars().count() + 1);
    format!("{}{}", prefix, "─".repeat(fill))
}

pub fn step_line(action: &str, details: &str, elapsed: Option<Duration>) -> String {
    let time = match elapsed {
        Some(elapsed) => format!("[{:>width$}]", format_duration(elapsed), width = TIME_WIDTH),
        None => " ".repeat(TIME_WIDTH + 2),
    };
    let line = format!(
        "│ {} {:<action_width$} {:<details_width$}",
        time,
        format!("{}:", action),
        details,
        action_width = ACTION_WIDTH,
        details_width = DETAILS_WIDTH
    );
    line.trim_end().to_string()
}

pub fn print_step(action: &str, details: &str, elapsed: Option<Duration>) {
    println!("{}", step_line(action, details, elapsed));
}

pub fn print_error_box(message: &str) {
    println!("{}", horizontal_line("├"));
    println!("│ ERROR: {}", message);
    println!("{}", horizontal_line("└"));
}

/// `ns` below a millisecond, `ms` below a second, else `s`
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos < 1_000_000 {
        format!("{}ns", nanos)
    } else if nanos < 1_000_000_000 {
        format!("{:.1}ms", nanos as f64 / 1_000_000.0)
    } else {
        format!("{:.2}s", nanos as f64 / 1_000_000_000.0)
    }
}

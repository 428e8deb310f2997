//! File writing utilities for activity export.
//!
//! This module writes emitted record graphs to disk as a pretty JSON array, JSON
//! lines, or a flattened CSV summary, optionally split into numbered chunk files.
//! [`ChunkedFileSink`] lets the pipeline write those chunks as it goes.

use crate::error::Result;
use crate::models::{Activity, OutputFormat};
use crate::pipeline::ActivitySink;
use crate::utils::chunk_by_count;
use csv::Writer;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Header of the CSV summary
pub const CSV_HEADER: [&str; 7] = ["provider_id", "end_at", "actor", "consumers", "thread", "body", "attachment_type"];

/// Writes each chunk it receives to `output_dir/timestamp/chunk_N.<ext>`.
///
/// The run directory is created with the first chunk, so a run that emits
/// nothing leaves no trace on disk.
#[derive(Debug)]
pub struct ChunkedFileSink {
    format: OutputFormat,
    run_dir: PathBuf,
    files: Vec<PathBuf>,
    records: usize,
}

impl ChunkedFileSink {
    #[must_use]
    pub fn new(format: OutputFormat, output_dir: &Path, timestamp: &str) -> Self {
        Self {
            format,
            run_dir: output_dir.join(timestamp),
            files: Vec::new(),
            records: 0,
        }
    }

    /// Paths of the chunk files written so far
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Activities written so far
    #[must_use]
    pub const fn records(&self) -> usize {
        self.records
    }

    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }
}

impl ActivitySink for ChunkedFileSink {
    fn write_chunk(&mut self, activities: &[Activity]) -> Result<()> {
        if activities.is_empty() {
            return Ok(());
        }

        create_dir_all(&self.run_dir)?;
        let file_path = self
            .run_dir
            .join(format!("chunk_{}.{}", self.files.len() + 1, self.format.extension()));
        write_activities_to_file(activities, self.format, &file_path)?;

        self.records += activities.len();
        self.files.push(file_path);
        Ok(())
    }
}

/// Write activities to chunk files under `output_dir/timestamp/`.
///
/// Files are named `chunk_1.<ext>`, `chunk_2.<ext>`, ... with at most
/// `records_per_file` activities each (zero means one file).
///
/// # Returns
///
/// Vector of paths to created files
pub fn write_activities_to_timestamped_dir(
    activities: &[Activity],
    format: OutputFormat,
    output_dir: &Path,
    timestamp: &str,
    records_per_file: usize,
) -> Result<Vec<PathBuf>> {
    let mut sink = ChunkedFileSink::new(format, output_dir, timestamp);
    for chunk in chunk_by_count(activities, records_per_file) {
        sink.write_chunk(&chunk)?;
    }
    Ok(sink.files)
}

/// Write activities to a file in the specified format.
///
/// # Errors
///
/// Returns an error if file creation or writing fails.
pub fn write_activities_to_file(activities: &[Activity], format: OutputFormat, file_path: &Path) -> Result<()> {
    match format {
        OutputFormat::Json => write_json_file(activities, file_path),
        OutputFormat::JsonLines => write_jsonl_file(activities, file_path),
        OutputFormat::Csv => write_csv_file(activities, file_path),
    }
}

fn write_json_file(activities: &[Activity], file_path: &Path) -> Result<()> {
    let file = File::create(file_path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, activities)?;
    writer.flush()?;
    Ok(())
}

fn write_jsonl_file(activities: &[Activity], file_path: &Path) -> Result<()> {
    let file = File::create(file_path)?;
    let mut writer = BufWriter::new(file);

    for activity in activities {
        serde_json::to_writer(&mut writer, activity)?;
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}

/// One CSV line per activity; consumers are joined with `;`
fn write_csv_file(activities: &[Activity], file_path: &Path) -> Result<()> {
    let file = File::create(file_path)?;
    let mut writer = Writer::from_writer(file);

    writer.write_record(CSV_HEADER)?;

    for activity in activities {
        writer.write_record(csv_row(activity))?;
    }

    writer.flush()?;
    Ok(())
}

fn csv_row(activity: &Activity) -> [String; 7] {
    let message = &activity.involved;
    let consumers = message
        .consumers
        .iter()
        .map(|identity| identity.provider_id.as_str())
        .collect::<Vec<_>>()
        .join(";");

    [
        activity.provider_id.clone(),
        activity.end_at.to_rfc3339(),
        activity.actor.provider_id.clone(),
        consumers,
        message.containers.as_ref().map(|thread| thread.provider_id.clone()).unwrap_or_default(),
        message.body.clone().unwrap_or_default(),
        message
            .contains
            .as_ref()
            .map(|attachment| attachment.represents.as_str().to_string())
            .unwrap_or_default(),
    ]
}

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use whatsapp_history_rust::attachment::{
    AttachmentClassifier, Base64Encoder, DisabledRecognizer, TesseractRecognizer, TextRecognizer,
};
use whatsapp_history_rust::config::AppConfig;
use whatsapp_history_rust::file_writer::ChunkedFileSink;
use whatsapp_history_rust::logging::{init_logging, OperationTimer};
use whatsapp_history_rust::models::{ExtractionRange, Me, OutputFormat};
use whatsapp_history_rust::pipeline::TransformPipeline;
use whatsapp_history_rust::source::{RowSource, SqliteRowSource};
use whatsapp_history_rust::store::RecordStore;
use whatsapp_history_rust::transformer::MessageTransformer;
use whatsapp_history_rust::utils::{parse_range_bound, run_timestamp};
use whatsapp_history_rust::validation::InputValidator;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract messages and write them as record graphs
    Extract {
        /// Only messages after this date (YYYY-MM-DD or RFC 3339)
        #[arg(short, long)]
        since: Option<String>,

        /// Only messages before this date (YYYY-MM-DD or RFC 3339)
        #[arg(short, long)]
        until: Option<String>,

        /// Maximum number of rows, newest first
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (json, jsonl or csv)
        #[arg(short, long)]
        format: Option<OutputFormat>,

        /// Output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Skip OCR even if enabled in configuration
        #[arg(long)]
        no_ocr: bool,

        /// Emit every activity without consulting the dedupe store
        #[arg(long)]
        no_store: bool,
    },
    /// Count the rows a range selects
    Count {
        /// Only messages after this date (YYYY-MM-DD or RFC 3339)
        #[arg(short, long)]
        since: Option<String>,

        /// Only messages before this date (YYYY-MM-DD or RFC 3339)
        #[arg(short, long)]
        until: Option<String>,
    },
    /// Forget every activity recorded in the dedupe store
    ClearStore,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    let log_file = config.logging.file_path.as_deref().map(Path::new);
    let _guard = init_logging(Some(&config.get_log_level()), log_file, config.logging.format == "json")?;

    info!("Starting whatsapp-history-rust");

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            since,
            until,
            limit,
            format,
            output_dir,
            no_ocr,
            no_store,
        } => {
            let range = build_range(&config, since.as_deref(), until.as_deref(), limit)?;
            let format = match format {
                Some(format) => format,
                None => config.output.default_format.parse().map_err(anyhow::Error::msg)?,
            };
            let output_dir = output_dir.unwrap_or_else(|| PathBuf::from(&config.output.output_directory));
            extract(&config, &range, format, &output_dir, no_ocr, no_store).await?;
        },
        Commands::Count { since, until } => {
            let range = build_range(&config, since.as_deref(), until.as_deref(), None)?;
            let source = open_source(&config)?;
            let count = source.results_count(&range).await?;
            info!(count, "Rows selected");
        },
        Commands::ClearStore => {
            let store = RecordStore::open(Path::new(&config.store.path))?;
            let keys = store.len();
            store.clear()?;
            info!(keys, path = %config.store.path, "Dedupe store cleared");
        },
    }

    Ok(())
}

/// Run the pipeline and write what it emits
async fn extract(
    config: &AppConfig,
    range: &ExtractionRange,
    format: OutputFormat,
    output_dir: &Path,
    no_ocr: bool,
    no_store: bool,
) -> Result<()> {
    let timer = OperationTimer::new("extract");
    let source = open_source(config)?;

    let recognizer: Box<dyn TextRecognizer> = if config.attachments.enable_ocr && !no_ocr {
        Box::new(TesseractRecognizer::new(config.attachments.ocr_command.clone()))
    } else {
        Box::new(DisabledRecognizer)
    };
    let encoder = Box::new(Base64Encoder::new(config.max_attachment_bytes()));
    let transformer = MessageTransformer::new(AttachmentClassifier::new(recognizer, encoder));

    let mut pipeline =
        TransformPipeline::new(Box::new(source), transformer).with_chunk_size(config.output.max_records_per_file);
    if config.store.enabled && !no_store {
        let store = RecordStore::open(Path::new(&config.store.path))
            .with_context(|| format!("Failed to open dedupe store at {}", config.store.path))?;
        pipeline = pipeline.with_store(store);
    }

    let mut sink = ChunkedFileSink::new(format, output_dir, &run_timestamp(Utc::now()));
    let report = pipeline.run(range, &mut sink).await?;
    if report.emitted == 0 {
        warn!("No new activities to write");
        timer.finish();
        return Ok(());
    }

    let mut metrics = pipeline.metrics().clone();
    metrics.record_export(report.emitted, format.extension());

    for file in sink.files() {
        info!(path = %file.display(), "Wrote output file");
    }
    info!(
        emitted = report.emitted,
        skipped = report.skipped,
        duplicates = report.duplicates,
        attachments = metrics.attachments_emitted,
        ocr_hits = metrics.ocr_hits,
        files = sink.files().len(),
        "Extraction complete"
    );
    timer.finish();

    Ok(())
}

/// Validate the configured identity and database, then open the row source
fn open_source(config: &AppConfig) -> Result<SqliteRowSource> {
    InputValidator::validate_member_id(&config.source.my_whatsapp_id)
        .context("Set source.my_whatsapp_id to your own WhatsApp id")?;
    InputValidator::validate_display_name(&config.source.my_whatsapp_name)?;

    let db_path = config.get_database_path();
    InputValidator::validate_database_path(&db_path)?;
    info!("Using WhatsApp database at: {}", db_path.display());

    let me = Me {
        name: config.source.my_whatsapp_name.clone(),
        member_id: config.source.my_whatsapp_id.clone(),
    };
    Ok(SqliteRowSource::new(db_path, me)?)
}

/// Command-line bounds win over configured ones
fn build_range(config: &AppConfig, since: Option<&str>, until: Option<&str>, limit: Option<usize>) -> Result<ExtractionRange> {
    let since = since
        .or(config.extraction.since.as_deref())
        .map(|value| parse_range_bound(value, false))
        .transpose()?;
    let until = until
        .or(config.extraction.until.as_deref())
        .map(|value| parse_range_bound(value, true))
        .transpose()?;
    InputValidator::validate_date_range(since, until)?;

    let limit = limit.or(config.extraction.limit);
    if let Some(limit) = limit {
        InputValidator::validate_limit(limit)?;
    }

    Ok(ExtractionRange { since, until, limit })
}

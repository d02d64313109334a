//! pdfhub CLI - PDF transcription tool

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pdfhub::render::document_markup;
use pdfhub::{
    detect_format_from_bytes, ClipboardSink, CopyOutcome, DocumentId, DocumentSource, Error,
    ExportFormat, JsonFormat, OverlayExporter, PageOrigin, PdfHub, PreparedCopy, ProgressEvent,
    TranscribeOptions, Transcriber,
};

#[derive(Parser)]
#[command(name = "pdfhub")]
#[command(version)]
#[command(about = "Transcribe PDF documents to reading-order text and positioned HTML", long_about = None)]
struct Cli {
    #[command(flatten)]
    layout: LayoutArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Reading-order settings shared by every subcommand.
#[derive(Args)]
struct LayoutArgs {
    /// Vertical distance under which two fragments share a line
    #[arg(long, global = true, default_value = "2.0", env = "PDFHUB_LINE_TOLERANCE")]
    line_tolerance: f64,

    /// Line-break threshold as a multiple of the fragment height
    #[arg(long, global = true, default_value = "1.0")]
    line_break_factor: f64,

    /// Transcribe documents one after another
    #[arg(long, global = true)]
    sequential: bool,

    /// Recompose extracted text into Unicode NFC
    #[arg(long, global = true)]
    nfc: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe a PDF to plain text
    Text {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Transcribe a PDF to positioned HTML
    Html {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Emit bare page blocks without the HTML document wrapper
        #[arg(long)]
        fragment: bool,

        /// Drop the page border and shadow
        #[arg(long)]
        plain: bool,
    },

    /// Transcribe several PDFs in order and join the results
    All {
        /// Input PDF files, in output order
        #[arg(value_name = "FILES", required = true)]
        inputs: Vec<PathBuf>,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Produce positioned HTML instead of text
        #[arg(long)]
        html: bool,

        /// Output the bulk result as JSON, one segment per document
        #[arg(long, conflicts_with = "html")]
        json: bool,
    },

    /// Show document information
    Info {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

type CliResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let options = cli.layout.options();

    let result = match cli.command {
        Commands::Text { input, output } => cmd_text(&input, output.as_deref(), options),
        Commands::Html {
            input,
            output,
            fragment,
            plain,
        } => cmd_html(&input, output.as_deref(), options, fragment, plain),
        Commands::All {
            inputs,
            output,
            html,
            json,
        } => cmd_all(&inputs, output.as_deref(), options, html, json),
        Commands::Info { input, json } => cmd_info(&input, options, json),
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

impl LayoutArgs {
    fn options(&self) -> TranscribeOptions {
        TranscribeOptions::new()
            .with_line_tolerance(self.line_tolerance)
            .with_line_break_factor(self.line_break_factor)
            .with_parallel(!self.sequential)
            .with_compose_unicode(self.nfc)
    }
}

fn cmd_text(input: &Path, output: Option<&Path>, options: TranscribeOptions) -> CliResult<()> {
    let hub = PdfHub::builder().with_options(options).build();
    let id = hub.open_file(input)?.handle.id;

    let text = with_progress(&hub, || hub.export_document(id, ExportFormat::Text))?;
    deliver(&hub, prepared(ExportFormat::Text, text), ExportFormat::Text, output)
}

fn cmd_html(
    input: &Path,
    output: Option<&Path>,
    options: TranscribeOptions,
    fragment: bool,
    plain: bool,
) -> CliResult<()> {
    let overlay = if plain {
        OverlayExporter::new().plain()
    } else {
        OverlayExporter::new()
    };
    let hub = PdfHub::builder()
        .with_options(options)
        .with_overlay(overlay)
        .build();
    let added = hub.open_file(input)?;

    let body = with_progress(&hub, || {
        hub.export_document(added.handle.id, ExportFormat::Overlay)
    })?;
    let html = if fragment || body.is_empty() {
        body
    } else {
        document_markup(&added.handle.name, &body)
    };
    deliver(&hub, prepared(ExportFormat::Overlay, html), ExportFormat::Overlay, output)
}

fn cmd_all(
    inputs: &[PathBuf],
    output: Option<&Path>,
    options: TranscribeOptions,
    html: bool,
    json: bool,
) -> CliResult<()> {
    let format = if html {
        ExportFormat::Overlay
    } else {
        ExportFormat::Text
    };
    let hub = PdfHub::builder().with_options(options).build();
    for input in inputs {
        let added = hub
            .open_file(input)
            .map_err(|e| format!("{}: {}", input.display(), e))?;
        log::debug!("Opened {} as {}", input.display(), added.handle.id);
    }

    let bulk = with_progress(&hub, || hub.export_all(format))?;
    for failed in bulk.failed() {
        eprintln!(
            "{} {} ({})",
            "Skipped".yellow(),
            failed.name,
            failed.error.as_deref().unwrap_or("unreadable")
        );
    }

    let content = if json {
        bulk.to_json(JsonFormat::Pretty)?
    } else if html && !bulk.segments.is_empty() {
        document_markup("pdfhub export", &bulk.join())
    } else {
        bulk.join()
    };
    deliver(&hub, prepared(format, content), format, output)
}

fn cmd_info(input: &Path, options: TranscribeOptions, json: bool) -> CliResult<()> {
    let data = fs::read(input)?;
    let format = detect_format_from_bytes(&data)?;
    let size = data.len();

    let source = DocumentSource::new(DocumentId::from_raw(1), input.display().to_string(), data);
    let transcription = Transcriber::default()
        .with_options(options)
        .run(&source, ExportFormat::Text)?;
    let pages = &transcription.transcript.pages;
    let without_text = pages
        .iter()
        .filter(|p| p.origin != PageOrigin::EmbeddedText)
        .count();
    let text = transcription.output();
    let words = text.split_whitespace().count();

    if json {
        let info = serde_json::json!({
            "file": input.display().to_string(),
            "version": format.version,
            "size": size,
            "pages": pages.len(),
            "pages_without_text": without_text,
            "words": words,
            "characters": text.chars().count(),
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: PDF {}", "Format".bold(), format.version);
    println!("{}: {} bytes", "Size".bold(), size);
    println!("{}: {}", "Pages".bold(), pages.len());

    println!();
    println!("{}", "Content Statistics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "Words".bold(), words);
    println!("{}: {}", "Characters".bold(), text.chars().count());
    if without_text > 0 {
        println!(
            "{}: {} {}",
            "Pages without text".bold(),
            without_text,
            "(no recognition engine configured)".dimmed()
        );
    }

    Ok(())
}

/// Run `task` while a spinner shows the hub's progress events.
fn with_progress<T>(hub: &PdfHub, task: impl FnOnce() -> pdfhub::Result<T>) -> pdfhub::Result<T> {
    let events = hub.subscribe();
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));

    let done = Arc::new(AtomicBool::new(false));
    let reporter = {
        let pb = pb.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::Acquire) {
                let Ok(event) = events.recv_timeout(Duration::from_millis(50)) else {
                    continue;
                };
                if matches!(
                    event,
                    ProgressEvent::PageFailed { .. } | ProgressEvent::Failed { .. }
                ) {
                    pb.println(format!("{} {}", "warning:".yellow(), event));
                }
                pb.set_message(event.to_string());
            }
        })
    };

    let result = task();
    done.store(true, Ordering::Release);
    let _ = reporter.join();
    pb.finish_and_clear();
    result
}

fn prepared(format: ExportFormat, content: String) -> PreparedCopy {
    match format {
        ExportFormat::Text => PreparedCopy {
            text: content,
            ..PreparedCopy::default()
        },
        ExportFormat::Overlay => PreparedCopy {
            overlay: content,
            ..PreparedCopy::default()
        },
    }
}

fn deliver(
    hub: &PdfHub,
    content: PreparedCopy,
    format: ExportFormat,
    output: Option<&Path>,
) -> CliResult<()> {
    let outcome = match output {
        Some(path) => hub.copy(&content, format, &FileSink::new(path))?,
        None => hub.copy(&content, format, &StdoutSink)?,
    };

    match (outcome, output) {
        (CopyOutcome::Empty, _) => {
            eprintln!("{}", "No text found, nothing written".yellow());
        }
        (CopyOutcome::Copied { len, .. }, Some(path)) => {
            println!("{} {} ({} bytes)", "Saved to".green(), path.display(), len);
        }
        (CopyOutcome::Copied { .. }, None) => {}
    }
    Ok(())
}

/// Writes exported content to standard output.
struct StdoutSink;

impl ClipboardSink for StdoutSink {
    fn write(&self, content: &str, _format: ExportFormat) -> pdfhub::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", content).map_err(|e| Error::SinkUnavailable(e.to_string()))
    }
}

/// Writes exported content to a file, replacing it.
struct FileSink {
    path: PathBuf,
}

impl FileSink {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl ClipboardSink for FileSink {
    fn write(&self, content: &str, _format: ExportFormat) -> pdfhub::Result<()> {
        fs::write(&self.path, content)
            .map_err(|e| Error::SinkUnavailable(format!("{}: {}", self.path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sink_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, "old content that is longer").unwrap();

        FileSink::new(&path)
            .write("new", ExportFormat::Text)
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_file_sink_reports_unwritable_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.txt");

        let err = FileSink::new(&path)
            .write("text", ExportFormat::Text)
            .unwrap_err();
        assert!(matches!(err, Error::SinkUnavailable(_)));
    }

    #[test]
    fn test_empty_content_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.html");

        let hub = PdfHub::new();
        deliver(
            &hub,
            prepared(ExportFormat::Overlay, String::new()),
            ExportFormat::Overlay,
            Some(&path),
        )
        .unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_prepared_fills_requested_format() {
        let copy = prepared(ExportFormat::Overlay, "<div></div>".into());
        assert_eq!(copy.get(ExportFormat::Overlay), "<div></div>");
        assert!(copy.get(ExportFormat::Text).is_empty());
    }

    #[test]
    fn test_layout_args_build_options() {
        let cli = Cli::parse_from([
            "pdfhub",
            "--line-tolerance",
            "3.5",
            "--sequential",
            "text",
            "a.pdf",
            "--nfc",
        ]);
        let options = cli.layout.options();
        assert_eq!(options.line_tolerance, 3.5);
        assert!(!options.parallel);
        assert!(options.compose_unicode);
    }
}

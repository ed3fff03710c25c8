//! Extract command - pull invoice fields out of documents.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use payreg_core::{DocumentReader, ExtractionResult, InvoiceParser, InvoiceTextParser, PdfExtractor};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input file or glob pattern (PDF or plain-text dumps)
    #[arg(required = true)]
    input: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Also write a summary CSV to this path
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text summary
    Text,
}

/// Result of processing a single file.
struct FileResult {
    path: PathBuf,
    extraction: Option<ExtractionResult>,
    error: Option<String>,
}

pub fn run(args: ExtractArgs) -> anyhow::Result<()> {
    let start = Instant::now();

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            matches!(ext.to_lowercase().as_str(), "pdf" | "txt")
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files",
            )?
            .progress_chars("=>-"),
    );

    let reader = PdfExtractor::new();
    let parser = InvoiceTextParser::new();
    let mut results = Vec::with_capacity(files.len());

    for path in files {
        match read_document(&path, &reader) {
            Ok(text) => {
                let extraction = parser.parse(&text);
                debug!(
                    "{}: {} fields missing",
                    path.display(),
                    extraction.missing_fields.len()
                );
                results.push(FileResult {
                    path,
                    extraction: Some(extraction),
                    error: None,
                });
            }
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                results.push(FileResult {
                    path,
                    extraction: None,
                    error: Some(e.to_string()),
                });
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    for result in &results {
        if let Some(extraction) = &result.extraction {
            match args.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(extraction)?),
                OutputFormat::Text => {
                    print!("{}", format_extraction_text(&result.path, extraction))
                }
            }
        }
    }

    if let Some(summary_path) = &args.summary {
        write_summary(summary_path, &results)?;
        eprintln!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();
    eprintln!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );

    if !failed.is_empty() {
        eprintln!("{}", style("Failed files:").red());
        for result in &failed {
            eprintln!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn read_document(path: &Path, reader: &PdfExtractor) -> anyhow::Result<String> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let text = match extension.as_str() {
        "pdf" => reader.read_text(path)?,
        _ => fs::read_to_string(path)?,
    };
    if text.trim().is_empty() {
        anyhow::bail!("No text extracted");
    }
    Ok(text)
}

fn format_extraction_text(path: &Path, extraction: &ExtractionResult) -> String {
    let invoice = &extraction.invoice;
    let or_dash = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());

    let mut output = String::new();
    output.push_str(&format!("{}\n", path.display()));
    output.push_str(&format!("  Invoice:  {}\n", or_dash(invoice.invoice_number.clone())));
    output.push_str(&format!(
        "  Date:     {}\n",
        or_dash(invoice.invoice_date.map(|d| d.format("%d.%m.%Y").to_string()))
    ));
    output.push_str(&format!("  Supplier: {}\n", or_dash(invoice.supplier.clone())));
    output.push_str(&format!(
        "  Amount:   {}\n",
        or_dash(invoice.amount.map(|a| format!("{a:.2}")))
    ));
    if !extraction.missing_fields.is_empty() {
        output.push_str(&format!("  Missing:  {}\n", extraction.missing_fields.join(", ")));
    }
    output
}

fn write_summary(path: &Path, results: &[FileResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "invoice_number",
        "invoice_date",
        "supplier",
        "amount",
        "missing_fields",
        "error",
    ])?;

    for result in results {
        let filename = result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");

        match &result.extraction {
            Some(extraction) => {
                let invoice = &extraction.invoice;
                wtr.write_record([
                    filename,
                    if extraction.is_complete() { "complete" } else { "partial" },
                    invoice.invoice_number.as_deref().unwrap_or(""),
                    &invoice.invoice_date.map(|d| d.to_string()).unwrap_or_default(),
                    invoice.supplier.as_deref().unwrap_or(""),
                    &invoice.amount.map(|a| format!("{a:.2}")).unwrap_or_default(),
                    &extraction.missing_fields.join(" "),
                    "",
                ])?;
            }
            None => {
                wtr.write_record([
                    filename,
                    "error",
                    "",
                    "",
                    "",
                    "",
                    "",
                    result.error.as_deref().unwrap_or(""),
                ])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}

//! Output formatters for operation results

use crate::OutputFormat;
use crate::stats::SheetStats;
use anyhow::Result;
use colored::*;
use sheetlink_core::{ErrorReport, ExtractionResult, LinkRecord, MergeResult};
use std::path::Path;

pub fn print_extraction(
    format: OutputFormat,
    file_path: &Path,
    result: &ExtractionResult,
    output_path: &Path,
    dry_run: bool,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let written = (!dry_run && result.output.is_some()).then_some(output_path);
            print_json(file_path, result, written, dry_run)
        }
        OutputFormat::Human => {
            println!("{}", format!("Extracting: {}", file_path.display()).bold());
            println!();

            if let Some(report) = &result.error {
                print_error(report);
                return Ok(());
            }

            print_links(&result.links, result.links_found);
            println!("{}", "Summary:".bold().underline());
            println!("  {} {}", "Rows:".bold(), result.total_rows);
            println!("  {} {}", "Links found:".green().bold(), result.links_found);
            print_destination(output_path, dry_run);
            Ok(())
        }
    }
}

pub fn print_merge(
    format: OutputFormat,
    file_path: &Path,
    result: &MergeResult,
    output_path: &Path,
    dry_run: bool,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let written = (!dry_run && result.output.is_some()).then_some(output_path);
            print_json(file_path, result, written, dry_run)
        }
        OutputFormat::Human => {
            println!("{}", format!("Merging: {}", file_path.display()).bold());
            println!();

            if let Some(report) = &result.error {
                print_error(report);
                return Ok(());
            }

            print_links(&result.links, result.links_created);

            if !result.rejected_rows.is_empty() {
                println!("{}", "Rejected rows:".bold().underline());
                for rejected in &result.rejected_rows {
                    println!(
                        "  {} {} {} ({})",
                        "WARN".yellow().bold(),
                        format!("row {}", rejected.source_row).bright_black(),
                        rejected.url,
                        rejected.reason
                    );
                }
                println!();
            }

            println!("{}", "Summary:".bold().underline());
            println!("  {} {}", "Links created:".green().bold(), result.links_created);
            if !result.rejected_rows.is_empty() {
                println!("  {} {}", "Rejected:".yellow().bold(), result.rejected_rows.len());
            }
            print_destination(output_path, dry_run);
            Ok(())
        }
    }
}

pub fn print_written(format: OutputFormat, output_path: &Path, size: usize) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "output": output_path.display().to_string(),
                "bytes": size,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Human => {
            println!("{} {}", "✓ Wrote".green().bold(), output_path.display());
        }
    }
    Ok(())
}

pub fn print_stats(format: OutputFormat, file_path: &Path, stats: &SheetStats) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "file": file_path.display().to_string(),
                "stats": stats,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Human => {
            println!("{}", format!("Workbook: {}", file_path.display()).bold());
            println!("{} {}", "Sheet:".bold(), stats.sheet_name.cyan().bold());
            println!("  {} {}", "Rows:".bold(), stats.rows);
            println!("  {} {}", "Non-empty cells:".bold(), stats.non_empty_cells);
            println!("  {} {}", "Hyperlinks:".green().bold(), stats.hyperlinks);

            if !stats.columns.is_empty() {
                println!();
                println!("{}", "Hyperlinks by column:".bold().underline());
                for column in &stats.columns {
                    let header = column.header.as_deref().unwrap_or("-");
                    println!(
                        "  {} {} {}",
                        format!("{:>3}", column.column).yellow(),
                        header,
                        format!("({})", column.hyperlinks).bright_black()
                    );
                }
            }
        }
    }
    Ok(())
}

fn print_links(links: &[LinkRecord], total: usize) {
    if links.is_empty() {
        println!("{}", "No hyperlinks found.".yellow());
        println!();
        return;
    }

    println!("{}", "Links:".bold().underline());
    for link in links {
        println!(
            "  {} {} {}",
            format!("{:>5}", link.row).bright_black(),
            link.title.cyan(),
            link.url
        );
    }
    if total > links.len() {
        println!("  {}", format!("... and {} more", total - links.len()).bright_black());
    }
    println!();
}

fn print_error(report: &ErrorReport) {
    println!(
        "{} [{}] {}",
        "ERROR".red().bold(),
        report.code.as_str().bright_black(),
        report.message
    );
}

fn print_destination(output_path: &Path, dry_run: bool) {
    if dry_run {
        println!("\n[DRY RUN] Output would be: {}", output_path.display());
    } else {
        println!("\n{} {}", "Output:".bold(), output_path.display());
    }
}

fn print_json<T: serde::Serialize>(
    file_path: &Path,
    result: &T,
    written: Option<&Path>,
    dry_run: bool,
) -> Result<()> {
    let output = serde_json::json!({
        "file": file_path.display().to_string(),
        "result": result,
        "output": written.map(|path| path.display().to_string()),
        "dryRun": dry_run,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

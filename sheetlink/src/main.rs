use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sheetlink_core::template::{EXTRACT_TEMPLATE_FILE_NAME, MERGE_TEMPLATE_FILE_NAME};
use sheetlink_core::reader;
use sheetlink_core::{ExtractLayout, LinkService, SheetlinkConfig, validate_upload};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod formatter;
mod stats;

#[derive(Parser)]
#[command(name = "sheetlink")]
#[command(about = "Extract hyperlinks from Excel workbooks and build them from Title/URL columns", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human", global = true)]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Copy the rows of a workbook and collect the hyperlinks of one column
    Extract {
        /// Path to the .xlsx file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Header of the column whose hyperlinks are collected
        #[arg(long, default_value = "Title")]
        column: String,

        /// Shape of the output workbook
        #[arg(long, value_enum, default_value = "full-row")]
        layout: LayoutArg,

        /// Output file (defaults to <FILE>_links.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show what would be done without writing the output file
        #[arg(long)]
        dry_run: bool,
    },
    /// Turn the Title and URL columns of a workbook into hyperlinks
    Merge {
        /// Path to the .xlsx file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output file (defaults to <FILE>_merged.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show what would be done without writing the output file
        #[arg(long)]
        dry_run: bool,
    },
    /// Count the hyperlinks of a workbook's first sheet, per column
    Stats {
        /// Path to the .xlsx file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Write the extraction sample workbook
    Template {
        #[arg(short, long, default_value = EXTRACT_TEMPLATE_FILE_NAME)]
        output: PathBuf,
    },
    /// Write the merge sample workbook
    MergeTemplate {
        #[arg(short, long, default_value = MERGE_TEMPLATE_FILE_NAME)]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    /// Every data row with all its cells
    FullRow,
    /// Row number, title and URL for each link
    Summary,
}

impl From<LayoutArg> for ExtractLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::FullRow => ExtractLayout::FullRow,
            LayoutArg::Summary => ExtractLayout::Summary,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON output for scripting
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = load_config(cli.config.as_deref())?;
    let service = LinkService::new(
        config.processing,
        Arc::new(sheetlink_core::InMemoryMetrics::new()),
    );

    let success = match cli.command {
        Command::Extract {
            file,
            column,
            layout,
            output,
            dry_run,
        } => {
            let bytes = read_input(&file)?;
            let result = service.extract(&bytes, Some(&column), layout.into());
            let output_path = output.unwrap_or_else(|| sibling_path(&file, "links"));
            if let Some(data) = result.output.as_deref().filter(|_| !dry_run) {
                write_output(&output_path, data)?;
            }
            formatter::print_extraction(cli.format, &file, &result, &output_path, dry_run)?;
            result.is_success()
        }
        Command::Merge {
            file,
            output,
            dry_run,
        } => {
            let bytes = read_input(&file)?;
            let result = service.merge_from_file(&bytes);
            let output_path = output.unwrap_or_else(|| sibling_path(&file, "merged"));
            if let Some(data) = result.output.as_deref().filter(|_| !dry_run) {
                write_output(&output_path, data)?;
            }
            formatter::print_merge(cli.format, &file, &result, &output_path, dry_run)?;
            result.is_success()
        }
        Command::Stats { file } => {
            let bytes = read_input(&file)?;
            let sheet = validate_upload(&bytes, service.config().max_file_size_bytes())
                .and_then(|_| {
                    reader::read_first_sheet_limited(
                        &bytes,
                        service.config().max_decompressed_size_bytes(),
                    )
                })
                .map_err(|e| anyhow::anyhow!("{}", e.report()))
                .with_context(|| format!("Failed to read workbook: {}", file.display()))?;
            formatter::print_stats(cli.format, &file, &stats::collect(&sheet))?;
            true
        }
        Command::Template { output } => {
            let template = service
                .create_template()
                .map_err(|report| anyhow::anyhow!("{report}"))?;
            write_output(&output, &template)?;
            formatter::print_written(cli.format, &output, template.len())?;
            true
        }
        Command::MergeTemplate { output } => {
            let template = service
                .create_merge_template()
                .map_err(|report| anyhow::anyhow!("{report}"))?;
            write_output(&output, &template)?;
            formatter::print_written(cli.format, &output, template.len())?;
            true
        }
    };

    std::process::exit(if success { 0 } else { 1 });
}

fn load_config(path: Option<&Path>) -> Result<SheetlinkConfig> {
    if let Some(config_path) = path {
        return SheetlinkConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()));
    }

    // Fall back to sheetlink.toml in the current directory
    let default_config_path = PathBuf::from("sheetlink.toml");
    if default_config_path.exists() {
        SheetlinkConfig::from_file(&default_config_path).with_context(|| {
            format!(
                "Failed to load config from {}",
                default_config_path.display()
            )
        })
    } else {
        Ok(SheetlinkConfig::default())
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))
}

/// `<dir>/<stem>_<suffix>.xlsx` next to `input`
fn sibling_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook".to_string());
    input.with_file_name(format!("{stem}_{suffix}.xlsx"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sibling_path() {
        assert_eq!(
            sibling_path(Path::new("data/report.xlsx"), "links"),
            PathBuf::from("data/report_links.xlsx")
        );
        assert_eq!(
            sibling_path(Path::new("legacy.xls"), "merged"),
            PathBuf::from("legacy_merged.xlsx")
        );
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "sheetlink",
            "extract",
            "in.xlsx",
            "--column",
            "Name",
            "--layout",
            "summary",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Command::Extract {
                column,
                layout,
                dry_run,
                output,
                ..
            } => {
                assert_eq!(column, "Name");
                assert_eq!(ExtractLayout::from(layout), ExtractLayout::Summary);
                assert!(dry_run);
                assert!(output.is_none());
            }
            _ => panic!("expected extract"),
        }

        let cli = Cli::try_parse_from(["sheetlink", "template", "-f", "json"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
        match cli.command {
            Command::Template { output } => {
                assert_eq!(output, PathBuf::from(EXTRACT_TEMPLATE_FILE_NAME))
            }
            _ => panic!("expected template"),
        }
    }
}

// pricesync CLI - apply a supplier price list to the product catalog

mod config;
mod exit_codes;
mod headers;
mod logger;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use pricesync_io::IoError;
use pricesync_recon::ReconError;

use exit_codes::{io_exit_code, recon_exit_code, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "pricesync")]
#[command(about = "Update catalog prices from a supplier price list")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Arguments for `run` when no subcommand is given
    #[command(flatten)]
    run: RunArgs,

    /// Verbose logging (debug level)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the target catalog against the source price list (default)
    #[command(after_help = "\
Examples:
  pricesync run
  pricesync run --config prices/pricesync.toml --dry-run
  pricesync run --source Lista002.xlsx --output public/Nueva.xlsx
  pricesync run --json --report plan.json")]
    Run(RunArgs),

    /// Print the header row of every sheet in one or more files
    #[command(after_help = "\
Examples:
  pricesync headers public/Lista001.xlsx
  pricesync headers public/*.xlsx --json")]
    Headers {
        /// Spreadsheet or CSV files to inspect
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Validate the configuration and show the resolved paths
    Check {
        /// Config file (default: ./pricesync.toml when present)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Config file (default: ./pricesync.toml when present)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Source price list (overrides source.file)
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Sheet to read from the source price list (overrides source.sheet)
    #[arg(long)]
    pub source_sheet: Option<String>,

    /// Target catalog workbook (overrides target.file)
    #[arg(long)]
    pub target: Option<PathBuf>,

    /// Target sheet name (overrides target.sheet)
    #[arg(long)]
    pub sheet: Option<String>,

    /// Output workbook (overrides output.file)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Column holding product codes in both files (overrides key_column)
    #[arg(long)]
    pub key_column: Option<String>,

    /// Source price column, skips auto-detection (overrides source.price_column)
    #[arg(long)]
    pub price_column: Option<String>,

    /// Compute the plan without writing the output workbook
    #[arg(long)]
    pub dry_run: bool,

    /// Print the summary as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Write the full reconciliation (every planned update) as JSON
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init_cli_logger(cli.verbose);

    let result = match cli.command {
        None => run::cmd_run(cli.run),
        Some(Commands::Run(args)) => run::cmd_run(args),
        Some(Commands::Headers { files, json }) => headers::cmd_headers(files, json),
        Some(Commands::Check { config }) => config::cmd_check(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::NoPriceColumn { .. } => {
                Some("name the column with --price-column or source.price_column".to_string())
            }
            ReconError::MissingSheet { .. } => {
                Some("pick the sheet with --sheet / --source-sheet".to_string())
            }
            ReconError::MissingColumn { column, .. } => Some(format!(
                "headers are matched exactly after trimming; check '{column}' with `pricesync headers`"
            )),
            _ => None,
        };
        Self { code: recon_exit_code(&err), message: err.to_string(), hint }
    }
}

impl From<IoError> for CliError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::Recon(inner) => inner.into(),
            IoError::NotFound(ref path) => {
                let hint = format!(
                    "check the path or override it (--source/--target); looked for {}",
                    path.display()
                );
                Self { code: io_exit_code(&err), message: err.to_string(), hint: Some(hint) }
            }
            other => Self::new(io_exit_code(&other), other.to_string()),
        }
    }
}

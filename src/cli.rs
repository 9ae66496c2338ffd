use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{export::EXPORT_FILE_NAME, loader::DEFAULT_TABLE};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Clean, load, and summarize luxury housing listings",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Normalize headers and coerce prices of a raw listing CSV
    Clean(CleanArgs),
    /// Replace a database table with the contents of a cleaned CSV
    Load(LoadArgs),
    /// Compute the dashboard's aggregate views for a filter selection
    Views(ViewsArgs),
    /// Write the filtered rows of the cleaned table to CSV
    Export(ExportArgs),
    /// Write the default listing schema as YAML
    Schema(SchemaArgs),
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    /// Raw listing CSV to clean
    #[arg(long)]
    pub input: PathBuf,
    /// Destination for the cleaned CSV (overwritten; `-` for stdout)
    #[arg(long)]
    pub output: PathBuf,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    /// Cleaned CSV to load
    #[arg(long)]
    pub input: PathBuf,
    /// Database URL such as `sqlite://listings.db` or `sqlite::memory:`
    #[arg(long = "db_url", alias = "db-url")]
    pub db_url: String,
    /// Table to replace
    #[arg(long, default_value = DEFAULT_TABLE)]
    pub table: String,
}

/// Row selection shared by `views` and `export`.
#[derive(Debug, Args, Default)]
pub struct FilterArgs {
    /// Inclusive numeric range of the form `field=lo..hi`
    #[arg(long = "range", action = clap::ArgAction::Append)]
    pub ranges: Vec<String>,
    /// Allowed labels of the form `field=a,b,c`
    #[arg(long = "include", action = clap::ArgAction::Append)]
    pub includes: Vec<String>,
    /// Start from the dashboard's opening selection before applying other filters
    #[arg(long = "defaults")]
    pub defaults: bool,
}

#[derive(Debug, Args)]
pub struct ViewsArgs {
    /// Cleaned CSV (defaults to data/cleaned_luxury_housing.csv)
    #[arg(short = 'i', long)]
    pub input: Option<PathBuf>,
    /// Schema YAML overriding the built-in listing layout
    #[arg(long)]
    pub schema: Option<PathBuf>,
    #[command(flatten)]
    pub filters: FilterArgs,
    /// Emit the views as JSON instead of tables
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Cleaned CSV (defaults to data/cleaned_luxury_housing.csv)
    #[arg(short = 'i', long)]
    pub input: Option<PathBuf>,
    /// Destination CSV (`-` for stdout)
    #[arg(short = 'o', long, default_value = EXPORT_FILE_NAME)]
    pub output: PathBuf,
    /// Schema YAML overriding the built-in listing layout
    #[arg(long)]
    pub schema: Option<PathBuf>,
    #[command(flatten)]
    pub filters: FilterArgs,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Destination YAML file (stdout if omitted)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

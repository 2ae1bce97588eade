use clap::{Args, Parser, Subcommand};
use course_upload::importer::ImportMode;
use course_upload::tracker::OutputMode;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "course-upload")]
#[command(about = "Bulk course import with category path resolution", long_about = None)]
pub struct Cli {
    /// SQLite database file, overrides `database_path`
    #[arg(long, global = true)]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import courses from a CSV file
    Upload(UploadArgs),
    /// List persisted categories with their flattened paths
    Categories,
    /// Print configuration values
    PrintConfig,
    /// Truncate all course and category tables
    TruncateDb,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// CSV file to import
    pub csv: PathBuf,

    /// Report what would happen without writing anything
    #[arg(long)]
    pub preview: bool,

    #[arg(long, value_enum)]
    pub mode: Option<ImportMode>,

    #[arg(long, value_enum)]
    pub output: Option<OutputMode>,

    /// Fail rows whose category path does not exist instead of creating it
    #[arg(long)]
    pub no_category_creation: bool,

    /// Honour `delete=1` rows
    #[arg(long)]
    pub allow_deletes: bool,

    /// Template for rows without a shortname, e.g. `%i` or `%+5f`
    #[arg(long)]
    pub shortname_template: Option<String>,
}

mod cli;
mod logging;
mod prompt;
mod spinner;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands, UploadArgs};
use colored::*;
use course_upload::config::AppConfig;
use course_upload::importer::Importer;
use course_upload::progress::{ProgressReporter, SilentProgress};
use course_upload::storage::Database;
use course_upload::tracker::{OutputMode, RunTotals};
use dotenv::dotenv;
use indicatif::HumanDuration;
use std::fs::File;
use std::io::{self, BufReader};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

fn main() -> ExitCode {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();
    let database = args.database.as_deref();

    let result = match &args.command {
        Some(Commands::Upload(upload)) => run_upload(database, upload),
        Some(Commands::Categories) => run_categories(database),
        Some(Commands::PrintConfig) => run_print_config(database),
        Some(Commands::TruncateDb) => run_truncate_db(database),
        None => Cli::command().print_long_help().map_err(Into::into),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn load_config(database: Option<&str>) -> Result<AppConfig> {
    let mut config = AppConfig::load().context("Error loading configuration")?;
    if let Some(database) = database {
        config.database_path = database.to_string();
    }
    debug!("config: {:?}", config);
    Ok(config)
}

fn open_database(config: &AppConfig) -> Result<Database> {
    Database::open(&config.database_path)
        .with_context(|| format!("Error opening database {}", config.database_path))
}

fn run_upload(database: Option<&str>, upload: &UploadArgs) -> Result<()> {
    let mut config = load_config(database)?;
    if upload.preview {
        config.preview = true;
    }
    if let Some(mode) = upload.mode {
        config.import_mode = mode;
    }
    if let Some(output) = upload.output {
        config.output = output;
    }
    if upload.no_category_creation {
        config.allow_category_creation = false;
    }
    if upload.allow_deletes {
        config.allow_deletes = true;
    }
    if let Some(template) = &upload.shortname_template {
        config.shortname_template = Some(template.clone());
    }

    let options = config.import_options().context("Invalid import options")?;
    let db = open_database(&config)?;
    let file = File::open(&upload.csv)
        .with_context(|| format!("Error opening {}", upload.csv.display()))?;

    info!("Uploading courses from {}", upload.csv.display());
    let started = Instant::now();

    let stdout = io::stdout();
    let mut reporter = config.output.reporter(stdout.lock());
    let progress: Box<dyn ProgressReporter> = match config.output {
        OutputMode::None => Box::new(spinner::CliReporter::new()),
        _ => Box::new(SilentProgress),
    };

    let mut importer = Importer::new(&db, options)?;
    let totals = importer.run(BufReader::new(file), reporter.as_mut(), progress.as_ref())?;

    print_summary(&totals, started.elapsed());
    Ok(())
}

fn print_summary(totals: &RunTotals, elapsed: Duration) {
    let verb = if totals.preview { "previewed" } else { "processed" };
    info!(
        "{} rows {} in {}",
        totals.total,
        verb,
        HumanDuration(elapsed)
    );
    info!("{}", summary_counts(totals));
}

fn summary_counts(totals: &RunTotals) -> String {
    format!(
        "created: {}, updated: {}, deleted: {}, categories: {}, errors: {}",
        totals.created.to_string().green(),
        totals.updated.to_string().cyan(),
        totals.deleted.to_string().yellow(),
        totals.categories_created.to_string().blue(),
        totals.errors.to_string().red(),
    )
}

fn run_categories(database: Option<&str>) -> Result<()> {
    let config = load_config(database)?;
    let db = open_database(&config)?;
    let categories = db.list_category_paths()?;
    if categories.is_empty() {
        println!("No categories");
        return Ok(());
    }
    for (category, path) in categories {
        let idnumber = category.idnumber.unwrap_or_default();
        println!("{}\t{}\t{}", category.id, path, idnumber);
    }
    Ok(())
}

fn run_print_config(database: Option<&str>) -> Result<()> {
    let config = load_config(database)?;
    print!("{}", config.to_toml()?);
    Ok(())
}

fn run_truncate_db(database: Option<&str>) -> Result<()> {
    let config = load_config(database)?;
    let confirmed = prompt::prompt_confirm(
        &format!("Delete every course and category in {}?", config.database_path),
        Some(false),
    )?;
    if !confirmed {
        info!("Truncate cancelled");
        return Ok(());
    }
    let db = open_database(&config)?;
    db.truncate_all()?;
    info!("Database {} truncated", config.database_path);
    Ok(())
}

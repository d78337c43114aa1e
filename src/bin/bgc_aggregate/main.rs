use std::{path::PathBuf, process::ExitCode};

use bgc_rs::{
    config::{ProvidersConfig, TemplateSet},
    dateranges::DateRangeGenerator,
    io::savers::save_from_dateranges,
    loaders::LoadReport,
    logging::init_logging,
    providers,
    storer::{Storer, TableView},
};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use config::RunConfig;
use error_stack::ResultExt;
use errors::CliError;
use indexmap::IndexMap;
use rayon::prelude::*;
use tabled::settings::Style;

mod config;
mod errors;

fn main() -> ExitCode {
    let clargs = Cli::parse();

    if let Err(e) = init_logging(clargs.verbosity.log_level_filter(), clargs.log_file.as_deref()) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match driver(clargs) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("bgc_aggregate did not complete successfully:\n{e:?}");
            ExitCode::FAILURE
        }
    }
}

fn driver(clargs: Cli) -> error_stack::Result<(), CliError> {
    let run = RunConfig::load(&clargs.config).change_context(CliError::ReadingConfig)?;
    let templates = match &run.variables {
        Some(p) => TemplateSet::from_toml_file(p).change_context(CliError::ReadingConfig)?,
        None => TemplateSet::standard(),
    };
    let providers_config = ProvidersConfig::from_toml_file(&run.providers_config)
        .change_context(CliError::ReadingConfig)?;

    let loaders = run.providers.iter()
        .map(|name| {
            let loader = providers::build(name, &templates, &providers_config)
                .change_context_lazy(|| CliError::Configuration(name.clone()))?;
            loader.validate()
                .change_context_lazy(|| CliError::Configuration(name.clone()))?;
            Ok(loader)
        }).collect::<error_stack::Result<Vec<_>, CliError>>()?;

    if clargs.check_config_only {
        println!("Loaded configuration:\n{run:#?}");
        println!("Providers: {}", loaders.iter().map(|l| l.provider()).collect::<Vec<_>>().join(", "));
        return Ok(());
    }

    let constraints = run.constraints();
    log::info!("Loading {} provider(s) with constraints: {constraints}", loaders.len());
    let results = loaders.par_iter()
        .map(|l| l.load(&constraints))
        .collect::<Vec<_>>();

    let mut reports: Vec<LoadReport> = vec![];
    let mut by_category: IndexMap<String, Vec<Storer>> = IndexMap::new();
    for (loader, res) in loaders.iter().zip(results) {
        let (storer, report) = res.change_context_lazy(|| CliError::Loading(loader.provider().to_string()))?;
        reports.push(report);
        by_category.entry(storer.category().to_string()).or_default().push(storer);
    }

    println!("{}", tabled::Table::new(reports.iter()).with(Style::blank()));

    let priority = run.priority();
    let key = run.duplicate_key();
    for (category, storers) in by_category.iter() {
        let merged = Storer::union(storers.iter())
            .change_context_lazy(|| CliError::Aggregating(category.clone()))?;
        let deduplicated = merged.deduplicate(priority.as_slice(), &key);
        log::info!(
            "{category}: {} rows from {} provider(s), {} duplicate(s) removed",
            deduplicated.len(), storers.len(), merged.len() - deduplicated.len()
        );
        save_category(&run, category, &deduplicated)?;
    }

    Ok(())
}

fn save_category(run: &RunConfig, category: &str, storer: &Storer) -> error_stack::Result<(), CliError> {
    if let (Some(start), Some(end)) = (run.start_date, run.end_date) {
        let interval = run.date_interval().change_context_lazy(|| CliError::Saving(category.to_string()))?;
        let ranges = DateRangeGenerator::new(start, end, interval)
            .change_context_lazy(|| CliError::Saving(category.to_string()))?;
        save_from_dateranges(storer, &run.output, &ranges, run.per_provider)
            .change_context_lazy(|| CliError::Saving(category.to_string()))?;
    } else {
        std::fs::create_dir_all(&run.output)
            .change_context_lazy(|| CliError::Custom(format!("Could not create {}", run.output.display())))?;
        let path = run.output.join(format!("bgc_{category}.txt"));
        storer.save(&path).change_context_lazy(|| CliError::Saving(category.to_string()))?;
        log::info!("Wrote {}", path.display());
    }
    Ok(())
}

/// Aggregate biogeochemical measurements from several data providers.
///
/// Each configured provider is loaded, filtered with the run's constraints and
/// converted to common variables. Measurements present in more than one provider are
/// kept only once, from the provider with the highest priority, and the result is
/// written as text files split by date ranges.
#[derive(Debug, clap::Parser)]
struct Cli {
    /// Path to the run configuration file (TOML)
    config: PathBuf,

    /// Also write the log to this file
    #[clap(long)]
    log_file: Option<PathBuf>,

    /// Load the configuration and set up the providers, then exit without loading data
    #[clap(long)]
    check_config_only: bool,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,
}

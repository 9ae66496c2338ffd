pub mod cache;
pub mod cleaning;
pub mod cli;
pub mod coerce;
pub mod dashboard;
pub mod data;
pub mod dataset;
pub mod error;
pub mod export;
pub mod filter;
pub mod io_utils;
pub mod loader;
pub mod normalize;
pub mod schema;
pub mod stats;
pub mod table;
pub mod views;

use std::{env, io::Write, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cache::LoadCache,
    cli::{Cli, Commands, FilterArgs},
    dashboard::Dashboard,
    dataset::Dataset,
    filter::FilterPredicate,
    schema::Schema,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("listing_pipeline", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Clean(args) => handle_clean(&args),
        Commands::Load(args) => handle_load(&args),
        Commands::Views(args) => handle_views(&args),
        Commands::Export(args) => handle_export(&args),
        Commands::Schema(args) => handle_schema(&args),
    }
}

fn handle_clean(args: &cli::CleanArgs) -> Result<()> {
    let report = cleaning::clean(&args.input, &args.output)
        .with_context(|| format!("Cleaning {:?}", args.input))?;
    debug!("Cleaned headers: {:?}", report.headers);
    Ok(())
}

fn handle_load(args: &cli::LoadArgs) -> Result<()> {
    info!(
        "Loading '{}' into table '{}'",
        args.input.display(),
        args.table
    );
    loader::load_csv(&args.input, &args.db_url, &args.table)
        .with_context(|| format!("Loading {:?} into {}", args.input, args.db_url))?;
    Ok(())
}

fn handle_views(args: &cli::ViewsArgs) -> Result<()> {
    let schema = load_schema(args.schema.as_deref())?;
    let path = dataset::resolve_dataset_path(args.input.as_deref())?;
    let mut cache = LoadCache::default();
    let dataset = cache.get_or_load(&path, &schema)?;
    let predicate = build_filter(&dataset, &args.filters)?;
    let dashboard = Dashboard::build(&dataset, &predicate)?;
    for view in dashboard.insufficient_views() {
        warn!("View '{view}' has insufficient data for the current filters");
    }

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    if args.json {
        serde_json::to_writer_pretty(&mut handle, &dashboard).context("Serializing views")?;
        writeln!(handle).context("Writing views")?;
    } else {
        handle
            .write_all(dashboard.render().as_bytes())
            .context("Writing views")?;
    }
    Ok(())
}

fn handle_export(args: &cli::ExportArgs) -> Result<()> {
    let schema = load_schema(args.schema.as_deref())?;
    let path = dataset::resolve_dataset_path(args.input.as_deref())?;
    let mut cache = LoadCache::default();
    let dataset = cache.get_or_load(&path, &schema)?;
    let predicate = build_filter(&dataset, &args.filters)?;
    let selection = predicate.apply(&dataset)?;
    export::export_selection(&selection, &args.output)
        .with_context(|| format!("Exporting to {:?}", args.output))?;
    Ok(())
}

fn handle_schema(args: &cli::SchemaArgs) -> Result<()> {
    let schema = Schema::listing();
    match &args.output {
        Some(path) => {
            schema
                .save(path)
                .with_context(|| format!("Writing schema to {path:?}"))?;
            info!("Schema with {} field(s) written to {path:?}", schema.fields.len());
        }
        None => print!("{}", schema.to_yaml_string()?),
    }
    Ok(())
}

fn load_schema(path: Option<&std::path::Path>) -> Result<Schema> {
    match path {
        Some(path) => {
            Schema::load(path).with_context(|| format!("Loading schema from {path:?}"))
        }
        None => Ok(Schema::listing()),
    }
}

/// Builds the row filter for `views` and `export`.
///
/// Explicit `--range`/`--include` constraints replace any default constraint on
/// the same field.
pub fn build_filter(dataset: &Dataset, args: &FilterArgs) -> Result<FilterPredicate> {
    let mut predicate = if args.defaults {
        FilterPredicate::dashboard_defaults(dataset)?
    } else {
        FilterPredicate::new()
    };
    for spec in &args.ranges {
        let range = FilterPredicate::parse_range(spec)?;
        predicate.ranges.retain(|r| r.field != range.field);
        predicate.ranges.push(range);
    }
    for spec in &args.includes {
        let set = FilterPredicate::parse_members(spec)?;
        predicate.sets.retain(|s| s.field != set.field);
        predicate.sets.push(set);
    }
    debug!("Filter: {predicate:?}");
    Ok(predicate)
}

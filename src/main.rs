use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hcqr::config::{GridConfig, IndexConfig};
use hcqr::grid::GridRegistry;
use hcqr::hcqr::{Hcqr, HcqrStats, StaticHcqr};
use hcqr::index::{CellIndexSpec, FromCellIndex, HcqrIndex, MemoryCellIndex, build_index};
use hcqr::query::{QueryEvaluator, parse_query};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "hcqr")]
#[command(about = "Evaluate and inspect hierarchical compressed query results")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a query against a cell index fixture
    Query {
        /// Cell index fixture (JSON)
        fixture: PathBuf,

        /// Query string
        #[arg(required = true, trailing_var_arg = true)]
        query: Vec<String>,

        /// Index configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the result in static form to this file
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Print at most this many item ids
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Show statistics of a stored static result
    Inspect {
        /// Static HCQR file
        file: PathBuf,

        /// Cell index fixture the result was computed from
        #[arg(short, long)]
        fixture: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Query {
            fixture,
            query,
            config,
            out,
            limit,
        } => run_query(&fixture, &query.join(" "), config.as_deref(), out.as_deref(), limit)?,
        Commands::Inspect { file, fixture } => inspect(&file, &fixture)?,
    }

    Ok(())
}

fn load_cells(fixture: &Path, grid: &GridConfig) -> Result<Arc<MemoryCellIndex>> {
    let spec = CellIndexSpec::load(fixture)
        .with_context(|| format!("failed to load fixture {}", fixture.display()))?;
    let cells = MemoryCellIndex::from_spec_with_grid(&spec, &GridRegistry::with_defaults(), grid)
        .with_context(|| format!("failed to build cell index from {}", fixture.display()))?;
    Ok(Arc::new(cells))
}

fn run_query(fixture: &Path, query: &str, config: Option<&Path>, out: Option<&Path>, limit: usize) -> Result<()> {
    let config = match config {
        Some(path) => IndexConfig::load(path).with_context(|| format!("failed to load config {}", path.display()))?,
        None => IndexConfig::default(),
    };
    let index = build_index(&config, load_cells(fixture, &config.grid)?)?;

    let parsed = parse_query(query);
    let result = QueryEvaluator::new(index.as_ref())
        .with_default_query_type(config.default_query_type)
        .evaluate(&parsed)
        .with_context(|| format!("failed to evaluate '{}'", query))?;

    let items = result.items()?;
    println!("Query:            {}", query);
    println!("Representation:   {}", result.representation());
    print_stats(&result.stats()?);

    println!();
    println!("Items ({}):", items.len());
    for id in items.iter().take(limit) {
        println!("  {}", id);
    }
    if items.len() > limit as u64 {
        println!("  ... and {} more", items.len() - limit as u64);
    }

    if let Some(path) = out {
        result
            .to_static()?
            .save(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!();
        println!("Wrote static result to {}", path.display());
    }

    Ok(())
}

fn inspect(file: &Path, fixture: &Path) -> Result<()> {
    let config = IndexConfig::default();
    let base = FromCellIndex::new(load_cells(fixture, &config.grid)?, config.pixel_cache_size);
    let tree = StaticHcqr::open(file, base.context().clone())
        .with_context(|| format!("failed to open {}", file.display()))?;

    println!("File:             {}", file.display());
    println!("Root pixel:       {}", tree.root_pixel());
    println!("Tree bytes:       {}", tree.tree().data_len());
    println!("Fetched sets:     {}", tree.fetched_len());

    let result = Hcqr::Static(tree);
    result.validate().context("stored tree is invalid")?;
    print_stats(&result.stats()?);

    Ok(())
}

fn print_stats(stats: &HcqrStats) {
    println!("Nodes:            {}", stats.nodes);
    println!("Depth:            {}", stats.depth);
    println!("Item count:       {}", stats.items);
    println!("  internal        {}", stats.internal);
    println!("  full match      {}", stats.full_match);
    println!("  partial match   {}", stats.partial_match);
    println!("  fetched         {}", stats.fetched);
}

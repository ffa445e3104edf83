//! Zonal class-area table from a serialised grid and polygon set.
//!
//! Inputs are JSON: a `GridStore` (`rows`, `cols`, `data`, `transform`,
//! optional `nodata`) and an array of polygons (`id`, `rings` as lists of
//! `[x, y]`). Output is the dense table as CSV or JSON.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use zonal_core::{GridStore, Polygon, RasterStrategy, ResultTable, ZonalConfig, ZonalEngine};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "tabulate", about = "Per-polygon class areas over a categorical raster")]
struct Args {
    /// GridStore JSON file.
    #[arg(short, long)]
    grid: PathBuf,

    /// JSON array of polygons.
    #[arg(short, long)]
    polygons: PathBuf,

    /// Engine config JSON; flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output file; stdout when absent.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value = "csv")]
    format: Format,

    /// Multiply every area by this factor (1e-4 turns m² into hectares).
    #[arg(long, default_value = "1.0")]
    scale: f64,

    /// Worker count; 1 forces sequential processing.
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// Rasterization strategy.
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Skip the ring self-intersection precheck.
    #[arg(long)]
    no_simplicity_check: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Csv,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    Scanline,
    PointInPolygon,
}

impl From<StrategyArg> for RasterStrategy {
    fn from(s: StrategyArg) -> Self {
        match s {
            StrategyArg::Scanline => RasterStrategy::Scanline,
            StrategyArg::PointInPolygon => RasterStrategy::PointInPolygon,
        }
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct JsonReport<'a> {
    table: &'a ResultTable,
    failures: Vec<JsonFailure<'a>>,
}

#[derive(Serialize)]
struct JsonFailure<'a> {
    index: usize,
    id: &'a str,
    error: String,
}

/// Unknown names fall back to `info`.
fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn init_logging(level: &str) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(level))
        .with_target(false)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn load_config(args: &Args) -> Result<ZonalConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Cannot read {}", path.display()))?;
            ZonalConfig::from_json_str(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => ZonalConfig::default(),
    };
    apply_overrides(&mut config, args);
    Ok(config)
}

/// Flags win over whatever the config file set.
fn apply_overrides(config: &mut ZonalConfig, args: &Args) {
    if let Some(n) = args.workers {
        config.workers = Some(n);
    }
    if let Some(s) = args.strategy {
        config.strategy = s.into();
    }
    if args.no_simplicity_check {
        config.check_simplicity = false;
    }
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;
    let config = load_config(&args)?;

    let grid: GridStore = serde_json::from_str(
        &fs::read_to_string(&args.grid)
            .with_context(|| format!("Cannot read {}", args.grid.display()))?,
    )
    .with_context(|| format!("parsing {}", args.grid.display()))?;
    let polygons: Vec<Polygon> = serde_json::from_str(
        &fs::read_to_string(&args.polygons)
            .with_context(|| format!("Cannot read {}", args.polygons.display()))?,
    )
    .with_context(|| format!("parsing {}", args.polygons.display()))?;

    tracing::info!(
        rows = grid.rows(),
        cols = grid.cols(),
        cell_area = grid.cell_area(),
        extent = ?grid.extent(),
        polygons = polygons.len(),
        "inputs loaded"
    );

    let on_progress = |p: zonal_core::Progress<'_>| {
        if p.completed % 1000 == 0 || p.completed == p.total {
            tracing::info!(completed = p.completed, total = p.total, "progress");
        }
    };
    let hooks = zonal_core::RunHooks { progress: Some(&on_progress), cancel: None };
    let report = ZonalEngine::new(&grid, config).run_with(&polygons, hooks)?;

    for f in &report.failures {
        tracing::debug!(index = f.index, id = %f.id, "excluded: {}", f.error);
    }

    let table = if args.scale == 1.0 { report.table.clone() } else { report.table.scaled(args.scale) };

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            fs::File::create(path).with_context(|| format!("Write failed: {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut out = BufWriter::new(sink);
    match args.format {
        Format::Csv => table.write_csv(&mut out)?,
        Format::Json => {
            let failures = report
                .failures
                .iter()
                .map(|f| JsonFailure { index: f.index, id: &f.id, error: f.error.to_string() })
                .collect();
            serde_json::to_writer_pretty(&mut out, &JsonReport { table: &table, failures })?;
            writeln!(out)?;
            out.flush()?;
        }
    }

    if !report.is_complete() {
        eprintln!("{} polygon(s) excluded: {}", report.failures.len(), report.failed_ids().join(", "));
    }
    Ok(())
}

// ── Unit tests ────────────────────────────────────────────────────────────────

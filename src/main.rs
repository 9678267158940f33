// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::{error, info};
use popgraph::{Location, Model, PathFinder, SearchLimits};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Builds a model from OSM data and population rings
    Build(BuildArgs),

    /// Finds the best route between two buildings of a model, printed as GeoJSON
    Route(RouteArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// File with population ring ("rng") records
    #[arg(long)]
    rings: PathBuf,

    /// OSM XML file, optionally gzip- or bzip2-compressed
    #[arg(long)]
    osm: PathBuf,

    /// Where to save the model
    #[arg(long)]
    out_model: PathBuf,

    /// File with "ignore" and "remap" adjustments
    #[arg(long)]
    adjust_model: Option<PathBuf>,

    /// Number of worker threads (0 uses all cores)
    #[arg(long, default_value_t = 0)]
    workers: usize,

    /// Where to save a GeoJSON view of the ring selected with --pop-ring
    #[arg(long, requires = "pop_ring")]
    geojson: Option<PathBuf>,

    /// Index of the population ring to export with --geojson
    #[arg(long, requires = "geojson")]
    pop_ring: Option<usize>,
}

#[derive(Args)]
struct RouteArgs {
    /// Model file created with the build command
    #[arg(long)]
    model: PathBuf,

    #[arg(long)]
    start_bld: i64,

    #[arg(long)]
    end_bld: i64,

    /// Minimize travel time instead of distance
    #[arg(long)]
    use_time: bool,

    /// Minimal margin (in miles) of the searched area around both buildings
    #[arg(long, requires = "search_scale")]
    search_dist: Option<f64>,

    /// Additional margin of the searched area, as a fraction of the distance between buildings
    #[arg(long, requires = "search_dist")]
    search_scale: Option<f64>,
}

/// Failure of a command, mapped onto the process exit code.
#[derive(Debug, thiserror::Error)]
enum Failure {
    #[error("ring data: {0}")]
    Rings(#[source] popgraph::model::Error),

    #[error("model file: {0}")]
    Model(#[source] popgraph::model::Error),

    #[error("{0}")]
    Osm(#[from] popgraph::osm::Error),

    #[error("{0}")]
    Route(#[from] popgraph::PathError),

    #[error("output: {0}")]
    Output(#[from] io::Error),
}

impl Failure {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Rings(_) => 2,
            Self::Model(_) | Self::Output(_) => 3,
            Self::Osm(_) => 4,
            Self::Route(_) => 5,
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    colog::init();

    let result = match cli.command {
        Command::Build(args) => build(args),
        Command::Route(args) => route(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn build(args: BuildArgs) -> Result<(), Failure> {
    let rings = popgraph::model::read_rings_from_file(&args.rings).map_err(Failure::Rings)?;
    info!("Loaded {} population rings", rings.len());

    let adjustments = match &args.adjust_model {
        Some(path) => popgraph::population::Adjustments::from_file(path)?,
        None => popgraph::population::Adjustments::default(),
    };

    let options = popgraph::osm::Options {
        workers: args.workers,
        ..Default::default()
    };
    let document = popgraph::osm::Document::from_file(&options, &args.osm)?;
    let model = popgraph::osm::build_model(&document, rings, &adjustments, &options)?;

    model.save(&args.out_model).map_err(Failure::Model)?;
    info!("Saved model to {}", args.out_model.display());

    if let (Some(path), Some(ring)) = (&args.geojson, args.pop_ring) {
        let mut w = BufWriter::new(File::create(path)?);
        popgraph::geojson::write_ring(&mut w, &model, ring)?;
        w.flush()?;
        info!("Saved ring {} to {}", ring, path.display());
    }

    Ok(())
}

fn route(args: RouteArgs) -> Result<(), Failure> {
    let model = Model::load(&args.model).map_err(Failure::Model)?;
    let limits = match (args.search_dist, args.search_scale) {
        (Some(min_dist), Some(scale)) => Some(SearchLimits { min_dist, scale }),
        _ => None,
    };

    let path = PathFinder::new(&model).find_best_path(
        Location::Building(args.start_bld),
        Location::Building(args.end_bld),
        args.use_time,
        limits,
    )?;

    if path.is_empty() {
        info!("Building {} is unreachable from {}", args.end_bld, args.start_bld);
    } else {
        info!("Found a route with {} hops, cost {:.4}", path.hops(), path.cost());
    }

    let stdout = io::stdout();
    let mut w = stdout.lock();
    popgraph::geojson::write_path(&mut w, &model, &path)?;
    Ok(())
}

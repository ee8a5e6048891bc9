mod config;
mod loader;
mod mapgen;
mod render;

use clap::{Parser, ValueEnum};
use config::PlannerConfig;
use harmonic_core::{
    BoundaryValues, FieldSampler, GridMap, HarmonicField, SolveReport, Solver, SolverConfig,
    SweepOrder, Termination, load_checkpoint, save_checkpoint, trace_path,
};
use log::info;
use mapgen::{generate_map, sample_map_kind};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Map image: dark = obstacle, red = goal, light = free
    #[arg(long, required_unless_present = "random_seed", conflicts_with = "random_seed")]
    map: Option<PathBuf>,

    /// Generate a random map from this seed instead of loading one
    #[arg(long)]
    random_seed: Option<u64>,

    /// Random map width
    #[arg(long, default_value_t = 64)]
    width: usize,

    /// Random map height
    #[arg(long, default_value_t = 64)]
    height: usize,

    /// JSON config with optional boundary/solver/thresholds/path sections
    #[arg(long)]
    config: Option<PathBuf>,

    /// Convergence threshold on the per-sweep max change
    #[arg(long)]
    epsilon: Option<f64>,

    /// Sweep cap (0 = unbounded)
    #[arg(long)]
    max_iterations: Option<u32>,

    /// Relaxation order
    #[arg(long, value_enum)]
    order: Option<OrderArg>,

    /// Resume from a checkpoint written by an earlier run on the same map
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Trace a descent path from this point, e.g. "3.5,10"
    #[arg(long, value_parser = parse_point)]
    start: Option<(f64, f64)>,

    /// Output directory
    #[arg(long)]
    out: PathBuf,

    /// Also write field.png
    #[arg(long)]
    render: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OrderArg {
    GaussSeidel,
    Jacobi,
    RedBlack,
}

impl From<OrderArg> for SweepOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::GaussSeidel => SweepOrder::GaussSeidel,
            OrderArg::Jacobi => SweepOrder::Jacobi,
            OrderArg::RedBlack => SweepOrder::RedBlack,
        }
    }
}

#[derive(Serialize)]
struct RunReport {
    source: String,
    width: usize,
    height: usize,
    boundary: BoundaryValues,
    solver: SolverConfig,
    solve: SolveReport,
    total_sweeps: u32,
    unreachable_free_cells: usize,
    path_termination: Option<Termination>,
    path_points: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let report = run(&args)?;

    println!("Wrote results to: {}", args.out.display());
    println!(
        "Sweeps: {} (converged={}, elapsed={:.3?})",
        report.solve.iterations, report.solve.converged, report.solve.elapsed
    );
    Ok(())
}

fn run(args: &Args) -> Result<RunReport, Box<dyn std::error::Error>> {
    let config = build_config(args)?;
    fs::create_dir_all(&args.out)?;

    let (map, source) = load_or_generate(args, &config)?;
    let unreachable = map.unreachable_free_count();

    let mut field = match &args.resume {
        Some(path) => {
            let checkpoint = load_checkpoint(path)?;
            HarmonicField::restore(map, config.boundary.clone(), &checkpoint)?
        }
        None => HarmonicField::initialize(map, config.boundary.clone())?,
    };
    println!("{field}");

    let solver = Solver::new(config.solver.clone())?;
    let solve = solver.solve(&mut field);
    println!("{field}");
    if let Some(warning) = solve.warning() {
        println!("Warning: {warning}");
    }

    let mut field_writer = BufWriter::new(File::create(args.out.join("field.bin"))?);
    write_f64_vec(&mut field_writer, field.values())?;
    field_writer.flush()?;

    save_checkpoint(&field, &args.out.join("checkpoint.bin"))?;

    if args.render {
        render::render_field(&field.snapshot(), &args.out.join("field.png"))?;
    }

    let mut path_termination = None;
    let mut path_points = None;
    if let Some(start) = args.start {
        let sampler = FieldSampler::new(&field);
        let path = trace_path(&sampler, start, &config.path)?;
        info!(
            "Path from {:?}: {} points, length {:.2}, {:?}",
            start,
            path.points.len(),
            path.length(),
            path.termination
        );
        let mut path_file = BufWriter::new(File::create(args.out.join("path.json"))?);
        serde_json::to_writer_pretty(&mut path_file, &path)?;
        path_file.flush()?;
        path_termination = Some(path.termination);
        path_points = Some(path.points.len());
    }

    let report = RunReport {
        source,
        width: field.width(),
        height: field.height(),
        boundary: config.boundary.clone(),
        solver: config.solver.clone(),
        solve,
        total_sweeps: field.sweeps(),
        unreachable_free_cells: unreachable,
        path_termination,
        path_points,
    };

    let mut report_file = BufWriter::new(File::create(args.out.join("report.json"))?);
    serde_json::to_writer_pretty(&mut report_file, &report)?;
    report_file.write_all(b"\n")?;
    report_file.flush()?;

    Ok(report)
}

/// Config file (or defaults) with command-line overrides applied.
fn build_config(args: &Args) -> Result<PlannerConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => PlannerConfig::from_file(path)?,
        None => PlannerConfig::default(),
    };
    if let Some(epsilon) = args.epsilon {
        config.solver.epsilon = epsilon;
    }
    if let Some(cap) = args.max_iterations {
        config.solver.max_iterations = (cap > 0).then_some(cap);
    }
    if let Some(order) = args.order {
        config.solver.order = order.into();
    }
    config.validate()?;
    Ok(config)
}

fn load_or_generate(
    args: &Args,
    config: &PlannerConfig,
) -> Result<(GridMap, String), Box<dyn std::error::Error>> {
    if let Some(path) = &args.map {
        let map = loader::load_map(path, &config.thresholds)?;
        return Ok((map, path.display().to_string()));
    }
    let seed = args
        .random_seed
        .ok_or("either --map or --random-seed is required")?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let kind = sample_map_kind(&mut rng);
    let map = generate_map(&mut rng, args.width, args.height, kind)?;
    info!("Generated {} map from seed {}", kind.as_str(), seed);
    Ok((map, format!("random:{}:{}", kind.as_str(), seed)))
}

fn write_f64_vec<W: Write>(w: &mut W, v: &[f64]) -> std::io::Result<()> {
    for &x in v {
        w.write_all(&x.to_le_bytes())?;
    }
    Ok(())
}

fn parse_point(s: &str) -> Result<(f64, f64), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected \"x,y\", got {s:?}"))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad x in {s:?}: {e}"))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad y in {s:?}: {e}"))?;
    Ok((x, y))
}

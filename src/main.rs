use clap::Parser;
use hearth::output;
use hearth::solver::HeatSolver;
use hearth::stats::Stats;
use std::path::PathBuf;
use std::time::Instant;

/// 2D finite-element heat conduction solver
#[derive(Parser)]
#[command(name = "hearth", version)]
struct Cli {
    /// Problem basename (expects <basename>.feh plus the mesh files)
    problem: PathBuf,

    /// Previous solution file supplying the transient term
    #[arg(long)]
    prev: Option<PathBuf>,

    /// Keep the temporary mesh files after loading
    #[arg(long)]
    keep_mesh: bool,

    /// Print performance stats to stderr
    #[arg(long)]
    stats: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut stats = if cli.stats { Some(Stats::new()) } else { None };

    let start = Instant::now();
    let mut solver = HeatSolver::load(&cli.problem, cli.prev.as_deref(), !cli.keep_mesh)
        .unwrap_or_else(|e| {
            eprintln!("Load error: {e}");
            std::process::exit(1);
        });
    if let Some(stats) = stats.as_mut() {
        stats.add_phase("Load", start.elapsed());
    }

    let start = Instant::now();
    let solution = solver.analyze().unwrap_or_else(|e| {
        eprintln!("Solve error: {e}");
        std::process::exit(1);
    });
    if let Some(stats) = stats.as_mut() {
        stats.add_phase("Solve", start.elapsed());
        stats.outer_iterations = solution.iterations;
        stats.cg_iterations = solution.cg_iterations.clone();
    }

    let start = Instant::now();
    output::write_results(&solver, &solution).unwrap_or_else(|e| {
        eprintln!("Output error: {e}");
        std::process::exit(1);
    });
    if let Some(stats) = stats.as_mut() {
        stats.add_phase("Write", start.elapsed());
    }

    if let Some(stats) = &stats {
        stats.display();
    }
}

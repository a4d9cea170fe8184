use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{Level, LevelFilter};

use batchline::config::SolveConfig;
use batchline::error::Error;
use batchline::geometry::{GeometryProfile, TableModel};
use batchline::historian::{build_boundary, build_flow_series, MemoryHistorian};
use batchline::orchestrator::SolverOrchestrator;
use batchline::scheme::Limiter;
use batchline::series::BoundaryCondition;

/// Track density, viscosity, and reference temperature along a synthetic
/// pipeline fed with a day of generated telemetry.
#[derive(Debug, Parser)]
#[clap(version = "0.1.0")]
struct Opts {
    /// Path length [m]
    #[clap(long, default_value = "120000")]
    length: f64,

    /// Target cell spacing [m]
    #[clap(long, default_value = "500")]
    dx: f64,

    /// Hours of synthetic telemetry to generate
    #[clap(long, default_value = "24")]
    hours: usize,

    /// Directory for result segments
    #[clap(short, long, default_value = "results")]
    out_dir: PathBuf,

    /// Abandon cases running longer than this many seconds
    #[clap(long)]
    timeout_sec: Option<u64>,

    /// Sharpness of the generalized minmod limiter, in [1, 2]
    #[clap(long, default_value = "1.0")]
    beta: f64,

    /// off | error | warn | info | debug | trace
    #[clap(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let opts = Opts::parse();
    let level = match opts.log_level.as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };
    simple_logger::SimpleLogger::new()
        .with_level(level)
        .init()
        .unwrap();

    if let Err(e) = run(&opts) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(opts: &Opts) -> Result<(), Error> {
    // a 34-inch line necking down to 28-inch past the 60% mark
    let model = TableModel::new(
        opts.length,
        vec![
            (0.0, 864.0),
            (0.60 * opts.length, 864.0),
            (0.61 * opts.length, 711.0),
            (opts.length, 711.0),
        ],
    );
    let geometry = Arc::new(GeometryProfile::from_model(&model, "KS1", "KS4", opts.dx)?);

    let end = opts.hours as f64 * 3600.0;
    let historian = MemoryHistorian::new()
        .load("FT_mainline", flow_samples(opts.hours))
        .load("RHO_inlet", batch_samples(opts.hours, 840.0, 861.5))
        .load("MU_inlet", batch_samples(opts.hours, 0.6, 2.4))
        .load("TREF_inlet", batch_samples(opts.hours, 15.0, 15.0));
    let flow = Arc::new(build_flow_series(
        &historian,
        "FT_mainline",
        0.0,
        end,
        geometry.length(),
    )?);

    let limiter = Limiter::from_name("generalized_minmod", opts.beta)?;
    let case = |name: &str, initial: f64, tag: &str| -> Result<(SolveConfig, BoundaryCondition), Error> {
        let config = SolveConfig::new(name)
            .with_limiter(limiter)
            .with_uniform_initial(initial)
            .with_log_levels(vec![Level::Error, Level::Warn, Level::Info, Level::Debug])
            .with_output_dir(opts.out_dir.clone());
        let boundary = build_boundary(&historian, tag, 0.0, end)?;
        Ok((config, boundary))
    };
    let cases = vec![
        case("rho", 850.0, "RHO_inlet")?,
        case("mu", 1.5, "MU_inlet")?,
        case("tref", 15.0, "TREF_inlet")?,
    ];

    let mut orchestrator = SolverOrchestrator::new(geometry.clone(), flow);
    if let Some(sec) = opts.timeout_sec {
        orchestrator = orchestrator.with_timeout(Duration::from_secs(sec));
    }

    println!(
        "{} cells at dx = {:.1} m over {:.1} km, {} h of telemetry",
        geometry.n_cells(),
        geometry.dx(),
        geometry.length() / 1e3,
        opts.hours
    );
    let reports = orchestrator.run_all(cases);

    println!();
    for report in &reports {
        println!("{:.<8} {}", report.case, report.outcome);
    }
    println!();
    println!("segments in {}", opts.out_dir.display());
    Ok(())
}

/// A daily flow pattern [m³/h] with a sinusoidal swing and a three-hour
/// shutdown whose readings dip below zero, as real meters do.
fn flow_samples(hours: usize) -> Vec<(f64, f64)> {
    (0..=hours)
        .map(|h| {
            let t = h as f64 * 3600.0;
            let swing = 900.0 * (t / 86400.0 * std::f64::consts::TAU).sin();
            let shutdown = if (10..13).contains(&(h % 24)) { 3000.0 } else { 0.0 };
            (t, 2400.0 + swing - shutdown)
        })
        .collect()
}

/// Inlet readings alternating between two batch qualities every six hours.
fn batch_samples(hours: usize, a: f64, b: f64) -> Vec<(f64, f64)> {
    (0..=hours)
        .map(|h| (h as f64 * 3600.0, if (h / 6) % 2 == 0 { a } else { b }))
        .collect()
}

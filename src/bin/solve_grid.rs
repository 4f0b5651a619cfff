//! Grid MDP solver binary.
//!
//! Usage:
//!   cargo run --release --bin solve_grid -- <INPUT> <ALGORITHM> [OPTIONS]
//!
//! Options:
//!   --keep-values        Policy iteration: warm-start each evaluation
//!   --graph              Policy iteration: write the sweep-count diagnostic
//!   --output <DIR>       Output directory (default: output)
//!   --config <FILE>      Solver configuration JSON file (optional)
//!   --p, --gamma, --epsilon   Override individual parameters

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use grid_mdp::io::{
    load_and_validate, render_policy, render_sweeps, render_values, Algorithm, OutputDir,
    SolutionReport,
};
use grid_mdp::mdp::{PolicyIteration, Progress, SolverConfig, ValueIteration};

#[derive(Parser, Debug)]
#[command(name = "solve_grid", about = "Solve a stochastic grid-world MDP")]
struct Cli {
    /// Path to the JSON file holding the `states` and `rewards` grids
    input: PathBuf,

    /// Planner to run
    #[arg(value_enum)]
    algorithm: Algorithm,

    /// Policy iteration only: reuse the previous values (warm start) instead of
    /// resetting them every iteration
    #[arg(long)]
    keep_values: bool,

    /// Policy iteration only: also write how many evaluation sweeps each
    /// policy-iteration step needed
    #[arg(long)]
    graph: bool,

    /// Directory for reports and renderings
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Solver configuration JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Probability that the intended move succeeds
    #[arg(long)]
    p: Option<f64>,

    /// Discount factor
    #[arg(long)]
    gamma: Option<f64>,

    /// Convergence threshold
    #[arg(long)]
    epsilon: Option<f64>,
}

fn init_logging() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(d) = "grid_mdp=info".parse() {
        filter = filter.add_directive(d);
    }
    if let Ok(d) = "solve_grid=info".parse() {
        filter = filter.add_directive(d);
    }

    fmt().with_env_filter(filter).init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> grid_mdp::Result<()> {
    let config = load_config(cli)?;
    let input = load_and_validate(&cli.input)?;
    let mdp = input.to_model(&config)?;
    let stem = file_stem(&cli.input);

    info!(
        input = %cli.input.display(),
        shape = ?input.shape(),
        states = mdp.states().len(),
        algorithm = cli.algorithm.name(),
        "solving"
    );
    info!(
        p = config.slip_success,
        gamma = config.discount,
        epsilon = config.epsilon,
        "configuration"
    );

    let spinner = progress_spinner();
    let mut out = OutputDir::new(&cli.output);

    match cli.algorithm {
        Algorithm::ValueIteration => {
            let mut solver = ValueIteration::new(mdp, config.clone());
            let result = solver.solve_with_callback(|p: &Progress| {
                spinner.set_message(format!("sweep {} | delta {:.6}", p.sweeps, p.delta));
            });
            spinner.finish_and_clear();

            println!("{}", render_values(result.values()));
            println!("{}", render_policy(&result.policy));
            info!(
                sweeps = result.stats.sweeps,
                elapsed = result.stats.elapsed_seconds,
                "value iteration complete"
            );

            let report = SolutionReport::from_value_iteration(&stem, &config, &result);
            out.write_solution(&report, &result.policy, result.values())?;
        }
        Algorithm::PolicyIteration => {
            let reset_values = !cli.keep_values;
            let mut solver = PolicyIteration::new(mdp, config.clone(), reset_values);
            let result = solver.solve_with_callback(|p: &Progress| {
                spinner.set_message(format!(
                    "iteration {} | sweeps {} | changed {}",
                    p.policy_iteration, p.sweeps, p.changed_states
                ));
            });
            spinner.finish_and_clear();

            if let Some(values) = result.history.last() {
                println!("{}", render_values(values));
                let report = SolutionReport::from_policy_iteration(&stem, &config, &result);
                out.write_solution(&report, &result.policy, values)?;
            }
            println!("{}", render_policy(&result.policy));
            info!(
                iterations = result.stats.policy_iterations,
                sweeps = result.stats.sweeps,
                reset_values,
                "policy iteration complete"
            );

            if cli.graph {
                println!("Evaluation sweeps per policy-iteration step:");
                println!("{}", render_sweeps(&result.sweep_counts));
                out.write_sweeps(&stem, &result.sweep_counts)?;
            }
        }
    }

    info!(dir = %out.root().display(), "done");
    Ok(())
}

fn load_config(cli: &Cli) -> grid_mdp::Result<SolverConfig> {
    let mut config = match &cli.config {
        Some(path) => SolverConfig::from_json_file(path)?,
        None => SolverConfig::default(),
    };
    if let Some(p) = cli.p {
        config = config.with_slip_success(p);
    }
    if let Some(gamma) = cli.gamma {
        config = config.with_discount(gamma);
    }
    if let Some(epsilon) = cli.epsilon {
        config = config.with_epsilon(epsilon);
    }
    config.validate()?;
    Ok(config)
}

fn progress_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "grid".to_string())
}

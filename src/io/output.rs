//! Output formatting for solver results.
//!
//! Turns value histories, policies and sweep counts into JSON reports, text
//! grids and a CSV diagnostic. Files go to an [`OutputDir`], which creates
//! its directory right before the first write.

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::mdp::{
    policy_symbols, PolicyGrid, PolicyIterationResult, SolveStats, SolverConfig, ValueGrid,
    ValueIterationResult,
};

/// Which planner produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum Algorithm {
    /// Bellman-optimality sweeps.
    ValueIteration,
    /// Evaluation and improvement until the policy is stable.
    PolicyIteration,
}

impl Algorithm {
    /// Name used in file names and report titles.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::ValueIteration => "ValueIteration",
            Algorithm::PolicyIteration => "PolicyIteration",
        }
    }
}

/// Serializable summary of one solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionReport {
    /// Planner used.
    pub algorithm: Algorithm,
    /// Stem of the input file the grids came from.
    pub input: String,
    /// Solver parameters.
    pub config: SolverConfig,
    /// Solve statistics.
    pub stats: SolveStats,
    /// `(rows, cols)` of the grid.
    pub shape: (usize, usize),
    /// Value grid snapshots as nested rows, oldest first.
    pub value_history: Vec<Vec<Vec<f64>>>,
    /// Final policy, one string of symbols per row.
    pub policy: Vec<String>,
    /// Evaluation sweeps per policy-iteration step.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sweep_counts: Option<Vec<u64>>,
}

impl SolutionReport {
    /// Report for a value-iteration result.
    pub fn from_value_iteration(input: &str, config: &SolverConfig, result: &ValueIterationResult) -> Self {
        Self {
            algorithm: Algorithm::ValueIteration,
            input: input.to_string(),
            config: config.clone(),
            stats: result.stats.clone(),
            shape: result.policy.shape(),
            value_history: result.history.iter().map(ValueGrid::to_rows).collect(),
            policy: policy_symbols(&result.policy),
            sweep_counts: None,
        }
    }

    /// Report for a policy-iteration result.
    pub fn from_policy_iteration(input: &str, config: &SolverConfig, result: &PolicyIterationResult) -> Self {
        Self {
            algorithm: Algorithm::PolicyIteration,
            input: input.to_string(),
            config: config.clone(),
            stats: result.stats.clone(),
            shape: result.policy.shape(),
            value_history: result.history.iter().map(ValueGrid::to_rows).collect(),
            policy: policy_symbols(&result.policy),
            sweep_counts: Some(result.sweep_counts.clone()),
        }
    }

    /// Final value grid as nested rows.
    pub fn final_values(&self) -> Option<&Vec<Vec<f64>>> {
        self.value_history.last()
    }

    /// Save to JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())
    }
}

/// Policy as a text grid, symbols separated by spaces.
pub fn render_policy(policy: &PolicyGrid) -> String {
    let mut out = String::new();
    for row in policy.iter_rows() {
        let line: Vec<String> = row.iter().map(|c| c.symbol().to_string()).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out
}

/// Value grid as right-aligned columns with three decimals.
pub fn render_values(values: &ValueGrid) -> String {
    let mut out = String::new();
    for row in values.iter_rows() {
        for v in row {
            // Writing to a String cannot fail.
            let _ = write!(out, "{:>10.3}", v);
        }
        out.push('\n');
    }
    out
}

/// Horizontal bar chart of evaluation sweeps per policy-iteration step.
pub fn render_sweeps(sweeps: &[u64]) -> String {
    const WIDTH: u64 = 50;
    let max = sweeps.iter().copied().max().unwrap_or(0).max(1);
    let mut out = String::new();
    for (i, &count) in sweeps.iter().enumerate() {
        let bar = (count * WIDTH).div_ceil(max) as usize;
        let _ = writeln!(out, "{:>4} | {:<width$} {}", i + 1, "#".repeat(bar), count, width = WIDTH as usize);
    }
    out
}

/// Export evaluation sweeps per step as CSV.
pub fn export_sweeps_csv<P: AsRef<Path>>(sweeps: &[u64], path: P) -> io::Result<()> {
    let mut file = File::create(path)?;

    // Header
    writeln!(file, "iteration,sweeps")?;

    for (i, count) in sweeps.iter().enumerate() {
        writeln!(file, "{},{}", i + 1, count)?;
    }
    Ok(())
}

/// Output directory that is created on the first write, not before.
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
    ready: bool,
}

impl OutputDir {
    /// Target `root`; nothing touches the filesystem yet.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            ready: false,
        }
    }

    /// Directory files are written to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for `name` inside the directory, creating the directory if needed.
    pub fn prepare(&mut self, name: &str) -> io::Result<PathBuf> {
        if !self.ready {
            fs::create_dir_all(&self.root)?;
            self.ready = true;
            debug!(dir = %self.root.display(), "created output directory");
        }
        Ok(self.root.join(name))
    }

    /// Write the report plus text renderings of its policy and final values.
    ///
    /// Returns the paths written.
    pub fn write_solution(
        &mut self,
        report: &SolutionReport,
        policy: &PolicyGrid,
        values: &ValueGrid,
    ) -> io::Result<Vec<PathBuf>> {
        let prefix = format!("{}_{}", report.input, report.algorithm.name());

        let report_path = self.prepare(&format!("{}_Report.json", prefix))?;
        report.save_json(&report_path)?;

        let policy_path = self.prepare(&format!("{}_Policy.txt", prefix))?;
        fs::write(&policy_path, render_policy(policy))?;

        let last = report.value_history.len().saturating_sub(1);
        let values_path = self.prepare(&format!("{}_Values_{}.txt", prefix, last))?;
        fs::write(&values_path, render_values(values))?;

        let written = vec![report_path, policy_path, values_path];
        for path in &written {
            info!(path = %path.display(), "wrote output");
        }
        Ok(written)
    }

    /// Write the sweep-count diagnostic as CSV and a text chart.
    pub fn write_sweeps(&mut self, input: &str, sweeps: &[u64]) -> io::Result<Vec<PathBuf>> {
        let prefix = format!("{}_{}", input, Algorithm::PolicyIteration.name());

        let csv_path = self.prepare(&format!("{}_EvalSweeps.csv", prefix))?;
        export_sweeps_csv(sweeps, &csv_path)?;

        let chart_path = self.prepare(&format!("{}_EvalSweeps.txt", prefix))?;
        fs::write(&chart_path, render_sweeps(sweeps))?;

        info!(path = %csv_path.display(), "wrote sweep diagnostic");
        Ok(vec![csv_path, chart_path])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdp::{parse_policy, value_iteration, CellType, Grid};

    fn solved() -> (SolverConfig, ValueIterationResult) {
        let cells = Grid::from_rows(vec![vec![CellType::Terminal, CellType::Active, CellType::Barrier]]).unwrap();
        let rewards = Grid::from_rows(vec![vec![1.0, 0.0, 0.0]]).unwrap();
        let config = SolverConfig::default();
        let result = value_iteration(cells, rewards, &config).unwrap();
        (config, result)
    }

    #[test]
    fn test_render_policy() {
        let policy = parse_policy(&["o<x", "+^v"]).unwrap();
        assert_eq!(render_policy(&policy), "o < x\n+ ^ v\n");
    }

    #[test]
    fn test_render_values() {
        let values = ValueGrid::from_rows(vec![vec![1.0, -2.5]]).unwrap();
        assert_eq!(render_values(&values), "     1.000    -2.500\n");
    }

    #[test]
    fn test_render_sweeps_scales_to_max() {
        let chart = render_sweeps(&[10, 5]);
        let lines: Vec<&str> = chart.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].matches('#').count(), 50);
        assert_eq!(lines[1].matches('#').count(), 25);
        assert!(lines[1].ends_with(" 5"));
    }

    #[test]
    fn test_report_round_trips_through_json() {
        let (config, result) = solved();
        let report = SolutionReport::from_value_iteration("tiny", &config, &result);
        assert_eq!(report.policy, vec!["o<x"]);
        assert!(report.sweep_counts.is_none());

        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("sweep_counts"));
        let back: SolutionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.value_history, report.value_history);
        assert_eq!(back.algorithm, Algorithm::ValueIteration);
    }

    #[test]
    fn test_output_dir_created_on_first_write() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("out");
        let mut out = OutputDir::new(&root);
        assert!(!root.exists());

        let (config, result) = solved();
        let report = SolutionReport::from_value_iteration("tiny", &config, &result);
        let written = out
            .write_solution(&report, &result.policy, result.values())
            .unwrap();
        assert!(root.is_dir());
        assert_eq!(written.len(), 3);
        assert!(written.iter().all(|p| p.exists()));
        assert!(written[0].ends_with("tiny_ValueIteration_Report.json"));

        let sweeps = out.write_sweeps("tiny", &[3, 2, 1]).unwrap();
        let csv = fs::read_to_string(&sweeps[0]).unwrap();
        assert_eq!(csv, "iteration,sweeps\n1,3\n2,2\n3,1\n");
    }
}

//! Reading grid inputs and writing solver outputs.
//!
//! - [`input`]: loads the cell-type and reward grids and rejects malformed files
//! - [`output`]: reports, text renderings and the sweep-count diagnostic

pub mod input;
pub mod output;

pub use input::{load_and_validate, GridInput, InputError};
pub use output::{
    export_sweeps_csv, render_policy, render_sweeps, render_values, Algorithm, OutputDir,
    SolutionReport,
};

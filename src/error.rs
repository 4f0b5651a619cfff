//! Crate-level error type.

use thiserror::Error;

use crate::io::InputError;
use crate::mdp::{ConfigError, MdpError};

/// Any failure between reading an input file and writing the results.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid solver configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The input file was rejected.
    #[error("input error: {0}")]
    Input(#[from] InputError),
    /// The model could not be built.
    #[error("model error: {0}")]
    Model(#[from] MdpError),
    /// Writing results failed.
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),
}

/// Result alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

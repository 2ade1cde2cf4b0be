//! Error types for portfolio analysis.

use thiserror::Error;

/// Main error type for backtesting, optimization, and risk analysis.
#[derive(Error, Debug)]
pub enum PortfolioError {
    /// Malformed return series or arguments: gaps, misaligned asset order,
    /// non-finite values, mismatched dimensions.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A weight vector that does not sum to one or lies outside its bounds.
    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    /// The optimizer did not reach a feasible optimum within its budget.
    #[error("Optimizer failed to converge: {0}")]
    Convergence(String),

    /// A matrix that must be inverted is singular.
    #[error("Singular matrix: {0}")]
    SingularMatrix(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}

impl PortfolioError {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub(crate) fn invalid_weights(message: impl Into<String>) -> Self {
        Self::InvalidWeights(message.into())
    }
}

/// Result type alias for portfolio operations.
pub type Result<T> = std::result::Result<T, PortfolioError>;

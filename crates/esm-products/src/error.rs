//! Error types for product generation.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::report::ResolutionReport;

/// Errors that can occur while resolving or writing products.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed catalog table or configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Strict policy: the source holds variables the catalog does not describe.
    ///
    /// Carries the resolution report built so far so its diagnostics still
    /// reach the caller.
    #[error("unknown source variables: {}", join_names(.names))]
    UnknownVariable {
        names: BTreeSet<String>,
        report: Box<ResolutionReport>,
    },

    /// Not enough coordinate samples to correct the grid edges.
    #[error("{axis} axis has {len} samples, at least {min} required")]
    GridTooSmall {
        axis: &'static str,
        len: usize,
        min: usize,
    },

    /// A variable is spatially indexed but the grid coordinates are unusable.
    #[error("variable '{variable}' is indexed by lat/lon but {reason}")]
    AxisMismatch { variable: String, reason: String },

    /// Corrected coordinates are not strictly monotonic.
    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    /// Source dataset has no variable with this name.
    #[error("source variable not found: {0}")]
    MissingVariable(String),

    /// Source dataset has no dimension with this name.
    #[error("source dimension not found: {0}")]
    MissingDimension(String),

    /// Array shape does not agree with the declared dimension tuple.
    #[error("variable '{variable}' has shape {shape:?} but {dimensions} dimensions")]
    Shape {
        variable: String,
        shape: Vec<usize>,
        dimensions: usize,
    },

    /// Output container rejected an operation.
    #[error("sink error: {0}")]
    Sink(String),

    /// Storage/IO error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl EngineError {
    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a Sink error.
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// Create an AxisMismatch error.
    pub fn axis_mismatch(variable: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AxisMismatch {
            variable: variable.into(),
            reason: reason.into(),
        }
    }

    /// Attach a variable name to a shape error raised by a name-agnostic helper.
    pub fn for_variable(self, name: &str) -> Self {
        match self {
            Self::Shape {
                variable,
                shape,
                dimensions,
            } if variable.is_empty() => Self::Shape {
                variable: name.to_string(),
                shape,
                dimensions,
            },
            other => other,
        }
    }

    /// Whether the error only invalidates the output group being written.
    pub fn is_group_scoped(&self) -> bool {
        !matches!(
            self,
            Self::Config(_) | Self::UnknownVariable { .. } | Self::Yaml(_)
        )
    }
}

fn join_names(names: &BTreeSet<String>) -> String {
    names.iter().cloned().collect::<Vec<_>>().join(", ")
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

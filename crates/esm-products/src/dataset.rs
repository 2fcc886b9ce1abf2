//! Capabilities the engine needs from the gridded-dataset container format.
//!
//! The persisted format itself lives outside this crate; it is seen as a
//! store of named multi-dimensional arrays plus named dimensions and
//! attributes.

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::resolver::Inventory;

/// Element type of a stored variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int32,
    Float32,
    Float64,
}

impl DataType {
    /// Get the type name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A variable read from the source dataset.
///
/// Values are widened to f64 for processing; `dtype` records the stored type.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceVariable {
    pub dimensions: Vec<String>,
    pub dtype: DataType,
    pub data: ArrayD<f64>,
}

/// Attribute values the engine writes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl AttributeValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Text(_) => None,
        }
    }
}

/// Parameters for creating an output variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    pub name: String,
    pub dtype: DataType,
    pub dimensions: Vec<String>,
    pub fill_value: Option<f64>,
    pub long_name: Option<String>,
    pub units: Option<String>,
}

impl VariableSpec {
    pub fn new(name: impl Into<String>, dtype: DataType, dimensions: Vec<String>) -> Self {
        Self {
            name: name.into(),
            dtype,
            dimensions,
            fill_value: None,
            long_name: None,
            units: None,
        }
    }

    pub fn with_fill_value(mut self, fill_value: f64) -> Self {
        self.fill_value = Some(fill_value);
        self
    }

    pub fn with_long_name(mut self, long_name: impl Into<String>) -> Self {
        self.long_name = Some(long_name.into());
        self
    }

    pub fn with_units(mut self, units: Option<&str>) -> Self {
        self.units = units.map(str::to_string);
        self
    }
}

/// Handle to a variable created in an output container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableHandle(pub String);

impl VariableHandle {
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Where an attribute is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeTarget<'a> {
    /// Global (container) attribute
    Container,
    Variable(&'a VariableHandle),
}

/// Read access to a source dataset.
pub trait SourceDataset {
    /// Variable names, in dataset order.
    fn variable_names(&self) -> Vec<String>;

    /// Dimension-name tuple of a variable.
    fn variable_dimensions(&self, name: &str) -> Result<Vec<String>>;

    /// Length of a named dimension.
    fn dimension_size(&self, name: &str) -> Result<usize>;

    /// Read a variable's array and metadata.
    fn read_variable(&self, name: &str) -> Result<SourceVariable>;

    /// Whether the dataset declares a dimension with this name.
    ///
    /// Only `MissingDimension` means absent; any other failure is returned.
    fn has_dimension(&self, name: &str) -> Result<bool> {
        match self.dimension_size(name) {
            Ok(_) => Ok(true),
            Err(EngineError::MissingDimension(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Whether the dataset holds a variable with this name.
    ///
    /// Only `MissingVariable` means absent; any other failure is returned.
    fn has_variable(&self, name: &str) -> Result<bool> {
        match self.variable_dimensions(name) {
            Ok(_) => Ok(true),
            Err(EngineError::MissingVariable(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Name -> dimension tuple for every variable.
    fn inventory(&self) -> Result<Inventory> {
        self.variable_names()
            .into_iter()
            .map(|name| {
                let dims = self.variable_dimensions(&name)?;
                Ok((name, dims))
            })
            .collect()
    }
}

/// One output container being written.
///
/// Operations must be issued in order: dimensions before the variables that
/// use them, variables created before they are written.
pub trait OutputContainer {
    fn create_dimension(&mut self, name: &str, size: usize) -> Result<()>;

    fn create_variable(&mut self, spec: &VariableSpec) -> Result<VariableHandle>;

    fn write(&mut self, handle: &VariableHandle, data: &ArrayD<f64>) -> Result<()>;

    fn set_attribute(&mut self, target: AttributeTarget<'_>, key: &str, value: AttributeValue) -> Result<()>;

    /// Flush and close; the container is complete only after this succeeds.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Factory for output containers.
pub trait DatasetSink {
    fn create_container<'a>(&'a mut self, name: &str) -> Result<Box<dyn OutputContainer + 'a>>;
}

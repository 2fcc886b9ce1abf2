//! In-memory datasets.
//!
//! `MemoryDataset` serves both as a source and as the stored form of a
//! finished output container; `MemorySink` collects closed containers.

use std::collections::HashSet;

use indexmap::IndexMap;
use ndarray::ArrayD;

use crate::dataset::{
    AttributeTarget, AttributeValue, DataType, DatasetSink, OutputContainer, SourceDataset,
    SourceVariable, VariableHandle, VariableSpec,
};
use crate::error::{EngineError, Result};

/// A variable held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryVariable {
    pub dimensions: Vec<String>,
    pub dtype: DataType,
    pub fill_value: Option<f64>,
    /// `None` until written
    pub data: Option<ArrayD<f64>>,
    pub attributes: IndexMap<String, AttributeValue>,
}

impl MemoryVariable {
    /// Text attribute lookup.
    pub fn attribute_text(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(AttributeValue::as_text)
    }
}

/// Named dimensions, variables and global attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryDataset {
    pub dimensions: IndexMap<String, usize>,
    pub variables: IndexMap<String, MemoryVariable>,
    pub attributes: IndexMap<String, AttributeValue>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a dimension; redeclaring with a different size is an error.
    pub fn add_dimension(&mut self, name: &str, size: usize) -> Result<()> {
        match self.dimensions.get(name) {
            Some(&existing) if existing != size => Err(EngineError::sink(format!(
                "dimension '{}' already declared with size {}",
                name, existing
            ))),
            Some(_) => Ok(()),
            None => {
                self.dimensions.insert(name.to_string(), size);
                Ok(())
            }
        }
    }

    /// Add a fully populated variable; its shape must match its dimensions.
    pub fn add_variable(
        &mut self,
        name: &str,
        dimensions: &[&str],
        dtype: DataType,
        data: ArrayD<f64>,
    ) -> Result<()> {
        let dimensions: Vec<String> = dimensions.iter().map(|d| d.to_string()).collect();
        self.check_shape(name, &dimensions, data.shape())?;
        self.variables.insert(
            name.to_string(),
            MemoryVariable {
                dimensions,
                dtype,
                fill_value: None,
                data: Some(data),
                attributes: IndexMap::new(),
            },
        );
        Ok(())
    }

    pub fn variable(&self, name: &str) -> Option<&MemoryVariable> {
        self.variables.get(name)
    }

    /// Written array of a variable.
    pub fn data(&self, name: &str) -> Option<&ArrayD<f64>> {
        self.variables.get(name).and_then(|v| v.data.as_ref())
    }

    /// Global text attribute lookup.
    pub fn attribute_text(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(AttributeValue::as_text)
    }

    fn check_shape(&self, name: &str, dimensions: &[String], shape: &[usize]) -> Result<()> {
        if dimensions.len() != shape.len() {
            return Err(EngineError::Shape {
                variable: name.to_string(),
                shape: shape.to_vec(),
                dimensions: dimensions.len(),
            });
        }
        for (dim, &len) in dimensions.iter().zip(shape) {
            let declared = self
                .dimensions
                .get(dim)
                .ok_or_else(|| EngineError::MissingDimension(dim.clone()))?;
            if *declared != len {
                return Err(EngineError::Shape {
                    variable: name.to_string(),
                    shape: shape.to_vec(),
                    dimensions: dimensions.len(),
                });
            }
        }
        Ok(())
    }
}

impl SourceDataset for MemoryDataset {
    fn variable_names(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }

    fn variable_dimensions(&self, name: &str) -> Result<Vec<String>> {
        self.variables
            .get(name)
            .map(|v| v.dimensions.clone())
            .ok_or_else(|| EngineError::MissingVariable(name.to_string()))
    }

    fn dimension_size(&self, name: &str) -> Result<usize> {
        self.dimensions
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::MissingDimension(name.to_string()))
    }

    fn read_variable(&self, name: &str) -> Result<SourceVariable> {
        let var = self
            .variables
            .get(name)
            .ok_or_else(|| EngineError::MissingVariable(name.to_string()))?;
        let data = var
            .data
            .clone()
            .ok_or_else(|| EngineError::MissingVariable(format!("{} (never written)", name)))?;
        Ok(SourceVariable {
            dimensions: var.dimensions.clone(),
            dtype: var.dtype,
            data,
        })
    }
}

/// Collects closed containers in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    containers: IndexMap<String, MemoryDataset>,
    failing_variables: HashSet<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write to a variable with this name fail.
    pub fn fail_writes_to(mut self, variable: &str) -> Self {
        self.failing_variables.insert(variable.to_string());
        self
    }

    /// Closed containers, in close order.
    pub fn containers(&self) -> &IndexMap<String, MemoryDataset> {
        &self.containers
    }

    pub fn container(&self, name: &str) -> Option<&MemoryDataset> {
        self.containers.get(name)
    }
}

impl DatasetSink for MemorySink {
    fn create_container<'a>(&'a mut self, name: &str) -> Result<Box<dyn OutputContainer + 'a>> {
        Ok(Box::new(MemoryContainer {
            name: name.to_string(),
            dataset: MemoryDataset::new(),
            sink: self,
        }))
    }
}

/// An open container; reaches the sink only when closed.
struct MemoryContainer<'a> {
    name: String,
    dataset: MemoryDataset,
    sink: &'a mut MemorySink,
}

impl OutputContainer for MemoryContainer<'_> {
    fn create_dimension(&mut self, name: &str, size: usize) -> Result<()> {
        if self.dataset.dimensions.contains_key(name) {
            return Err(EngineError::sink(format!(
                "{}: dimension '{}' already exists",
                self.name, name
            )));
        }
        self.dataset.add_dimension(name, size)
    }

    fn create_variable(&mut self, spec: &VariableSpec) -> Result<VariableHandle> {
        if self.dataset.variables.contains_key(&spec.name) {
            return Err(EngineError::sink(format!(
                "{}: variable '{}' already exists",
                self.name, spec.name
            )));
        }
        if let Some(dim) = spec
            .dimensions
            .iter()
            .find(|d| !self.dataset.dimensions.contains_key(d.as_str()))
        {
            return Err(EngineError::sink(format!(
                "{}: variable '{}' uses undeclared dimension '{}'",
                self.name, spec.name, dim
            )));
        }

        let mut attributes = IndexMap::new();
        if let Some(long_name) = &spec.long_name {
            attributes.insert("long_name".to_string(), AttributeValue::from(long_name.as_str()));
        }
        if let Some(units) = &spec.units {
            attributes.insert("units".to_string(), AttributeValue::from(units.as_str()));
        }

        self.dataset.variables.insert(
            spec.name.clone(),
            MemoryVariable {
                dimensions: spec.dimensions.clone(),
                dtype: spec.dtype,
                fill_value: spec.fill_value,
                data: None,
                attributes,
            },
        );
        Ok(VariableHandle(spec.name.clone()))
    }

    fn write(&mut self, handle: &VariableHandle, data: &ArrayD<f64>) -> Result<()> {
        if self.sink.failing_variables.contains(handle.name()) {
            return Err(EngineError::sink(format!(
                "{}: write to '{}' failed",
                self.name,
                handle.name()
            )));
        }
        let dimensions = self
            .dataset
            .variables
            .get(handle.name())
            .map(|v| v.dimensions.clone())
            .ok_or_else(|| EngineError::sink(format!("unknown variable '{}'", handle.name())))?;
        self.dataset.check_shape(handle.name(), &dimensions, data.shape())?;

        if let Some(var) = self.dataset.variables.get_mut(handle.name()) {
            var.data = Some(data.clone());
        }
        Ok(())
    }

    fn set_attribute(&mut self, target: AttributeTarget<'_>, key: &str, value: AttributeValue) -> Result<()> {
        let attributes = match target {
            AttributeTarget::Container => &mut self.dataset.attributes,
            AttributeTarget::Variable(handle) => {
                &mut self
                    .dataset
                    .variables
                    .get_mut(handle.name())
                    .ok_or_else(|| EngineError::sink(format!("unknown variable '{}'", handle.name())))?
                    .attributes
            }
        };
        attributes.insert(key.to_string(), value);
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.sink.containers.insert(this.name, this.dataset);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    fn source() -> MemoryDataset {
        let mut ds = MemoryDataset::new();
        ds.add_dimension("lat", 3).unwrap();
        ds.add_dimension("lon", 2).unwrap();
        ds.add_variable(
            "lat",
            &["lat"],
            DataType::Float64,
            Array::from_vec(vec![-10.0, 0.0, 10.0]).into_dyn(),
        )
        .unwrap();
        ds.add_variable(
            "dust",
            &["lat", "lon"],
            DataType::Float32,
            ArrayD::zeros(IxDyn(&[3, 2])),
        )
        .unwrap();
        ds
    }

    #[test]
    fn test_source_dataset_reads() {
        let ds = source();
        assert_eq!(ds.variable_names(), vec!["lat", "dust"]);
        assert_eq!(ds.dimension_size("lon").unwrap(), 2);
        assert!(ds.has_dimension("lat").unwrap());
        assert!(!ds.has_dimension("lev").unwrap());

        let inventory = ds.inventory().unwrap();
        assert_eq!(inventory["dust"], vec!["lat", "lon"]);

        let lat = ds.read_variable("lat").unwrap();
        assert_eq!(lat.dtype, DataType::Float64);
        assert_eq!(lat.data.as_slice().unwrap(), &[-10.0, 0.0, 10.0]);
        assert!(matches!(ds.read_variable("nope"), Err(EngineError::MissingVariable(_))));
    }

    #[test]
    fn test_add_variable_checks_shape() {
        let mut ds = source();
        let err = ds
            .add_variable("bad", &["lat", "lon"], DataType::Float32, ArrayD::zeros(IxDyn(&[2, 3])))
            .unwrap_err();
        assert!(matches!(err, EngineError::Shape { .. }));
        let err = ds
            .add_variable("bad", &["time"], DataType::Float32, ArrayD::zeros(IxDyn(&[1])))
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingDimension(_)));
    }

    #[test]
    fn test_container_reaches_sink_only_on_close() {
        let mut sink = MemorySink::new();
        {
            let mut container = sink.create_container("abandoned").unwrap();
            container.create_dimension("x", 2).unwrap();
        }
        assert!(sink.containers().is_empty());

        let mut container = sink.create_container("out").unwrap();
        container.create_dimension("x", 2).unwrap();
        let spec = VariableSpec::new("v", DataType::Float32, vec!["x".to_string()])
            .with_fill_value(-9999.0)
            .with_long_name("value")
            .with_units(Some("1"));
        let handle = container.create_variable(&spec).unwrap();
        container
            .write(&handle, &Array::from_vec(vec![1.0, 2.0]).into_dyn())
            .unwrap();
        container
            .set_attribute(AttributeTarget::Container, "title", "t".into())
            .unwrap();
        container.close().unwrap();

        let out = sink.container("out").unwrap();
        let var = out.variable("v").unwrap();
        assert_eq!(var.fill_value, Some(-9999.0));
        assert_eq!(var.attribute_text("long_name"), Some("value"));
        assert_eq!(var.attribute_text("units"), Some("1"));
        assert_eq!(out.attribute_text("title"), Some("t"));
        assert_eq!(out.data("v").unwrap().as_slice().unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn test_container_rejects_out_of_order_operations() {
        let mut sink = MemorySink::new().fail_writes_to("broken");
        let mut container = sink.create_container("out").unwrap();

        let spec = VariableSpec::new("v", DataType::Float32, vec!["x".to_string()]);
        assert!(container.create_variable(&spec).is_err());

        container.create_dimension("x", 2).unwrap();
        assert!(container.create_dimension("x", 2).is_err());

        let handle = container.create_variable(&spec).unwrap();
        let wrong = ArrayD::zeros(IxDyn(&[3]));
        assert!(container.write(&handle, &wrong).is_err());

        let broken = container
            .create_variable(&VariableSpec::new("broken", DataType::Float32, vec!["x".to_string()]))
            .unwrap();
        let err = container.write(&broken, &ArrayD::zeros(IxDyn(&[2]))).unwrap_err();
        assert!(matches!(err, EngineError::Sink(_)));
    }
}

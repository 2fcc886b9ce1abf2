//! Product engine for Earth System Model gridded output.
//!
//! Turns one source dataset into a set of distributable output containers:
//! - `catalog`: naming catalog built from the variable table plus aliases
//! - `resolver`: binds catalog rows to source variables and groups them
//! - `dims` / `spatial`: axis ordering and lat/lon grid normalization
//! - `writer` / `pipeline`: container assembly and the end-to-end run
//!
//! Storage is abstracted behind [`SourceDataset`] and [`DatasetSink`];
//! [`MemoryDataset`] and [`MemorySink`] are in-memory implementations.

pub mod catalog;
pub mod config;
pub mod dataset;
pub mod dims;
pub mod error;
pub mod memory;
pub mod metadata;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod spatial;
pub mod writer;

pub use catalog::{CatalogEntry, CatalogRow, NamingCatalog};
pub use config::{EngineConfig, ModelProfile, ProductMetadata, ResolutionPolicy, NODATA};
pub use dataset::{
    AttributeTarget, AttributeValue, DataType, DatasetSink, OutputContainer, SourceDataset,
    SourceVariable, VariableHandle, VariableSpec,
};
pub use dims::{AxisPermutation, SpatialAxes};
pub use error::{EngineError, Result};
pub use memory::{MemoryDataset, MemorySink, MemoryVariable};
pub use pipeline::ProductPipeline;
pub use report::{Diagnostic, GroupReport, GroupStatus, ResolutionReport, RunReport};
pub use resolver::{Inventory, OutputGroup, Resolution, ResolvedVariable, VariableResolver};
pub use spatial::{GridMapping, SpatialGrid, SpatialIndex};
pub use writer::{GroupWrite, ProductWriter};

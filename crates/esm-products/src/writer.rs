//! Output container assembly for one resolved group.

use chrono::Utc;
use ndarray::Array1;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::dataset::{AttributeTarget, DataType, DatasetSink, OutputContainer, SourceDataset, VariableSpec};
use crate::dims::{AxisPermutation, SpatialAxes, LAT, LON};
use crate::error::{EngineError, Result};
use crate::metadata;
use crate::report::Diagnostic;
use crate::resolver::{OutputGroup, ResolvedVariable};
use crate::spatial::SpatialGrid;

/// Name of the scalar grid-mapping variable.
pub const GRID_MAPPING: &str = "latitude_longitude";

/// Level dimension, always present in an output container.
pub const LEV: &str = "lev";

/// Time coordinate, copied verbatim when present.
pub const TIME: &str = "time";

/// What a successful group write produced.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupWrite {
    pub container: String,
    /// Output variable names, in write order
    pub variables: Vec<String>,
}

/// Writes one output container per group.
pub struct ProductWriter<'a> {
    config: &'a EngineConfig,
}

impl<'a> ProductWriter<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Write `group` into a new container.
    ///
    /// Non-fatal notices are appended to `diagnostics` as they occur, so a
    /// caller still sees them when the write later fails. The container is
    /// only handed to the sink on close; a failed group leaves nothing behind.
    pub fn write<S: SourceDataset + ?Sized>(
        &self,
        group: &OutputGroup,
        source: &S,
        sink: &mut dyn DatasetSink,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<GroupWrite> {
        let name = self.config.container_name(&group.suffix);
        let grid = load_grid(source, group)?;
        let spatial = group
            .variables
            .iter()
            .any(|v| SpatialAxes::classify(&v.dimensions) == SpatialAxes::Both);

        info!(
            container = %name,
            variables = group.variables.len(),
            gridded = grid.is_some(),
            "Writing output container"
        );

        let mut container = sink.create_container(&name)?;

        let dimensions = self.declare_dimensions(
            container.as_mut(),
            &name,
            group,
            source,
            grid.as_ref(),
            diagnostics,
        )?;

        if let Some(grid) = &grid {
            self.write_coordinates(container.as_mut(), source, grid)?;
        }
        if dimensions.iter().any(|d| d == TIME) && source.has_variable(TIME)? {
            self.write_time(container.as_mut(), source)?;
        }
        if let (true, Some(grid)) = (spatial, &grid) {
            write_grid_mapping(container.as_mut(), grid)?;
        }

        let mut written = Vec::with_capacity(group.variables.len());
        for var in &group.variables {
            self.write_variable(container.as_mut(), source, var, grid.as_ref(), diagnostics)?;
            written.push(var.output_name.clone());
        }

        let bbox = grid.as_ref().and_then(SpatialGrid::bbox);
        for (key, value) in metadata::global_attributes(self.config, group, bbox.as_ref(), Utc::now()) {
            container.set_attribute(AttributeTarget::Container, &key, value)?;
        }

        container.close()?;
        info!(container = %name, written = written.len(), "Closed output container");

        Ok(GroupWrite {
            container: name,
            variables: written,
        })
    }

    /// Declare every dimension the group needs, once each: lat/lon when the
    /// grid is written, then the variables' own dimensions, then `lev`.
    fn declare_dimensions<S: SourceDataset + ?Sized>(
        &self,
        container: &mut dyn OutputContainer,
        name: &str,
        group: &OutputGroup,
        source: &S,
        grid: Option<&SpatialGrid>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Vec<String>> {
        let mut order: Vec<String> = Vec::new();
        if grid.is_some() {
            order.push(LAT.to_string());
            order.push(LON.to_string());
        }
        for dim in group.variables.iter().flat_map(|v| v.dimensions.iter()) {
            if !order.contains(dim) {
                order.push(dim.clone());
            }
        }

        for dim in &order {
            let size = source.dimension_size(dim)?;
            container.create_dimension(dim, size)?;
        }

        if !order.iter().any(|d| d == LEV) {
            let size = if source.has_dimension(LEV)? {
                source.dimension_size(LEV)?
            } else {
                warn!(container = %name, "Source has no lev dimension, declaring it with size 1");
                diagnostics.push(Diagnostic::MissingLevDimension {
                    container: name.to_string(),
                });
                1
            };
            container.create_dimension(LEV, size)?;
            order.push(LEV.to_string());
        }

        debug!(container = %name, dimensions = ?order, "Declared dimensions");
        Ok(order)
    }

    fn write_coordinates<S: SourceDataset + ?Sized>(
        &self,
        container: &mut dyn OutputContainer,
        source: &S,
        grid: &SpatialGrid,
    ) -> Result<()> {
        let axes = [
            (LAT, &grid.lat.corrected_values, "Latitude (WGS-84)", "degrees_north", "latitude"),
            (LON, &grid.lon.corrected_values, "Longitude (WGS-84)", "degrees_east", "longitude"),
        ];
        for (axis, values, long_name, units, standard_name) in axes {
            let dtype = source.read_variable(axis)?.dtype;
            let spec = VariableSpec::new(axis, dtype, vec![axis.to_string()])
                .with_fill_value(self.config.fill_value)
                .with_long_name(long_name)
                .with_units(Some(units));
            let handle = container.create_variable(&spec)?;
            container.write(&handle, &Array1::from(values.clone()).into_dyn())?;
            container.set_attribute(
                AttributeTarget::Variable(&handle),
                "standard_name",
                standard_name.into(),
            )?;
        }
        Ok(())
    }

    fn write_time<S: SourceDataset + ?Sized>(&self, container: &mut dyn OutputContainer, source: &S) -> Result<()> {
        let time = source.read_variable(TIME)?;
        let spec = VariableSpec::new(TIME, time.dtype, time.dimensions)
            .with_fill_value(self.config.fill_value)
            .with_long_name("Time")
            .with_units(Some("none"));
        let handle = container.create_variable(&spec)?;
        container.write(&handle, &time.data)
    }

    fn write_variable<S: SourceDataset + ?Sized>(
        &self,
        container: &mut dyn OutputContainer,
        source: &S,
        var: &ResolvedVariable,
        grid: Option<&SpatialGrid>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<()> {
        let src = source.read_variable(&var.source_name)?;
        if src.data.ndim() != src.dimensions.len() {
            return Err(EngineError::Shape {
                variable: var.source_name.clone(),
                shape: src.data.shape().to_vec(),
                dimensions: src.dimensions.len(),
            });
        }

        let layout = SpatialAxes::classify(&src.dimensions);
        if layout == SpatialAxes::Partial {
            diagnostics.push(Diagnostic::PartialSpatialAxes {
                variable: var.output_name.clone(),
                dimensions: src.dimensions.clone(),
            });
        }

        let permutation = AxisPermutation::for_axes(&src.dimensions);
        let dimensions = permutation.apply_to(&src.dimensions);
        let mut data = permutation
            .transpose(src.data)
            .map_err(|e| e.for_variable(&var.source_name))?;

        if layout == SpatialAxes::Both {
            let grid = grid.ok_or_else(|| EngineError::axis_mismatch(&var.source_name, "no grid was loaded"))?;
            data = grid
                .reindex_canonical(&data)
                .map_err(|e| e.for_variable(&var.source_name))?;
        }

        let fill = self.config.fill_value;
        data.mapv_inplace(|v| if v.is_finite() { v } else { fill });

        let units = match &self.config.model {
            Some(model) => model.units_for(&var.source_name, var.units()),
            None => var.units(),
        };
        let spec = VariableSpec::new(var.output_name.as_str(), DataType::Float32, dimensions)
            .with_fill_value(fill)
            .with_long_name(var.long_name.as_str())
            .with_units(units);

        let handle = container.create_variable(&spec)?;
        container.write(&handle, &data)?;
        if layout == SpatialAxes::Both {
            container.set_attribute(AttributeTarget::Variable(&handle), "grid_mapping", GRID_MAPPING.into())?;
        }

        debug!(
            source = %var.source_name,
            output = %var.output_name,
            transposed = !permutation.is_identity(),
            "Wrote variable"
        );
        Ok(())
    }
}

fn write_grid_mapping(container: &mut dyn OutputContainer, grid: &SpatialGrid) -> Result<()> {
    let spec = VariableSpec::new(GRID_MAPPING, DataType::Int32, Vec::new());
    let handle = container.create_variable(&spec)?;
    let target = AttributeTarget::Variable(&handle);
    container.set_attribute(target, "grid_mapping_name", GRID_MAPPING.into())?;
    container.set_attribute(target, "GeoTransform", grid.mapping.geotransform.to_string().into())?;
    container.set_attribute(target, "spatial_ref", grid.mapping.crs.wkt().into())?;
    Ok(())
}

/// Read a 1-D coordinate variable, or `None` when the source lacks it.
fn read_coordinate<S: SourceDataset + ?Sized>(source: &S, name: &str) -> Result<Option<Vec<f64>>> {
    if !source.has_variable(name)? {
        return Ok(None);
    }
    let var = source.read_variable(name)?;
    Ok(Some(var.data.iter().copied().collect()))
}

/// Normalize the source grid for a group.
///
/// A group with a lat/lon-indexed variable must have usable coordinates.
/// Other groups carry the grid along when it normalizes cleanly and skip it
/// otherwise.
fn load_grid<S: SourceDataset + ?Sized>(source: &S, group: &OutputGroup) -> Result<Option<SpatialGrid>> {
    let lat = read_coordinate(source, LAT)?;
    let lon = read_coordinate(source, LON)?;

    let needs_grid = group
        .variables
        .iter()
        .find(|v| SpatialAxes::classify(&v.dimensions) == SpatialAxes::Both);

    match needs_grid {
        Some(var) => {
            let lat = match lat {
                Some(values) if !values.is_empty() => values,
                Some(_) => return Err(EngineError::axis_mismatch(&var.source_name, "the lat coordinate is empty")),
                None => return Err(EngineError::axis_mismatch(&var.source_name, "the source has no lat coordinate")),
            };
            let lon = match lon {
                Some(values) if !values.is_empty() => values,
                Some(_) => return Err(EngineError::axis_mismatch(&var.source_name, "the lon coordinate is empty")),
                None => return Err(EngineError::axis_mismatch(&var.source_name, "the source has no lon coordinate")),
            };
            SpatialGrid::from_coordinates(&lat, &lon).map(Some)
        }
        None => match (lat, lon) {
            (Some(lat), Some(lon)) => match SpatialGrid::from_coordinates(&lat, &lon) {
                Ok(grid) => Ok(Some(grid)),
                Err(e) => {
                    warn!(suffix = %group.suffix, error = %e, "Skipping coordinates for non-gridded group");
                    Ok(None)
                }
            },
            _ => {
                debug!(suffix = %group.suffix, "Source has no lat/lon coordinates");
                Ok(None)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntry, CatalogRow};
    use crate::memory::{MemoryDataset, MemorySink};
    use ndarray::{Array, IxDyn};

    fn entry(short: &str, suffix: &str) -> CatalogEntry {
        CatalogRow::new(short, short, Some("1"), suffix, "").into()
    }

    fn resolved(source: &str, dims: &[&str], suffix: &str) -> ResolvedVariable {
        ResolvedVariable {
            catalog_entry: entry(source, suffix),
            source_name: source.to_string(),
            output_name: source.to_string(),
            long_name: source.to_string(),
            dimensions: dims.iter().map(|d| d.to_string()).collect(),
            species_suffix: None,
        }
    }

    fn group(vars: Vec<ResolvedVariable>) -> OutputGroup {
        OutputGroup {
            suffix: vars[0].suffix().to_string(),
            variables: vars,
        }
    }

    /// lat ascending [0, 10, 20], lon [170, 190] (190 wraps to -170)
    fn source() -> MemoryDataset {
        let mut ds = MemoryDataset::new();
        ds.add_dimension("time", 1).unwrap();
        ds.add_dimension("lat", 3).unwrap();
        ds.add_dimension("lon", 2).unwrap();
        ds.add_variable("lat", &["lat"], DataType::Float64, Array::from(vec![0.0, 10.0, 20.0]).into_dyn())
            .unwrap();
        ds.add_variable("lon", &["lon"], DataType::Float64, Array::from(vec![170.0, 190.0]).into_dyn())
            .unwrap();
        ds.add_variable("time", &["time"], DataType::Float64, Array::from(vec![0.0]).into_dyn())
            .unwrap();
        let data = Array::from_shape_vec(IxDyn(&[1, 3, 2]), vec![0.0, 1.0, 10.0, 11.0, 20.0, f64::NAN]).unwrap();
        ds.add_variable("aod", &["time", "lat", "lon"], DataType::Float64, data)
            .unwrap();
        ds.add_variable("series", &["time"], DataType::Float64, Array::from(vec![3.0]).into_dyn())
            .unwrap();
        ds
    }

    fn write(group: &OutputGroup, ds: &MemoryDataset) -> (MemorySink, Vec<Diagnostic>, Result<GroupWrite>) {
        let config = EngineConfig::default();
        let mut sink = MemorySink::new();
        let mut diagnostics = Vec::new();
        let result = ProductWriter::new(&config).write(group, ds, &mut sink, &mut diagnostics);
        (sink, diagnostics, result)
    }

    #[test]
    fn test_write_gridded_group() {
        let ds = source();
        let (sink, diagnostics, result) = write(&group(vec![resolved("aod", &["time", "lat", "lon"], "AOD")]), &ds);

        let written = result.unwrap();
        assert_eq!(written.container, "EMIT_L4_ESM_AOD");
        assert_eq!(written.variables, vec!["aod".to_string()]);
        assert_eq!(diagnostics, vec![Diagnostic::MissingLevDimension {
            container: "EMIT_L4_ESM_AOD".to_string()
        }]);

        let out = sink.container("EMIT_L4_ESM_AOD").unwrap();
        let dims: Vec<&str> = out.dimensions.keys().map(String::as_str).collect();
        assert_eq!(dims, vec!["lat", "lon", "time", "lev"]);
        assert_eq!(out.dimensions["lev"], 1);

        let lat: Vec<f64> = out.data("lat").unwrap().iter().copied().collect();
        assert_eq!(lat, vec![20.0, 10.0, 0.0]);
        let lon: Vec<f64> = out.data("lon").unwrap().iter().copied().collect();
        assert_eq!(lon, vec![-170.0, 170.0]);

        // rows reversed, columns swapped, NaN filled
        let aod: Vec<f64> = out.data("aod").unwrap().iter().copied().collect();
        assert_eq!(aod, vec![-9999.0, 20.0, 11.0, 10.0, 1.0, 0.0]);

        let var = out.variable("aod").unwrap();
        assert_eq!(var.dtype, DataType::Float32);
        assert_eq!(var.fill_value, Some(-9999.0));
        assert_eq!(var.attribute_text("grid_mapping"), Some(GRID_MAPPING));

        let mapping = out.variable(GRID_MAPPING).unwrap();
        assert_eq!(mapping.dtype, DataType::Int32);
        assert!(mapping.dimensions.is_empty());
        assert_eq!(mapping.attribute_text("GeoTransform"), Some("-340 340 0 25 0 -10"));
        assert!(mapping.attribute_text("spatial_ref").unwrap().starts_with("GEOGCS[\"WGS 84\""));

        assert_eq!(out.variable("lat").unwrap().attribute_text("standard_name"), Some("latitude"));
        assert_eq!(out.variable("time").unwrap().attribute_text("long_name"), Some("Time"));
        assert!(out.attribute_text("title").is_some());
    }

    #[test]
    fn test_non_gridded_group_still_gets_coordinates() {
        let ds = source();
        let (sink, _, result) = write(&group(vec![resolved("series", &["time"], "TS")]), &ds);
        result.unwrap();

        let out = sink.container("EMIT_L4_ESM_TS").unwrap();
        assert!(out.variable("lat").is_some());
        assert!(out.variable(GRID_MAPPING).is_none());
        assert!(out.variable("series").unwrap().attribute_text("grid_mapping").is_none());
    }

    #[test]
    fn test_missing_coordinate_is_axis_mismatch() {
        let mut ds = MemoryDataset::new();
        ds.add_dimension("lat", 3).unwrap();
        ds.add_dimension("lon", 2).unwrap();
        ds.add_variable("aod", &["lat", "lon"], DataType::Float64, Array::zeros(IxDyn(&[3, 2])))
            .unwrap();

        let (sink, _, result) = write(&group(vec![resolved("aod", &["lat", "lon"], "AOD")]), &ds);
        assert!(matches!(result, Err(EngineError::AxisMismatch { ref variable, .. }) if variable == "aod"));
        assert!(sink.containers().is_empty());
    }

    #[test]
    fn test_small_grid_fails_gridded_group() {
        let mut ds = MemoryDataset::new();
        ds.add_dimension("lat", 2).unwrap();
        ds.add_dimension("lon", 2).unwrap();
        ds.add_variable("lat", &["lat"], DataType::Float64, Array::from(vec![0.0, 1.0]).into_dyn())
            .unwrap();
        ds.add_variable("lon", &["lon"], DataType::Float64, Array::from(vec![0.0, 1.0]).into_dyn())
            .unwrap();
        ds.add_variable("aod", &["lat", "lon"], DataType::Float64, Array::zeros(IxDyn(&[2, 2])))
            .unwrap();

        let (_, _, result) = write(&group(vec![resolved("aod", &["lat", "lon"], "AOD")]), &ds);
        assert!(matches!(result, Err(EngineError::GridTooSmall { axis: "lat", len: 2, min: 3 })));
    }

    #[test]
    fn test_failed_write_leaves_no_container() {
        let ds = source();
        let config = EngineConfig::default();
        let mut sink = MemorySink::new().fail_writes_to("aod");
        let mut diagnostics = Vec::new();
        let result = ProductWriter::new(&config).write(
            &group(vec![resolved("aod", &["time", "lat", "lon"], "AOD")]),
            &ds,
            &mut sink,
            &mut diagnostics,
        );

        assert!(matches!(result, Err(EngineError::Sink(_))));
        assert!(sink.containers().is_empty());
        // raised before the failure, still reported
        assert_eq!(diagnostics.len(), 1);
    }

    /// Delegates to a memory dataset but fails lookups of one name with an
    /// I/O error, the way an unreadable file would.
    struct UnreadableSource {
        inner: MemoryDataset,
        broken: &'static str,
    }

    impl UnreadableSource {
        fn check(&self, name: &str) -> Result<()> {
            if name == self.broken {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, format!("cannot read {}", name)).into());
            }
            Ok(())
        }
    }

    impl SourceDataset for UnreadableSource {
        fn variable_names(&self) -> Vec<String> {
            self.inner.variable_names()
        }

        fn variable_dimensions(&self, name: &str) -> Result<Vec<String>> {
            self.check(name)?;
            self.inner.variable_dimensions(name)
        }

        fn dimension_size(&self, name: &str) -> Result<usize> {
            self.check(name)?;
            self.inner.dimension_size(name)
        }

        fn read_variable(&self, name: &str) -> Result<crate::dataset::SourceVariable> {
            self.check(name)?;
            self.inner.read_variable(name)
        }
    }

    #[test]
    fn test_unreadable_lev_is_not_treated_as_absent() {
        let ds = UnreadableSource {
            inner: source(),
            broken: LEV,
        };
        let config = EngineConfig::default();
        let mut sink = MemorySink::new();
        let mut diagnostics = Vec::new();
        let result = ProductWriter::new(&config).write(
            &group(vec![resolved("aod", &["time", "lat", "lon"], "AOD")]),
            &ds,
            &mut sink,
            &mut diagnostics,
        );

        assert!(matches!(result, Err(EngineError::Io(_))));
        assert!(diagnostics.is_empty());
        assert!(sink.containers().is_empty());
    }

    #[test]
    fn test_unreadable_coordinate_is_not_treated_as_absent() {
        let ds = UnreadableSource {
            inner: source(),
            broken: LAT,
        };
        let config = EngineConfig::default();
        let mut sink = MemorySink::new();
        let mut diagnostics = Vec::new();
        let result = ProductWriter::new(&config).write(
            &group(vec![resolved("series", &["time"], "TS")]),
            &ds,
            &mut sink,
            &mut diagnostics,
        );

        assert!(matches!(result, Err(EngineError::Io(_))));
        assert!(sink.containers().is_empty());
    }

    #[test]
    fn test_empty_coordinate_is_axis_mismatch() {
        let mut ds = MemoryDataset::new();
        ds.add_dimension("lat", 0).unwrap();
        ds.add_dimension("lon", 2).unwrap();
        ds.add_variable("lat", &["lat"], DataType::Float64, Array::zeros(IxDyn(&[0])))
            .unwrap();
        ds.add_variable("lon", &["lon"], DataType::Float64, Array::from(vec![0.0, 1.0]).into_dyn())
            .unwrap();
        ds.add_variable("aod", &["lat", "lon"], DataType::Float64, Array::zeros(IxDyn(&[0, 2])))
            .unwrap();

        let (sink, _, result) = write(&group(vec![resolved("aod", &["lat", "lon"], "AOD")]), &ds);
        match result {
            Err(EngineError::AxisMismatch { variable, reason }) => {
                assert_eq!(variable, "aod");
                assert_eq!(reason, "the lat coordinate is empty");
            }
            other => panic!("expected AxisMismatch, got {:?}", other),
        }
        assert!(sink.containers().is_empty());
    }
}

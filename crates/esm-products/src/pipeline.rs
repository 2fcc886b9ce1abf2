//! End-to-end product run: catalog, resolution, grouping, writing.

use tracing::{error, info, warn};

use crate::catalog::{CatalogRow, NamingCatalog};
use crate::config::EngineConfig;
use crate::dataset::{DatasetSink, SourceDataset};
use crate::error::{EngineError, Result};
use crate::report::{Diagnostic, GroupReport, GroupStatus, ResolutionReport, RunReport};
use crate::resolver::{group_by_suffix, Resolution, VariableResolver};
use crate::writer::ProductWriter;

/// Drives one source dataset through to its output containers.
pub struct ProductPipeline {
    config: EngineConfig,
}

impl ProductPipeline {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the whole pipeline.
    ///
    /// Configuration problems and strict-policy resolution failures abort the
    /// run. Anything that goes wrong while writing a group only fails that
    /// group; the others are still written.
    pub fn run<S: SourceDataset + ?Sized>(
        &self,
        rows: Vec<CatalogRow>,
        source: &S,
        sink: &mut dyn DatasetSink,
    ) -> Result<RunReport> {
        self.config.validate()?;

        let (catalog, catalog_diagnostics) = NamingCatalog::build(rows, &self.config.aliases)?;
        info!(entries = catalog.len(), policy = %self.config.policy, "Built naming catalog");

        let inventory = source.inventory()?;
        let Resolution {
            variables,
            report: mut resolution,
        } = match VariableResolver::from_config(&self.config).resolve(&catalog, &inventory) {
            Ok(resolution) => resolution,
            Err(EngineError::UnknownVariable { names, mut report }) => {
                prepend_diagnostics(&mut report, catalog_diagnostics);
                return Err(EngineError::UnknownVariable { names, report });
            }
            Err(e) => return Err(e),
        };
        prepend_diagnostics(&mut resolution, catalog_diagnostics);

        let groups = group_by_suffix(variables);
        let mut report = RunReport {
            resolution,
            groups: Vec::with_capacity(groups.len()),
        };

        let writer = ProductWriter::new(&self.config);
        for group in groups {
            let mut diagnostics = Vec::new();
            let container = self.config.container_name(&group.suffix);

            let status = match writer.write(&group, source, sink, &mut diagnostics) {
                Ok(written) => GroupStatus::Written {
                    variables: written.variables,
                },
                Err(e) if e.is_group_scoped() => {
                    error!(container = %container, error = %e, "Output group failed");
                    GroupStatus::Failed { error: e.to_string() }
                }
                Err(e) => return Err(e),
            };

            report.groups.push(GroupReport {
                suffix: group.suffix,
                container,
                status,
                diagnostics,
            });
        }

        let failed = report.failed().count();
        if failed > 0 {
            warn!(failed, total = report.groups.len(), "Run finished with failed groups");
        } else {
            info!(written = report.groups.len(), "Run finished");
        }

        Ok(report)
    }
}

/// Catalog diagnostics come first: they were raised before resolution.
fn prepend_diagnostics(report: &mut ResolutionReport, mut diagnostics: Vec<Diagnostic>) {
    diagnostics.append(&mut report.diagnostics);
    report.diagnostics = diagnostics;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DataType;
    use crate::memory::{MemoryDataset, MemorySink};
    use ndarray::{Array, IxDyn};

    fn source() -> MemoryDataset {
        let mut ds = MemoryDataset::new();
        ds.add_dimension("lat", 3).unwrap();
        ds.add_dimension("lon", 2).unwrap();
        ds.add_variable("lat", &["lat"], DataType::Float64, Array::from(vec![-10.0, 0.0, 10.0]).into_dyn())
            .unwrap();
        ds.add_variable("lon", &["lon"], DataType::Float64, Array::from(vec![0.0, 90.0]).into_dyn())
            .unwrap();
        for name in ["a", "b"] {
            ds.add_variable(name, &["lat", "lon"], DataType::Float64, Array::ones(IxDyn(&[3, 2])))
                .unwrap();
        }
        ds
    }

    fn rows() -> Vec<CatalogRow> {
        vec![
            CatalogRow::new("a", "a", Some("1"), "A", "First."),
            CatalogRow::new("b", "b", Some("1"), "B", "Second."),
        ]
    }

    #[test]
    fn test_run_writes_every_group() {
        let pipeline = ProductPipeline::new(EngineConfig::default());
        let mut sink = MemorySink::new();
        let report = pipeline.run(rows(), &source(), &mut sink).unwrap();

        assert_eq!(report.succeeded().count(), 2);
        assert_eq!(
            sink.containers().keys().collect::<Vec<_>>(),
            vec!["EMIT_L4_ESM_A", "EMIT_L4_ESM_B"]
        );
        assert!(report.resolution.unresolved_catalog_names.is_empty());
    }

    #[test]
    fn test_failed_group_does_not_stop_run() {
        let pipeline = ProductPipeline::new(EngineConfig::default());
        let mut sink = MemorySink::new().fail_writes_to("a");
        let report = pipeline.run(rows(), &source(), &mut sink).unwrap();

        let failed: Vec<_> = report.failed().map(|g| g.container.as_str()).collect();
        assert_eq!(failed, vec!["EMIT_L4_ESM_A"]);
        assert!(sink.container("EMIT_L4_ESM_A").is_none());
        assert!(sink.container("EMIT_L4_ESM_B").is_some());
    }

    #[test]
    fn test_invalid_config_aborts() {
        let config = EngineConfig {
            species: Vec::new(),
            ..EngineConfig::default()
        };
        let mut sink = MemorySink::new();
        assert!(ProductPipeline::new(config).run(rows(), &source(), &mut sink).is_err());
        assert!(sink.containers().is_empty());
    }

    #[test]
    fn test_strict_failure_keeps_catalog_diagnostics() {
        let mut config = EngineConfig {
            policy: crate::config::ResolutionPolicy::Strict,
            ..EngineConfig::default()
        };
        config.aliases.insert("c_old".to_string(), "c".to_string());
        let mut ds = source();
        ds.add_variable("stray", &["lat", "lon"], DataType::Float64, Array::zeros(IxDyn(&[3, 2])))
            .unwrap();

        let mut sink = MemorySink::new();
        match ProductPipeline::new(config).run(rows(), &ds, &mut sink) {
            Err(EngineError::UnknownVariable { names, report }) => {
                assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["stray".to_string()]);
                assert_eq!(
                    report.diagnostics.first(),
                    Some(&Diagnostic::MissingAliasTarget {
                        alias: "c_old".to_string(),
                        canonical: "c".to_string(),
                    })
                );
                assert!(report.resolved_catalog_names.contains("a"));
            }
            other => panic!("expected UnknownVariable, got {:?}", other),
        }
        assert!(sink.containers().is_empty());
    }
}

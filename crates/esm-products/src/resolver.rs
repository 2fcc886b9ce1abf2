//! Matching catalog descriptors against the variables of a source dataset.

use std::collections::{BTreeSet, HashSet};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogEntry, NamingCatalog};
use crate::config::{EngineConfig, ResolutionPolicy};
use crate::error::{EngineError, Result};
use crate::report::{Diagnostic, ResolutionReport};

/// Source variable name -> dimension-name tuple, in source order.
pub type Inventory = IndexMap<String, Vec<String>>;

/// A catalog descriptor bound to one concrete source variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedVariable {
    pub catalog_entry: CatalogEntry,
    /// Name in the source dataset
    pub source_name: String,
    /// Name in the output container
    pub output_name: String,
    /// Long name, including the species token for repeated families
    pub long_name: String,
    /// Source dimension tuple
    pub dimensions: Vec<String>,
    pub species_suffix: Option<String>,
}

impl ResolvedVariable {
    /// Output-group key.
    pub fn suffix(&self) -> &str {
        &self.catalog_entry.suffix
    }

    pub fn units(&self) -> Option<&str> {
        self.catalog_entry.units.as_deref()
    }
}

/// Resolved variables in catalog-row-then-species order, plus the report.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub variables: Vec<ResolvedVariable>,
    pub report: ResolutionReport,
}

impl Resolution {
    /// Partition into output groups, keyed by suffix in first-appearance order.
    pub fn into_groups(self) -> Vec<OutputGroup> {
        group_by_suffix(self.variables)
    }
}

/// All resolved variables sharing one catalog suffix; one output container.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputGroup {
    pub suffix: String,
    pub variables: Vec<ResolvedVariable>,
}

impl OutputGroup {
    /// Catalog entries that contributed to this group, once per row, in
    /// resolution order.
    pub fn contributing_entries(&self) -> Vec<&CatalogEntry> {
        let mut entries: Vec<&CatalogEntry> = Vec::new();
        for var in &self.variables {
            if !entries.iter().any(|e| *e == &var.catalog_entry) {
                entries.push(&var.catalog_entry);
            }
        }
        entries
    }
}

/// Group variables by suffix, preserving the order in which each suffix and
/// each variable first appeared.
pub fn group_by_suffix(variables: Vec<ResolvedVariable>) -> Vec<OutputGroup> {
    let mut groups: IndexMap<String, Vec<ResolvedVariable>> = IndexMap::new();
    for var in variables {
        groups.entry(var.suffix().to_string()).or_default().push(var);
    }
    groups
        .into_iter()
        .map(|(suffix, variables)| OutputGroup { suffix, variables })
        .collect()
}

/// Matches catalog entries against source variable names.
pub struct VariableResolver<'a> {
    species: &'a [String],
    axes: &'a [String],
    policy: ResolutionPolicy,
}

impl<'a> VariableResolver<'a> {
    /// Create a resolver with explicit vocabularies.
    pub fn new(species: &'a [String], axes: &'a [String], policy: ResolutionPolicy) -> Self {
        Self {
            species,
            axes,
            policy,
        }
    }

    /// Create a resolver from the engine configuration.
    pub fn from_config(config: &'a EngineConfig) -> Self {
        Self::new(&config.species, &config.axes, config.policy)
    }

    /// Resolve every catalog entry against `inventory`.
    ///
    /// Output names are unique within a suffix: when a later match would
    /// reuse a name already taken in its group (an alias and its canonical
    /// name both present, or duplicated rows), the earlier match in catalog
    /// order wins and the later one is reported as a collision.
    ///
    /// Under the strict policy, source variables that no entry consumed
    /// (other than coordinate variables) fail the run; the error carries
    /// the report built so far.
    pub fn resolve(&self, catalog: &NamingCatalog, inventory: &Inventory) -> Result<Resolution> {
        let mut resolution = Resolution::default();
        let mut consumed: HashSet<String> = HashSet::new();
        let mut claimed: HashSet<(String, String)> = HashSet::new();
        let mut unmatched_rows: Vec<&CatalogEntry> = Vec::new();

        for entry in catalog {
            let matches = self.candidates(entry, inventory);
            if matches.is_empty() {
                unmatched_rows.push(entry);
                continue;
            }

            for (source_name, long_name, dims, species) in matches {
                consumed.insert(source_name.clone());
                let output = output_name(entry, &source_name);

                if !claimed.insert((entry.suffix.clone(), output.clone())) {
                    warn!(
                        source = %source_name,
                        output = %output,
                        suffix = %entry.suffix,
                        "Output name already taken in group, skipping"
                    );
                    resolution.report.diagnostics.push(Diagnostic::OutputNameCollision {
                        source: source_name,
                        output,
                        suffix: entry.suffix.clone(),
                    });
                    continue;
                }

                if output != source_name {
                    info!(source = %source_name, output = %output, "Renaming aliased variable");
                    resolution.report.diagnostics.push(Diagnostic::Rewrite {
                        source: source_name.clone(),
                        output: output.clone(),
                    });
                }

                resolution.variables.push(ResolvedVariable {
                    catalog_entry: entry.clone(),
                    source_name,
                    output_name: output,
                    long_name,
                    dimensions: dims.to_vec(),
                    species_suffix: species.cloned(),
                });
            }

            let resolved = &mut resolution.report.resolved_catalog_names;
            resolved.insert(entry.short_name.clone());
            if let Some(canonical) = &entry.alias_of {
                resolved.insert(canonical.clone());
            }
        }

        for entry in unmatched_rows {
            if resolution.report.resolved_catalog_names.contains(&entry.short_name) {
                continue;
            }
            if resolution
                .report
                .unresolved_catalog_names
                .insert(entry.short_name.clone())
            {
                debug!(short_name = %entry.short_name, "Catalog name not present in source");
                resolution.report.diagnostics.push(Diagnostic::Unresolved {
                    short_name: entry.short_name.clone(),
                });
            }
        }

        let unrecognized: BTreeSet<String> = inventory
            .keys()
            .filter(|name| !consumed.contains(*name) && !self.axes.contains(*name))
            .cloned()
            .collect();

        for name in &unrecognized {
            warn!(variable = %name, "Source variable not described by the catalog");
            resolution.report.diagnostics.push(Diagnostic::Unrecognized {
                source: name.clone(),
            });
        }

        info!(
            resolved = resolution.variables.len(),
            unresolved = resolution.report.unresolved_catalog_names.len(),
            unrecognized = unrecognized.len(),
            "Resolved catalog against source"
        );

        resolution.report.unrecognized_source_names = unrecognized;
        if self.policy == ResolutionPolicy::Strict && !resolution.report.unrecognized_source_names.is_empty() {
            return Err(EngineError::UnknownVariable {
                names: resolution.report.unrecognized_source_names.clone(),
                report: Box::new(resolution.report),
            });
        }

        Ok(resolution)
    }

    /// Source variables matching one entry: (source name, long name,
    /// dimensions, species token), in species order for repeated families.
    fn candidates<'i>(
        &'i self,
        entry: &CatalogEntry,
        inventory: &'i Inventory,
    ) -> Vec<(String, String, &'i [String], Option<&'i String>)> {
        if entry.mineral_repeat {
            self.species
                .iter()
                .filter_map(|token| {
                    let candidate = format!("{}_{}", entry.short_name, token);
                    let dims = inventory.get(&candidate)?;
                    let long_name = format!("{} {}", entry.long_name, token);
                    Some((candidate, long_name, dims.as_slice(), Some(token)))
                })
                .collect()
        } else {
            inventory
                .get(&entry.short_name)
                .map(|dims| (entry.short_name.clone(), entry.long_name.clone(), dims.as_slice(), None))
                .into_iter()
                .collect()
        }
    }
}

/// Rewrite the leading alias token of `source_name` to the canonical name.
fn output_name(entry: &CatalogEntry, source_name: &str) -> String {
    match &entry.alias_of {
        Some(canonical) => match source_name.strip_prefix(entry.short_name.as_str()) {
            Some(rest) => format!("{}{}", canonical, rest),
            None => source_name.to_string(),
        },
        None => source_name.to_string(),
    }
}

//! Structured diagnostics surfaced to the caller.
//!
//! Nothing non-fatal is swallowed: every notice that is logged is also kept
//! here so that audit tooling can consume it.

use std::collections::BTreeSet;

use serde::Serialize;

/// A non-fatal event raised while building the catalog, resolving
/// variables or writing a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// An alias names a canonical short name absent from the table.
    MissingAliasTarget { alias: String, canonical: String },
    /// An alias collides with a short name already in the table.
    AliasShadowsEntry { alias: String },
    /// A source variable was renamed on output.
    Rewrite { source: String, output: String },
    /// A catalog row matched nothing in the source.
    Unresolved { short_name: String },
    /// A source variable matched no catalog row.
    Unrecognized { source: String },
    /// A later match would reuse an output name already taken in its
    /// group; the earlier match in catalog order was kept.
    OutputNameCollision {
        source: String,
        output: String,
        suffix: String,
    },
    /// A variable carries only one of lat/lon; its axes were left as-is.
    PartialSpatialAxes {
        variable: String,
        dimensions: Vec<String>,
    },
    /// The source has no `lev` dimension; it was declared with size 1.
    MissingLevDimension { container: String },
}

/// Outcome of matching the catalog against the source.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolutionReport {
    /// Catalog names with at least one match (canonical names included
    /// when satisfied through an alias)
    pub resolved_catalog_names: BTreeSet<String>,
    /// Catalog names with no match
    pub unresolved_catalog_names: BTreeSet<String>,
    /// Source variables no catalog row consumed (coordinates excluded)
    pub unrecognized_source_names: BTreeSet<String>,
    /// Every diagnostic, in the order it was raised
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolutionReport {
    /// Rename notices, in resolution order.
    pub fn rewrites(&self) -> impl Iterator<Item = (&str, &str)> {
        self.diagnostics.iter().filter_map(|d| match d {
            Diagnostic::Rewrite { source, output } => Some((source.as_str(), output.as_str())),
            _ => None,
        })
    }
}

/// Whether a group's container was completed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GroupStatus {
    Written { variables: Vec<String> },
    Failed { error: String },
}

/// Result of writing one output group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    pub suffix: String,
    pub container: String,
    #[serde(flatten)]
    pub status: GroupStatus,
    /// Diagnostics raised while writing this group
    pub diagnostics: Vec<Diagnostic>,
}

impl GroupReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, GroupStatus::Written { .. })
    }
}

/// Everything a run produced, for audit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub resolution: ResolutionReport,
    pub groups: Vec<GroupReport>,
}

impl RunReport {
    /// Containers that were written and closed.
    pub fn succeeded(&self) -> impl Iterator<Item = &GroupReport> {
        self.groups.iter().filter(|g| g.succeeded())
    }

    /// Groups whose container was abandoned.
    pub fn failed(&self) -> impl Iterator<Item = &GroupReport> {
        self.groups.iter().filter(|g| !g.succeeded())
    }

    /// Serialize to JSON for audit logs.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

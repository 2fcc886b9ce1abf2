//! Controlled naming catalog.
//!
//! The catalog is an ordered table of output-variable descriptors. Row order
//! is significant: it drives output-group population order and therefore the
//! order in which titles and summaries are assembled.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::report::Diagnostic;

/// One record of the naming table, as supplied by the catalog source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRow {
    #[serde(rename = "Short Name")]
    pub short_name: String,
    #[serde(rename = "Long Name")]
    pub long_name: String,
    #[serde(rename = "Units", default)]
    pub units: Option<String>,
    #[serde(rename = "Suffix")]
    pub suffix: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "Mineral Repeat", default, deserialize_with = "deserialize_flag")]
    pub mineral_repeat: bool,
}

impl CatalogRow {
    /// Convenience constructor for a plain (non-repeating) row.
    pub fn new(
        short_name: impl Into<String>,
        long_name: impl Into<String>,
        units: Option<&str>,
        suffix: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            short_name: short_name.into(),
            long_name: long_name.into(),
            units: units.map(str::to_string),
            suffix: suffix.into(),
            description: description.into(),
            mineral_repeat: false,
        }
    }

    /// Mark the row as a per-species family.
    pub fn mineral_repeat(mut self) -> Self {
        self.mineral_repeat = true;
        self
    }
}

/// Accept booleans as well as the textual forms spreadsheets export.
fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Int(i) => Ok(i != 0),
        Flag::Text(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "invalid Mineral Repeat value '{}'",
                other
            ))),
        },
    }
}

/// A descriptor of the effective catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub short_name: String,
    pub long_name: String,
    pub units: Option<String>,
    /// Output-group key
    pub suffix: String,
    pub description: String,
    pub mineral_repeat: bool,
    /// Canonical short name when this entry was synthesized from an alias
    pub alias_of: Option<String>,
}

impl From<CatalogRow> for CatalogEntry {
    fn from(row: CatalogRow) -> Self {
        Self {
            short_name: row.short_name,
            long_name: row.long_name,
            units: row.units.filter(|u| !u.is_empty()),
            suffix: row.suffix,
            description: row.description,
            mineral_repeat: row.mineral_repeat,
            alias_of: None,
        }
    }
}

/// The effective catalog: table rows followed by synthesized alias rows.
#[derive(Debug, Clone, Default)]
pub struct NamingCatalog {
    entries: Vec<CatalogEntry>,
}

impl NamingCatalog {
    /// Build the effective catalog from the parsed table and alias map.
    ///
    /// Each alias clones every row whose short name equals its canonical
    /// name. Aliases whose target is absent are skipped and reported; a row
    /// without a short name or suffix makes the table invalid.
    pub fn build(
        rows: Vec<CatalogRow>,
        aliases: &IndexMap<String, String>,
    ) -> Result<(Self, Vec<Diagnostic>)> {
        let mut diagnostics = Vec::new();

        for (i, row) in rows.iter().enumerate() {
            if row.short_name.trim().is_empty() {
                return Err(EngineError::config(format!("catalog row {} has no Short Name", i)));
            }
            if row.suffix.trim().is_empty() {
                return Err(EngineError::config(format!(
                    "catalog row {} ('{}') has no Suffix",
                    i, row.short_name
                )));
            }
        }

        let mut entries: Vec<CatalogEntry> = rows.into_iter().map(CatalogEntry::from).collect();
        let table_len = entries.len();

        for (alias, canonical) in aliases {
            if entries[..table_len].iter().any(|e| &e.short_name == alias) {
                warn!(alias = %alias, "Alias shadows an existing catalog row, skipping");
                diagnostics.push(Diagnostic::AliasShadowsEntry {
                    alias: alias.clone(),
                });
                continue;
            }

            let clones: Vec<CatalogEntry> = entries[..table_len]
                .iter()
                .filter(|e| &e.short_name == canonical)
                .map(|e| CatalogEntry {
                    short_name: alias.clone(),
                    alias_of: Some(canonical.clone()),
                    ..e.clone()
                })
                .collect();

            if clones.is_empty() {
                let err = EngineError::config(format!(
                    "alias '{}' refers to unknown catalog name '{}'",
                    alias, canonical
                ));
                warn!(error = %err, "Skipping alias");
                diagnostics.push(Diagnostic::MissingAliasTarget {
                    alias: alias.clone(),
                    canonical: canonical.clone(),
                });
                continue;
            }

            debug!(alias = %alias, canonical = %canonical, rows = clones.len(), "Added alias rows");
            entries.extend(clones);
        }

        Ok((Self { entries }, diagnostics))
    }

    /// Entries in effective order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in effective order.
    pub fn iter(&self) -> std::slice::Iter<'_, CatalogEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a NamingCatalog {
    type Item = &'a CatalogEntry;
    type IntoIter = std::slice::Iter<'a, CatalogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

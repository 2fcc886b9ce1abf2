//! Descriptive metadata for output containers.

use chrono::{DateTime, Utc};
use esm_common::BoundingBox;
use indexmap::IndexMap;

use crate::config::EngineConfig;
use crate::dataset::AttributeValue;
use crate::resolver::OutputGroup;

/// Separator between the titles of catalog rows sharing one container.
pub const TITLE_SEPARATOR: &str = "; ";

/// Turn a catalog long name into title text.
///
/// Underscores become spaces, two run-together phrases are split, and each
/// word is capitalized (a letter is upper-cased when it does not follow
/// another letter, and lower-cased otherwise).
pub fn format_title(long_name: &str) -> String {
    let spaced = long_name
        .replace('_', " ")
        .replace("radiativeforcing", "radiative forcing")
        .replace("topofatmosphere", "top of atmosphere");

    let mut out = String::with_capacity(spaced.len());
    let mut prev_alpha = false;
    for c in spaced.chars() {
        if prev_alpha {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}

/// Container title: prefix followed by each contributing row's title.
pub fn compose_title(config: &EngineConfig, group: &OutputGroup) -> String {
    let titles: Vec<String> = group
        .contributing_entries()
        .iter()
        .map(|e| format_title(&e.long_name))
        .collect();
    format!("{}{}", config.metadata.title_prefix, titles.join(TITLE_SEPARATOR))
}

/// Container summary: mission text, model addendum, row descriptions.
pub fn compose_summary(config: &EngineConfig, group: &OutputGroup) -> String {
    let mut summary = config.metadata.summary.clone();
    if let Some(addendum) = config.model.as_ref().and_then(|m| m.summary_addendum.as_deref()) {
        summary.push_str(addendum);
    }
    for entry in group.contributing_entries() {
        summary.push_str(&entry.description);
    }
    summary
}

/// Every global attribute of a group's container, in write order.
pub fn global_attributes(
    config: &EngineConfig,
    group: &OutputGroup,
    bbox: Option<&BoundingBox>,
    created: DateTime<Utc>,
) -> IndexMap<String, AttributeValue> {
    let mut attrs: IndexMap<String, AttributeValue> = config
        .metadata
        .global_attributes
        .iter()
        .map(|(k, v)| (k.clone(), AttributeValue::from(v.as_str())))
        .collect();

    attrs.insert("summary".to_string(), compose_summary(config, group).into());
    attrs.insert(
        "date_created".to_string(),
        created.format("%Y-%m-%dT%H:%M:%SZ").to_string().into(),
    );

    if let Some(description) = config.model.as_ref().and_then(|m| m.input_description.as_deref()) {
        attrs.insert("input_description".to_string(), description.into());
    }

    if let Some(bbox) = bbox {
        attrs.insert("geospatial_lat_min".to_string(), bbox.min_lat.into());
        attrs.insert("geospatial_lat_max".to_string(), bbox.max_lat.into());
        attrs.insert("geospatial_lon_min".to_string(), bbox.min_lon.into());
        attrs.insert("geospatial_lon_max".to_string(), bbox.max_lon.into());
    }

    attrs.insert("title".to_string(), compose_title(config, group).into());
    attrs
}

//! Engine configuration.
//!
//! Species vocabulary, alias map and unknown-variable policy are all
//! per-run inputs; the constants below are only their defaults.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Species tokens accepted as suffixes of mineral-repeat variables, in
/// resolution order.
pub const DEFAULT_SPECIES: &[&str] = &[
    "ill", "kao", "sme", "feo", "qua", "cal", "fel", "gyp", "Illi", "Kaol", "Smec", "Calc",
    "Quar", "Feld", "FeOx", "Gyps", "IlFe", "KaFe", "SmFe", "CaFe", "QuFe", "FeFe", "GyFe",
];

/// Dimension names the engine understands.
pub const DEFAULT_AXES: &[&str] = &["bins", "lon", "lat", "lev", "time"];

/// Sentinel written for missing data.
pub const NODATA: f64 = -9999.0;

/// How unrecognized source variables are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionPolicy {
    /// Report unrecognized variables and carry on.
    #[default]
    Permissive,
    /// Fail the run when any source variable is unrecognized.
    Strict,
}

impl ResolutionPolicy {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "permissive" | "warn" => Some(Self::Permissive),
            "strict" | "raise" => Some(Self::Strict),
            _ => None,
        }
    }

    /// Get the policy name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Permissive => "permissive",
            Self::Strict => "strict",
        }
    }
}

impl std::fmt::Display for ResolutionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Replace the units of every source variable whose name contains `contains`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitOverride {
    pub contains: String,
    pub units: String,
}

/// Per-model metadata adjustments.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelProfile {
    /// Model name as it appears in the granule lookup table
    pub name: String,
    /// Text appended to the mission summary
    pub summary_addendum: Option<String>,
    /// Value of the `input_description` global attribute
    pub input_description: Option<String>,
    /// Unit replacements keyed by source-name substring
    pub unit_overrides: Vec<UnitOverride>,
}

impl ModelProfile {
    /// GISS ModelE2.1 as described by Obiso et al. (2024).
    pub fn giss_modele21() -> Self {
        Self {
            name: "GISS ModelE2.1".to_string(),
            summary_addendum: Some(
                "This version of GISS ModelE2.1 is described by Obiso et al. ACP (2024)"
                    .to_string(),
            ),
            input_description: Some(
                "The FeOx (iron oxides) tracer contains both hematite and goethite; illite \
                 additionally contains chlorite and vermiculite.  A fraction of the \
                 non-iron-oxide minerals are mixed internally with iron oxides (Perlwitz et \
                 al., ACP 2015)."
                    .to_string(),
            ),
            unit_overrides: vec![UnitOverride {
                contains: "atm_min".to_string(),
                units: "kg m-3".to_string(),
            }],
        }
    }

    /// Look up a built-in profile by model name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "GISS ModelE2.1" => Some(Self::giss_modele21()),
            _ => None,
        }
    }

    /// Units for `source_name`, after any override.
    pub fn units_for<'a>(&'a self, source_name: &str, units: Option<&'a str>) -> Option<&'a str> {
        self.unit_overrides
            .iter()
            .find(|o| source_name.contains(o.contains.as_str()))
            .map(|o| o.units.as_str())
            .or(units)
    }
}

/// Descriptive metadata shared by every output container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductMetadata {
    /// Leading part of every container title
    pub title_prefix: String,
    /// Mission summary preceding the per-variable descriptions
    pub summary: String,
    /// Global attributes written verbatim, in order
    pub global_attributes: IndexMap<String, String>,
}

impl Default for ProductMetadata {
    fn default() -> Self {
        let global_attributes = [
            ("ncei_template_version", "NCEI_NetCDF_Swath_Template_v2.0"),
            ("keywords", "Imaging Spectroscopy, minerals, EMIT, dust, radiative forcing"),
            ("Conventions", "CF-1.63, ACDD-1.3"),
            ("sensor", "EMIT (Earth Surface Mineral Dust Source Investigation)"),
            ("instrument", "EMIT"),
            ("platform", "ISS"),
            ("institution", "NASA Jet Propulsion Laboratory/California Institute of Technology"),
            ("license", "Freely Distributed"),
            ("naming_authority", "LPDAAC"),
            ("keywords_vocabulary", "NASA Global Change Master Directory (GCMD) Science Keywords"),
            ("stdname_vocabulary", "NetCDF Climate and Forecast (CF) Metadata Convention"),
            ("creator_name", "Jet Propulsion Laboratory/California Institute of Technology"),
            ("creator_url", "https://www.jpl.nasa.gov"),
            ("project", "Earth Surface Mineral Dust Source Investigation"),
            ("project_url", "https://earth.jpl.nasa.gov/emit"),
            ("publisher_name", "NASA LPDAAC"),
            ("publisher_url", "https://lpdaac.usgs.gov"),
            ("publisher_email", "lpdaac@usgs.gov"),
            ("identifier_product_doi_authority", "https://doi.org"),
            ("processing_level", "L4"),
            ("geospatial_bounds_crs", "EPSG:4326"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            title_prefix: "EMIT L4 Earth System Model Products V001; ".to_string(),
            summary: MISSION_SUMMARY.to_string(),
            global_attributes,
        }
    }
}

const MISSION_SUMMARY: &str = "The Earth Surface Mineral Dust Source Investigation (EMIT) is an \
Earth Ventures-Instrument (EVI-4) Mission that maps the surface mineralogy of arid dust source \
regions via imaging spectroscopy in the visible and short-wave infrared (VSWIR). Installed on the \
International Space Station (ISS), the EMIT instrument is a Dyson imaging spectrometer that uses \
contiguous spectroscopic measurements from 410 to 2450 nm to resolve absoprtion features of iron \
oxides, clays, sulfates, carbonates, and other dust-forming minerals. During its one-year mission, \
EMIT will observe the sunlit Earth's dust source regions that occur within +/-52° latitude and \
produce maps of the source regions that can be used to improve forecasts of the role of mineral \
dust in the radiative forcing (warming or cooling) of the atmosphere.\n";

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ordered species-token vocabulary for mineral-repeat rows
    pub species: Vec<String>,

    /// Ordered alias -> canonical short-name map
    pub aliases: IndexMap<String, String>,

    /// Treatment of source variables the catalog does not describe
    pub policy: ResolutionPolicy,

    /// Fill value declared on every output variable
    pub fill_value: f64,

    /// Dimension vocabulary; matching source variables are coordinates
    pub axes: Vec<String>,

    /// Granule base name; containers are named `{output_base}_{suffix}`
    pub output_base: String,

    /// Optional per-model metadata adjustments
    pub model: Option<ModelProfile>,

    /// Global descriptive metadata
    pub metadata: ProductMetadata,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            species: DEFAULT_SPECIES.iter().map(|s| s.to_string()).collect(),
            aliases: IndexMap::new(),
            policy: ResolutionPolicy::Permissive,
            fill_value: NODATA,
            axes: DEFAULT_AXES.iter().map(|s| s.to_string()).collect(),
            output_base: "EMIT_L4_ESM".to_string(),
            model: None,
            metadata: ProductMetadata::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file; missing keys keep their defaults.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PRODUCT_OUTPUT_BASE") {
            config.output_base = val;
        }

        if let Ok(val) = std::env::var("PRODUCT_POLICY") {
            config.policy = ResolutionPolicy::from_str(&val)
                .ok_or_else(|| EngineError::config(format!("unknown policy '{}'", val)))?;
        }

        if let Ok(val) = std::env::var("PRODUCT_FILL_VALUE") {
            config.fill_value = val
                .parse()
                .map_err(|_| EngineError::config(format!("invalid fill value '{}'", val)))?;
        }

        if let Ok(val) = std::env::var("PRODUCT_SPECIES") {
            config.species = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(val) = std::env::var("PRODUCT_MODEL") {
            config.model = Some(ModelProfile::builtin(&val).unwrap_or(ModelProfile {
                name: val,
                ..Default::default()
            }));
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.species.is_empty() {
            return Err(EngineError::config("species vocabulary must not be empty"));
        }

        if self.species.iter().any(|s| s.is_empty()) {
            return Err(EngineError::config("species tokens must not be empty"));
        }

        if !self.is_axis("lat") || !self.is_axis("lon") {
            return Err(EngineError::config("axis vocabulary must contain 'lat' and 'lon'"));
        }

        if !self.fill_value.is_finite() {
            return Err(EngineError::config("fill_value must be finite"));
        }

        if self.output_base.is_empty() {
            return Err(EngineError::config("output_base must not be empty"));
        }

        Ok(())
    }

    /// Whether `name` belongs to the dimension vocabulary.
    pub fn is_axis(&self, name: &str) -> bool {
        self.axes.iter().any(|a| a == name)
    }

    /// Container name for an output-group suffix.
    pub fn container_name(&self, suffix: &str) -> String {
        format!("{}_{}", self.output_base, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.species.len(), 23);
        // lower-case mineral tokens resolve before the model-specific spellings
        assert_eq!(&config.species[..8], &test_utils::species::MINERALS[..]);
        assert_eq!(config.species[22], "GyFe");
        assert_eq!(config.fill_value, -9999.0);
        assert_eq!(config.policy, ResolutionPolicy::Permissive);
        assert_eq!(config.container_name("rf"), "EMIT_L4_ESM_rf");
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(ResolutionPolicy::from_str("STRICT"), Some(ResolutionPolicy::Strict));
        assert_eq!(ResolutionPolicy::from_str("warn"), Some(ResolutionPolicy::Permissive));
        assert_eq!(ResolutionPolicy::from_str("sometimes"), None);
    }

    #[test]
    fn test_validate_rejects_bad_vocabularies() {
        let mut config = EngineConfig::default();
        config.species.clear();
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.axes = vec!["lat".to_string(), "time".to_string()];
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.fill_value = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_yaml_keeps_defaults_for_missing_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "policy: strict\noutput_base: EMIT_L4_GISS\nspecies: [ill, kao]\naliases:\n  dust_sw_rf_srf: dust_sw_rf_sfc\n"
        )
        .unwrap();

        let config = EngineConfig::from_yaml(file.path()).unwrap();
        assert_eq!(config.policy, ResolutionPolicy::Strict);
        assert_eq!(config.output_base, "EMIT_L4_GISS");
        assert_eq!(config.species, vec!["ill", "kao"]);
        assert_eq!(config.aliases.get("dust_sw_rf_srf").unwrap(), "dust_sw_rf_sfc");
        assert_eq!(config.fill_value, NODATA);
        assert_eq!(config.axes.len(), 5);
    }

    #[test]
    fn test_model_unit_override() {
        let giss = ModelProfile::giss_modele21();
        assert_eq!(giss.units_for("dust_atm_min_ill", Some("kg m-2")), Some("kg m-3"));
        assert_eq!(giss.units_for("dust_aod_550", Some("1")), Some("1"));
        assert_eq!(ModelProfile::builtin("GISS ModelE2.1"), Some(giss));
        assert!(ModelProfile::builtin("CESM2").is_none());
    }
}

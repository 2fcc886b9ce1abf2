//! Common test fixtures for esm-products tests.
//!
//! This module provides pre-defined test data that represents common
//! scenarios in model output post-processing.

/// Common grid specifications for testing.
pub mod grid {
    /// Coarse global grid, 4 x 8 cells, latitude south to north.
    pub const COARSE_GLOBAL: GridSpec = GridSpec {
        nlat: 4,
        nlon: 8,
        lat_start: -67.5,
        lat_step: 45.0,
        lon_start: 0.0,
        lon_step: 45.0,
    };

    /// Smallest grid the latitude edge correction accepts.
    pub const MINIMAL: GridSpec = GridSpec {
        nlat: 3,
        nlon: 2,
        lat_start: -10.0,
        lat_step: 10.0,
        lon_start: 170.0,
        lon_step: 20.0,
    };

    /// Grid specification for testing.
    #[derive(Debug, Clone, Copy)]
    pub struct GridSpec {
        pub nlat: usize,
        pub nlon: usize,
        pub lat_start: f64,
        pub lat_step: f64,
        pub lon_start: f64,
        pub lon_step: f64,
    }

    impl GridSpec {
        /// Returns the total number of grid cells.
        pub fn size(&self) -> usize {
            self.nlat * self.nlon
        }

        /// Latitude centres in source order.
        pub fn latitudes(&self) -> Vec<f64> {
            crate::generators::latitudes(self.lat_start, self.lat_step, self.nlat)
        }

        /// Longitude centres in source order.
        pub fn longitudes(&self) -> Vec<f64> {
            (0..self.nlon)
                .map(|i| self.lon_start + self.lon_step * i as f64)
                .collect()
        }
    }
}

/// Species vocabularies used by mineral-repeat rows.
pub mod species {
    /// The two-token vocabulary used by most scenario tests
    pub const PAIR: [&str; 2] = ["ill", "kao"];

    /// Lower-case three-letter mineral tokens
    pub const MINERALS: [&str; 8] = ["ill", "kao", "sme", "feo", "qua", "cal", "fel", "gyp"];
}

/// Source variable names and their catalog descriptors.
pub mod variables {
    /// Per-species dust optical depth family
    pub const DUST_AOD: &str = "dust_aod_550";

    /// Catalog suffix of the optical depth family
    pub const DUST_AOD_SUFFIX: &str = "AOD";

    /// Canonical radiative forcing name
    pub const LW_FORCING: &str = "dust_lw_radiativeforcing_topofatmosphere";

    /// Alias for [`LW_FORCING`] used by some model versions
    pub const LW_FORCING_ALIAS: &str = "dust_lwrf_toa";

    /// Shortwave forcing, same suffix as [`LW_FORCING`]
    pub const SW_FORCING: &str = "dust_sw_radiativeforcing";

    /// Catalog suffix of the radiative forcing family
    pub const FORCING_SUFFIX: &str = "RF";

    /// A name no catalog describes
    pub const UNKNOWN: &str = "foo_bar";

    /// Minimum concentration variable subject to GISS unit overrides
    pub const ATM_MIN: &str = "dust_atm_min_conc";
}

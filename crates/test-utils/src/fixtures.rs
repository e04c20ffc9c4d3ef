//! Common test fixtures for reanalysis profile tests.
//!
//! This module provides pre-defined query points, times and grids that
//! represent common scenarios in point lookups.

/// Query points as (latitude, longitude).
pub mod points {
    /// Denver, with a western (negative) longitude.
    pub const DENVER: (f64, f64) = (40.0, -105.0);

    /// Denver, with the same longitude expressed in [0, 360).
    pub const DENVER_EAST: (f64, f64) = (40.0, 255.0);

    /// Just off a grid node, within half a degree.
    pub const DENVER_OFFSET: (f64, f64) = (40.1, -104.9);

    /// Near the pole, far outside the synthetic grid.
    pub const NEAR_POLE: (f64, f64) = (89.999, 0.0);
}

/// Query times.
pub mod times {
    /// First step of the synthetic archives.
    pub const ARCHIVE_START: &str = "2021-01-01T00:00:00Z";

    /// Second step of the synthetic archives.
    pub const ARCHIVE_SECOND_STEP: &str = "2021-01-01T01:00:00Z";

    /// Twenty minutes past the first step, inside a 30 minute tolerance.
    pub const NEAR_START: &str = "2021-01-01T00:20:00Z";

    /// Decades outside any archive coverage.
    pub const OUTSIDE_COVERAGE: &str = "1850-06-01T00:00:00Z";

    /// `hours since 1900-01-01` of 2021-01-01T00:00:00Z.
    pub const HOURS_SINCE_1900_AT_START: i64 = 1_060_680;
}

/// Common grid specifications for testing.
pub mod grid {
    /// ERA5 global grid (0.25 degree resolution), latitude descending.
    pub const ERA5_GLOBAL: GridSpec = GridSpec {
        width: 1440,
        height: 721,
        min_lon: 0.0,
        max_lon: 359.75,
        min_lat: -90.0,
        max_lat: 90.0,
    };

    /// Small 0.25 degree subset around Denver used by the synthetic archives.
    pub const DENVER_SUBSET: GridSpec = GridSpec {
        width: 5,
        height: 6,
        min_lon: 254.5,
        max_lon: 255.5,
        min_lat: 39.75,
        max_lat: 41.0,
    };

    /// Grid specification for testing.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct GridSpec {
        pub width: usize,
        pub height: usize,
        pub min_lon: f64,
        pub max_lon: f64,
        pub min_lat: f64,
        pub max_lat: f64,
    }

    impl GridSpec {
        /// Longitude spacing in degrees.
        pub fn lon_step(&self) -> f64 {
            if self.width > 1 {
                (self.max_lon - self.min_lon) / (self.width - 1) as f64
            } else {
                0.0
            }
        }

        /// Latitude spacing in degrees.
        pub fn lat_step(&self) -> f64 {
            if self.height > 1 {
                (self.max_lat - self.min_lat) / (self.height - 1) as f64
            } else {
                0.0
            }
        }

        /// Latitudes from north to south, as ERA5 stores them.
        pub fn latitudes(&self) -> Vec<f64> {
            (0..self.height)
                .map(|i| self.max_lat - i as f64 * self.lat_step())
                .collect()
        }

        /// Longitudes from west to east.
        pub fn longitudes(&self) -> Vec<f64> {
            (0..self.width)
                .map(|i| self.min_lon + i as f64 * self.lon_step())
                .collect()
        }
    }
}

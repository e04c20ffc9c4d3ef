//! Hybrid-level vertical coefficient table.
//!
//! Each row describes one model half level of the hybrid sigma-pressure
//! coordinate: the pressure at level `k` is `a[k] + b[k] * surface_pressure`
//! (both in pascals). Row 0 is the top-of-atmosphere sentinel.
//!
//! The resource is tab separated with columns
//! `a, b, ph [hPa], pf [hPa], geopotential altitude [m], geometric altitude [m],
//! temperature [K], density [kg/m^3]`. Reference columns may be `-` where
//! undefined (the sentinel row).

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ProfileError, Result};

/// The ERA5 L137 coefficient table shipped with the crate.
const EMBEDDED_TABLE: &str = include_str!("../data/era5_vertical.txt");

/// Number of columns in the tabular resource.
const COLUMNS: usize = 8;

/// One row of the coefficient table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerticalLevel {
    /// Half-level index (0 is the top sentinel).
    pub index: usize,
    /// Pressure coefficient in Pa.
    pub a: f64,
    /// Dimensionless surface-pressure coefficient.
    pub b: f64,
    pub half_level_pressure: Option<f64>,
    pub full_level_pressure: Option<f64>,
    pub geopotential_altitude: Option<f64>,
    pub geometric_altitude: Option<f64>,
    pub temperature: Option<f64>,
    pub density: Option<f64>,
}

/// Immutable table of hybrid coefficients keyed by level index.
#[derive(Debug, Clone)]
pub struct VerticalCoefficientTable {
    levels: Vec<VerticalLevel>,
}

impl VerticalCoefficientTable {
    /// Parse the tab-separated resource.
    ///
    /// Blank lines and lines starting with `#` are skipped. Any malformed row
    /// fails the whole parse.
    pub fn parse(source: &str) -> Result<Self> {
        let mut levels = Vec::new();

        for (line_no, line) in source.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let cols: Vec<&str> = line.split('\t').map(str::trim).collect();
            if cols.len() != COLUMNS {
                return Err(ProfileError::CoefficientTable(format!(
                    "line {}: expected {} columns, found {}",
                    line_no + 1,
                    COLUMNS,
                    cols.len()
                )));
            }

            let a = required(cols[0], line_no, "a")?;
            let b = required(cols[1], line_no, "b")?;

            levels.push(VerticalLevel {
                index: levels.len(),
                a,
                b,
                half_level_pressure: optional(cols[2], line_no, "ph")?,
                full_level_pressure: optional(cols[3], line_no, "pf")?,
                geopotential_altitude: optional(cols[4], line_no, "geopotential altitude")?,
                geometric_altitude: optional(cols[5], line_no, "geometric altitude")?,
                temperature: optional(cols[6], line_no, "temperature")?,
                density: optional(cols[7], line_no, "density")?,
            });
        }

        if levels.len() < 2 {
            return Err(ProfileError::CoefficientTable(format!(
                "table needs a sentinel row and at least one level, found {} row(s)",
                levels.len()
            )));
        }

        debug!(levels = levels.len(), "Parsed vertical coefficient table");
        Ok(Self { levels })
    }

    /// Load a table from a file on disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            ProfileError::CoefficientTable(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&source)
    }

    /// The built-in ERA5 L137 table.
    pub fn embedded() -> Result<Self> {
        Self::parse(EMBEDDED_TABLE)
    }

    /// Load from `path` when given, otherwise use the embedded table.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let table = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::embedded()?,
        };
        info!(
            levels = table.len(),
            source = %path.map(|p| p.display().to_string()).unwrap_or_else(|| "embedded".into()),
            "Loaded vertical coefficient table"
        );
        Ok(table)
    }

    /// All rows, in index order.
    pub fn coefficients(&self) -> &[VerticalLevel] {
        &self.levels
    }

    /// Row for a given index.
    pub fn level(&self, index: usize) -> Option<&VerticalLevel> {
        self.levels.get(index)
    }

    /// Number of rows, including the sentinel.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Number of model levels below the sentinel.
    pub fn model_levels(&self) -> usize {
        self.levels.len() - 1
    }

    /// Half-level pressures in Pa for a given surface pressure in Pa,
    /// excluding the sentinel row. Index 0 of the result is level 1.
    pub fn half_level_pressures(&self, surface_pressure_pa: f64) -> Vec<f64> {
        self.levels
            .iter()
            .skip(1)
            .map(|level| level.a + level.b * surface_pressure_pa)
            .collect()
    }
}

fn parse_value(raw: &str, line_no: usize, column: &str) -> Result<f64> {
    let value: f64 = raw.parse().map_err(|_| {
        ProfileError::CoefficientTable(format!(
            "line {}: invalid {} value '{}'",
            line_no + 1,
            column,
            raw
        ))
    })?;
    if !value.is_finite() {
        return Err(ProfileError::CoefficientTable(format!(
            "line {}: non-finite {} value",
            line_no + 1,
            column
        )));
    }
    Ok(value)
}

fn required(raw: &str, line_no: usize, column: &str) -> Result<f64> {
    if raw == "-" || raw.is_empty() {
        return Err(ProfileError::CoefficientTable(format!(
            "line {}: missing {} coefficient",
            line_no + 1,
            column
        )));
    }
    parse_value(raw, line_no, column)
}

fn optional(raw: &str, line_no: usize, column: &str) -> Result<Option<f64>> {
    if raw == "-" || raw.is_empty() {
        return Ok(None);
    }
    parse_value(raw, line_no, column).map(Some)
}

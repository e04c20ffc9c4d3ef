//! Test data generators for creating synthetic atmospheric soundings.
//!
//! These generators create predictable, physically plausible profiles based
//! on the International Standard Atmosphere, so tests can assert ordering and
//! ranges without real archive data.

/// Standard gravity used to turn heights into geopotential (m/s^2).
pub const GRAVITY: f64 = 9.806_65;

/// The 37 ERA5 pressure levels in hPa, top of atmosphere first.
pub const ERA5_PRESSURE_LEVELS: [f64; 37] = [
    1.0, 2.0, 3.0, 5.0, 7.0, 10.0, 20.0, 30.0, 50.0, 70.0, 100.0, 125.0, 150.0, 175.0, 200.0,
    225.0, 250.0, 300.0, 350.0, 400.0, 450.0, 500.0, 550.0, 600.0, 650.0, 700.0, 750.0, 775.0,
    800.0, 825.0, 850.0, 875.0, 900.0, 925.0, 950.0, 975.0, 1000.0,
];

const R_DRY: f64 = 287.052_87;

/// ISA layers: (base height m, base temperature K, lapse rate K/m, base pressure hPa).
const ISA_LAYERS: [(f64, f64, f64, f64); 5] = [
    (0.0, 288.15, -0.0065, 1013.25),
    (11_000.0, 216.65, 0.0, 226.3206),
    (20_000.0, 216.65, 0.001, 54.74889),
    (32_000.0, 228.65, 0.0028, 8.680187),
    (47_000.0, 270.65, 0.0, 1.109063),
];

fn isa_layer(pressure_hpa: f64) -> (f64, f64, f64, f64) {
    ISA_LAYERS
        .iter()
        .rev()
        .find(|(_, _, _, base_p)| pressure_hpa <= *base_p)
        .copied()
        .unwrap_or(ISA_LAYERS[0])
}

/// ISA geopotential height (m) at a pressure (hPa).
///
/// Pressures above 1013.25 hPa extrapolate the lowest layer, giving negative
/// heights.
pub fn isa_height(pressure_hpa: f64) -> f64 {
    let (h0, t0, lapse, p0) = isa_layer(pressure_hpa);
    if lapse == 0.0 {
        h0 - R_DRY * t0 / GRAVITY * (pressure_hpa / p0).ln()
    } else {
        let t = t0 * (pressure_hpa / p0).powf(-lapse * R_DRY / GRAVITY);
        h0 + (t - t0) / lapse
    }
}

/// ISA temperature (K) at a pressure (hPa).
pub fn isa_temperature(pressure_hpa: f64) -> f64 {
    let (_, t0, lapse, p0) = isa_layer(pressure_hpa);
    if lapse == 0.0 {
        t0
    } else {
        t0 * (pressure_hpa / p0).powf(-lapse * R_DRY / GRAVITY)
    }
}

/// Specific humidity (kg/kg) decaying with height from 6 g/kg near 1000 hPa,
/// floored at a stratospheric 2.5 mg/kg.
pub fn specific_humidity(pressure_hpa: f64) -> f64 {
    (0.006 * (pressure_hpa / 1000.0).powi(3)).max(2.5e-6)
}

/// Westerly wind increasing with height (m/s).
pub fn u_wind(pressure_hpa: f64) -> f64 {
    5.0 + 25.0 * (1.0 - pressure_hpa / 1000.0)
}

/// Weak southerly wind (m/s).
pub fn v_wind(pressure_hpa: f64) -> f64 {
    2.0 - pressure_hpa / 1000.0
}

/// Weak subsidence (Pa/s), strongest mid-troposphere.
pub fn omega(pressure_hpa: f64) -> f64 {
    0.1 * (pressure_hpa / 1000.0) * (1.0 - pressure_hpa / 1000.0)
}

/// A synthetic sounding on given pressure levels.
#[derive(Debug, Clone, PartialEq)]
pub struct Sounding {
    pub pressure: Vec<f64>,
    pub geopotential: Vec<f64>,
    pub temperature: Vec<f64>,
    pub specific_humidity: Vec<f64>,
    pub u_wind: Vec<f64>,
    pub v_wind: Vec<f64>,
    pub omega: Vec<f64>,
}

/// Creates a standard-atmosphere sounding on the given levels (hPa).
///
/// # Example
///
/// ```
/// use test_utils::{standard_sounding, ERA5_PRESSURE_LEVELS};
///
/// let sounding = standard_sounding(&ERA5_PRESSURE_LEVELS);
/// assert_eq!(sounding.temperature.len(), 37);
/// assert!(sounding.geopotential[0] > sounding.geopotential[36]);
/// ```
pub fn standard_sounding(levels_hpa: &[f64]) -> Sounding {
    Sounding {
        pressure: levels_hpa.to_vec(),
        geopotential: levels_hpa.iter().map(|p| isa_height(*p) * GRAVITY).collect(),
        temperature: levels_hpa.iter().map(|p| isa_temperature(*p)).collect(),
        specific_humidity: levels_hpa.iter().map(|p| specific_humidity(*p)).collect(),
        u_wind: levels_hpa.iter().map(|p| u_wind(*p)).collect(),
        v_wind: levels_hpa.iter().map(|p| v_wind(*p)).collect(),
        omega: levels_hpa.iter().map(|p| omega(*p)).collect(),
    }
}

//! Physical formulas used by the profile builders.

use metfor::{HectoPascal, Kelvin, Quantity};

/// Standard acceleration of gravity in m/s^2 (WMO).
pub const STANDARD_GRAVITY: f64 = 9.806_65;

/// Pure thermodynamic functions needed to derive profile fields.
///
/// Implementations must not keep per-call state; builders call them once per
/// level.
pub trait Thermodynamics: Send + Sync {
    /// Dewpoint in kelvin from pressure (hPa), air temperature (K) and
    /// specific humidity (kg/kg). `None` when undefined for the inputs.
    fn dewpoint(&self, pressure_hpa: f64, temperature_k: f64, specific_humidity: f64) -> Option<f64>;

    /// Height in meters from geopotential in m^2/s^2.
    fn height(&self, geopotential: f64) -> f64 {
        geopotential / STANDARD_GRAVITY
    }
}

/// [`Thermodynamics`] backed by the `metfor` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetforPhysics;

impl Thermodynamics for MetforPhysics {
    fn dewpoint(&self, pressure_hpa: f64, temperature_k: f64, specific_humidity: f64) -> Option<f64> {
        if !(pressure_hpa.is_finite() && temperature_k.is_finite() && specific_humidity.is_finite())
        {
            return None;
        }
        if pressure_hpa <= 0.0 || specific_humidity <= 0.0 {
            return None;
        }

        // Temperature does not enter the formula; a supersaturated input
        // yields a dewpoint above it, returned as computed.
        metfor::dew_point_from_p_and_specific_humidity(HectoPascal(pressure_hpa), specific_humidity)
            .map(|dp| Kelvin::from(dp).unpack())
            .filter(|dp| dp.is_finite())
            .or_else(|| bolton_dewpoint(pressure_hpa, specific_humidity))
    }
}

/// Ratio of the gas constants of dry air and water vapor.
const EPSILON: f64 = 0.621_957;

/// Dewpoint (K) by inverting the Bolton (1980) saturation vapor pressure fit.
///
/// Used for stratospheric levels, where vapor pressures fall outside the
/// range metfor evaluates.
fn bolton_dewpoint(pressure_hpa: f64, specific_humidity: f64) -> Option<f64> {
    if specific_humidity >= 1.0 {
        return None;
    }
    let mixing_ratio = specific_humidity / (1.0 - specific_humidity);
    let vapor_pressure = pressure_hpa * mixing_ratio / (EPSILON + mixing_ratio);
    let ln_ratio = (vapor_pressure / 6.112).ln();
    let dewpoint_c = 243.5 * ln_ratio / (17.67 - ln_ratio);
    let dewpoint_k = dewpoint_c + 273.15;
    (dewpoint_k.is_finite() && dewpoint_k > 0.0).then_some(dewpoint_k)
}

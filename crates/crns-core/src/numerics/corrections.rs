//! Pure correction formulas applied to raw fast-neutron counts.
//!
//! Pressure follows Hawdon et al. (2014), humidity Rosolem et al. (2013),
//! biomass Baatz et al. (2015) and the beta-coefficient model Desilets
//! (2021). All are total over their physical domains; callers guard the
//! divisions that can degenerate (e.g. a zero station count).

use crate::common::constants::{
    BIOMASS_SLOPE, CELSIUS_TO_KELVIN, HUMIDITY_SLOPE, REFERENCE_STATION_RIGIDITY, RIGIDITY_SLOPE,
    WATER_VAPOUR_GAS_CONSTANT,
};

/// Multiplicative pressure correction `exp(B * (P - P0))`.
pub fn pressure_factor(pressure: f64, beta: f64, reference_pressure: f64) -> f64 {
    (beta * (pressure - reference_pressure)).exp()
}

/// Saturation vapour pressure (hPa) from air temperature (C), Magnus form.
/// Feeding dewpoint temperature instead yields the actual vapour pressure.
pub fn saturation_vapour_pressure(temperature: f64) -> f64 {
    6.112 * ((17.67 * temperature) / (243.5 + temperature)).exp()
}

/// Relative humidity (%) from air and dewpoint temperatures (C).
pub fn relative_humidity(temperature: f64, dewpoint: f64) -> f64 {
    100.0
        * ((17.625 * 243.04 * (dewpoint - temperature))
            / ((243.04 + temperature) * (243.04 + dewpoint)))
            .exp()
}

/// Actual vapour pressure (Pa) from saturation vapour pressure (Pa) and
/// relative humidity (%).
pub fn actual_vapour_pressure(saturation_pa: f64, relative_humidity: f64) -> f64 {
    saturation_pa * (relative_humidity / 100.0)
}

/// Vapour pressure (kPa) from dewpoint temperature (C), Shuttleworth (2012)
/// eq. 2.21 rearranged.
pub fn dewpoint_vapour_pressure(dewpoint: f64) -> f64 {
    ((0.0707 * dewpoint - 0.49299) / (1.0 + 0.00421 * dewpoint)).exp()
}

/// Absolute humidity (kg/m^3) from vapour pressure (Pa) and temperature (C).
pub fn absolute_humidity(vapour_pressure_pa: f64, temperature: f64) -> f64 {
    vapour_pressure_pa / (WATER_VAPOUR_GAS_CONSTANT * (temperature + CELSIUS_TO_KELVIN))
}

/// Humidity correction factor `1 + 0.0054 * (pv - pv0)`, pv in g/m^3.
pub fn humidity_factor(absolute_humidity: f64, reference_humidity: f64) -> f64 {
    1.0 + HUMIDITY_SLOPE * (absolute_humidity - reference_humidity)
}

/// Incoming-intensity factor as the plain reference-station ratio.
pub fn intensity_factor(reference_count: f64, station_count: f64) -> f64 {
    reference_count / station_count
}

/// Linear adjustment for the cutoff-rigidity difference between the site and
/// the Jungfraujoch reference station (Hawdon et al. 2014).
pub fn rigidity_correction(cutoff_rigidity: f64) -> f64 {
    RIGIDITY_SLOPE * (cutoff_rigidity - REFERENCE_STATION_RIGIDITY) + 1.0
}

/// Intensity factor with the rigidity adjustment applied to its deviation
/// from unity.
pub fn rigidity_adjusted_intensity(intensity_factor: f64, cutoff_rigidity: f64) -> f64 {
    (intensity_factor - 1.0) * rigidity_correction(cutoff_rigidity) + 1.0
}

/// Biomass correction `1 / (1 - 0.009 * agb)` for above-ground biomass in
/// kg/m^2. An approximation, not a measurement; unknown biomass means no
/// correction and the caller passes no factor at all.
pub fn biomass_factor(above_ground_biomass: f64) -> f64 {
    1.0 / (1.0 - BIOMASS_SLOPE * above_ground_biomass)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaCoefficients {
    /// Pressure attenuation coefficient B (per mb).
    pub beta: f64,
    /// Site reference pressure (mb) from the barometric formula.
    pub reference_pressure: f64,
}

/// Site pressure-correction constants from latitude (degrees), elevation (m)
/// and cutoff rigidity (GV). Polynomial coefficients and term structure are
/// fixed by the Desilets (2021) elevation-scaling model; the only free
/// inputs are the three physical ones.
pub fn beta_coefficient(latitude: f64, elevation: f64, cutoff_rigidity: f64) -> BetaCoefficients {
    let rho_rck = 2670.0;
    let x0 = (101_325.0 * (1.0 - 2.25577e-5 * elevation).powf(5.25588)) / 100.0;

    let z = -0.00000448211 * x0.powi(3) + 0.0160234 * x0.powi(2) - 27.0977 * x0 + 15_666.1;

    let lat_rad = latitude.to_radians();
    let g_lat = 978_032.7
        * (1.0 + 0.0053024 * lat_rad.sin().powi(2) - 0.0000058 * (2.0 * lat_rad).sin().powi(2));
    let del_free_air = -0.3087691 * z;
    let del_boug = rho_rck * z * 0.00004193;
    let g_corr = (g_lat + del_free_air + del_boug) / 100_000.0;

    let g = g_corr / 10.0;
    let x = x0 / g;

    let n_1 = 0.01231386;
    let alpha_1 = 0.0554611;
    let k_1 = 0.6012159;
    let b0 = 4.74235e-06;
    let b1 = -9.66624e-07;
    let b2 = 1.42783e-09;
    let b3 = -3.70478e-09;
    let b4 = 1.27739e-09;
    let b5 = 3.58814e-11;
    let b6 = -3.146e-15;
    let b7 = -3.5528e-13;
    let b8 = -4.29191e-14;

    let rc = cutoff_rigidity;
    let term1 = n_1 * (1.0 + (-alpha_1 * rc.powf(k_1)).exp()).recip() * (x - x0);
    let term2 = 0.5 * (b0 + b1 * rc + b2 * rc.powi(2)) * (x.powi(2) - x0.powi(2));
    let term3 = 0.3333 * (b3 + b4 * rc + b5 * rc.powi(2)) * (x.powi(3) - x0.powi(3));
    let term4 = 0.25 * (b6 + b7 * rc + b8 * rc.powi(2)) * (x.powi(4) - x0.powi(4));

    let beta = ((term1 + term2 + term3 + term4) / (x0 - x)).abs();

    BetaCoefficients {
        beta,
        reference_pressure: x0,
    }
}

//! Physical constants of the neutron-moisture relation shared across the
//! processing stages, to avoid ad hoc per-module literal values.

/// Desilets et al. (2010) counting-rate law constants.
pub const A0: f64 = 0.0808;
pub const A1: f64 = 0.372;
pub const A2: f64 = 0.115;

/// Quartz particle density (g/cm^3), the saturation-ceiling default.
pub const QUARTZ_DENSITY: f64 = 2.65;

/// Soil-organic-carbon to water-equivalent conversion (Hawdon et al. 2014).
pub const SOC_WATER_EQUIVALENT: f64 = 0.556;

/// Humidity correction slope per g/m^3 of absolute humidity (Rosolem et al. 2013).
pub const HUMIDITY_SLOPE: f64 = 0.0054;

/// Biomass correction slope per kg/m^2 (Baatz et al. 2015).
pub const BIOMASS_SLOPE: f64 = 0.009;

/// Cutoff rigidity of the Jungfraujoch reference station (GV).
pub const REFERENCE_STATION_RIGIDITY: f64 = 4.49;
pub const RIGIDITY_SLOPE: f64 = -0.075;

/// Specific gas constant of water vapour (J/(kg K)).
pub const WATER_VAPOUR_GAS_CONSTANT: f64 = 461.5;

pub const CELSIUS_TO_KELVIN: f64 = 273.15;

/// External sentinel marking a missing value in persisted series.
pub const NO_VALUE: f64 = -999.0;

/// Radii (m) at which the sensing depth is evaluated before averaging.
pub const SENSING_DEPTH_RADII: [f64; 3] = [10.0, 75.0, 150.0];

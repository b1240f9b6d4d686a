pub mod corrections;
pub mod weighting;

pub use corrections::{
    absolute_humidity, actual_vapour_pressure, beta_coefficient, biomass_factor,
    dewpoint_vapour_pressure, humidity_factor, intensity_factor, pressure_factor,
    relative_humidity, rigidity_adjusted_intensity, rigidity_correction,
    saturation_vapour_pressure, BetaCoefficients,
};
pub use weighting::{
    depth_weight, penetration_depth, radial_weight, rescaled_radius, wr_a, wr_b, wr_x,
};

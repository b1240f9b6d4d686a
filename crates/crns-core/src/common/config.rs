//! Immutable run configuration passed by reference into every stage entry
//! point. Field defaults mirror the established processing conventions and
//! every value can be overridden from a JSON document.

use crate::common::constants;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InversionMethod {
    #[default]
    Standard,
    Kohli,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityMethod {
    /// Direct reference-station ratio.
    ReferenceRatio,
    /// Reference-station ratio with the linear cutoff-rigidity adjustment.
    #[default]
    RigidityAdjusted,
}

/// Local time-of-day window over which calibration-day averages are taken.
/// The 16:00-23:00 default is the COSMOS-USA sampling convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for CalibrationWindow {
    fn default() -> Self {
        Self {
            start_hour: 16,
            end_hour: 23,
        }
    }
}

impl CalibrationWindow {
    /// Window membership follows the reference convention: exclusive of the
    /// starting hour, inclusive of the final one.
    pub fn contains_hour(&self, hour: u32) -> bool {
        hour > self.start_hour && hour <= self.end_hour
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Relative-change threshold for calibration convergence.
    pub accuracy: f64,
    /// Hard cap on weighting iterations before a convergence failure.
    pub max_iterations: usize,
    /// Rolling-average window length in hours.
    pub rolling_window: usize,
    /// Minimum valid hours a rolling window needs to emit a value.
    pub rolling_min_valid: usize,
    /// Upper bound of the N0 scan as a multiple of the mean corrected count.
    pub n0_search_multiplier: f64,
    pub calibration_window: CalibrationWindow,
    pub inversion_method: InversionMethod,
    pub intensity_method: IntensityMethod,
    /// Particle density (g/cm^3) used for the saturation ceiling.
    pub particle_density: f64,
    /// Reference absolute humidity (g/m^3) of the humidity correction.
    pub reference_humidity: f64,
    /// Reference neutron-monitor count the intensity ratio is taken against.
    pub reference_station_count: f64,
    /// Minimum plausible count rate as a percentage of N0.
    pub below_n0_percent: f64,
    /// Largest tolerated hour-to-hour count change in percent.
    pub timestep_diff_percent: f64,
    pub a0: f64,
    pub a1: f64,
    pub a2: f64,
    /// Opt-in to the legacy behaviour of dividing percent-valued calibration
    /// moisture by 100 instead of rejecting it.
    pub rescale_percent_moisture: bool,
    /// Also produce the daily-resolution inversion.
    pub daily_aggregation: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            accuracy: 0.01,
            max_iterations: 100,
            rolling_window: 12,
            rolling_min_valid: 6,
            n0_search_multiplier: 2.0,
            calibration_window: CalibrationWindow::default(),
            inversion_method: InversionMethod::default(),
            intensity_method: IntensityMethod::default(),
            particle_density: constants::QUARTZ_DENSITY,
            reference_humidity: 0.0,
            reference_station_count: 159.0,
            below_n0_percent: 30.0,
            timestep_diff_percent: 20.0,
            a0: constants::A0,
            a1: constants::A1,
            a2: constants::A2,
            rescale_percent_moisture: false,
            daily_aggregation: false,
        }
    }
}

impl ProcessingConfig {
    /// Saturation ceiling for a given bulk density.
    pub fn max_moisture(&self, bulk_density: f64) -> f64 {
        1.0 - bulk_density / self.particle_density
    }
}

//! Iterative field-moisture solver for one calibration day.
//!
//! Implements the Schrön et al. (2017) weighting procedure: depth-weight
//! samples into per-profile moistures, radially weight the profiles, and
//! iterate until the field estimate reaches a fixed point.

use crate::common::config::CalibrationWindow;
use crate::common::ProcessingConfig;
use crate::domain::{CalibrationSample, CrnsError, CrnsResult, ProfileWeighting, TimeSeriesRecord};
use crate::numerics::corrections::{
    absolute_humidity, actual_vapour_pressure, saturation_vapour_pressure,
};
use crate::numerics::weighting::{depth_weight, radial_weight, rescaled_radius};
use chrono::{NaiveDate, Timelike};
use std::collections::BTreeMap;

/// Vegetation height is fixed at zero: reliable per-campaign data is rare
/// and the footprint impact is small.
const VEGETATION_HEIGHT: f64 = 0.0;

/// Day-average ambient conditions feeding the weighting functions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct DayEnvironment {
    pub pressure: f64,
    pub temperature: f64,
    /// Absolute humidity in g/m^3.
    pub absolute_humidity: f64,
}

/// Averages a series column over the calibration time window of the given
/// date, falling back to the full-day mean when the window holds no data.
pub(super) fn window_average<F>(
    series: &[TimeSeriesRecord],
    date: NaiveDate,
    window: &CalibrationWindow,
    field: F,
) -> Option<f64>
where
    F: Fn(&TimeSeriesRecord) -> Option<f64>,
{
    let in_window: Vec<f64> = series
        .iter()
        .filter(|row| row.date() == date && window.contains_hour(row.timestamp.hour()))
        .filter_map(&field)
        .collect();
    let values = if in_window.is_empty() {
        series
            .iter()
            .filter(|row| row.date() == date)
            .filter_map(&field)
            .collect()
    } else {
        in_window
    };
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Builds the day's averaged environment, or names the missing input. The
/// humidity path prefers the local relative-humidity source and falls back
/// to vapour pressure.
pub(super) fn day_environment(
    series: &[TimeSeriesRecord],
    date: NaiveDate,
    window: &CalibrationWindow,
) -> Result<DayEnvironment, String> {
    let pressure = window_average(series, date, window, |row| row.pressure)
        .ok_or_else(|| format!("no pressure data on {date}"))?;
    let temperature = window_average(series, date, window, |row| row.temperature)
        .ok_or_else(|| format!("no temperature data on {date}"))?;

    let absolute = if let Some(rh) =
        window_average(series, date, window, |row| row.relative_humidity)
    {
        let saturation_pa = saturation_vapour_pressure(temperature) * 100.0;
        absolute_humidity(actual_vapour_pressure(saturation_pa, rh), temperature) * 1000.0
    } else if let Some(vp) = window_average(series, date, window, |row| row.vapour_pressure) {
        absolute_humidity(vp, temperature) * 1000.0
    } else {
        return Err(format!("no humidity data on {date}"));
    };

    Ok(DayEnvironment {
        pressure,
        temperature,
        absolute_humidity: absolute,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct ConvergedDay {
    pub field_moisture: f64,
    pub iterations: usize,
    pub profiles: Vec<ProfileWeighting>,
}

struct ProfileAccumulator {
    weighted_moisture: f64,
    depth_weight_sum: f64,
    radius: f64,
    rescaled: f64,
}

/// Iterates the weighting procedure to a fixed point. The initial estimate
/// is the unweighted sample mean; each pass rescales radii, depth-weights
/// samples into profile moistures and radially weights the profiles.
pub(super) fn converge_field_moisture(
    samples: &[CalibrationSample],
    environment: &DayEnvironment,
    bulk_density: f64,
    config: &ProcessingConfig,
) -> CrnsResult<ConvergedDay> {
    let mut moisture =
        samples.iter().map(|s| s.volumetric_moisture).sum::<f64>() / samples.len() as f64;
    let mut iterations = 0usize;

    loop {
        iterations += 1;
        if iterations > config.max_iterations {
            return Err(CrnsError::computation(
                "CALIB.NON_CONVERGENT",
                format!(
                    "weighting iteration did not reach accuracy {} within {} iterations",
                    config.accuracy, config.max_iterations
                ),
            ));
        }

        let mut profiles: BTreeMap<&str, ProfileAccumulator> = BTreeMap::new();
        for sample in samples {
            let rescaled = rescaled_radius(
                sample.radial_distance,
                environment.pressure,
                VEGETATION_HEIGHT,
                moisture,
            );
            let weight = depth_weight(sample.depth_midpoint(), rescaled, bulk_density, moisture);
            let entry = profiles
                .entry(sample.profile_id.as_str())
                .or_insert(ProfileAccumulator {
                    weighted_moisture: 0.0,
                    depth_weight_sum: 0.0,
                    radius: sample.radial_distance,
                    rescaled,
                });
            entry.weighted_moisture += sample.volumetric_moisture * weight;
            entry.depth_weight_sum += weight;
            entry.radius = sample.radial_distance;
            entry.rescaled = rescaled;
        }

        let mut table = Vec::with_capacity(profiles.len());
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for (profile_id, acc) in profiles {
            let profile_moisture = acc.weighted_moisture / acc.depth_weight_sum;
            let weight = radial_weight(
                acc.radius,
                acc.rescaled,
                environment.absolute_humidity,
                environment.temperature / 100.0,
            );
            table.push(ProfileWeighting {
                profile_id: profile_id.to_string(),
                radius: acc.radius,
                rescaled_radius: acc.rescaled,
                weighted_moisture: profile_moisture,
                radial_weight: weight,
            });
            weighted_sum += profile_moisture * weight;
            weight_sum += weight;
        }

        if weight_sum == 0.0 {
            return Err(CrnsError::computation(
                "CALIB.ZERO_WEIGHT",
                "radial weight sum is zero; cannot form the field moisture ratio",
            ));
        }

        let updated = weighted_sum / weight_sum;
        let accuracy = if moisture == 0.0 {
            if updated == 0.0 { 0.0 } else { f64::INFINITY }
        } else {
            ((updated - moisture) / moisture).abs()
        };
        moisture = updated;

        if accuracy <= config.accuracy {
            return Ok(ConvergedDay {
                field_moisture: moisture,
                iterations,
                profiles: table,
            });
        }
    }
}

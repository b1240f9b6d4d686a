//! N0 calibration engine.
//!
//! Pairs converged field moistures from soil sampling campaigns with the
//! corrected neutron series and scans integer N0 candidates for the value
//! that minimises the summed relative inversion error across all usable
//! calibration days.

mod solver;

use crate::common::constants::SOC_WATER_EQUIVALENT;
use crate::common::ProcessingConfig;
use crate::domain::{
    CalibrationDay, CalibrationOutcome, CalibrationSample, CrnsError, CrnsResult, DayOutcome,
    DayWeighting, SiteMetadata, SoilConstants, TimeSeriesRecord,
};
use crate::modules::traits::{inversion_for, CountInversion};
use solver::{converge_field_moisture, day_environment, window_average};
use std::collections::BTreeMap;

pub struct CalibrationEngine<'a> {
    config: &'a ProcessingConfig,
}

impl<'a> CalibrationEngine<'a> {
    pub fn new(config: &'a ProcessingConfig) -> Self {
        Self { config }
    }

    /// Runs the full calibration: per-day weighting, then the N0 scan. The
    /// found N0 is written back into the site record. Days with missing
    /// series data are skipped with a reason; convergence failures abort the
    /// whole site because a silent partial fit would bias N0.
    pub fn calibrate(
        &self,
        site: &mut SiteMetadata,
        samples: &[CalibrationSample],
        series: &[TimeSeriesRecord],
    ) -> CrnsResult<CalibrationOutcome> {
        if samples.is_empty() {
            return Err(CrnsError::input_validation(
                "CALIB.NO_SAMPLES",
                format!("site {} has no calibration samples", site.site_label()),
            ));
        }
        for sample in samples {
            sample.validate()?;
        }
        let soil = site.soil_constants()?;

        let mut days = Vec::new();
        for day in group_by_date(samples) {
            days.push(self.calibrate_day(day, series, &soil)?);
        }

        let inversion = inversion_for(self.config);
        let (n0, summed_relative_error, search_start, search_end) =
            self.scan_n0(&days, series, &soil, inversion.as_ref())?;
        site.n0 = Some(n0);

        Ok(CalibrationOutcome {
            n0,
            summed_relative_error,
            search_start,
            search_end,
            days,
        })
    }

    fn calibrate_day(
        &self,
        day: CalibrationDay,
        series: &[TimeSeriesRecord],
        soil: &SoilConstants,
    ) -> CrnsResult<DayOutcome> {
        let mut samples = day.samples;
        let mean_moisture =
            samples.iter().map(|s| s.volumetric_moisture).sum::<f64>() / samples.len() as f64;
        let mut rescaled_from_percent = false;
        if mean_moisture > 1.0 {
            if !self.config.rescale_percent_moisture {
                return Err(CrnsError::input_validation(
                    "INPUT.MOISTURE_UNITS",
                    format!(
                        "calibration day {} has mean moisture {mean_moisture}, which looks \
                         like percent; supply decimal fractions or enable percent rescaling",
                        day.date
                    ),
                ));
            }
            for sample in samples.iter_mut() {
                sample.volumetric_moisture /= 100.0;
            }
            rescaled_from_percent = true;
        }

        let window = &self.config.calibration_window;
        let environment = match day_environment(series, day.date, window) {
            Ok(environment) => environment,
            Err(reason) => {
                return Ok(DayOutcome::Skipped {
                    date: day.date,
                    reason,
                });
            }
        };

        let converged =
            converge_field_moisture(&samples, &environment, soil.bulk_density, self.config)?;
        let mean_count = window_average(series, day.date, window, |row| row.calibration_corrected);

        Ok(DayOutcome::Calibrated(DayWeighting {
            date: day.date,
            field_moisture: converged.field_moisture,
            iterations: converged.iterations,
            absolute_humidity: environment.absolute_humidity,
            mean_temperature: environment.temperature,
            mean_pressure: environment.pressure,
            mean_count,
            profiles: converged.profiles,
            moisture_rescaled_from_percent: rescaled_from_percent,
        }))
    }

    /// Integer scan from the series-mean corrected count up to its
    /// configured multiple. Ties keep the lowest candidate.
    fn scan_n0(
        &self,
        days: &[DayOutcome],
        series: &[TimeSeriesRecord],
        soil: &SoilConstants,
        inversion: &dyn CountInversion,
    ) -> CrnsResult<(f64, f64, u32, u32)> {
        let counts: Vec<f64> = series
            .iter()
            .filter_map(|row| row.calibration_corrected)
            .collect();
        if counts.is_empty() {
            return Err(CrnsError::input_validation(
                "CALIB.NO_CORRECTED_COUNTS",
                "series has no corrected counts; run the correction stage first",
            ));
        }
        let mean_count = counts.iter().sum::<f64>() / counts.len() as f64;
        let search_start = mean_count.floor() as u32;
        let mut search_end = (mean_count * self.config.n0_search_multiplier).floor() as u32;
        if search_end <= search_start {
            search_end = search_start + 1;
        }

        let usable: Vec<&DayWeighting> = days
            .iter()
            .filter_map(DayOutcome::weighting)
            .filter(|day| day.mean_count.is_some() && day.field_moisture > 0.0)
            .collect();
        if usable.is_empty() {
            return Err(CrnsError::computation(
                "CALIB.NO_USABLE_DAYS",
                "no calibration day has both a converged moisture and a mean corrected count",
            ));
        }

        let soc_water = soil.soil_organic_carbon * SOC_WATER_EQUIVALENT;
        let mut best: Option<(u32, f64)> = None;
        for candidate in search_start..search_end {
            let mut total = 0.0;
            for day in &usable {
                let count = match day.mean_count {
                    Some(count) => count,
                    None => continue,
                };
                let predicted = inversion.moisture(
                    soil.bulk_density,
                    count,
                    f64::from(candidate),
                    soil.lattice_water,
                    soc_water,
                );
                total += ((predicted - day.field_moisture) / day.field_moisture).abs();
            }
            if best.is_none_or(|(_, error)| total < error) {
                best = Some((candidate, total));
            }
        }

        // The scan range is non-empty by construction.
        let (n0, error) = best.ok_or_else(|| {
            CrnsError::internal("CALIB.EMPTY_SCAN", "N0 scan produced no candidates")
        })?;
        Ok((f64::from(n0), error, search_start, search_end))
    }
}

fn group_by_date(samples: &[CalibrationSample]) -> Vec<CalibrationDay> {
    let mut grouped: BTreeMap<chrono::NaiveDate, Vec<CalibrationSample>> = BTreeMap::new();
    for sample in samples {
        grouped.entry(sample.date).or_default().push(sample.clone());
    }
    grouped
        .into_iter()
        .map(|(date, samples)| CalibrationDay { date, samples })
        .collect()
}

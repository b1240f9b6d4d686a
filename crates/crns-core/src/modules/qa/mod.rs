//! COSMOS-style quality control on the corrected count series.
//!
//! Flag precedence when several conditions hold: low-battery, then
//! above-reference, then below-minimum-rate, then step-change. Flagged rows
//! keep their meteorological inputs but lose the count-derived columns so
//! no later stage inverts a rejected count.

use crate::common::ProcessingConfig;
use crate::domain::{
    CrnsError, CrnsResult, QualityFlag, SiteMetadata, StageReport, TimeSeriesRecord,
};

/// Sensor battery level below which counts are untrustworthy.
const LOW_BATTERY_VOLTS: f64 = 10.0;

#[derive(Debug)]
pub struct QualityControl<'a> {
    config: &'a ProcessingConfig,
    n0: f64,
}

impl<'a> QualityControl<'a> {
    pub fn new(config: &'a ProcessingConfig, site: &SiteMetadata) -> CrnsResult<Self> {
        let n0 = site.calibrated_n0()?;
        Ok(Self { config, n0 })
    }

    pub fn apply(&self, rows: &mut [TimeSeriesRecord]) -> CrnsResult<StageReport> {
        if rows.is_empty() {
            return Err(CrnsError::input_validation(
                "INPUT.SERIES_EMPTY",
                "quality control received an empty series",
            ));
        }
        let minimum = self.n0 * self.config.below_n0_percent / 100.0;
        let mut report = StageReport::default();
        // Step changes are judged against the previous retained count, so a
        // flagged hour does not hide a persisting jump.
        let mut previous_valid: Option<f64> = None;

        for row in rows.iter_mut() {
            let count = match row.corrected_count {
                Some(count) => count,
                None => continue,
            };

            let flag = if row.battery.is_some_and(|volts| volts < LOW_BATTERY_VOLTS) {
                QualityFlag::LowBattery
            } else if count > self.n0 {
                QualityFlag::AboveReference
            } else if count < minimum {
                QualityFlag::BelowMinimumRate
            } else if self.is_step_change(previous_valid, count) {
                QualityFlag::StepChange
            } else {
                QualityFlag::Valid
            };

            row.flag = flag;
            if flag == QualityFlag::Valid {
                previous_valid = Some(count);
                report.record_processed();
            } else {
                row.corrected_count = None;
                row.calibration_corrected = None;
                row.count_error = None;
                report.record_skip(row.timestamp, flag_reason(flag, count, minimum, self.n0));
            }
        }
        Ok(report)
    }

    fn is_step_change(&self, previous: Option<f64>, count: f64) -> bool {
        match previous {
            Some(previous) if previous > 0.0 => {
                (count - previous).abs() / previous * 100.0 > self.config.timestep_diff_percent
            }
            _ => false,
        }
    }
}

fn flag_reason(flag: QualityFlag, count: f64, minimum: f64, n0: f64) -> String {
    match flag {
        QualityFlag::AboveReference => format!("count {count} exceeds N0 {n0}"),
        QualityFlag::BelowMinimumRate => format!("count {count} below minimum rate {minimum}"),
        QualityFlag::LowBattery => format!("battery below {LOW_BATTERY_VOLTS} V"),
        QualityFlag::StepChange => format!("count {count} jumped from the previous hour"),
        QualityFlag::Valid => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::QualityControl;
    use crate::common::ProcessingConfig;
    use crate::domain::{QualityFlag, SiteMetadata, TimeSeriesRecord};
    use chrono::{Duration, NaiveDateTime};

    fn site() -> SiteMetadata {
        SiteMetadata {
            country: "USA".to_string(),
            site_number: "011".to_string(),
            site_name: None,
            latitude: 34.25,
            elevation: 1200.0,
            cutoff_rigidity: 4.49,
            bulk_density: Some(1.4),
            bulk_density_fallback: None,
            lattice_water: Some(0.02),
            soil_organic_carbon: Some(0.01),
            max_moisture: None,
            reference_pressure: Some(880.0),
            beta_coefficient: Some(0.0074),
            biomass: None,
            n0: Some(2000.0),
        }
    }

    fn series(counts: &[Option<f64>]) -> Vec<TimeSeriesRecord> {
        let start: NaiveDateTime = "2016-05-01T00:00:00".parse().expect("timestamp");
        counts
            .iter()
            .enumerate()
            .map(|(hour, count)| {
                let mut row = TimeSeriesRecord::new(start + Duration::hours(hour as i64));
                row.corrected_count = *count;
                row.calibration_corrected = *count;
                row.count_error = count.map(|c| c.sqrt().floor());
                row.battery = Some(12.5);
                row
            })
            .collect()
    }

    #[test]
    fn ordinary_counts_stay_valid() {
        let config = ProcessingConfig::default();
        let control = QualityControl::new(&config, &site()).expect("control should build");
        let mut rows = series(&[Some(1500.0), Some(1520.0), Some(1490.0)]);

        let report = control.apply(&mut rows).expect("apply should succeed");
        assert_eq!(report.processed, 3);
        assert!(report.skipped.is_empty());
        assert!(rows.iter().all(|row| row.flag == QualityFlag::Valid));
    }

    #[test]
    fn counts_above_n0_are_flagged_and_cleared() {
        let config = ProcessingConfig::default();
        let control = QualityControl::new(&config, &site()).expect("control should build");
        let mut rows = series(&[Some(1500.0), Some(2100.0)]);

        control.apply(&mut rows).expect("apply should succeed");
        assert_eq!(rows[1].flag, QualityFlag::AboveReference);
        assert_eq!(rows[1].corrected_count, None);
        assert_eq!(rows[1].calibration_corrected, None);
        assert_eq!(rows[1].count_error, None);
    }

    #[test]
    fn counts_below_the_minimum_rate_are_flagged() {
        let config = ProcessingConfig::default();
        let control = QualityControl::new(&config, &site()).expect("control should build");
        // Minimum is 30% of N0 = 600.
        let mut rows = series(&[Some(1500.0), Some(550.0)]);

        control.apply(&mut rows).expect("apply should succeed");
        assert_eq!(rows[1].flag, QualityFlag::BelowMinimumRate);
    }

    #[test]
    fn low_battery_outranks_step_change() {
        let config = ProcessingConfig::default();
        let control = QualityControl::new(&config, &site()).expect("control should build");
        // 1500 -> 1000 is both a >20% step and a low-battery hour.
        let mut rows = series(&[Some(1500.0), Some(1000.0)]);
        rows[1].battery = Some(9.0);

        control.apply(&mut rows).expect("apply should succeed");
        assert_eq!(rows[1].flag, QualityFlag::LowBattery);
    }

    #[test]
    fn low_battery_outranks_the_minimum_rate_check() {
        let config = ProcessingConfig::default();
        let control = QualityControl::new(&config, &site()).expect("control should build");
        // 550 is below the 600 minimum and the battery is flat; the battery
        // flag wins.
        let mut rows = series(&[Some(1500.0), Some(550.0)]);
        rows[1].battery = Some(9.0);

        control.apply(&mut rows).expect("apply should succeed");
        assert_eq!(rows[1].flag, QualityFlag::LowBattery);
    }

    #[test]
    fn thresholds_judge_the_corrected_count_not_the_raw_one() {
        let config = ProcessingConfig::default();
        let control = QualityControl::new(&config, &site()).expect("control should build");
        // A raw count above N0 that corrects to below it passes; the
        // converse is rejected.
        let mut rows = series(&[Some(1900.0), Some(2100.0)]);
        rows[0].raw_count = Some(2100.0);
        rows[1].raw_count = Some(1900.0);

        control.apply(&mut rows).expect("apply should succeed");
        assert_eq!(rows[0].flag, QualityFlag::Valid);
        assert_eq!(rows[1].flag, QualityFlag::AboveReference);
    }

    #[test]
    fn step_changes_are_judged_against_the_last_valid_hour() {
        let config = ProcessingConfig::default();
        let control = QualityControl::new(&config, &site()).expect("control should build");
        // The jump to 1000 is flagged; the next hour still compares to 1500
        // and is flagged too; returning near 1500 is accepted again.
        let mut rows = series(&[Some(1500.0), Some(1000.0), Some(1010.0), Some(1480.0)]);

        let report = control.apply(&mut rows).expect("apply should succeed");
        assert_eq!(rows[1].flag, QualityFlag::StepChange);
        assert_eq!(rows[2].flag, QualityFlag::StepChange);
        assert_eq!(rows[3].flag, QualityFlag::Valid);
        assert_eq!(report.processed, 2);
        assert_eq!(report.skipped.len(), 2);
    }

    #[test]
    fn flagged_rows_keep_meteorological_inputs() {
        let config = ProcessingConfig::default();
        let control = QualityControl::new(&config, &site()).expect("control should build");
        let mut rows = series(&[Some(2100.0)]);
        rows[0].pressure = Some(880.0);
        rows[0].temperature = Some(20.0);

        control.apply(&mut rows).expect("apply should succeed");
        assert_eq!(rows[0].flag, QualityFlag::AboveReference);
        assert_eq!(rows[0].pressure, Some(880.0));
        assert_eq!(rows[0].temperature, Some(20.0));
    }

    #[test]
    fn rows_without_counts_are_left_untouched() {
        let config = ProcessingConfig::default();
        let control = QualityControl::new(&config, &site()).expect("control should build");
        let mut rows = series(&[Some(1500.0), None, Some(1510.0)]);

        let report = control.apply(&mut rows).expect("apply should succeed");
        assert_eq!(report.processed, 2);
        assert_eq!(rows[1].flag, QualityFlag::Valid);
    }

    #[test]
    fn quality_control_requires_a_calibrated_n0() {
        let config = ProcessingConfig::default();
        let mut uncalibrated = site();
        uncalibrated.n0 = None;
        let error =
            QualityControl::new(&config, &uncalibrated).expect_err("should need an N0");
        assert_eq!(error.placeholder(), "THETA.N0_UNSET");
    }
}

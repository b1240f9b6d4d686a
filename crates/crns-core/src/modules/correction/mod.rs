//! Neutron correction pipeline: per-row application of the humidity,
//! pressure, incoming-intensity and biomass factors.
//!
//! Every row is independent; the stage is a pure function of the row's
//! meteorological inputs and the site constants, so re-running it on an
//! already corrected series reproduces the same corrected counts. Rows with
//! a missing required input keep an undefined corrected count and are
//! recorded in the stage report rather than silently corrected by 1.

use crate::common::{IntensityMethod, ProcessingConfig};
use crate::domain::{CrnsError, CrnsResult, SiteMetadata, StageReport, TimeSeriesRecord};
use crate::numerics::corrections::{
    absolute_humidity, biomass_factor, dewpoint_vapour_pressure, humidity_factor,
    intensity_factor, pressure_factor, rigidity_adjusted_intensity,
};

#[derive(Debug)]
pub struct CorrectionPipeline<'a> {
    config: &'a ProcessingConfig,
    beta: f64,
    reference_pressure: f64,
    cutoff_rigidity: f64,
    /// Static factor for the whole series; biomass data is not time-varying.
    biomass: f64,
}

impl<'a> CorrectionPipeline<'a> {
    pub fn new(config: &'a ProcessingConfig, site: &SiteMetadata) -> CrnsResult<Self> {
        let beta = site.beta_coefficient.ok_or_else(|| {
            CrnsError::input_validation(
                "INPUT.BETA_COEFFICIENT",
                format!("site {} has no beta coefficient", site.site_label()),
            )
        })?;
        let reference_pressure = site.reference_pressure.ok_or_else(|| {
            CrnsError::input_validation(
                "INPUT.REFERENCE_PRESSURE",
                format!("site {} has no reference pressure", site.site_label()),
            )
        })?;
        // Unknown biomass means no correction, an approximation carried into N0.
        let biomass = site.biomass.map(biomass_factor).unwrap_or(1.0);
        Ok(Self {
            config,
            beta,
            reference_pressure,
            cutoff_rigidity: site.cutoff_rigidity,
            biomass,
        })
    }

    pub fn apply(&self, rows: &mut [TimeSeriesRecord]) -> CrnsResult<StageReport> {
        if rows.is_empty() {
            return Err(CrnsError::input_validation(
                "INPUT.SERIES_EMPTY",
                "correction pipeline received an empty series",
            ));
        }
        let mut report = StageReport::default();
        for row in rows.iter_mut() {
            match self.correct_row(row) {
                Ok(()) => report.record_processed(),
                Err(reason) => {
                    row.corrected_count = None;
                    row.calibration_corrected = None;
                    row.count_error = None;
                    report.record_skip(row.timestamp, reason);
                }
            }
        }
        Ok(report)
    }

    fn correct_row(&self, row: &mut TimeSeriesRecord) -> Result<(), String> {
        let humidity = self.humidity_factor_for(row)?;
        let pressure = self.pressure_factor_for(row)?;
        let intensity = self.intensity_factor_for(row)?;
        row.humidity_factor = Some(humidity);
        row.pressure_factor = Some(pressure);
        row.intensity_factor = Some(intensity);
        row.biomass_factor = Some(self.biomass);

        let raw = row.raw_count.ok_or("missing raw count")?;
        if raw <= 0.0 {
            return Err(format!("non-positive raw count {raw}"));
        }
        let corrected = (raw * pressure * intensity * humidity * self.biomass).floor();
        // Biomass-free variant consumed by the N0 calibration, so the static
        // biomass effect stays inside N0.
        let calibration = (raw * pressure * intensity * humidity).floor();
        row.corrected_count = Some(corrected);
        row.calibration_corrected = Some(calibration);
        // Poisson counting statistics scaled onto the corrected count.
        row.count_error = Some((raw.sqrt() / raw * corrected).floor());
        Ok(())
    }

    fn humidity_factor_for(&self, row: &TimeSeriesRecord) -> Result<f64, String> {
        let temperature = row.temperature.ok_or("missing temperature")?;
        let vapour_pressure_pa = match (row.vapour_pressure, row.dewpoint) {
            (Some(vp), _) => vp,
            (None, Some(dewpoint)) => dewpoint_vapour_pressure(dewpoint) * 1000.0,
            (None, None) => return Err("missing vapour pressure and dewpoint".to_string()),
        };
        let pv = absolute_humidity(vapour_pressure_pa, temperature) * 1000.0;
        Ok(humidity_factor(pv, self.config.reference_humidity))
    }

    fn pressure_factor_for(&self, row: &TimeSeriesRecord) -> Result<f64, String> {
        let pressure = row.pressure.ok_or("missing pressure")?;
        Ok(pressure_factor(pressure, self.beta, self.reference_pressure))
    }

    fn intensity_factor_for(&self, row: &TimeSeriesRecord) -> Result<f64, String> {
        let station_count = row.reference_count.ok_or("missing reference station count")?;
        if station_count <= 0.0 {
            return Err(format!("non-positive station count {station_count}"));
        }
        let factor = intensity_factor(self.config.reference_station_count, station_count);
        Ok(match self.config.intensity_method {
            IntensityMethod::ReferenceRatio => factor,
            IntensityMethod::RigidityAdjusted => {
                rigidity_adjusted_intensity(factor, self.cutoff_rigidity)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::CorrectionPipeline;
    use crate::common::{IntensityMethod, ProcessingConfig};
    use crate::domain::{SiteMetadata, TimeSeriesRecord};
    use chrono::NaiveDateTime;

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
            n0: None,
        }
    }

    fn timestamp(text: &str) -> NaiveDateTime {
        text.parse().expect("timestamp should parse")
    }

    fn complete_row(text: &str) -> TimeSeriesRecord {
        let mut row = TimeSeriesRecord::new(timestamp(text));
        row.raw_count = Some(1500.0);
        row.pressure = Some(880.0);
        row.temperature = Some(20.0);
        row.vapour_pressure = Some(1200.0);
        row.reference_count = Some(159.0);
        row
    }

    #[test]
    fn corrects_a_complete_row_with_all_factors() {
        let config = ProcessingConfig::default();
        let pipeline = CorrectionPipeline::new(&config, &site()).expect("pipeline should build");
        let mut rows = vec![complete_row("2016-05-01T12:00:00")];

        let report = pipeline.apply(&mut rows).expect("apply should succeed");
        assert_eq!(report.processed, 1);
        assert!(report.skipped.is_empty());

        let row = &rows[0];
        // Reference pressure and station count match the row, so pressure and
        // intensity factors are unity and only humidity adjusts the count.
        assert!((row.pressure_factor.expect("factor") - 1.0).abs() < 1e-12);
        assert!((row.intensity_factor.expect("factor") - 1.0).abs() < 1e-12);
        let pv = 1200.0 / (461.5 * (20.0 + 273.15)) * 1000.0;
        let expected_humidity = 1.0 + 0.0054 * pv;
        assert!((row.humidity_factor.expect("factor") - expected_humidity).abs() < 1e-12);
        assert_eq!(row.biomass_factor, Some(1.0));

        let expected = (1500.0 * expected_humidity).floor();
        assert_eq!(row.corrected_count, Some(expected));
        assert_eq!(row.calibration_corrected, Some(expected));
        let expected_error = ((1500.0f64).sqrt() / 1500.0 * expected).floor();
        assert_eq!(row.count_error, Some(expected_error));
    }

    #[test]
    fn is_idempotent_for_identical_inputs() {
        let config = ProcessingConfig::default();
        let pipeline = CorrectionPipeline::new(&config, &site()).expect("pipeline should build");
        let mut first = vec![complete_row("2016-05-01T12:00:00")];
        pipeline.apply(&mut first).expect("first apply");
        let mut second = first.clone();
        pipeline.apply(&mut second).expect("second apply");
        assert_eq!(first, second);
    }

    #[test]
    fn missing_inputs_propagate_as_undefined_not_unity() {
        let config = ProcessingConfig::default();
        let pipeline = CorrectionPipeline::new(&config, &site()).expect("pipeline should build");
        let mut rows = vec![complete_row("2016-05-01T12:00:00")];
        rows[0].reference_count = None;

        let report = pipeline.apply(&mut rows).expect("apply should succeed");
        assert_eq!(report.processed, 0);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].reason.contains("reference station"));
        assert_eq!(rows[0].corrected_count, None);
        assert_eq!(rows[0].count_error, None);
    }

    #[test]
    fn dewpoint_substitutes_for_missing_vapour_pressure() {
        let config = ProcessingConfig::default();
        let pipeline = CorrectionPipeline::new(&config, &site()).expect("pipeline should build");
        let mut rows = vec![complete_row("2016-05-01T12:00:00")];
        rows[0].vapour_pressure = None;
        rows[0].dewpoint = Some(10.0);

        let report = pipeline.apply(&mut rows).expect("apply should succeed");
        assert_eq!(report.processed, 1);
        assert!(rows[0].corrected_count.is_some());
    }

    #[test]
    fn biomass_factor_scales_corrected_but_not_calibration_counts() {
        let config = ProcessingConfig::default();
        let mut biomass_site = site();
        biomass_site.biomass = Some(4.0);
        let pipeline =
            CorrectionPipeline::new(&config, &biomass_site).expect("pipeline should build");
        let mut rows = vec![complete_row("2016-05-01T12:00:00")];
        pipeline.apply(&mut rows).expect("apply should succeed");

        let corrected = rows[0].corrected_count.expect("corrected");
        let calibration = rows[0].calibration_corrected.expect("calibration");
        assert!(corrected > calibration);
        let factor = 1.0 / (1.0 - 0.009 * 4.0);
        assert!((rows[0].biomass_factor.expect("factor") - factor).abs() < 1e-12);
    }

    #[test]
    fn intensity_method_selection_changes_the_factor() {
        let mut config = ProcessingConfig::default();
        let mut distant_site = site();
        distant_site.cutoff_rigidity = 10.0;

        config.intensity_method = IntensityMethod::ReferenceRatio;
        let plain = CorrectionPipeline::new(&config, &distant_site).expect("pipeline");
        let mut rows = vec![complete_row("2016-05-01T12:00:00")];
        rows[0].reference_count = Some(150.0);
        plain.apply(&mut rows).expect("apply");
        let plain_factor = rows[0].intensity_factor.expect("factor");

        config.intensity_method = IntensityMethod::RigidityAdjusted;
        let adjusted = CorrectionPipeline::new(&config, &distant_site).expect("pipeline");
        let mut rows = vec![complete_row("2016-05-01T12:00:00")];
        rows[0].reference_count = Some(150.0);
        adjusted.apply(&mut rows).expect("apply");
        let adjusted_factor = rows[0].intensity_factor.expect("factor");

        assert!((plain_factor - 159.0 / 150.0).abs() < 1e-12);
        assert!(adjusted_factor < plain_factor);
    }

    #[test]
    fn pipeline_requires_pressure_constants() {
        let config = ProcessingConfig::default();
        let mut incomplete = site();
        incomplete.beta_coefficient = None;
        let error =
            CorrectionPipeline::new(&config, &incomplete).expect_err("missing beta should fail");
        assert_eq!(error.placeholder(), "INPUT.BETA_COEFFICIENT");
    }

    #[test]
    fn empty_series_is_rejected() {
        let config = ProcessingConfig::default();
        let pipeline = CorrectionPipeline::new(&config, &site()).expect("pipeline should build");
        let error = pipeline.apply(&mut []).expect_err("empty series should fail");
        assert_eq!(error.placeholder(), "INPUT.SERIES_EMPTY");
    }
}

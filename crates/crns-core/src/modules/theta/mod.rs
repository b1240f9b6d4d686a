//! Soil-moisture inversion stage: corrected counts to volumetric moisture,
//! counting-statistics error bands, sensing depth and rolling averages.
//!
//! Runs after correction, calibration and quality flagging. Rows carrying a
//! non-valid flag or no corrected count keep undefined moisture columns and
//! are recorded in the stage report.

use crate::common::constants::{SENSING_DEPTH_RADII, SOC_WATER_EQUIVALENT};
use crate::common::ProcessingConfig;
use crate::domain::{
    CrnsError, CrnsResult, DailyMoistureRecord, QualityFlag, SiteMetadata, StageReport,
    TimeSeriesRecord,
};
use crate::modules::serialization::round3;
use crate::modules::traits::{inversion_for, CountInversion};
use crate::numerics::weighting::{penetration_depth, rescaled_radius};
use std::collections::BTreeMap;

/// Valid hours a day needs before the daily aggregate is emitted.
const DAILY_MIN_VALID_HOURS: usize = 12;

#[derive(Debug)]
pub struct ThetaEngine<'a> {
    config: &'a ProcessingConfig,
    inversion: Box<dyn CountInversion>,
    n0: f64,
    bulk_density: f64,
    lattice_water: f64,
    soc_water: f64,
    /// Physical saturation ceiling; inverted values never exceed it.
    max_moisture: f64,
    /// Optional second N0 for the side-by-side comparison column.
    alternative_n0: Option<f64>,
}

impl<'a> ThetaEngine<'a> {
    pub fn new(
        config: &'a ProcessingConfig,
        site: &SiteMetadata,
        alternative_n0: Option<f64>,
    ) -> CrnsResult<Self> {
        let soil = site.soil_constants()?;
        let n0 = site.calibrated_n0()?;
        if let Some(alt) = alternative_n0 {
            if alt <= 0.0 {
                return Err(CrnsError::input_validation(
                    "THETA.ALT_N0",
                    format!("alternative N0 must be positive, got {alt}"),
                ));
            }
        }
        let max_moisture = site
            .max_moisture
            .unwrap_or_else(|| config.max_moisture(soil.bulk_density));
        Ok(Self {
            config,
            inversion: inversion_for(config),
            n0,
            bulk_density: soil.bulk_density,
            lattice_water: soil.lattice_water,
            soc_water: soil.soil_organic_carbon * SOC_WATER_EQUIVALENT,
            max_moisture,
            alternative_n0,
        })
    }

    /// Fills the moisture, error-band, sensing-depth and rolling columns.
    pub fn apply(&self, rows: &mut [TimeSeriesRecord]) -> CrnsResult<StageReport> {
        if rows.is_empty() {
            return Err(CrnsError::input_validation(
                "INPUT.SERIES_EMPTY",
                "theta stage received an empty series",
            ));
        }
        let mut report = StageReport::default();
        for row in rows.iter_mut() {
            match self.invert_row(row) {
                Ok(()) => report.record_processed(),
                Err(reason) => {
                    row.soil_moisture = None;
                    row.moisture_plus_error = None;
                    row.moisture_minus_error = None;
                    row.sensing_depth = None;
                    row.soil_moisture_alt_n0 = None;
                    report.record_skip(row.timestamp, reason);
                }
            }
        }
        // Rolling means run over the exact values; three-place rounding is
        // a final presentation pass that never escapes the physical bounds.
        self.fill_rolling(rows);
        for row in rows.iter_mut() {
            row.soil_moisture = row.soil_moisture.map(|theta| self.round_moisture(theta));
            row.moisture_plus_error = row
                .moisture_plus_error
                .map(|theta| self.round_moisture(theta));
            row.moisture_minus_error = row
                .moisture_minus_error
                .map(|theta| self.round_moisture(theta));
            row.soil_moisture_alt_n0 = row
                .soil_moisture_alt_n0
                .map(|theta| self.round_moisture(theta));
            row.sensing_depth = row.sensing_depth.map(round3);
        }
        Ok(report)
    }

    fn invert_row(&self, row: &mut TimeSeriesRecord) -> Result<(), String> {
        if row.flag != QualityFlag::Valid {
            return Err(format!("row flagged as {:?}", row.flag));
        }
        let count = row.corrected_count.ok_or("missing corrected count")?;

        let moisture = self.clamped_moisture(count, self.n0);
        row.soil_moisture = Some(moisture);

        // The inversion is decreasing in the count, so the low count bounds
        // the moisture from above.
        if let Some(error) = row.count_error {
            row.moisture_plus_error = Some(self.clamped_moisture(count - error, self.n0));
            row.moisture_minus_error = Some(self.clamped_moisture(count + error, self.n0));
        } else {
            row.moisture_plus_error = None;
            row.moisture_minus_error = None;
        }

        row.sensing_depth = row
            .pressure
            .map(|pressure| self.sensing_depth(pressure, moisture));

        row.soil_moisture_alt_n0 = self
            .alternative_n0
            .map(|alt| self.clamped_moisture(count, alt));
        Ok(())
    }

    /// Three-place rounding, re-clamped so it cannot nudge a saturated
    /// value past the ceiling.
    fn round_moisture(&self, moisture: f64) -> f64 {
        round3(moisture).clamp(0.0, self.max_moisture)
    }

    fn clamped_moisture(&self, count: f64, n0: f64) -> f64 {
        let moisture = self.inversion.moisture(
            self.bulk_density,
            count,
            n0,
            self.lattice_water,
            self.soc_water,
        );
        moisture.clamp(0.0, self.max_moisture)
    }

    /// D86 sensing depth (cm) averaged over the three footprint radii.
    fn sensing_depth(&self, pressure: f64, moisture: f64) -> f64 {
        let total: f64 = SENSING_DEPTH_RADII
            .iter()
            .map(|&radius| {
                let rescaled = rescaled_radius(radius, pressure, 0.0, moisture);
                penetration_depth(rescaled, self.bulk_density, moisture)
            })
            .sum();
        total / SENSING_DEPTH_RADII.len() as f64
    }

    fn fill_rolling(&self, rows: &mut [TimeSeriesRecord]) {
        let moisture: Vec<Option<f64>> = rows.iter().map(|row| row.soil_moisture).collect();
        let depth: Vec<Option<f64>> = rows.iter().map(|row| row.sensing_depth).collect();
        let window = self.config.rolling_window;
        let min_valid = self.config.rolling_min_valid;
        let rolling_moisture = rolling_mean(&moisture, window, min_valid);
        let rolling_depth = rolling_mean(&depth, window, min_valid);
        for (row, (theta, depth)) in rows
            .iter_mut()
            .zip(rolling_moisture.into_iter().zip(rolling_depth))
        {
            row.moisture_rolling = theta.map(|theta| self.round_moisture(theta));
            row.sensing_depth_rolling = depth.map(round3);
        }
    }

    /// Daily-resolution inversion from summed counts, not averaged hourly
    /// moistures. Days with fewer valid hours than the threshold are
    /// omitted; partial days are scaled to a full 24 h equivalent.
    pub fn aggregate_daily(&self, rows: &[TimeSeriesRecord]) -> Vec<DailyMoistureRecord> {
        let mut by_date: BTreeMap<chrono::NaiveDate, Vec<f64>> = BTreeMap::new();
        for row in rows {
            if row.flag != QualityFlag::Valid {
                continue;
            }
            if let Some(count) = row.corrected_count {
                by_date.entry(row.date()).or_default().push(count);
            }
        }

        let daily_n0 = self.n0 * 24.0;
        let mut records = Vec::new();
        for (date, counts) in by_date {
            let valid_hours = counts.len();
            if valid_hours < DAILY_MIN_VALID_HOURS {
                continue;
            }
            let daily_count = counts.iter().sum::<f64>() / valid_hours as f64 * 24.0;
            let count_error = daily_count.sqrt();
            let moisture = self.clamped_moisture(daily_count, daily_n0);
            records.push(DailyMoistureRecord {
                date,
                corrected_count: daily_count.floor(),
                count_error: count_error.floor(),
                soil_moisture: self.round_moisture(moisture),
                moisture_plus_error: self
                    .round_moisture(self.clamped_moisture(daily_count - count_error, daily_n0)),
                moisture_minus_error: self
                    .round_moisture(self.clamped_moisture(daily_count + count_error, daily_n0)),
                valid_hours,
            });
        }
        records
    }
}

/// Trailing-window mean over an optional series. A window emits a value
/// only when it holds at least `min_valid` defined entries; early indices
/// use the shorter prefix window.
pub fn rolling_mean(values: &[Option<f64>], window: usize, min_valid: usize) -> Vec<Option<f64>> {
    let window = window.max(1);
    values
        .iter()
        .enumerate()
        .map(|(index, _)| {
            let start = (index + 1).saturating_sub(window);
            let defined: Vec<f64> = values[start..=index].iter().flatten().copied().collect();
            if defined.len() >= min_valid {
                Some(defined.iter().sum::<f64>() / defined.len() as f64)
            } else {
                None
            }
        })
        .collect()
}

pub mod errors;

pub use errors::{CrnsError, CrnsErrorCategory, CrnsResult, StageResult};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Per-site record created once at setup and enriched by the metadata
/// collaborator; the calibration engine writes `n0` back into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteMetadata {
    pub country: String,
    pub site_number: String,
    #[serde(default)]
    pub site_name: Option<String>,
    pub latitude: f64,
    pub elevation: f64,
    pub cutoff_rigidity: f64,
    #[serde(default)]
    pub bulk_density: Option<f64>,
    /// ISRIC-derived fallback used when no field bulk density is available.
    #[serde(default)]
    pub bulk_density_fallback: Option<f64>,
    #[serde(default)]
    pub lattice_water: Option<f64>,
    #[serde(default)]
    pub soil_organic_carbon: Option<f64>,
    #[serde(default)]
    pub max_moisture: Option<f64>,
    #[serde(default)]
    pub reference_pressure: Option<f64>,
    #[serde(default)]
    pub beta_coefficient: Option<f64>,
    /// Above-ground biomass in kg/m^2; absent means no biomass correction.
    #[serde(default)]
    pub biomass: Option<f64>,
    #[serde(default)]
    pub n0: Option<f64>,
}

impl SiteMetadata {
    pub fn site_label(&self) -> String {
        format!("{}_SITE_{}", self.country, self.site_number)
    }

    /// Field bulk density when measured, ISRIC estimate otherwise.
    pub fn effective_bulk_density(&self) -> Option<f64> {
        self.bulk_density.or(self.bulk_density_fallback)
    }

    pub fn soil_constants(&self) -> CrnsResult<SoilConstants> {
        let bulk_density = self.effective_bulk_density().ok_or_else(|| {
            CrnsError::input_validation(
                "INPUT.BULK_DENSITY",
                format!("site {} has no bulk density", self.site_label()),
            )
        })?;
        let lattice_water = self.lattice_water.ok_or_else(|| {
            CrnsError::input_validation(
                "INPUT.LATTICE_WATER",
                format!("site {} has no lattice water fraction", self.site_label()),
            )
        })?;
        let soil_organic_carbon = self.soil_organic_carbon.ok_or_else(|| {
            CrnsError::input_validation(
                "INPUT.SOIL_ORGANIC_CARBON",
                format!("site {} has no soil organic carbon", self.site_label()),
            )
        })?;
        if bulk_density <= 0.0 || lattice_water < 0.0 || soil_organic_carbon < 0.0 {
            return Err(CrnsError::input_validation(
                "INPUT.SOIL_CONSTANTS",
                format!(
                    "site {} soil constants out of range: bd={}, lw={}, soc={}",
                    self.site_label(),
                    bulk_density,
                    lattice_water,
                    soil_organic_carbon
                ),
            ));
        }
        Ok(SoilConstants {
            bulk_density,
            lattice_water,
            soil_organic_carbon,
        })
    }

    pub fn calibrated_n0(&self) -> CrnsResult<f64> {
        match self.n0 {
            Some(n0) if n0 > 0.0 => Ok(n0),
            Some(n0) => Err(CrnsError::input_validation(
                "THETA.N0_UNSET",
                format!("site {} has non-positive N0 {}", self.site_label(), n0),
            )),
            None => Err(CrnsError::input_validation(
                "THETA.N0_UNSET",
                format!("site {} has no calibrated N0", self.site_label()),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoilConstants {
    pub bulk_density: f64,
    pub lattice_water: f64,
    pub soil_organic_carbon: f64,
}

/// COSMOS-USA compatible quality flag values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QualityFlag {
    #[default]
    Valid,
    StepChange,
    BelowMinimumRate,
    AboveReference,
    LowBattery,
}

impl From<QualityFlag> for u8 {
    fn from(flag: QualityFlag) -> Self {
        match flag {
            QualityFlag::Valid => 0,
            QualityFlag::StepChange => 1,
            QualityFlag::BelowMinimumRate => 2,
            QualityFlag::AboveReference => 3,
            QualityFlag::LowBattery => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown quality flag value {0}")]
pub struct UnknownQualityFlag(u8);

impl TryFrom<u8> for QualityFlag {
    type Error = UnknownQualityFlag;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Valid),
            1 => Ok(Self::StepChange),
            2 => Ok(Self::BelowMinimumRate),
            3 => Ok(Self::AboveReference),
            4 => Ok(Self::LowBattery),
            other => Err(UnknownQualityFlag(other)),
        }
    }
}

/// One hourly row of the site series. Ingestion creates one row per hour
/// with raw inputs; each stage fills in its own columns. Missing values are
/// `None` internally and the external sentinel only at the serde boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRecord {
    pub timestamp: NaiveDateTime,
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub raw_count: Option<f64>,
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub pressure: Option<f64>,
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub temperature: Option<f64>,
    /// External relative humidity in percent.
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub relative_humidity: Option<f64>,
    /// Vapour pressure in Pascals.
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub vapour_pressure: Option<f64>,
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub dewpoint: Option<f64>,
    /// Neutron-monitor reference station count for the same hour.
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub reference_count: Option<f64>,
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub battery: Option<f64>,
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub pressure_factor: Option<f64>,
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub humidity_factor: Option<f64>,
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub intensity_factor: Option<f64>,
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub biomass_factor: Option<f64>,
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub corrected_count: Option<f64>,
    /// Corrected count without the static biomass factor; the calibration
    /// engine consumes this column so the biomass effect stays inside N0.
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub calibration_corrected: Option<f64>,
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub count_error: Option<f64>,
    #[serde(default)]
    pub flag: QualityFlag,
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub soil_moisture: Option<f64>,
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub moisture_plus_error: Option<f64>,
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub moisture_minus_error: Option<f64>,
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub moisture_rolling: Option<f64>,
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub sensing_depth: Option<f64>,
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub sensing_depth_rolling: Option<f64>,
    /// Comparison series computed from an externally supplied second N0.
    #[serde(with = "crate::modules::serialization::sentinel", default)]
    pub soil_moisture_alt_n0: Option<f64>,
}

impl TimeSeriesRecord {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            raw_count: None,
            pressure: None,
            temperature: None,
            relative_humidity: None,
            vapour_pressure: None,
            dewpoint: None,
            reference_count: None,
            battery: None,
            pressure_factor: None,
            humidity_factor: None,
            intensity_factor: None,
            biomass_factor: None,
            corrected_count: None,
            calibration_corrected: None,
            count_error: None,
            flag: QualityFlag::Valid,
            soil_moisture: None,
            moisture_plus_error: None,
            moisture_minus_error: None,
            moisture_rolling: None,
            sensing_depth: None,
            sensing_depth_rolling: None,
            soil_moisture_alt_n0: None,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// One physical soil sample from a calibration campaign. The depth range is
/// kept as sampled and collapsed to its midpoint when weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub date: NaiveDate,
    pub profile_id: String,
    /// Radial distance from the sensor in metres.
    pub radial_distance: f64,
    /// Sample depth range in centimetres.
    pub depth_top: f64,
    pub depth_bottom: f64,
    /// Volumetric water content as a decimal fraction.
    pub volumetric_moisture: f64,
}

impl CalibrationSample {
    pub fn depth_midpoint(&self) -> f64 {
        self.depth_top + (self.depth_bottom - self.depth_top) / 2.0
    }

    pub fn validate(&self) -> CrnsResult<()> {
        if self.radial_distance < 0.0 || self.depth_top < 0.0 || self.depth_bottom < self.depth_top
        {
            return Err(CrnsError::input_validation(
                "INPUT.SAMPLE_GEOMETRY",
                format!(
                    "sample in profile '{}' on {} has invalid geometry: radius={}, depth={}..{}",
                    self.profile_id,
                    self.date,
                    self.radial_distance,
                    self.depth_top,
                    self.depth_bottom
                ),
            ));
        }
        if self.volumetric_moisture < 0.0 {
            return Err(CrnsError::input_validation(
                "INPUT.SAMPLE_MOISTURE",
                format!(
                    "sample in profile '{}' on {} has negative moisture {}",
                    self.profile_id, self.date, self.volumetric_moisture
                ),
            ));
        }
        Ok(())
    }
}

/// Samples for one calibration campaign day, produced by an explicit
/// grouping step and iterated directly.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationDay {
    pub date: NaiveDate,
    pub samples: Vec<CalibrationSample>,
}

/// Audit row for one vertical profile after depth weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileWeighting {
    pub profile_id: String,
    pub radius: f64,
    pub rescaled_radius: f64,
    pub weighted_moisture: f64,
    pub radial_weight: f64,
}

/// Converged weighting result for one calibration day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayWeighting {
    pub date: NaiveDate,
    pub field_moisture: f64,
    pub iterations: usize,
    pub absolute_humidity: f64,
    pub mean_temperature: f64,
    pub mean_pressure: f64,
    /// Mean corrected count in the calibration window, used by the N0 scan.
    pub mean_count: Option<f64>,
    pub profiles: Vec<ProfileWeighting>,
    pub moisture_rescaled_from_percent: bool,
}

/// Per-day calibration result: either a converged weighting or a recorded
/// skip reason. Skips never abort the other days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DayOutcome {
    Calibrated(DayWeighting),
    Skipped { date: NaiveDate, reason: String },
}

impl DayOutcome {
    pub fn weighting(&self) -> Option<&DayWeighting> {
        match self {
            Self::Calibrated(weighting) => Some(weighting),
            Self::Skipped { .. } => None,
        }
    }
}

/// Result of the full N0 calibration for one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationOutcome {
    pub n0: f64,
    pub summed_relative_error: f64,
    pub search_start: u32,
    pub search_end: u32,
    pub days: Vec<DayOutcome>,
}

/// Row-level accounting for the per-timestamp stages; skipped rows are
/// counted and named instead of silently dropped.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StageReport {
    pub processed: usize,
    pub skipped: Vec<RowSkip>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSkip {
    pub timestamp: NaiveDateTime,
    pub reason: String,
}

impl StageReport {
    pub fn record_processed(&mut self) {
        self.processed += 1;
    }

    pub fn record_skip(&mut self, timestamp: NaiveDateTime, reason: impl Into<String>) {
        self.skipped.push(RowSkip {
            timestamp,
            reason: reason.into(),
        });
    }
}

/// Daily-resolution inversion output; a distinct resolution computed from
/// daily count sums, not an average of the hourly moisture series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMoistureRecord {
    pub date: NaiveDate,
    pub corrected_count: f64,
    pub count_error: f64,
    pub soil_moisture: f64,
    pub moisture_plus_error: f64,
    pub moisture_minus_error: f64,
    pub valid_hours: usize,
}

#[cfg(test)]
mod tests {
    use super::{CalibrationSample, QualityFlag, SiteMetadata, TimeSeriesRecord};
    use chrono::{NaiveDate, NaiveDateTime};

    fn sample_site() -> SiteMetadata {
        SiteMetadata {
            country: "USA".to_string(),
            site_number: "011".to_string(),
            site_name: Some("Test Ranch".to_string()),
            latitude: 34.25,
            elevation: 1200.0,
            cutoff_rigidity: 4.49,
            bulk_density: Some(1.4),
            bulk_density_fallback: Some(1.43),
            lattice_water: Some(0.02),
            soil_organic_carbon: Some(0.01),
            max_moisture: None,
            reference_pressure: Some(880.0),
            beta_coefficient: Some(0.0074),
            biomass: Some(2.5),
            n0: Some(2000.0),
        }
    }

    fn timestamp(text: &str) -> NaiveDateTime {
        text.parse().expect("timestamp should parse")
    }

    #[test]
    fn soil_constants_prefer_measured_bulk_density() {
        let site = sample_site();
        let constants = site.soil_constants().expect("constants should resolve");
        assert_eq!(constants.bulk_density, 1.4);

        let mut fallback_site = site.clone();
        fallback_site.bulk_density = None;
        let constants = fallback_site
            .soil_constants()
            .expect("fallback should resolve");
        assert_eq!(constants.bulk_density, 1.43);
    }

    #[test]
    fn soil_constants_require_all_fields() {
        let mut site = sample_site();
        site.lattice_water = None;
        let error = site.soil_constants().expect_err("missing lw should fail");
        assert_eq!(error.placeholder(), "INPUT.LATTICE_WATER");
    }

    #[test]
    fn calibrated_n0_rejects_unset_and_non_positive() {
        let mut site = sample_site();
        site.n0 = None;
        assert_eq!(
            site.calibrated_n0().expect_err("unset should fail").placeholder(),
            "THETA.N0_UNSET"
        );
        site.n0 = Some(0.0);
        assert_eq!(
            site.calibrated_n0().expect_err("zero should fail").placeholder(),
            "THETA.N0_UNSET"
        );
    }

    #[test]
    fn depth_midpoint_collapses_range() {
        let sample = CalibrationSample {
            date: NaiveDate::from_ymd_opt(2016, 5, 1).expect("date should build"),
            profile_id: "N25".to_string(),
            radial_distance: 25.0,
            depth_top: 10.0,
            depth_bottom: 15.0,
            volumetric_moisture: 0.25,
        };
        assert_eq!(sample.depth_midpoint(), 12.5);
        sample.validate().expect("sample should be valid");
    }

    #[test]
    fn sample_validation_rejects_bad_geometry() {
        let sample = CalibrationSample {
            date: NaiveDate::from_ymd_opt(2016, 5, 1).expect("date should build"),
            profile_id: "N25".to_string(),
            radial_distance: -1.0,
            depth_top: 10.0,
            depth_bottom: 15.0,
            volumetric_moisture: 0.25,
        };
        let error = sample.validate().expect_err("negative radius should fail");
        assert_eq!(error.placeholder(), "INPUT.SAMPLE_GEOMETRY");
    }

    #[test]
    fn quality_flag_round_trips_through_integers() {
        for value in 0u8..=4 {
            let flag = QualityFlag::try_from(value).expect("flag should parse");
            assert_eq!(u8::from(flag), value);
        }
        assert!(QualityFlag::try_from(9).is_err());
    }

    #[test]
    fn new_record_starts_with_no_computed_values() {
        let record = TimeSeriesRecord::new(timestamp("2016-05-01T12:00:00"));
        assert!(record.corrected_count.is_none());
        assert!(record.soil_moisture.is_none());
        assert_eq!(record.flag, QualityFlag::Valid);
        assert_eq!(
            record.date(),
            NaiveDate::from_ymd_opt(2016, 5, 1).expect("date should build")
        );
    }
}

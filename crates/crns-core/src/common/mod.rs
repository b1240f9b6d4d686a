pub mod config;
pub mod constants;

pub use config::{CalibrationWindow, IntensityMethod, InversionMethod, ProcessingConfig};

pub mod calibration;
pub mod correction;
pub mod qa;
pub mod serialization;
pub mod theta;

mod traits;

pub use calibration::CalibrationEngine;
pub use correction::CorrectionPipeline;
pub use qa::QualityControl;
pub use theta::ThetaEngine;
pub use traits::{inversion_for, CountInversion, DesiletsInversion, KohliInversion};

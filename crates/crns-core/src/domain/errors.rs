use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CrnsResult<T> = Result<T, CrnsError>;
pub type StageResult<T> = CrnsResult<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrnsErrorCategory {
    Success,
    InputValidationError,
    IoSystemError,
    ComputationError,
    InternalError,
}

impl CrnsErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::InputValidationError => 2,
            Self::IoSystemError => 3,
            Self::ComputationError => 4,
            Self::InternalError => 5,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::InputValidationError => "InputValidationError",
            Self::IoSystemError => "IoSystemError",
            Self::ComputationError => "ComputationError",
            Self::InternalError => "InternalError",
        }
    }

    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Success)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrnsError {
    category: CrnsErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl CrnsError {
    pub fn new(
        category: CrnsErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(CrnsErrorCategory::InputValidationError, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(CrnsErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn computation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(CrnsErrorCategory::ComputationError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(CrnsErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> CrnsErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        let severity = if self.category.is_fatal() {
            "ERROR"
        } else {
            "INFO"
        };
        format!("{}: [{}] {}", severity, self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> Option<String> {
        self.category
            .is_fatal()
            .then(|| format!("FATAL EXIT CODE: {}", self.exit_code()))
    }
}

impl Display for CrnsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.label(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for CrnsError {}

#[cfg(test)]
mod tests {
    use super::{CrnsError, CrnsErrorCategory};

    #[test]
    fn exit_mapping_is_stable() {
        let cases = [
            (CrnsErrorCategory::Success, 0, "Success"),
            (CrnsErrorCategory::InputValidationError, 2, "InputValidationError"),
            (CrnsErrorCategory::IoSystemError, 3, "IoSystemError"),
            (CrnsErrorCategory::ComputationError, 4, "ComputationError"),
            (CrnsErrorCategory::InternalError, 5, "InternalError"),
        ];

        for (category, exit_code, label) in cases {
            assert_eq!(category.exit_code(), exit_code);
            assert_eq!(category.label(), label);
        }
    }

    #[test]
    fn fatal_error_renders_diagnostic_lines() {
        let error = CrnsError::input_validation(
            "INPUT.MOISTURE_UNITS",
            "sample moisture 32.5 exceeds 1.0; expected a decimal fraction",
        );

        assert_eq!(error.exit_code(), 2);
        assert_eq!(
            error.diagnostic_line(),
            "ERROR: [INPUT.MOISTURE_UNITS] sample moisture 32.5 exceeds 1.0; expected a decimal fraction"
        );
        assert_eq!(
            error.fatal_exit_line().as_deref(),
            Some("FATAL EXIT CODE: 2")
        );
    }
}

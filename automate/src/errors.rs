use crate::action::RecordId;
use thiserror::Error;

/// Errors raised while building, editing or loading a workflow document.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Unknown action kind: {0}")]
    UnknownActionKind(String),

    #[error("Action '{kind}' has no field named '{field}'")]
    UnknownField { kind: String, field: String },

    #[error("Record not found in workflow: {0}")]
    RecordNotFound(RecordId),

    #[error("Malformed project data: {0}")]
    Format(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for WorkflowError {
    fn from(err: serde_json::Error) -> Self {
        WorkflowError::Format(err.to_string())
    }
}

impl From<serde_yaml::Error> for WorkflowError {
    fn from(err: serde_yaml::Error) -> Self {
        WorkflowError::Format(err.to_string())
    }
}

/// Errors raised by an automation driver.
#[derive(Error, Debug)]
pub enum AutomationError {
    /// The operator slammed the pointer into a screen corner.
    #[error("Fail-safe triggered from mouse moving to a corner of the screen")]
    FailSafe,

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<image::ImageError> for AutomationError {
    fn from(err: image::ImageError) -> Self {
        AutomationError::ImageError(err.to_string())
    }
}

/// Errors raised when a workflow is lowered or executed.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Step {step} ({kind}): field '{field}' = '{value}' is not a valid {expected}")]
    InvalidLiteral {
        step: usize,
        kind: String,
        field: String,
        value: String,
        expected: &'static str,
    },

    #[error(transparent)]
    Driver(#[from] AutomationError),
}

impl ExecutionError {
    pub fn is_fail_safe(&self) -> bool {
        matches!(self, ExecutionError::Driver(AutomationError::FailSafe))
    }
}

/// Errors raised while reading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid duration '{0}'")]
    InvalidDuration(String),

    #[error("Unknown time unit '{unit}' in '{input}'")]
    UnknownUnit { input: String, unit: String },

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

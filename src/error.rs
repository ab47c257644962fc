use thiserror::Error;

pub type SduiResult<T> = Result<T, SduiError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SduiError {
    #[error("JSON error: {0}")]
    Json(String),

    #[error("YAML error: {0}")]
    Yaml(String),

    #[error("Invalid specification version '{version}': expected MAJOR[.MINOR[.PATCH]]")]
    InvalidVersion { version: String },

    #[error("Unsupported specification version '{version}': this resolver understands major version {supported}")]
    UnsupportedVersion { version: String, supported: u64 },

    #[error("Malformed component at {path}: {reason}")]
    MalformedSpec { path: String, reason: String },

    #[error("Unknown component type '{component}'")]
    UnknownComponentType { component: String },

    #[error("Invalid binding '{expr}': {reason}")]
    InvalidBinding { expr: String, reason: String },

    #[error("Invalid condition '{expr}': {reason}")]
    InvalidCondition { expr: String, reason: String },

    #[error("Invalid property '{property}' for component '{component}': {reason}")]
    InvalidProperty {
        component: String,
        property: String,
        reason: String,
    },

    #[error("Maximum nesting depth ({max_depth}) exceeded")]
    MaxNestingDepthExceeded { max_depth: usize },

    #[error("Duplicate id '{id}': component ids must be unique within the document")]
    DuplicateId { id: String },

    #[error("Invalid action reference '{property}': {reason}")]
    InvalidAction { property: String, reason: String },

    #[error("Invalid tag '{tag}': tags must be non-empty, lowercase, and contain no spaces")]
    InvalidTag { tag: String },

    #[error("No element with role '{role}' and name '{name}'")]
    InteractionTarget { role: String, name: String },

    #[error("Render paths diverged at step {step}: {detail}")]
    ParityMismatch { step: usize, detail: String },

    #[error("Assertion failed at step {step}: {message}")]
    AssertionFailed { step: usize, message: String },

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for SduiError {
    fn from(err: serde_json::Error) -> Self {
        SduiError::Json(err.to_string())
    }
}

impl From<serde_yaml::Error> for SduiError {
    fn from(err: serde_yaml::Error) -> Self {
        SduiError::Yaml(err.to_string())
    }
}

impl From<std::io::Error> for SduiError {
    fn from(err: std::io::Error) -> Self {
        SduiError::Io(err.to_string())
    }
}

/// Error types for settings editing and import
use thiserror::Error;

/// Why an imported settings file was rejected
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to import settings: Invalid JSON")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid settings file format")]
    NotAnObject,

    #[error("Invalid settings file format")]
    MissingProjects,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("project not found: {0}")]
    ProjectNotFound(usize),

    #[error("environment not found: {project}-{environment}")]
    EnvironmentNotFound { project: usize, environment: usize },

    #[error("cannot remove the only project")]
    LastProject,

    #[error("Please fill in all fields")]
    IncompleteEnvironment,
}

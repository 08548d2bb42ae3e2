use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitError {
    #[error("dependency cycle among modules: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),

    #[error("module '{module}' depends on unknown module '{dependency}'")]
    MissingDependency { module: String, dependency: String },

    #[error("module '{0}' is registered twice")]
    DuplicateModule(String),

    #[error("critical module '{module}' failed to initialize: {reason}")]
    ModuleInitFailed { module: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("critical module '{module}' failed to start: {reason}")]
    CriticalModuleFailed { module: String, reason: String },
}

/// Why an intent was not carried out
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Health gate closed; carries the reason, e.g. "battery"
    #[error("blocked: {0}")]
    Blocked(String),

    #[error("unknown location '{0}'")]
    UnknownLocation(String),

    #[error("invalid goal: {0}")]
    InvalidGoal(String),

    #[error("module '{0}' is not available")]
    ModuleUnavailable(String),

    #[error("perception failed: {0}")]
    Perception(String),
}

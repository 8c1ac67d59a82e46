use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Source Error: {0}")]
    Source(#[from] OpenError),
    #[error("Binding Error: {0}")]
    Binding(#[from] BindingError),
    #[error("Config Error: {0}")]
    Config(#[from] ConfigError),
    #[error("Dispatch Error: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("Pipeline Error: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("Settings Error: {0}")]
    Settings(#[from] config::ConfigError),
    #[error("Ui Error: {0}")]
    Ui(String),
}

// A video device could not be acquired. Carries the probed index so the UI
// can point at the failing camera selector entry.
#[derive(Error, Debug)]
#[error("Failed to open video source {index}: {reason}")]
pub struct OpenError {
    pub index: u32,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum BindingError {
    #[error("Malformed binding payload: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Failed to read or write the bindings file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cooldown must be a positive number of seconds, got {0}")]
    InvalidCooldown(f64),
    #[error("Unknown camera index {0}")]
    UnknownCamera(u32),
}

#[derive(Error, Debug)]
#[error("Failed to launch action '{action}': {reason}")]
pub struct DispatchError {
    pub action: String,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("The pipeline is already running.")]
    AlreadyStarted,
    #[error("The pipeline is not running.")]
    NotRunning,
}

// Collaborator boundary: whatever the landmark or classification model
// reports is carried opaquely, logged once per frame, never fatal.
#[derive(Error, Debug)]
#[error("Perception failed: {0}")]
pub struct PerceptionError(pub String);

use thiserror::Error;
use vetcare_config::ConfigError;
use vetcare_core::CoreError;

/// Error type surfaced by [`crate::ClinicApp`].
#[derive(Debug, Error)]
pub enum VetcareError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type VetcareResult<T> = Result<T, VetcareError>;

impl VetcareError {
    /// Message safe to show to clinic staff. Persistence failures collapse
    /// to a generic text; details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            VetcareError::Core(err) if err.is_persistence() => {
                "The clinic records could not be read or saved. Please try again.".into()
            }
            VetcareError::Core(CoreError::NotFound { entity, .. }) => {
                format!("The requested {} does not exist.", entity)
            }
            VetcareError::Core(CoreError::Conflict(message)) => {
                format!("{}. Reload and try again.", capitalize(message))
            }
            VetcareError::Core(CoreError::Unauthorized(_)) => {
                "You are not allowed to perform this action.".into()
            }
            VetcareError::Core(err) => err.to_string(),
            VetcareError::Config(_) => "The configuration file could not be used.".into(),
            VetcareError::Io(_) => {
                "The clinic records could not be read or saved. Please try again.".into()
            }
        }
    }

    pub fn is_persistence(&self) -> bool {
        match self {
            VetcareError::Core(err) => err.is_persistence(),
            VetcareError::Config(_) | VetcareError::Io(_) => true,
        }
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Failures of the maintenance binary.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Unknown command `{0}`")]
    UnknownCommand(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error(transparent)]
    App(#[from] VetcareError),
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        CliError::App(err.into())
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::App(err.into())
    }
}

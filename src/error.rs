use thiserror::Error;

/// Failures an application record operation can report.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// A required field was empty or a date was malformed. Caught before the
    /// store is called.
    #[error("'{field}' is missing or malformed")]
    Validation { field: &'static str },

    #[error("Application #{0} not found")]
    NotFound(i64),

    #[error("Storage error: {0}")]
    Transport(String),
}

impl From<rusqlite::Error> for TrackerError {
    fn from(e: rusqlite::Error) -> Self {
        TrackerError::Transport(e.to_string())
    }
}

impl TrackerError {
    /// Message shown to the user when an operation fails.
    pub fn user_message(&self) -> String {
        match self {
            TrackerError::Validation { field } => format!("Please fill in the {} field (dates as YYYY-MM-DD).", field),
            TrackerError::NotFound(id) => format!("Application #{} no longer exists.", id),
            TrackerError::Transport(_) => "Could not reach the application store. Nothing was changed.".to_string(),
        }
    }
}

use thiserror::Error;

/// Failures surfaced to the user in the error banner.
///
/// None of these are fatal: the triggering action ends, its busy state is
/// cleared and every control stays usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabError {
    /// Missing image or prompt, caught before any service call.
    #[error("{0}")]
    InputValidation(String),

    /// The uploaded file could not be read or encoded.
    #[error("{0}")]
    Encoding(String),

    /// Any failure from the generative service, including empty responses.
    #[error("{message}")]
    Service { message: String },

    #[error("Settings error: {0}")]
    Settings(String),
}

impl LabError {
    pub fn service(message: impl Into<String>) -> Self {
        Self::Service {
            message: message.into(),
        }
    }
}

pub type LabResult<T> = std::result::Result<T, LabError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_shown_verbatim() {
        let error = LabError::InputValidation("Please enter a prompt.".to_string());
        assert_eq!(error.to_string(), "Please enter a prompt.");

        let error = LabError::service("Failed to edit image. HTTP 500");
        assert_eq!(error.to_string(), "Failed to edit image. HTTP 500");
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("{0}")]
    Validation(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AdminError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AdminError::Validation(msg.into())
    }

    /// Message suitable for an operator-facing notification.
    pub fn user_message(&self) -> String {
        match self {
            AdminError::Validation(msg) => msg.clone(),
            AdminError::Api { message, .. } if !message.is_empty() => message.clone(),
            AdminError::Api { status, .. } => format!("Request failed with status {status}"),
            AdminError::Request(_) => "Could not reach the server. Please try again.".into(),
            other => other.to_string(),
        }
    }
}

pub type Result<T, E = AdminError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_prefers_server_message() {
        let err = AdminError::Api { status: 400, message: "Email already exists".into() };
        assert_eq!(err.user_message(), "Email already exists");

        let err = AdminError::Api { status: 502, message: String::new() };
        assert_eq!(err.user_message(), "Request failed with status 502");
    }

    #[test]
    fn validation_message_is_shown_verbatim() {
        let err = AdminError::validation("Name is required");
        assert_eq!(err.user_message(), "Name is required");
        assert_eq!(err.to_string(), "Name is required");
    }
}

use serde_json::Value;

/// Errors returned by the Etherscan client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The client could not be configured, e.g. an unknown network name.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A cache store failed while it was being cleared.
    #[error("Cache error: {0}")]
    Cache(String),

    /// An argument was rejected before any request was sent.
    #[error("Invalid argument: {0}")]
    Validation(String),

    /// The API answered with `status == "0"`.
    #[error("Etherscan API error: {message}")]
    Api {
        /// The `message` field of the envelope
        message: String,
        /// The `result` field of the envelope, usually an explanation string
        result: Value,
    },

    /// The proxy endpoint returned a JSON-RPC error object.
    #[error("JSON-RPC error {code}: {message}")]
    Rpc {
        /// The JSON-RPC error code
        code: i64,
        /// The JSON-RPC error message
        message: String,
    },

    /// A string could not be converted to the expected type.
    #[error("Failed to parse '{value}' as {expected}")]
    Parse {
        /// The offending input
        value: String,
        /// Name of the expected type
        expected: &'static str,
    },

    /// A required key was absent from a response.
    #[error("Missing or malformed field '{0}' in response")]
    MissingField(String),

    /// The request could not be sent or the server returned a non-success
    /// HTTP status.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// The response body is not valid JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn parse(value: &str, expected: &'static str) -> Self {
        Self::Parse {
            value: value.to_string(),
            expected,
        }
    }

    /// Whether this is the envelope Etherscan uses for an empty list result.
    pub fn is_empty_result(&self) -> bool {
        match self {
            Self::Api { message, result } => {
                message.starts_with("No transactions found")
                    && result.as_array().is_some_and(Vec::is_empty)
            }
            _ => false,
        }
    }
}

/// Result type of the Etherscan client.
pub type Result<T> = std::result::Result<T, Error>;

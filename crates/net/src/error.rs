//! Network error types

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Auth response did not contain a usable token")]
    MissingToken,

    #[error("Checkout response did not contain a redirect URL")]
    MissingCheckoutUrl,

    #[error("Invalid API base URL: {0}")]
    BaseUrl(String),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

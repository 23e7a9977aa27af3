//! Error types for the engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] patron_core::Error),

    #[error("Backend error: {0}")]
    Api(#[from] patron_net::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] patron_core::ConfigError),

    #[error("No signed-in session")]
    NotSignedIn,

    #[error("Login requires a non-empty bearer token")]
    EmptyToken,

    #[error("Backend did not return a usable profile")]
    MissingProfile,
}

pub type Result<T> = std::result::Result<T, Error>;

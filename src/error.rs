//! Error types for portal-harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IMAP error: {0}")]
    Imap(String),

    #[error("Email parsing error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    /// A non-2xx response from the portal or payment API.
    #[error("{context}: {status} - {message}")]
    Http {
        context: String,
        status: u16,
        message: String,
    },

    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered 2xx but the body lacked an expected field.
    #[error("Unexpected API response: {0}")]
    Api(String),

    #[error("Token is not set. Please authenticate first.")]
    NotAuthenticated,

    #[error("Signing error: {0}")]
    Signing(String),
}

pub type Result<T> = std::result::Result<T, Error>;

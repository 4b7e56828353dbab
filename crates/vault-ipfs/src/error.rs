//! Error types for the IPFS client

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IpfsError {
    /// No pinning-service token was configured
    #[error("WEB3_STORAGE_TOKEN not found in environment variables")]
    MissingToken,

    #[error("token contains characters not allowed in a header")]
    InvalidToken,

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a non-success status
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Nothing stored under the CID
    #[error("No files found for {0}")]
    NotFound(String),

    /// Response did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Gateway body exceeded the configured download limit
    #[error("content for {cid} exceeds {limit} bytes")]
    TooLarge { cid: String, limit: u64 },

    #[error("refusing to upload an empty payload")]
    EmptyPayload,
}

pub type Result<T> = std::result::Result<T, IpfsError>;

//! Client for pinning opaque payloads to IPFS and reading them back

pub mod client;
pub mod error;

pub use client::{
    DEFAULT_API_URL, DEFAULT_GATEWAY_TEMPLATE, DEFAULT_MAX_DOWNLOAD_BYTES, IpfsClient, IpfsConfig,
    gateway_url,
};
pub use error::{IpfsError, Result};

//! HTTP client for an IPFS pinning service

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vault_core::ContentStore;

use crate::error::{IpfsError, Result};

pub const DEFAULT_API_URL: &str = "https://api.web3.storage";
pub const DEFAULT_GATEWAY_TEMPLATE: &str = "https://{cid}.ipfs.w3s.link";
pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 100 * 1024 * 1024;
const OCTET_STREAM: &str = "application/octet-stream";

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpfsConfig {
    /// Pinning API base URL
    pub api_url: String,
    /// Gateway URL with a `{cid}` placeholder
    pub gateway_template: String,
    /// Bearer token for the pinning API
    pub token: Option<String>,
    pub timeout_secs: u64,
    /// Largest gateway response `get` will buffer
    #[serde(default = "default_max_download_bytes")]
    pub max_download_bytes: u64,
}

fn default_max_download_bytes() -> u64 {
    DEFAULT_MAX_DOWNLOAD_BYTES
}

impl Default for IpfsConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            gateway_template: DEFAULT_GATEWAY_TEMPLATE.to_string(),
            token: None,
            timeout_secs: 60,
            max_download_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    cid: String,
}

/// Gateway URL for a CID under `template`.
pub fn gateway_url(template: &str, cid: &str) -> String {
    template.replace("{cid}", cid)
}

/// Uploads and retrieves opaque payloads by content identifier.
///
/// Construction fails when no token is configured, so a misconfigured client
/// never reaches the network. The token is only sent to the pinning API;
/// gateway reads are anonymous.
pub struct IpfsClient {
    config: IpfsConfig,
    client: Client,
    auth: header::HeaderValue,
}

impl IpfsClient {
    pub fn new(config: IpfsConfig) -> Result<Self> {
        let token = config
            .token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or(IpfsError::MissingToken)?;

        let mut auth = header::HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| IpfsError::InvalidToken)?;
        auth.set_sensitive(true);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            auth,
        })
    }

    pub fn config(&self) -> &IpfsConfig {
        &self.config
    }

    pub fn gateway_url(&self, cid: &str) -> String {
        gateway_url(&self.config.gateway_template, cid)
    }

    /// Pin `data` under `name` and return its CID.
    pub async fn upload(&self, name: &str, data: &[u8], content_type: &str) -> Result<String> {
        if data.is_empty() {
            return Err(IpfsError::EmptyPayload);
        }

        let url = format!("{}/upload", self.config.api_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, self.auth.clone())
            .header(header::CONTENT_TYPE, content_type)
            .header("X-Name", urlencoding::encode(name).into_owned())
            .body(data.to_vec())
            .send()
            .await?;

        let body: UploadResponse = self.handle_response(response).await?;
        if body.cid.is_empty() {
            return Err(IpfsError::InvalidResponse("empty cid".to_string()));
        }

        info!(cid = %body.cid, name, bytes = data.len(), "uploaded to IPFS");
        Ok(body.cid)
    }

    /// Pin an already encrypted payload.
    pub async fn upload_encrypted(&self, data: &[u8], filename: &str) -> Result<String> {
        self.upload(filename, data, OCTET_STREAM).await
    }

    /// Fetch the payload stored under `cid` through the gateway.
    pub async fn get(&self, cid: &str) -> Result<Vec<u8>> {
        let url = self.gateway_url(cid);
        debug!(cid, %url, "fetching from IPFS gateway");

        let mut response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(IpfsError::NotFound(cid.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(IpfsError::Server { status, message });
        }

        let limit = self.config.max_download_bytes;
        let too_large = || IpfsError::TooLarge {
            cid: cid.to_string(),
            limit,
        };
        if response.content_length().is_some_and(|length| length > limit) {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if (body.len() + chunk.len()) as u64 > limit {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        if body.is_empty() {
            return Err(IpfsError::NotFound(cid.to_string()));
        }
        Ok(body)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(IpfsError::Server { status, message });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|err| IpfsError::InvalidResponse(err.to_string()))
    }
}

#[async_trait]
impl ContentStore for IpfsClient {
    async fn put(&self, name: &str, data: &[u8]) -> anyhow::Result<String> {
        Ok(self.upload_encrypted(data, name).await?)
    }

    async fn get(&self, cid: &str) -> anyhow::Result<Vec<u8>> {
        Ok(IpfsClient::get(self, cid).await?)
    }

    fn gateway_url(&self, cid: &str) -> String {
        IpfsClient::gateway_url(self, cid)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config_for(server: &MockServer) -> IpfsConfig {
        IpfsConfig {
            api_url: server.uri(),
            gateway_template: format!("{}/ipfs/{{cid}}", server.uri()),
            token: Some("secret-token".to_string()),
            timeout_secs: 5,
            max_download_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
        }
    }

    #[test]
    fn missing_token_fails_before_any_request() {
        assert!(matches!(
            IpfsClient::new(IpfsConfig::default()),
            Err(IpfsError::MissingToken)
        ));
        let empty = IpfsConfig {
            token: Some(String::new()),
            ..IpfsConfig::default()
        };
        assert!(matches!(IpfsClient::new(empty), Err(IpfsError::MissingToken)));
    }

    #[test]
    fn default_gateway_uses_subdomain_template() {
        assert_eq!(
            gateway_url(DEFAULT_GATEWAY_TEMPLATE, "bafybeigdyr"),
            "https://bafybeigdyr.ipfs.w3s.link"
        );
    }

    #[tokio::test]
    async fn upload_sends_token_and_returns_cid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(header("authorization", "Bearer secret-token"))
            .and(header("x-name", "lab%20result.pdf"))
            .and(body_bytes(b"ciphertext".to_vec()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"cid": "bafkreiabc"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = IpfsClient::new(config_for(&server)).unwrap();
        let cid = client
            .upload_encrypted(b"ciphertext", "lab result.pdf")
            .await
            .unwrap();
        assert_eq!(cid, "bafkreiabc");
    }

    #[tokio::test]
    async fn upload_surfaces_service_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let client = IpfsClient::new(config_for(&server)).unwrap();
        match client.upload_encrypted(b"data", "f.bin").await {
            Err(IpfsError::Server { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "bad token");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_payload_is_not_uploaded() {
        let server = MockServer::start().await;
        let client = IpfsClient::new(config_for(&server)).unwrap();
        assert!(matches!(
            client.upload_encrypted(b"", "f.bin").await,
            Err(IpfsError::EmptyPayload)
        ));
    }

    #[tokio::test]
    async fn get_reads_through_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ipfs/bafkreiabc"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ipfs/bafkreimissing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = IpfsClient::new(config_for(&server)).unwrap();
        assert_eq!(client.get("bafkreiabc").await.unwrap(), b"payload");
        assert!(matches!(
            client.get("bafkreimissing").await,
            Err(IpfsError::NotFound(cid)) if cid == "bafkreimissing"
        ));
    }

    #[tokio::test]
    async fn gateway_reads_carry_no_credentials() {
        let api = MockServer::start().await;
        let gateway = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ipfs/bafkreiabc"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
            .expect(1)
            .mount(&gateway)
            .await;

        let config = IpfsConfig {
            gateway_template: format!("{}/ipfs/{{cid}}", gateway.uri()),
            ..config_for(&api)
        };
        let client = IpfsClient::new(config).unwrap();
        assert_eq!(client.get("bafkreiabc").await.unwrap(), b"payload");

        let requests = gateway.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].headers.contains_key("authorization"));
        assert!(api.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_gateway_body_is_refused() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ipfs/bafkreibig"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 64]))
            .mount(&server)
            .await;

        let config = IpfsConfig {
            max_download_bytes: 16,
            ..config_for(&server)
        };
        let client = IpfsClient::new(config).unwrap();
        assert!(matches!(
            client.get("bafkreibig").await,
            Err(IpfsError::TooLarge { limit: 16, .. })
        ));

        let roomy = IpfsClient::new(config_for(&server)).unwrap();
        assert_eq!(roomy.get("bafkreibig").await.unwrap().len(), 64);
    }
}

// transport.rs

use crate::error::{DatalogError, Result};
use crate::types::Config;
use reqwest::Client;
use tracing::debug;
use url::Url;

/// Download collaborator injected into the data-set engine. `url` is a
/// path + query relative to the device base URL (for example
/// `logger.json?id=temperature1&utc=1710287585000`).
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}

/// reqwest-backed transport talking to the device's REST API.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .connect_timeout(crate::constants::API_CONFIG.timeouts.connection)
            .build()?;

        Ok(Self {
            client,
            base_url: config.url,
        })
    }

    fn build_url(&self, path_and_query: &str) -> Result<Url> {
        Url::parse(&format!("{}/{}", self.base_url, path_and_query))
            .map_err(|e| DatalogError::InvalidRequest(format!("Invalid URL: {}", e)))
    }
}

impl Transport for HttpTransport {
    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let full_url = self.build_url(url)?;
        debug!(url = %full_url, "downloading");

        let response = self.client.get(full_url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DatalogError::Server {
                status: status.as_u16(),
                url: full_url.to_string(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

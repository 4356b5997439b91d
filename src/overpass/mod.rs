use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub mod mirrors;
pub mod model;
pub mod query;

pub use mirrors::{fetch_with_mirrors, FetchError, FetchState, MirrorRotation};
pub use model::{OverpassElement, OverpassResponse};

// one overpass-compatible endpoint, swapped for a mock in tests
#[async_trait]
pub trait GeodataSource: Send + Sync {
    async fn query(&self, endpoint: &str, query: &str) -> Result<OverpassResponse>;
}

pub struct HttpOverpassClient {
    client: Client,
}

impl HttpOverpassClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl GeodataSource for HttpOverpassClient {
    async fn query(&self, endpoint: &str, query: &str) -> Result<OverpassResponse> {
        // the interpreter takes the raw QL as the POST body
        let response = self
            .client
            .post(endpoint)
            .body(query.to_owned())
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", endpoint))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("{} answered with status {}", endpoint, status);
        }

        response
            .json::<OverpassResponse>()
            .await
            .with_context(|| format!("Failed to decode response from {}", endpoint))
    }
}

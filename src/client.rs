//! Typed HTTP client for the orchestrator REST API.

use anyhow::{bail, Context, Result};
use reqwest::Client;

use crate::api::rest::JsonMessage;
use crate::domain::node::Node;
use crate::domain::service::Service;
use crate::domain::types::ServiceStatus;

pub struct OrchestratorClient {
    base_url: String,
    http: Client,
}

impl OrchestratorClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub async fn nodes(&self) -> Result<Vec<Node>> {
        self.get("/orchestrator/nodes").await
    }

    pub async fn node(&self, name: &str) -> Result<Node> {
        self.get(&format!("/orchestrator/nodes/{name}")).await
    }

    pub async fn connect_node(&self, name: &str) -> Result<()> {
        self.post_no_content(&format!("/orchestrator/nodes/{name}"))
            .await
    }

    pub async fn disconnect_node(&self, name: &str) -> Result<()> {
        self.post_no_content(&format!("/orchestrator/nodes/{name}/disconnect"))
            .await
    }

    pub async fn services(&self) -> Result<Vec<Service>> {
        self.get("/orchestrator/services").await
    }

    pub async fn service(&self, name: &str) -> Result<Service> {
        self.get(&format!("/orchestrator/services/{name}")).await
    }

    pub async fn statuses(&self) -> Result<Vec<ServiceStatus>> {
        self.get("/orchestrator/statuses").await
    }

    pub async fn status(&self, service: &str) -> Result<ServiceStatus> {
        self.get(&format!("/orchestrator/statuses/{service}")).await
    }

    pub async fn start(&self, service: &str, node: &str) -> Result<()> {
        self.post_no_content(&format!("/orchestrator/services/{service}/{node}"))
            .await
    }

    pub async fn stop(&self, service: &str, node: &str) -> Result<()> {
        let url = format!("{}/orchestrator/services/{service}/{node}", self.base_url);
        let resp = self
            .http
            .delete(&url)
            .send()
            .await
            .with_context(|| format!("DELETE {url}"))?;
        Self::expect_no_content(&url, resp).await
    }

    // ── Internal helpers ───────────────────────────────────

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        if !resp.status().is_success() {
            bail!("{} returned {}", url, Self::describe_failure(resp).await);
        }

        resp.json()
            .await
            .with_context(|| format!("parsing response from {url}"))
    }

    async fn post_no_content(&self, path: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .post(&url)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        Self::expect_no_content(&url, resp).await
    }

    async fn expect_no_content(url: &str, resp: reqwest::Response) -> Result<()> {
        if !resp.status().is_success() {
            bail!("{} returned {}", url, Self::describe_failure(resp).await);
        }
        Ok(())
    }

    /// Prefer the daemon's `{"Message": ...}` body over the bare status.
    async fn describe_failure(resp: reqwest::Response) -> String {
        let status = resp.status();
        match resp.json::<JsonMessage>().await {
            Ok(body) => format!("{status}: {}", body.message),
            Err(_) => status.to_string(),
        }
    }
}

//! HTTP health-check probes.
//!
//! A probe is a stateless expectation: issue one request and compare the
//! response status against the configured code. Any transport error or
//! status mismatch is a probe failure — expected steady-state data for the
//! polling engine, never a fatal condition.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::error::OrchestratorError;

const METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpProbe {
    #[serde(rename = "Method")]
    pub method: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "StatusCode")]
    pub status_code: u16,
    #[serde(rename = "Headers", default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

impl HttpProbe {
    /// Pure validation: method whitelist, URL parseability, status-code
    /// range. Performs no network I/O.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if !METHODS.contains(&self.method.as_str()) {
            return Err(OrchestratorError::Validation(format!(
                "unsupported HTTP method {}",
                self.method
            )));
        }
        if reqwest::Url::parse(&self.address).is_err() {
            return Err(OrchestratorError::Validation(format!(
                "invalid probe URL {}",
                self.address
            )));
        }
        if !(100..=526).contains(&self.status_code) {
            return Err(OrchestratorError::Validation(format!(
                "probe status code {} out of range",
                self.status_code
            )));
        }
        Ok(())
    }

    /// Issue the request with no body. Success iff the transport succeeds
    /// and the response status equals the expected code exactly.
    pub async fn call(&self, client: &reqwest::Client) -> Result<(), OrchestratorError> {
        let method =
            reqwest::Method::from_bytes(self.method.as_bytes()).map_err(|_| {
                OrchestratorError::Validation(format!("unsupported HTTP method {}", self.method))
            })?;
        let mut request = client.request(method, &self.address);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }
        let response = request.send().await.map_err(|e| OrchestratorError::Probe {
            address: self.address.clone(),
            message: e.to_string(),
        })?;
        let got = response.status().as_u16();
        if got != self.status_code {
            return Err(OrchestratorError::Probe {
                address: self.address.clone(),
                message: format!("expected status code {}, got {}", self.status_code, got),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn probe(method: &str, address: &str, status_code: u16) -> HttpProbe {
        HttpProbe {
            method: method.to_string(),
            address: address.to_string(),
            status_code,
            headers: HashMap::new(),
        }
    }

    #[test]
    fn validate_accepts_well_formed_probe() {
        assert!(probe("GET", "http://127.0.0.1/health", 200).validate().is_ok());
    }

    #[test]
    fn validate_rejects_unknown_method() {
        assert!(probe("HEAD", "http://127.0.0.1/health", 200)
            .validate()
            .is_err());
    }

    #[test]
    fn validate_rejects_unparsable_url() {
        assert!(probe("GET", "not a url", 200).validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_status() {
        assert!(probe("GET", "http://127.0.0.1/health", 99).validate().is_err());
        assert!(probe("GET", "http://127.0.0.1/health", 527)
            .validate()
            .is_err());
    }

    #[tokio::test]
    async fn call_passes_on_exact_status_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let probe = probe("GET", &format!("{}/health", server.uri()), 200);
        assert!(probe.call(&reqwest::Client::new()).await.is_ok());
    }

    #[tokio::test]
    async fn call_fails_on_status_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let probe = probe("GET", &format!("{}/health", server.uri()), 200);
        let err = probe.call(&reqwest::Client::new()).await.unwrap_err();
        assert!(err.to_string().contains("expected status code 200, got 503"));
    }

    #[tokio::test]
    async fn call_sends_configured_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .and(header("x-probe-token", "s3cret"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let mut probe = probe("GET", &format!("{}/health", server.uri()), 204);
        probe
            .headers
            .insert("x-probe-token".to_string(), "s3cret".to_string());
        assert!(probe.call(&reqwest::Client::new()).await.is_ok());
    }

    #[tokio::test]
    async fn call_fails_on_transport_error() {
        // Nothing listens on this port.
        let probe = probe("GET", "http://127.0.0.1:1/health", 200);
        assert!(probe.call(&reqwest::Client::new()).await.is_err());
    }
}

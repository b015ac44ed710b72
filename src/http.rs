//! Thin HTTP client used by provider adapters.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};

/// Default User-Agent for provider requests.
pub const USER_AGENT: &str = concat!("access-checker/", env!("CARGO_PKG_VERSION"));

/// HTTP client with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    name: String,
}

impl HttpClient {
    /// Build a client identified by `name` in logs.
    pub fn new(name: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self {
            client,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Make a POST request with JSON body.
    pub async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        json: &T,
    ) -> Result<HttpResponse, reqwest::Error> {
        self.post_json_with_headers(url, json, &HashMap::new()).await
    }

    /// POST JSON request with custom headers.
    pub async fn post_json_with_headers<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        json: &T,
        headers: &HashMap<String, String>,
    ) -> Result<HttpResponse, reqwest::Error> {
        let mut request = self.client.post(url).json(json);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let response = request.send().await?;
        Ok(HttpResponse::from_reqwest(response))
    }
}

/// HTTP response wrapper.
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
    body: Response,
}

impl HttpResponse {
    fn from_reqwest(response: Response) -> Self {
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_lowercase(), v.to_string()))
            })
            .collect();
        Self {
            status: response.status(),
            headers,
            body: response,
        }
    }

    /// Check if the response is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Check if the response is 429 Too Many Requests.
    pub fn is_rate_limited(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS
    }

    /// Get the Retry-After header.
    pub fn retry_after(&self) -> Option<&str> {
        self.headers.get("retry-after").map(|s| s.as_str())
    }

    /// Get response body as text.
    pub async fn text(self) -> Result<String, reqwest::Error> {
        self.body.text().await
    }

    /// Deserialize response body as JSON.
    pub async fn json<T: serde::de::DeserializeOwned>(self) -> Result<T, reqwest::Error> {
        self.body.json().await
    }
}

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST /stream/history and return the status with the decoded body.
    pub async fn history(&self, token: &str, from: &str, size: usize) -> Result<(StatusCode, Value)> {
        let url = format!("{}/stream/history", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "from": from, "size": size }))
            .send()
            .await
            .context("Failed to send history request")?;

        let status = response.status();
        let body = response
            .json::<Value>()
            .await
            .context("History response is not JSON")?;

        Ok((status, body))
    }

    /// GET /stream and return only the status, dropping the stream right away.
    pub async fn stream_status(&self, token: &str) -> Result<StatusCode> {
        let url = format!("{}/stream", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to open stream")?;

        Ok(response.status())
    }
}

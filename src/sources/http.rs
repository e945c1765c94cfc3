use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, SimtransError};
use super::{EnglishStrings, EnglishStringSource, FetchOutcome};

/// Fetches `{base_url}/{repo}/{ref}/{repo}-strings_en.json`
pub struct HttpEnglishSource {
    client: Client,
    base_url: String,
    default_ref: String,
}

impl HttpEnglishSource {
    pub fn new(base_url: &str, default_ref: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("simtrans/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_ref: default_ref.to_string(),
        })
    }

    pub fn file_url(&self, repo: &str, git_ref: Option<&str>) -> String {
        format!(
            "{}/{}/{}/{}-strings_en.json",
            self.base_url,
            repo,
            git_ref.unwrap_or(&self.default_ref),
            repo
        )
    }
}

#[async_trait]
impl EnglishStringSource for HttpEnglishSource {
    async fn get(&self, repo: &str, git_ref: Option<&str>) -> Result<FetchOutcome<EnglishStrings>> {
        let url = self.file_url(repo, git_ref);
        debug!("Fetching English strings from: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SimtransError::fetch(&url, format!("HTTP request failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(FetchOutcome::NotFound);
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SimtransError::fetch(
                &url,
                format!("unexpected status {}: {}", status, error_text),
            ));
        }

        let strings: EnglishStrings = response
            .json()
            .await
            .map_err(|e| SimtransError::fetch(&url, format!("Failed to parse response: {}", e)))?;

        Ok(FetchOutcome::Found(strings))
    }
}

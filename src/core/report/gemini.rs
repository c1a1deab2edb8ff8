//! Gemini `generateContent` client used for report narratives.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use zeroize::Zeroize;

use super::ReportError;

pub const GEMINI_DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const GEMINI_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"[redacted]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Drop for GeminiConfig {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: GEMINI_DEFAULT_MODEL.to_string(),
            base_url: GEMINI_DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(client: reqwest::Client, config: GeminiConfig) -> Self {
        Self { client, config }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn build_request(&self, prompt: &str) -> reqwest::RequestBuilder {
        let body = GenerateContentRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };
        self.client
            .post(self.config.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .timeout(GEMINI_REQUEST_TIMEOUT)
            .json(&body)
    }

    /// Generate text for `prompt`. Returns the first candidate's text.
    pub async fn generate(&self, prompt: &str) -> Result<String, ReportError> {
        debug!(
            "Requesting Gemini narrative: model={}, prompt_len={}",
            self.config.model,
            prompt.len()
        );

        let response = self
            .build_request(prompt)
            .send()
            .await
            .map_err(|e| ReportError::Generation(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Gemini returned {status}: {body}");
            return Err(ReportError::Generation(format!("Gemini returned {status}")));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ReportError::Generation(format!("invalid response: {e}")))?;

        parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text.filter(|t| !t.trim().is_empty()))
            .ok_or_else(|| ReportError::Generation("Gemini returned no text".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let mut config = GeminiConfig::new("k");
        config.base_url = "http://127.0.0.1:9999/".to_string();
        assert_eq!(
            config.endpoint(),
            "http://127.0.0.1:9999/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_build_request() {
        let client = GeminiClient::new(reqwest::Client::new(), GeminiConfig::new("secret"));
        let request = client.build_request("hello").build().unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(
            request.headers().get("x-goog-api-key").unwrap().to_str().unwrap(),
            "secret"
        );
        let body: serde_json::Value =
            serde_json::from_slice(request.body().unwrap().as_bytes().unwrap()).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = GeminiConfig::new("secret");
        assert!(!format!("{config:?}").contains("secret"));
    }
}

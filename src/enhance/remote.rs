//! HTTP client for the remote enhancement service.
//!
//! Speaks the common `/audio/transcriptions` multipart protocol: WAV bytes
//! plus a model name in, `{ "text": ... }` out. Any non-2xx response or
//! transport error is one uniform pipeline failure; retry policy lives in
//! [`crate::enhance::pipeline`], not here.

use crate::enhance::EnhancementService;
use crate::error::{ProtoscribeError, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Deserialize, Debug)]
struct TranscriptionResponse {
    text: String,
}

/// Enhancement service backed by an OpenAI-style transcription endpoint.
pub struct HttpEnhancementService {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl HttpEnhancementService {
    /// Create a client with the default request timeout (120 seconds).
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<&str>,
        model: impl Into<String>,
    ) -> Result<Self> {
        Self::with_timeout(base_url, api_key, model, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: Option<&str>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key
            && !key.is_empty()
        {
            let value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                ProtoscribeError::Enhancement {
                    message: format!("invalid authorization header value: {e}"),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        })
    }
}

#[async_trait]
impl EnhancementService for HttpEnhancementService {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        if audio.is_empty() {
            return Err(ProtoscribeError::Enhancement {
                message: "empty audio payload".to_string(),
            });
        }

        let url = format!("{}/audio/transcriptions", self.base_url);
        debug!(url = %url, bytes = audio.len(), "sending enhancement request");

        let audio_part = Part::bytes(audio.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")?;

        let form = Form::new()
            .part("file", audio_part)
            .text("model", self.model.clone())
            .text("response_format", "json")
            .text("temperature", "0");

        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProtoscribeError::EnhancementStatus {
                status: status.as_u16(),
                message,
            });
        }

        let body: TranscriptionResponse = response.json().await?;
        Ok(body.text)
    }

    fn name(&self) -> &str {
        "remote-transcription"
    }
}

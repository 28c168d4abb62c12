//! Transcription extraction — audio through a Whisper-style HTTP server.
//!
//! The transcription backend is opaque: any server speaking the
//! OpenAI-compatible `/v1/audio/transcriptions` multipart protocol works
//! (whisper.cpp server, faster-whisper-server, ...). Configured via
//! `WHISPER_BASE_URL`; transcription is unavailable when unset.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use docmill_core::defaults::{ENV_WHISPER_BASE_URL, TRANSCRIBE_TIMEOUT_SECS};
use docmill_core::{
    DocumentKind, Error, ExtractOptions, Extractor, ExtractorFamily, RawDocument, RawPage,
    Result,
};

use super::text_to_elements;

/// Response body of the transcription endpoint.
#[derive(Debug, Deserialize)]
pub struct TranscriptionResponse {
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
}

/// HTTP transcription backend.
pub struct WhisperHttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl WhisperHttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TRANSCRIBE_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// Create from `WHISPER_BASE_URL`. Returns None when unset or empty.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var(ENV_WHISPER_BASE_URL).ok()?;
        let url = url.trim();
        if url.is_empty() {
            return None;
        }
        Some(Self::new(url.trim_end_matches('/')))
    }

    /// Transcribe raw audio bytes.
    pub async fn transcribe(
        &self,
        data: &[u8],
        filename: &str,
    ) -> Result<TranscriptionResponse> {
        let part = reqwest::multipart::Part::bytes(data.to_vec()).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("response_format", "verbose_json");

        let url = format!("{}/v1/audio/transcriptions", self.base_url);
        debug!(url = %url, filename, "Sending audio for transcription");

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::ExtractionFailed(format!("transcription request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::ExtractionFailed(format!(
                "transcription server returned {}",
                response.status()
            )));
        }

        response
            .json::<TranscriptionResponse>()
            .await
            .map_err(|e| Error::ExtractionFailed(format!("invalid transcription response: {}", e)))
    }

    /// Probe the server's health endpoint.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        self.client
            .get(&url)
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

/// Extractor for audio recordings. The transcript is modeled as a single
/// synthetic page.
pub struct TranscribeExtractor {
    backend: Arc<WhisperHttpBackend>,
}

impl TranscribeExtractor {
    pub fn new(backend: Arc<WhisperHttpBackend>) -> Self {
        Self { backend }
    }

    /// Create from environment. Returns None when no transcription server
    /// is configured, in which case audio conversions fail with
    /// `ExtractorUnavailable` at dispatch.
    pub fn from_env() -> Option<Self> {
        WhisperHttpBackend::from_env().map(|backend| Self::new(Arc::new(backend)))
    }
}

#[async_trait]
impl Extractor for TranscribeExtractor {
    fn family(&self) -> ExtractorFamily {
        ExtractorFamily::Transcription
    }

    async fn extract(
        &self,
        _kind: DocumentKind,
        data: &[u8],
        filename: &str,
        _options: &ExtractOptions,
    ) -> Result<RawDocument> {
        if data.is_empty() {
            return Err(Error::ExtractionFailed(
                "cannot transcribe empty audio data".to_string(),
            ));
        }

        let transcription = self.backend.transcribe(data, filename).await?;

        let mut metadata = json!({
            "char_count": transcription.text.len(),
        });
        if let Some(lang) = &transcription.language {
            metadata["detected_language"] = json!(lang);
        }
        if let Some(duration) = transcription.duration {
            metadata["duration_secs"] = json!(duration);
        }

        Ok(RawDocument {
            pages: vec![RawPage::from_elements(text_to_elements(&transcription.text))],
            metadata,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.backend.health_check().await)
    }

    fn name(&self) -> &str {
        "transcribe"
    }
}

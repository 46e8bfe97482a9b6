//! HTTP implementation of the generation service contract.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::error::GenerationError;
use super::{GeneratedImage, GenerationService, SketchAnalysis};

/// Bound on each generation call; the model is slow but not unbounded.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct HttpGenerationService {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    media_type: String,
    data: String,
}

impl HttpGenerationService {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl GenerationService for HttpGenerationService {
    async fn analyze_sketch(
        &self,
        image: &[u8],
        media_type: &str,
    ) -> Result<SketchAnalysis, GenerationError> {
        debug!(bytes = image.len(), media_type, "requesting sketch analysis");
        let response = self
            .client
            .post(format!("{}/analyze", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&json!({
                "image": BASE64.encode(image),
                "media_type": media_type,
            }))
            .send()
            .await?
            .error_for_status()?;

        parse_analysis_text(&response.text().await?)
    }

    async fn synthesize_image(&self, prompt: &str) -> Result<GeneratedImage, GenerationError> {
        debug!(prompt, "requesting image synthesis");
        let response = self
            .client
            .post(format!("{}/image", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&json!({ "prompt": prompt }))
            .send()
            .await?
            .error_for_status()?
            .json::<ImageResponse>()
            .await?;

        if response.data.is_empty() {
            return Err(GenerationError::EmptyImage);
        }
        Ok(GeneratedImage {
            bytes: BASE64.decode(response.data.as_bytes())?,
            media_type: response.media_type,
        })
    }
}

/// Parse the model's analysis text into the structured shape. The model
/// may wrap its JSON in markdown fences; anything that still fails to
/// parse, or parses with an empty template, is a hard failure for the
/// whole cycle.
pub fn parse_analysis_text(text: &str) -> Result<SketchAnalysis, GenerationError> {
    let stripped = strip_markdown_fences(text);
    let analysis: SketchAnalysis = serde_json::from_str(stripped)
        .map_err(|e| GenerationError::MalformedAnalysis(e.to_string()))?;
    if analysis.template.trim().is_empty() {
        return Err(GenerationError::MalformedAnalysis(
            "analysis contained an empty template".to_string(),
        ));
    }
    // An empty placeholder id would substitute between every character
    // of the template downstream.
    if analysis
        .image_prompts
        .iter()
        .any(|prompt| prompt.placeholder_id.is_empty())
    {
        return Err(GenerationError::MalformedAnalysis(
            "analysis contained an empty placeholder id".to_string(),
        ));
    }
    Ok(analysis)
}

fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let inner = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.strip_suffix("```").unwrap_or(rest)
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.strip_suffix("```").unwrap_or(rest)
    } else {
        trimmed
    };
    inner.trim()
}

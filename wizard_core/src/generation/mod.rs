//! Client side of the external text/image generation service, and the
//! full sketch-to-document pipeline built on top of it.
//!
//! The service is treated as opaque and unreliable per call: a sketch
//! analysis that cannot be parsed fails the whole cycle, while each
//! image call that fails independently is substituted with the
//! deterministic fallback asset rather than aborting the batch.

pub mod client;
pub mod error;

pub use client::HttpGenerationService;
pub use error::GenerationError;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assembler::{assemble, ImagePrompt, ResolvedAsset};
use crate::preview::SourceDocument;

/// Structured response of the sketch-analysis call: a source template
/// with uniquely named image placeholders plus the ordered placeholder
/// map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SketchAnalysis {
    pub template: String,
    pub image_prompts: Vec<ImagePrompt>,
}

/// Raw image bytes plus their declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl GeneratedImage {
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.media_type,
            BASE64.encode(&self.bytes)
        )
    }
}

/// Request/response contract of the external generation service.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Analyze one sketch into a component template and image prompts.
    async fn analyze_sketch(
        &self,
        image: &[u8],
        media_type: &str,
    ) -> Result<SketchAnalysis, GenerationError>;

    /// Produce one image for one placeholder description.
    async fn synthesize_image(&self, prompt: &str) -> Result<GeneratedImage, GenerationError>;
}

/// Run every image call concurrently and wait for all of them to
/// settle. A failing call resolves to the fallback asset; one failing
/// image never fails the batch.
pub async fn resolve_assets<S: GenerationService + ?Sized>(
    service: &S,
    prompts: &[ImagePrompt],
) -> Vec<ResolvedAsset> {
    let calls = prompts.iter().map(|prompt| async move {
        match service.synthesize_image(&prompt.prompt).await {
            Ok(image) => ResolvedAsset {
                placeholder_id: prompt.placeholder_id.clone(),
                data_uri: image.to_data_uri(),
            },
            Err(err) => {
                warn!(
                    placeholder = %prompt.placeholder_id,
                    "image generation failed, substituting fallback: {err}"
                );
                ResolvedAsset::fallback(prompt.placeholder_id.clone())
            }
        }
    });
    futures::future::join_all(calls).await
}

/// Full generation cycle: analyze the sketch, resolve every placeholder
/// (with fallbacks), and assemble the final source document. Only an
/// analysis failure aborts the cycle.
pub async fn generate_document<S: GenerationService + ?Sized>(
    service: &S,
    sketch: &[u8],
    media_type: &str,
) -> Result<SourceDocument, GenerationError> {
    let analysis = service.analyze_sketch(sketch, media_type).await?;
    info!(
        placeholders = analysis.image_prompts.len(),
        "sketch analysis complete"
    );

    let assets = resolve_assets(service, &analysis.image_prompts).await;
    Ok(SourceDocument::new(assemble(&analysis.template, &assets)))
}

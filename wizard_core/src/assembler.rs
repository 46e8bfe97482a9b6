//! Merges a generated source template with the assets produced for its
//! image placeholders.
//!
//! Assembly is a pure string transform: it never fails, never validates,
//! and produces byte-identical output for identical inputs. Coverage of
//! every placeholder is the caller's responsibility (see
//! [`crate::generation::resolve_assets`], which substitutes
//! [`FALLBACK_IMAGE_URI`] for any image call that failed).

use serde::{Deserialize, Serialize};

/// Data URI rendered in place of an image whose generation call failed.
/// A grey 100x100 SVG tile with the word "Error".
pub const FALLBACK_IMAGE_URI: &str = "data:image/svg+xml;base64,PHN2ZyB3aWR0aD0iMTAwIiBoZWlnaHQ9IjEwMCIgeG1sbnM9Imh0dHA6Ly93d3cudzMub3JnLzIwMDAvc3ZnIj48cmVjdCB3aWR0aD0iMTAwIiBoZWlnaHQ9IjEwMCIgZmlsbD0iI2VlZSIvPjx0ZXh0IHg9IjUwJSIgeT0iNTAlIiBkb21pbmFudC1iYXNlbGluZT0ibWlkZGxlIiB0ZXh0LWFuY2hvcj0ibWlkZGxlIiBmb250LWZhbWlseT0ic2Fucy1zZXJpZiIgZmlsbD0iIzk5OSI+RXJyb3I8L3RleHQ+PC9zdmc+";

/// One entry of the placeholder map returned by sketch analysis: a unique
/// marker token embedded in the template plus the natural-language
/// description an image should be generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePrompt {
    /// Marker string as it appears in the template, e.g. `##PLACEHOLDER_1##`.
    pub placeholder_id: String,
    /// Description handed to the image-generation call.
    pub prompt: String,
}

/// A placeholder token paired with the data URI that replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAsset {
    pub placeholder_id: String,
    pub data_uri: String,
}

impl ResolvedAsset {
    /// Asset standing in for a failed image-generation call.
    pub fn fallback(placeholder_id: impl Into<String>) -> Self {
        Self {
            placeholder_id: placeholder_id.into(),
            data_uri: FALLBACK_IMAGE_URI.to_string(),
        }
    }
}

/// Replace every occurrence of each asset's placeholder token with its
/// data URI. Matching is exact-token and global; tokens without a
/// supplied asset are left verbatim.
pub fn assemble(template: &str, assets: &[ResolvedAsset]) -> String {
    let mut output = template.to_string();
    for asset in assets {
        output = output.replace(&asset.placeholder_id, &asset.data_uri);
    }
    output
}

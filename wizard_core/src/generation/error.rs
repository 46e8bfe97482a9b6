use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("the sketch analysis could not be parsed: {0}")]
    MalformedAnalysis(String),

    #[error("the generated image payload could not be decoded: {0}")]
    InvalidImagePayload(#[from] base64::DecodeError),

    #[error("the generated image payload was empty")]
    EmptyImage,
}

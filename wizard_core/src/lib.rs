pub mod account;
pub mod assembler;
pub mod generation;
pub mod preview;
pub mod sandbox;

pub use account::{AccountClient, AccountError, AuthSession, CredentialStore};
pub use assembler::{assemble, ImagePrompt, ResolvedAsset, FALLBACK_IMAGE_URI};
pub use generation::{
    generate_document, GenerationError, GenerationService, HttpGenerationService, SketchAnalysis,
};
pub use preview::{PreviewController, PreviewSession, PreviewUpdate, SourceDocument};
pub use sandbox::{ExecutionHost, ExecutionHostHandle, HostCommand, HostEvent, HostSignal};

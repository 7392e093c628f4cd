//! Trait definitions for the extractor module.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::error::ExtractorError;
use super::types::{ExtractProgress, ExtractRequest, ExtractionOutput, PlaylistEntry};

/// Something that turns a locator into local audio files.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Returns the name of this extractor implementation.
    fn name(&self) -> &str;

    /// Validates that the extractor is properly configured and ready.
    async fn validate(&self) -> Result<(), ExtractorError>;

    /// Lists the members of a playlist without transferring anything.
    async fn list_playlist(&self, locator: &str) -> Result<Vec<PlaylistEntry>, ExtractorError>;

    /// Transfers and transcodes the audio behind `request.locator`.
    ///
    /// Progress is sent with `try_send`; a full or closed channel never stalls
    /// the transfer.
    async fn extract(
        &self,
        request: ExtractRequest,
        progress_tx: mpsc::Sender<ExtractProgress>,
    ) -> Result<ExtractionOutput, ExtractorError>;
}

//! crates/image_enhancer_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! The web layer only talks to these traits; the file-backed account store,
//! the filter engine and the image codec are adapters behind them.

use async_trait::async_trait;
use image::RgbImage;

use crate::domain::{Account, ExportFormat, NewAccount, Technique};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Could not decode image: {0}")]
    Decode(String),
    #[error("Unsupported image layout: {0}")]
    UnsupportedFormat(String),
    #[error("Could not encode image: {0}")]
    Encode(String),
    #[error("Enhancement failed: {0}")]
    Enhancement(String),
    #[error("Account storage error: {0}")]
    Storage(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Durable mapping of email to account. Every mutation is persisted before it
/// returns, and implementations must serialize concurrent mutations.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Inserts a new account. Returns `false` without touching the store if
    /// the email is already registered.
    async fn register(&self, new_account: NewAccount) -> PortResult<bool>;

    async fn get_account(&self, email: &str) -> PortResult<Account>;

    /// Appends a usage record for `email` and returns the updated account.
    async fn record_enhancement(
        &self,
        email: &str,
        technique: Technique,
        source_filename: &str,
    ) -> PortResult<Account>;
}

/// The fixed catalog of image transforms.
pub trait ImageEnhancer: Send + Sync {
    /// Returns a new buffer; the input is never modified.
    fn enhance(&self, technique: Technique, image: &RgbImage) -> PortResult<RgbImage>;
}

/// Upload decoding and download encoding.
pub trait ImageCodec: Send + Sync {
    /// Decodes an uploaded file into a 3-channel, 8-bit buffer.
    fn decode(&self, data: &[u8]) -> PortResult<RgbImage>;

    fn encode(&self, image: &RgbImage, format: ExportFormat) -> PortResult<Vec<u8>>;
}

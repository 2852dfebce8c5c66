//! The external artifact generator the queue throttles.
//!
//! The queue treats generation as opaque: it hands over a
//! [`GenerationRequest`] and waits for it to settle. Retry and rate-limit
//! behavior inside the generator is its own business.

pub mod http;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{ArtifactUrl, GenerationRequest};

pub use http::HttpImageGenerator;

/// Produces one artifact for one subject.
///
/// Callers that need a hard timeout implement it here; the queue never
/// cancels an in-flight call.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<ArtifactUrl>;
}

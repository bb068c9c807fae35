//! Service access for the analysis and feedback endpoints.
//!
//! The orchestrator talks to the services through [`CoachApi`], which returns raw
//! replies; deciding what a reply means is left to the caller.

mod coach;
mod preflight;

pub use coach::CoachClient;
pub use preflight::PreflightChecks;

use crate::model::VideoFile;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

/// Network-level failure: the request never produced an HTTP response.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("could not connect to {url}")]
    Connect { url: String },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("invalid endpoint URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

/// An HTTP response, read to completion.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl HttpReply {
    pub fn json(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: Some("application/json".into()),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
            .unwrap_or(false)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[async_trait]
pub trait CoachApi: Send + Sync {
    /// Upload a video to the analysis endpoint.
    async fn analyze(&self, video: &VideoFile) -> Result<HttpReply, ServiceError>;

    /// Ask the feedback endpoint to respond to `prompt`.
    async fn feedback(&self, prompt: &str) -> Result<HttpReply, ServiceError>;
}

#[async_trait]
impl<T: CoachApi + ?Sized> CoachApi for Arc<T> {
    async fn analyze(&self, video: &VideoFile) -> Result<HttpReply, ServiceError> {
        (**self).analyze(video).await
    }

    async fn feedback(&self, prompt: &str) -> Result<HttpReply, ServiceError> {
        (**self).feedback(prompt).await
    }
}

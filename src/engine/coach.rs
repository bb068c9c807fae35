use super::{CoachApi, HttpReply, ServiceError};
use crate::model::{ApiStatus, FeedbackRequest, Phase, RunConfig, VideoFile};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::Url;

/// HTTP client for the analysis and feedback services.
#[derive(Clone)]
pub struct CoachClient {
    http: reqwest::Client,
    analysis_base: Url,
    feedback_base: Url,
    upload_field: String,
}

impl CoachClient {
    pub fn new(cfg: &RunConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.timeout)
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            http,
            analysis_base: parse_base(&cfg.base_url)?,
            feedback_base: parse_base(&cfg.feedback_url)?,
            upload_field: cfg.upload_field.clone(),
        })
    }

    pub fn analyze_url(&self) -> Result<Url, ServiceError> {
        endpoint(&self.analysis_base, Phase::Analysis.endpoint())
    }

    pub fn feedback_url(&self) -> Result<Url, ServiceError> {
        endpoint(&self.feedback_base, Phase::Feedback.endpoint())
    }

    pub fn status_url(&self) -> Result<Url, ServiceError> {
        endpoint(&self.analysis_base, "api-status")
    }

    /// Fetch model availability from the analysis service.
    pub async fn api_status(&self) -> Result<ApiStatus> {
        let url = self.status_url()?;
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify(e, &url))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "{url} returned {status}: {}",
                crate::model::truncate_chars(&body, crate::model::TRANSPORT_DIAGNOSTIC_LIMIT)
            );
        }
        resp.json::<ApiStatus>()
            .await
            .with_context(|| format!("decode status from {url}"))
    }
}

#[async_trait]
impl CoachApi for CoachClient {
    async fn analyze(&self, video: &VideoFile) -> Result<HttpReply, ServiceError> {
        let url = self.analyze_url()?;
        let part = Part::stream_with_length(video.bytes.clone(), video.len())
            .file_name(video.name.clone())
            .mime_str(video.mime_type())?;
        let form = Form::new().part(self.upload_field.clone(), part);

        tracing::debug!(%url, bytes = video.len(), field = %self.upload_field, "uploading video");
        let resp = self
            .http
            .post(url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| classify(e, &url))?;
        read_reply(resp, &url).await
    }

    async fn feedback(&self, prompt: &str) -> Result<HttpReply, ServiceError> {
        let url = self.feedback_url()?;
        let body = FeedbackRequest {
            text: prompt.to_string(),
        };

        tracing::debug!(%url, "requesting feedback");
        let resp = self
            .http
            .post(url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| classify(e, &url))?;
        read_reply(resp, &url).await
    }
}

async fn read_reply(resp: reqwest::Response, url: &Url) -> Result<HttpReply, ServiceError> {
    let status = resp.status().as_u16();
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = resp.bytes().await.map_err(|e| classify(e, url))?;
    tracing::debug!(%url, status, content_type = ?content_type, bytes = body.len(), "response received");
    Ok(HttpReply {
        status,
        content_type,
        body,
    })
}

fn classify(err: reqwest::Error, url: &Url) -> ServiceError {
    if err.is_timeout() {
        ServiceError::Timeout {
            url: url.to_string(),
        }
    } else if err.is_connect() {
        ServiceError::Connect {
            url: url.to_string(),
        }
    } else {
        ServiceError::Request(err)
    }
}

fn parse_base(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).with_context(|| format!("invalid base URL: {raw}"))?;
    // Url::join replaces the last segment unless the base ends with a slash.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn endpoint(base: &Url, path: &str) -> Result<Url, ServiceError> {
    base.join(path).map_err(|e| ServiceError::InvalidUrl {
        url: format!("{base}{path}"),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cfg(base: &str, feedback: &str) -> RunConfig {
        RunConfig {
            base_url: base.into(),
            feedback_url: feedback.into(),
            upload_field: "video".into(),
            timeout: Duration::from_secs(5),
            max_upload_bytes: crate::model::DEFAULT_MAX_UPLOAD_BYTES,
            allowed_extensions: None,
            user_agent: "squat-coach-test".into(),
        }
    }

    #[test]
    fn endpoints_are_joined_under_base_path() {
        let client = CoachClient::new(&cfg("http://127.0.0.1:5000", "http://localhost:9000/coach"))
            .unwrap();
        assert_eq!(
            client.analyze_url().unwrap().as_str(),
            "http://127.0.0.1:5000/analyze"
        );
        assert_eq!(
            client.feedback_url().unwrap().as_str(),
            "http://localhost:9000/coach/ai-feedback"
        );
        assert_eq!(
            client.status_url().unwrap().as_str(),
            "http://127.0.0.1:5000/api-status"
        );
    }

    #[test]
    fn invalid_base_is_rejected() {
        assert!(CoachClient::new(&cfg("not a url", "http://localhost")).is_err());
    }
}

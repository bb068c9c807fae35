use crate::model::{extension_of, Rejection, RunConfig, SubmissionInput, VideoFile};

/// Local checks run before anything is sent to the network.
#[derive(Debug, Clone)]
pub struct PreflightChecks {
    pub max_upload_bytes: u64,
    pub allowed_extensions: Option<Vec<String>>,
}

impl Default for PreflightChecks {
    fn default() -> Self {
        Self {
            max_upload_bytes: crate::model::DEFAULT_MAX_UPLOAD_BYTES,
            allowed_extensions: Some(
                crate::model::DEFAULT_ALLOWED_EXTENSIONS
                    .iter()
                    .map(|e| e.to_string())
                    .collect(),
            ),
        }
    }
}

impl From<&RunConfig> for PreflightChecks {
    fn from(cfg: &RunConfig) -> Self {
        Self {
            max_upload_bytes: cfg.max_upload_bytes,
            allowed_extensions: cfg.allowed_extensions.clone(),
        }
    }
}

impl PreflightChecks {
    /// Only require a present, non-empty payload.
    pub fn presence_only() -> Self {
        Self {
            max_upload_bytes: u64::MAX,
            allowed_extensions: None,
        }
    }

    pub fn validate<'a>(&self, input: &'a SubmissionInput) -> Result<&'a VideoFile, Rejection> {
        let video = match input {
            SubmissionInput::Missing => return Err(Rejection::MissingVideo),
            SubmissionInput::Unreadable { path, message } => {
                return Err(Rejection::Unreadable {
                    path: path.display().to_string(),
                    message: message.clone(),
                })
            }
            SubmissionInput::Oversized { name, size } => {
                self.check_extension(name)?;
                return Err(self.too_large(name, *size));
            }
            SubmissionInput::Video(v) => v,
        };

        if video.is_empty() {
            return Err(Rejection::EmptyVideo {
                name: video.name.clone(),
            });
        }
        self.check_extension(&video.name)?;
        if video.len() > self.max_upload_bytes {
            return Err(self.too_large(&video.name, video.len()));
        }

        Ok(video)
    }

    fn check_extension(&self, name: &str) -> Result<(), Rejection> {
        let Some(allowed) = self.allowed_extensions.as_deref() else {
            return Ok(());
        };
        let ok = extension_of(name)
            .map(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)))
            .unwrap_or(false);
        if ok {
            return Ok(());
        }
        Err(Rejection::UnsupportedExtension {
            name: name.to_string(),
            supported: allowed
                .iter()
                .map(|e| e.to_ascii_uppercase())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    fn too_large(&self, name: &str, size: u64) -> Rejection {
        Rejection::TooLarge {
            name: name.to_string(),
            size,
            limit: self.max_upload_bytes,
        }
    }
}

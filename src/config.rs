//! # Configuration
//!
//! Service configuration loaded from a YAML file. Every section is optional and
//! falls back to the defaults below.
//!
//! ```yaml
//! server:
//!   addr: "0.0.0.0:8080"
//! templates:
//!   dir: "templates"
//! session:
//!   cookie_name: "SESSIONID"
//! error_pages:
//!   group: "shared"
//!   not_found: "not_found"
//!   unauthorized: "unauthorized"
//!   internal_error: "error"
//! uploads:
//!   buffer_threshold_bytes: 1048576
//!   max_file_bytes: 10485760
//!   max_request_bytes: 52428800
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub templates: TemplateConfig,
    pub session: SessionConfig,
    pub error_pages: ErrorPagesConfig,
    pub uploads: UploadLimits,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub dir: PathBuf,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("templates"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie carrying the caller's session id.
    pub cookie_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "SESSIONID".to_string(),
        }
    }
}

/// View identifiers used for error responses to page-rendering handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorPagesConfig {
    /// Handler-group whose templates hold the error views.
    pub group: String,
    pub not_found: String,
    pub unauthorized: String,
    /// Used for every other failure; the real status is kept.
    pub internal_error: String,
}

impl Default for ErrorPagesConfig {
    fn default() -> Self {
        Self {
            group: "shared".to_string(),
            not_found: "not_found".to_string(),
            unauthorized: "unauthorized".to_string(),
            internal_error: "error".to_string(),
        }
    }
}

/// Request body and upload size thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadLimits {
    /// Upload parts larger than this are spooled to a temporary file.
    pub buffer_threshold_bytes: u64,
    /// Maximum size of a single multipart part.
    pub max_file_bytes: u64,
    /// Maximum size of the whole request body.
    pub max_request_bytes: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            buffer_threshold_bytes: 1024 * 1024,
            max_file_bytes: 10 * 1024 * 1024,
            max_request_bytes: 50 * 1024 * 1024,
        }
    }
}

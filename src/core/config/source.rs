//! Where model artifacts come from and where they are cached.

use super::ConfigValidator;
use crate::core::constants::MODEL_VERSION_TAG;
use crate::core::errors::{OCRError, OcrResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The four model artifacts the pipeline needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelArtifact {
    /// Text-line layout detector.
    Layout,
    /// Narrow recognizer (up to 30 characters).
    Recognition30,
    /// Medium recognizer (up to 50 characters).
    Recognition50,
    /// Wide recognizer (up to 100 characters).
    Recognition100,
}

impl ModelArtifact {
    /// Every artifact, in load order.
    pub const ALL: [ModelArtifact; 4] = [
        ModelArtifact::Layout,
        ModelArtifact::Recognition30,
        ModelArtifact::Recognition50,
        ModelArtifact::Recognition100,
    ];

    /// Cache key and display name of the artifact.
    pub fn name(self) -> &'static str {
        match self {
            ModelArtifact::Layout => "layout",
            ModelArtifact::Recognition30 => "recognition30",
            ModelArtifact::Recognition50 => "recognition50",
            ModelArtifact::Recognition100 => "recognition100",
        }
    }
}

impl std::fmt::Display for ModelArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Location of model artifacts and of the local cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSourceConfig {
    /// Base URL (`http://`/`https://`) or local directory that artifact paths are relative to.
    #[serde(default = "ModelSourceConfig::default_base")]
    pub base: String,

    /// Relative path of the layout model.
    #[serde(default = "ModelSourceConfig::default_layout_path")]
    pub layout_path: String,

    /// Relative paths of the narrow, medium and wide recognizer models.
    #[serde(default = "ModelSourceConfig::default_recognition_paths")]
    pub recognition_paths: [String; 3],

    /// Relative path of the recognizer configuration resource.
    #[serde(default = "ModelSourceConfig::default_recognition_config_path")]
    pub recognition_config_path: String,

    /// Version tag cached entries must carry to be reused.
    #[serde(default = "ModelSourceConfig::default_version_tag")]
    pub version_tag: String,

    /// Cache directory. `None` uses the platform cache directory.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl ModelSourceConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL or directory.
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    /// Sets the expected model version tag.
    pub fn with_version_tag(mut self, tag: impl Into<String>) -> Self {
        self.version_tag = tag.into();
        self
    }

    /// Sets the cache directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Returns true if `base` is an HTTP(S) URL.
    pub fn is_remote(&self) -> bool {
        self.base.starts_with("http://") || self.base.starts_with("https://")
    }

    /// Relative path of an artifact.
    pub fn artifact_path(&self, artifact: ModelArtifact) -> &str {
        match artifact {
            ModelArtifact::Layout => &self.layout_path,
            ModelArtifact::Recognition30 => &self.recognition_paths[0],
            ModelArtifact::Recognition50 => &self.recognition_paths[1],
            ModelArtifact::Recognition100 => &self.recognition_paths[2],
        }
    }

    /// Resolved cache directory.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("cascade-ocr")
                .join("models")
        })
    }

    fn default_base() -> String {
        "models".to_string()
    }

    fn default_layout_path() -> String {
        "layout.onnx".to_string()
    }

    fn default_recognition_paths() -> [String; 3] {
        [
            "recognition30.onnx".to_string(),
            "recognition50.onnx".to_string(),
            "recognition100.onnx".to_string(),
        ]
    }

    fn default_recognition_config_path() -> String {
        "recognition.json".to_string()
    }

    fn default_version_tag() -> String {
        MODEL_VERSION_TAG.to_string()
    }
}

impl Default for ModelSourceConfig {
    fn default() -> Self {
        Self {
            base: Self::default_base(),
            layout_path: Self::default_layout_path(),
            recognition_paths: Self::default_recognition_paths(),
            recognition_config_path: Self::default_recognition_config_path(),
            version_tag: Self::default_version_tag(),
            cache_dir: None,
        }
    }
}

impl ConfigValidator for ModelSourceConfig {
    fn validate(&self) -> OcrResult<()> {
        if self.base.trim().is_empty() {
            return Err(OCRError::config_error("model source base is empty"));
        }
        if self.version_tag.trim().is_empty() {
            return Err(OCRError::config_error("model version tag is empty"));
        }
        for artifact in ModelArtifact::ALL {
            if self.artifact_path(artifact).trim().is_empty() {
                return Err(OCRError::config_error(format!(
                    "artifact path for '{artifact}' is empty"
                )));
            }
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

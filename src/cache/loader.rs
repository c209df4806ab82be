//! Cache-or-download loading of the four model artifacts.

use super::source::{ArtifactSource, source_for};
use super::store::{FsModelCache, ModelCacheEntry, ModelCacheStore};
use crate::core::config::{ModelArtifact, ModelSourceConfig, RecognizerConfig};
use crate::core::errors::{OCRError, OcrResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-artifact download fraction in `[0, 1]`.
pub type DownloadProgress = BTreeMap<ModelArtifact, f32>;

/// Every model the pipeline needs, plus the recognizer configuration.
///
/// Payloads are reference counted so each recognition worker can build its
/// own sessions from the same bytes.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    pub layout: Arc<[u8]>,
    /// Narrow, medium and wide recognizer models.
    pub recognizers: [Arc<[u8]>; 3],
    pub recognizer_config: RecognizerConfig,
}

impl ModelBundle {
    /// The recognizer payloads as slices, narrowest first.
    pub fn recognizer_slices(&self) -> [&[u8]; 3] {
        [
            &self.recognizers[0],
            &self.recognizers[1],
            &self.recognizers[2],
        ]
    }
}

/// Loads model bytes from a versioned cache, falling back to an [`ArtifactSource`].
pub struct ModelLoader {
    config: ModelSourceConfig,
    source: Arc<dyn ArtifactSource>,
    cache: Arc<dyn ModelCacheStore>,
}

impl std::fmt::Debug for ModelLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelLoader")
            .field("base", &self.config.base)
            .field("version_tag", &self.config.version_tag)
            .finish()
    }
}

impl ModelLoader {
    pub fn new(
        config: ModelSourceConfig,
        source: Arc<dyn ArtifactSource>,
        cache: Arc<dyn ModelCacheStore>,
    ) -> Self {
        Self {
            config,
            source,
            cache,
        }
    }

    /// Builds a loader from configuration: an HTTP or directory source, and a
    /// filesystem cache in the resolved cache directory.
    pub fn from_config(config: ModelSourceConfig) -> OcrResult<Self> {
        let source: Arc<dyn ArtifactSource> = Arc::from(source_for(&config.base)?);
        let cache = FsModelCache::open(config.resolved_cache_dir())?;
        debug!("Model cache at {}", cache.dir().display());
        Ok(Self::new(config, source, Arc::new(cache)))
    }

    /// The version tag cached entries must carry.
    pub fn version_tag(&self) -> &str {
        &self.config.version_tag
    }

    /// Returns the bytes of one artifact.
    ///
    /// A cache hit with the expected version tag returns immediately and
    /// reports `1.0`. Otherwise the artifact is downloaded, reporting
    /// `received / total` whenever the source discloses a total, and stored
    /// under the current version tag. A failed cache write is logged and the
    /// downloaded bytes are still returned.
    pub fn load_model(
        &self,
        artifact: ModelArtifact,
        progress: &mut dyn FnMut(f32),
    ) -> OcrResult<Vec<u8>> {
        let name = artifact.name();
        let version = self.config.version_tag.as_str();

        match self.cache.lookup(name, version) {
            Ok(Some(entry)) => {
                debug!("Cache hit for {name} ({version})");
                progress(1.0);
                return Ok(entry.payload);
            }
            Ok(None) => debug!("Cache miss for {name} ({version})"),
            Err(e) => warn!("Reading {name} from cache failed, downloading: {e}"),
        }

        let path = self.config.artifact_path(artifact);
        let bytes = self.source.fetch(name, path, &mut |received, total| {
            if let Some(total) = total.filter(|&t| t > 0) {
                progress((received as f64 / total as f64).min(1.0) as f32);
            }
        })?;
        progress(1.0);

        if let Err(e) = self
            .cache
            .put(ModelCacheEntry::new(name, version, bytes.clone()))
        {
            warn!("Failed to cache {name}: {e}");
        }
        Ok(bytes)
    }

    /// Loads the recognizer configuration resource, falling back to the
    /// built-in defaults when it is missing or malformed.
    pub fn load_recognizer_config(&self) -> RecognizerConfig {
        let path = &self.config.recognition_config_path;
        let bytes = match self.source.fetch("recognition config", path, &mut |_, _| {}) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Recognizer config unavailable, using defaults: {e}");
                return RecognizerConfig::default();
            }
        };
        RecognizerConfig::from_json_slice(&bytes).unwrap_or_else(|e| {
            warn!("Recognizer config at {path} is invalid, using defaults: {e}");
            RecognizerConfig::default()
        })
    }

    /// Loads all four artifacts concurrently, then the recognizer config.
    ///
    /// `on_progress` runs on the calling thread with the updated progress map
    /// after every change. The first failure, in artifact order, is returned.
    pub fn load_all(&self, mut on_progress: impl FnMut(&DownloadProgress)) -> OcrResult<ModelBundle> {
        let mut progress: DownloadProgress =
            ModelArtifact::ALL.iter().map(|&a| (a, 0.0)).collect();

        let results: Vec<(ModelArtifact, OcrResult<Vec<u8>>)> = std::thread::scope(|scope| {
            let (tx, rx) = crossbeam_channel::unbounded::<(ModelArtifact, f32)>();
            let handles: Vec<_> = ModelArtifact::ALL
                .iter()
                .map(|&artifact| {
                    let tx = tx.clone();
                    let handle = scope.spawn(move || {
                        self.load_model(artifact, &mut |fraction| {
                            let _ = tx.send((artifact, fraction));
                        })
                    });
                    (artifact, handle)
                })
                .collect();
            drop(tx);

            for (artifact, fraction) in rx.iter() {
                let entry = progress.entry(artifact).or_insert(0.0);
                *entry = entry.max(fraction);
                on_progress(&progress);
            }

            handles
                .into_iter()
                .map(|(artifact, handle)| {
                    let result = handle.join().unwrap_or_else(|_| {
                        Err(OCRError::model_fetch(artifact.name(), "loader thread panicked"))
                    });
                    (artifact, result)
                })
                .collect()
        });

        let mut payloads = BTreeMap::new();
        for (artifact, result) in results {
            payloads.insert(artifact, Arc::<[u8]>::from(result?));
        }
        let mut take = |artifact: ModelArtifact| {
            payloads
                .remove(&artifact)
                .ok_or_else(|| OCRError::model_fetch(artifact.name(), "artifact was not loaded"))
        };

        let bundle = ModelBundle {
            layout: take(ModelArtifact::Layout)?,
            recognizers: [
                take(ModelArtifact::Recognition30)?,
                take(ModelArtifact::Recognition50)?,
                take(ModelArtifact::Recognition100)?,
            ],
            recognizer_config: self.load_recognizer_config(),
        };
        info!("Loaded {} model artifacts", ModelArtifact::ALL.len());
        Ok(bundle)
    }
}

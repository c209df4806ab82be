//! Model artifact caching and loading.
//!
//! [`ModelLoader`] resolves each of the four model artifacts from a versioned
//! [`ModelCacheStore`], downloading from an [`ArtifactSource`] on a miss.

pub mod loader;
pub mod source;
pub mod store;

pub use loader::{DownloadProgress, ModelBundle, ModelLoader};
pub use source::{ArtifactSource, DirectoryArtifactSource, FetchProgress, HttpArtifactSource, source_for};
pub use store::{FsModelCache, MemoryModelCache, ModelCacheEntry, ModelCacheStore};

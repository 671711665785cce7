//! Service layer
//!
//! Services are the runner's seams to the outside world: the artifact store,
//! the package index, the tag source and the log buffer collecting what a
//! pipeline reports.
//!
//! All services are trait-based to enable testing and dependency injection.

mod artifacts;
mod log_buffer;
mod publish;
mod tags;

// Re-export traits
pub use artifacts::ArtifactStore;
pub use log_buffer::LogBufferService;
pub use publish::PackageIndex;
pub use tags::TagResolver;

// Re-export implementations and their types
pub use artifacts::{ArtifactBundle, ArtifactManifest, FilesystemArtifactStore, ManifestFile, StoredArtifact};
pub use log_buffer::InMemoryLogBuffer;
pub use tags::{GithubTagResolver, StaticTagResolver, TagRequest};

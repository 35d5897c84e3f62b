//! Filesystem and database storage layer: blob, document, project, and
//! version stores, the job registry, the share-token resolver, and the
//! per-document advisory lock registry (`SPEC_FULL.md` §4).

pub mod blob_store;
pub mod compilation_version_store;
pub mod document_store;
pub mod document_version_store;
mod entity;
pub mod job_registry;
pub mod lock;
pub mod project_store;
pub mod share_resolver;

pub use blob_store::BlobStore;
pub use document_store::{ConflictPolicy, DocumentStore};
pub use document_version_store::DocumentVersionStore;
pub use job_registry::JobRegistry;
pub use lock::LockRegistry;
pub use project_store::ProjectStore;
pub use share_resolver::ShareTokenResolver;

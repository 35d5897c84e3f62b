//! Error types for the Vdocs orchestration and storage crate.
//!
//! This module defines a unified error enumeration used across the blob
//! store, document/project/compilation storage, the job registry, and the
//! runners. It integrates with `thiserror` for `Display` and error-source
//! chaining.
//!
//! Notes:
//! - Corrupted JSON on read is *not* represented here: stores return
//!   `Ok(None)` for unreadable metadata/history/manifests rather than
//!   propagating a parse error, per the error-handling policy in
//!   `SPEC_FULL.md` §7.
//! - Variants map onto the conceptual taxonomy of `SPEC_FULL.md` §7:
//!   `NotFound`, `Conflict`, `InvalidInput`, `Io`, `Dependency`, `Protocol`.

use thiserror::Error;

#[derive(Error, Debug)]
/// Unified error enumeration for the Vdocs library.
pub enum DocsError {
    /// Target id does not resolve (document, project, chapter, version, ...).
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness violation or write contention (per-document lock busy).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Bad bump kind, ill-formed reorder list, oversize image, malformed
    /// share-token shape, or any other caller-supplied input that cannot
    /// be honored.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Filesystem failure. Propagates to runners as a non-recoverable
    /// `Error` event.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// External collaborator (LLM, staged pipeline, media decoder) failed.
    /// Whether this is recoverable is a property of the call site, not of
    /// the error itself.
    #[error("dependency error: {0}")]
    Dependency(String),

    /// Client sent a message in the wrong runner state (e.g. a decision
    /// when no interrupt is pending).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Job registry (sea-orm/sqlite) failure.
    #[error("job registry error: {0}")]
    Registry(#[from] sea_orm::DbErr),
}

impl DocsError {
    /// Whether this error, surfaced as a runner `Error` event, should be
    /// marked recoverable. IO and registry failures are never recoverable;
    /// protocol and input errors are.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DocsError::Protocol(_) | DocsError::InvalidInput(_) | DocsError::Conflict(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DocsError>;

//! Share-token record embedded in document/project metadata.
//!
//! Tokens live inside the target's `metadata.json` rather than a separate
//! table, so revocation is a metadata edit (`SPEC_FULL.md` §4.9).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShareInfo {
    pub token: String,
    pub language: String,
    pub created_at: String,
}

/// What a share token resolves to. `Document` and `Project` each have
/// their own routing at the resolver, per `SPEC_FULL.md` §4.9.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShareScope {
    Document,
    Project,
}

/// What `ShareTokenResolver::resolve` hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedShare {
    pub owner_user_id: String,
    pub target_id: String,
    pub language: String,
    pub scope: ShareScope,
}

//! Runtime configuration, read from the environment with sane defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name of the environment variable selecting the data root.
pub const DATA_DIR_ENV: &str = "VDOCS_DATA_DIR";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// Root of the on-disk layout described in `SPEC_FULL.md` §6
    /// (`{data_root}/users/{user_id}/...`).
    pub data_root: PathBuf,

    /// Capacity of the bounded queue bridging a runner's worker thread to
    /// its consumer (`SPEC_FULL.md` §4.7 scheduling model).
    pub event_queue_capacity: usize,

    /// Default number of version snapshots a document/compilation version
    /// store retains on `gc(keep_count)` when the caller doesn't specify
    /// one explicitly (Open Question decision, `SPEC_FULL.md` §9.3).
    pub default_keep_count: usize,

    /// Age, in hours, after which terminal (complete/error) job records
    /// become eligible for `JobRegistry::gc`.
    pub job_gc_age_hours: i64,

    /// Maximum size, in bytes, of an image the editor runner will attach
    /// to a vision request (`SPEC_FULL.md` §4.7 Editor Runner specifics).
    pub max_image_attachment_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            event_queue_capacity: 256,
            default_keep_count: 10,
            job_gc_age_hours: 24,
            max_image_attachment_bytes: 5 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Build configuration from the process environment, falling back to
    /// defaults for anything unset. Only `VDOCS_DATA_DIR` is read today;
    /// the remaining fields are tuning knobs for embedders, not meant to
    /// be end-user configurable via the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            config.data_root = PathBuf::from(dir);
        }
        config
    }

    pub fn users_dir(&self) -> PathBuf {
        self.data_root.join("users")
    }

    pub fn user_dir(&self, user_id: &str) -> PathBuf {
        self.users_dir().join(user_id)
    }
}

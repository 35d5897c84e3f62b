//! Semver-shaped version identifiers, compared component-wise.
//!
//! Treating version numbers as plain strings is convenient for JSON but
//! unsafe to compare ("1.9.0" < "1.10.0" lexically says otherwise). This
//! value type exists for exactly that reason — the redesign flagged in
//! `SPEC_FULL.md` §9 (teacher precedent: `HashKind`/`ObjectHash` in
//! `src/hash.rs` of the teacher crate, which wrap a primitive value behind
//! `Display`/`FromStr` rather than passing raw strings around).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DocsError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// Which component `bump` advances. `Patch` is only ever produced by
/// `auto_patch` in the version stores — a caller requesting it explicitly
/// through `bump` is an input error (`SPEC_FULL.md` §4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BumpKind {
    Minor,
    Major,
}

impl Version {
    pub const INITIAL: Version = Version {
        major: 1,
        minor: 0,
        patch: 0,
    };

    pub fn bump_patch(self) -> Version {
        Version {
            major: self.major,
            minor: self.minor,
            patch: self.patch + 1,
        }
    }

    pub fn bump(self, kind: BumpKind) -> Version {
        match kind {
            BumpKind::Minor => Version {
                major: self.major,
                minor: self.minor + 1,
                patch: 0,
            },
            BumpKind::Major => Version {
                major: self.major + 1,
                minor: 0,
                patch: 0,
            },
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = DocsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        let [major, minor, patch] = parts.as_slice() else {
            return Err(DocsError::InvalidInput(format!(
                "`{s}` is not a valid X.Y.Z version"
            )));
        };
        let parse = |p: &str| {
            p.parse::<u32>()
                .map_err(|_| DocsError::InvalidInput(format!("`{s}` is not a valid X.Y.Z version")))
        };
        Ok(Version {
            major: parse(major)?,
            minor: parse(minor)?,
            patch: parse(patch)?,
        })
    }
}

impl TryFrom<String> for Version {
    type Error = DocsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_component_wise_not_lexically() {
        let v1_9 = Version::from_str("1.9.0").unwrap();
        let v1_10 = Version::from_str("1.10.0").unwrap();
        assert!(v1_9 < v1_10, "1.9.0 must compare less than 1.10.0");
    }

    #[test]
    fn patch_only_advances_patch() {
        let v = Version::INITIAL.bump_patch();
        assert_eq!(v, Version::from_str("1.0.1").unwrap());
    }

    #[test]
    fn minor_bump_resets_patch() {
        let v = Version::from_str("1.4.7").unwrap().bump(BumpKind::Minor);
        assert_eq!(v, Version::from_str("1.5.0").unwrap());
    }

    #[test]
    fn major_bump_resets_minor_and_patch() {
        let v = Version::from_str("1.4.7").unwrap().bump(BumpKind::Major);
        assert_eq!(v, Version::from_str("2.0.0").unwrap());
    }

    #[test]
    fn display_round_trips() {
        let v = Version::from_str("3.2.1").unwrap();
        assert_eq!(v.to_string(), "3.2.1");
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!(Version::from_str("1.0").is_err());
        assert!(Version::from_str("a.b.c").is_err());
    }
}

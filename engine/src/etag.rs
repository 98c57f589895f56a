//! Version tags and optimistic-concurrency preconditions.
//!
//! A record's tag encodes its version and last-modified timestamp as the weak
//! validator `W/"<version>-<timestamp>"`. A mutation may carry a precondition;
//! it commits only if the precondition still holds against the stored record.

use crate::{error::Result, Error, Timestamp, Version};
use std::fmt;
use std::str::FromStr;

/// Opaque version tag of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionTag {
    pub version: Version,
    pub timestamp: Timestamp,
}

impl VersionTag {
    pub fn new(version: Version, timestamp: Timestamp) -> Self {
        Self { version, timestamp }
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W/\"{}-{}\"", self.version, self.timestamp)
    }
}

impl FromStr for VersionTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::MalformedPrecondition(s.to_string());
        let inner = s
            .strip_prefix("W/\"")
            .and_then(|rest| rest.strip_suffix('"'))
            .ok_or_else(malformed)?;
        let (version, timestamp) = inner.split_once('-').ok_or_else(malformed)?;
        let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(version) || !digits(timestamp) {
            return Err(malformed());
        }
        Ok(Self {
            version: version.parse().map_err(|_| malformed())?,
            timestamp: timestamp.parse().map_err(|_| malformed())?,
        })
    }
}

/// Precondition attached to a mutation or delete.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Precondition {
    /// No precondition given: the mutation is unconditional.
    #[default]
    Unconditional,
    /// `*`: the record must exist, any version.
    Exists,
    /// Exact tag as presented by the client.
    Matches(String),
}

impl Precondition {
    /// Build a precondition from an optional `If-Match` style header value.
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            None => Precondition::Unconditional,
            Some("*") => Precondition::Exists,
            Some(tag) => Precondition::Matches(tag.to_string()),
        }
    }

    /// Precondition matching exactly the given tag.
    pub fn tag(tag: VersionTag) -> Self {
        Precondition::Matches(tag.to_string())
    }

    /// Check against the current tag of an existing record.
    pub fn check(&self, current: &VersionTag) -> Result<()> {
        match self {
            Precondition::Unconditional | Precondition::Exists => Ok(()),
            Precondition::Matches(raw) => {
                let presented: VersionTag = raw.parse()?;
                if presented == *current {
                    Ok(())
                } else {
                    Err(Error::PreconditionFailed {
                        expected: raw.clone(),
                        actual: current.to_string(),
                    })
                }
            }
        }
    }
}

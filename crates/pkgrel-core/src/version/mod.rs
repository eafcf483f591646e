//! Version planning.
//!
//! Computes the next version from the manifest's current version and a
//! [`BumpType`] picked by the operator. Plain bumps follow the usual semver
//! increment rules; the `pre*` bump types walk a prerelease chain (see
//! [`prerelease`]).

pub mod prerelease;

use std::str::FromStr;

use semver::{BuildMetadata, Prerelease, Version};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use prerelease::Channel;

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// Failed to parse a semver string.
    #[error("invalid semver: {0}")]
    InvalidSemver(#[from] semver::Error),

    /// A bump type name outside the supported set.
    #[error("unknown bump type `{0}`")]
    UnknownBump(String),

    /// The bump type does not describe an increment (`other`, `quit`).
    #[error("bump type `{0}` cannot be computed")]
    NotComputable(BumpType),

    /// A numeric component is already at its maximum and cannot be bumped.
    #[error("cannot bump {0}: a numeric component is at its maximum")]
    Overflow(Version),
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// How the operator asked to move the version forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BumpType {
    /// Patch release (x.y.Z).
    #[serde(rename = "patch")]
    Patch,
    /// Minor release (x.Y.0).
    #[serde(rename = "minor")]
    Minor,
    /// Major release (X.0.0).
    #[serde(rename = "major")]
    Major,
    /// Next minor, on the alpha channel.
    #[serde(rename = "preminor.alpha")]
    PreminorAlpha,
    /// Next minor, on the beta channel.
    #[serde(rename = "preminor.beta")]
    PreminorBeta,
    /// Next major, on the alpha channel.
    #[serde(rename = "premajor.alpha")]
    PremajorAlpha,
    /// Next major, on the beta channel.
    #[serde(rename = "premajor.beta")]
    PremajorBeta,
    /// Operator types the version in.
    #[serde(rename = "other")]
    Other,
    /// Abort without doing anything.
    #[serde(rename = "quit")]
    Quit,
}

/// Base increment a prerelease chain starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PreBase {
    Minor,
    Major,
}

impl BumpType {
    /// Bump types that map to a computed version, in menu order.
    pub const COMPUTABLE: [Self; 7] = [
        Self::Patch,
        Self::Minor,
        Self::Major,
        Self::PreminorAlpha,
        Self::PreminorBeta,
        Self::PremajorAlpha,
        Self::PremajorBeta,
    ];

    /// The bump type's name as typed on the command line and shown in menus.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Patch => "patch",
            Self::Minor => "minor",
            Self::Major => "major",
            Self::PreminorAlpha => "preminor.alpha",
            Self::PreminorBeta => "preminor.beta",
            Self::PremajorAlpha => "premajor.alpha",
            Self::PremajorBeta => "premajor.beta",
            Self::Other => "other",
            Self::Quit => "quit",
        }
    }

    /// Short hint shown next to the plain bumps in the selection menu.
    pub const fn hint(self) -> &'static str {
        match self {
            Self::Patch => "Bug Fixes",
            Self::Minor => "Features & Fixes",
            Self::Major => "Breaking Change",
            _ => "",
        }
    }

    /// Prerelease channel encoded in the bump type, if any.
    ///
    /// Also decides the registry dist-tag the release is published under.
    pub const fn channel(self) -> Option<Channel> {
        match self {
            Self::PreminorAlpha | Self::PremajorAlpha => Some(Channel::Alpha),
            Self::PreminorBeta | Self::PremajorBeta => Some(Channel::Beta),
            _ => None,
        }
    }

    const fn pre_base(self) -> Option<PreBase> {
        match self {
            Self::PreminorAlpha | Self::PreminorBeta => Some(PreBase::Minor),
            Self::PremajorAlpha | Self::PremajorBeta => Some(PreBase::Major),
            _ => None,
        }
    }
}

impl std::fmt::Display for BumpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BumpType {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::COMPUTABLE
            .into_iter()
            .chain([Self::Other, Self::Quit])
            .find(|bump| bump.as_str() == s)
            .ok_or_else(|| VersionError::UnknownBump(s.to_owned()))
    }
}

/// Compute the version that `bump` leads to from `current`.
///
/// Every result is strictly greater than `current`; a component that would
/// pass `u64::MAX` gives [`VersionError::Overflow`]. `Other` and `Quit`
/// carry no increment and are rejected with [`VersionError::NotComputable`].
pub fn compute_next_version(current: &Version, bump: BumpType) -> VersionResult<Version> {
    let next = match (bump.pre_base(), bump.channel()) {
        (Some(base), Some(channel)) => {
            if prerelease::continues_chain(&current.pre, channel) {
                prerelease::bump_within_chain(current, channel)?
            } else {
                let mut next = match base {
                    PreBase::Minor => {
                        Version::new(current.major, step(current, current.minor)?, 0)
                    }
                    PreBase::Major => Version::new(step(current, current.major)?, 0, 0),
                };
                next.pre = prerelease::seed(channel)?;
                next
            }
        }
        _ => match bump {
            BumpType::Patch => increment_patch(current)?,
            BumpType::Minor => increment_minor(current)?,
            BumpType::Major => increment_major(current)?,
            other => return Err(VersionError::NotComputable(other)),
        },
    };
    Ok(next)
}

fn increment_patch(current: &Version) -> VersionResult<Version> {
    if current.pre.is_empty() {
        Ok(Version::new(
            current.major,
            current.minor,
            step(current, current.patch)?,
        ))
    } else {
        Ok(release_of(current))
    }
}

fn increment_minor(current: &Version) -> VersionResult<Version> {
    if current.patch == 0 && !current.pre.is_empty() {
        Ok(release_of(current))
    } else {
        Ok(Version::new(current.major, step(current, current.minor)?, 0))
    }
}

fn increment_major(current: &Version) -> VersionResult<Version> {
    if current.minor == 0 && current.patch == 0 && !current.pre.is_empty() {
        Ok(release_of(current))
    } else {
        Ok(Version::new(step(current, current.major)?, 0, 0))
    }
}

/// `n + 1`, or [`VersionError::Overflow`] naming `current`.
pub(crate) fn step(current: &Version, n: u64) -> VersionResult<u64> {
    n.checked_add(1)
        .ok_or_else(|| VersionError::Overflow(current.clone()))
}

/// The stable release a prerelease leads up to.
fn release_of(current: &Version) -> Version {
    Version {
        pre: Prerelease::EMPTY,
        build: BuildMetadata::EMPTY,
        ..current.clone()
    }
}

/// Parse a version string, stripping an optional `v` prefix.
pub fn parse_version(s: &str) -> VersionResult<Version> {
    let s = s.trim();
    let s = s.strip_prefix('v').unwrap_or(s);
    Ok(Version::parse(s)?)
}

//! Prerelease chains.
//!
//! A chain is a run of versions sharing one base, e.g. `1.3.0-alpha.0`,
//! `1.3.0-alpha.1`, `1.3.0-beta.0`. Moving along a chain bumps the counter
//! or switches channel; it never touches the base version.

use semver::{BuildMetadata, Prerelease, Version};
use serde::Serialize;

use crate::version::{VersionResult, step};

/// Named pre-stable track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Early, unstable builds.
    Alpha,
    /// Feature-complete builds under test.
    Beta,
}

impl Channel {
    /// The channel's identifier, as it appears in a version and dist-tag.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alpha => "alpha",
            Self::Beta => "beta",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a version carrying `pre` may continue on `channel` without a
/// fresh base bump. Alpha continues alpha; beta continues alpha or beta.
pub fn continues_chain(pre: &Prerelease, channel: Channel) -> bool {
    let Some(first) = pre.as_str().split('.').next().filter(|s| !s.is_empty()) else {
        return false;
    };
    match channel {
        Channel::Alpha => first == Channel::Alpha.as_str(),
        Channel::Beta => first == Channel::Alpha.as_str() || first == Channel::Beta.as_str(),
    }
}

/// The first prerelease of a new chain: `<channel>.0`.
pub fn seed(channel: Channel) -> VersionResult<Prerelease> {
    Ok(Prerelease::new(&format!("{channel}.0"))?)
}

/// Move `current` one step along its chain on `channel`.
///
/// Same channel: the last numeric identifier is incremented (`.0` is
/// appended when there is none) and a counter already at `u64::MAX` is an
/// overflow error. Different channel: the prerelease
/// restarts at `<channel>.0`.
pub fn bump_within_chain(current: &Version, channel: Channel) -> VersionResult<Version> {
    let mut ids: Vec<String> = current.pre.as_str().split('.').map(str::to_owned).collect();

    let pre = if ids.first().map(String::as_str) == Some(channel.as_str()) {
        let last_numeric = ids
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, id)| id.parse::<u64>().ok().map(|n| (i, n)));
        match last_numeric {
            Some((i, n)) => ids[i] = step(current, n)?.to_string(),
            None => ids.push("0".to_owned()),
        }
        Prerelease::new(&ids.join("."))?
    } else {
        seed(channel)?
    };

    Ok(Version {
        pre,
        build: BuildMetadata::EMPTY,
        ..current.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pre(s: &str) -> Prerelease {
        Prerelease::new(s).unwrap()
    }

    #[test]
    fn alpha_continues_only_alpha() {
        assert!(continues_chain(&pre("alpha.3"), Channel::Alpha));
        assert!(!continues_chain(&pre("beta.0"), Channel::Alpha));
        assert!(!continues_chain(&Prerelease::EMPTY, Channel::Alpha));
    }

    #[test]
    fn beta_continues_alpha_and_beta() {
        assert!(continues_chain(&pre("alpha.0"), Channel::Beta));
        assert!(continues_chain(&pre("beta.2"), Channel::Beta));
        assert!(!continues_chain(&pre("rc.1"), Channel::Beta));
    }

    #[test]
    fn counter_without_number_starts_at_zero() {
        let v = Version::parse("1.0.0-alpha").unwrap();
        let next = bump_within_chain(&v, Channel::Alpha).unwrap();
        assert_eq!(next.to_string(), "1.0.0-alpha.0");
        assert!(next > v);
    }

    #[test]
    fn last_numeric_identifier_is_the_counter() {
        let v = Version::parse("1.0.0-alpha.1.exp").unwrap();
        let next = bump_within_chain(&v, Channel::Alpha).unwrap();
        assert_eq!(next.to_string(), "1.0.0-alpha.2.exp");
    }

    #[test]
    fn seed_starts_at_zero() {
        assert_eq!(seed(Channel::Beta).unwrap().as_str(), "beta.0");
    }
}

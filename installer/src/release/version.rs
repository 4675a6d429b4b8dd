//! Version identifiers for published releases.
//!
//! Tags take the form `vMAJOR.MINOR.PATCH` for stable releases and
//! `vMAJOR.MINOR.PATCHbN` for the `N`th prerelease (beta) of that target.
//! Release records store the same identifier without the leading `v`.
//!
//! Every numeric component is parsed as a decimal integer, so zero-padded
//! input such as `b01` denotes the same prerelease as `b1`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Prefix used by release tags.
pub const TAG_PREFIX: char = 'v';

/// Separator between the target version and the prerelease number.
const PRERELEASE_MARKER: char = 'b';

/// Errors arising from malformed version tags.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The input was empty (or only a prefix).
    #[error("version tag is empty")]
    Empty,

    /// The tag does not have exactly three dot-separated components.
    #[error("invalid version tag \"{input}\": expected vMAJOR.MINOR.PATCH or vMAJOR.MINOR.PATCHbN")]
    Shape {
        /// The rejected input.
        input: String,
    },

    /// A component is not a plain decimal number.
    #[error("invalid version tag \"{input}\": {component} component \"{value}\" is not a decimal number")]
    Component {
        /// The rejected input.
        input: String,
        /// Which component failed (`major`, `minor`, `patch`, or `prerelease`).
        component: &'static str,
        /// The offending text.
        value: String,
    },

    /// Prerelease numbering starts at 1.
    #[error("invalid version tag \"{input}\": prerelease numbers start at b1")]
    ZeroPrerelease {
        /// The rejected input.
        input: String,
    },
}

/// The kind of version increment requested when publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BumpKind {
    /// `x.y.z` → `x.y.(z+1)`.
    #[default]
    Patch,
    /// `x.y.z` → `x.(y+1).0`.
    Minor,
    /// `x.y.z` → `(x+1).0.0`.
    Major,
}

impl FromStr for BumpKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patch" => Ok(Self::Patch),
            "minor" => Ok(Self::Minor),
            "major" => Ok(Self::Major),
            other => Err(format!(
                "unknown bump kind \"{other}\"; expected patch, minor, or major"
            )),
        }
    }
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Patch => "patch",
            Self::Minor => "minor",
            Self::Major => "major",
        };
        f.write_str(name)
    }
}

/// A release version, optionally qualified by a prerelease number.
///
/// Ordering follows release semantics: a prerelease of `V` sorts after every
/// version numerically below `V` and before the stable `V` itself, and
/// prereleases of the same target sort by their number.
///
/// # Examples
///
/// ```
/// use keel_installer::release::version::Version;
///
/// let beta: Version = "v0.1.7b1".parse().expect("valid tag");
/// let stable: Version = "v0.1.7".parse().expect("valid tag");
/// let previous: Version = "0.1.6".parse().expect("valid record version");
///
/// assert!(previous < beta && beta < stable);
/// assert_eq!(beta.to_string(), "v0.1.7b1");
/// assert_eq!(beta.bare(), "0.1.7b1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    major: u32,
    minor: u32,
    patch: u32,
    prerelease: Option<u32>,
}

impl Version {
    /// Construct a stable version.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
        }
    }

    /// Construct the `number`th prerelease of `major.minor.patch`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::ZeroPrerelease`] when `number` is zero.
    pub fn prerelease(major: u32, minor: u32, patch: u32, number: u32) -> Result<Self, ParseError> {
        let version = Self::new(major, minor, patch);
        if number == 0 {
            return Err(ParseError::ZeroPrerelease {
                input: version.with_prerelease_unchecked(0).to_string(),
            });
        }
        Ok(version.with_prerelease_unchecked(number))
    }

    const fn with_prerelease_unchecked(self, number: u32) -> Self {
        Self {
            prerelease: Some(number),
            ..self
        }
    }

    /// Return the major component.
    #[must_use]
    pub const fn major(&self) -> u32 {
        self.major
    }

    /// Return the minor component.
    #[must_use]
    pub const fn minor(&self) -> u32 {
        self.minor
    }

    /// Return the patch component.
    #[must_use]
    pub const fn patch(&self) -> u32 {
        self.patch
    }

    /// Return the prerelease number, if any.
    #[must_use]
    pub const fn prerelease_number(&self) -> Option<u32> {
        self.prerelease
    }

    /// Return true when this is a prerelease (beta) version.
    #[must_use]
    pub const fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    /// Return the stable target this version belongs to.
    ///
    /// For a stable version this is the version itself.
    #[must_use]
    pub const fn stable(&self) -> Self {
        Self::new(self.major, self.minor, self.patch)
    }

    /// Return true when both versions share `major.minor.patch`.
    #[must_use]
    pub const fn same_target(&self, other: &Self) -> bool {
        self.major == other.major && self.minor == other.minor && self.patch == other.patch
    }

    /// Apply a bump to the stable part of this version.
    ///
    /// Returns `None` on numeric overflow.
    ///
    /// # Examples
    ///
    /// ```
    /// use keel_installer::release::version::{BumpKind, Version};
    ///
    /// let base = Version::new(1, 4, 2);
    /// assert_eq!(base.bump(BumpKind::Patch), Some(Version::new(1, 4, 3)));
    /// assert_eq!(base.bump(BumpKind::Minor), Some(Version::new(1, 5, 0)));
    /// assert_eq!(base.bump(BumpKind::Major), Some(Version::new(2, 0, 0)));
    /// ```
    #[must_use]
    pub fn bump(&self, kind: BumpKind) -> Option<Self> {
        match kind {
            BumpKind::Patch => Some(Self::new(self.major, self.minor, self.patch.checked_add(1)?)),
            BumpKind::Minor => Some(Self::new(self.major, self.minor.checked_add(1)?, 0)),
            BumpKind::Major => Some(Self::new(self.major.checked_add(1)?, 0, 0)),
        }
    }

    /// Render the version without the tag prefix, as stored in records and
    /// version marker files.
    #[must_use]
    pub fn bare(&self) -> String {
        match self.prerelease {
            Some(n) => format!(
                "{}.{}.{}{PRERELEASE_MARKER}{n}",
                self.major, self.minor, self.patch
            ),
            None => format!("{}.{}.{}", self.major, self.minor, self.patch),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TAG_PREFIX}{}", self.bare())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.prerelease, other.prerelease) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(&b),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let body = input.strip_prefix(TAG_PREFIX).unwrap_or(input);
        if body.is_empty() {
            return Err(ParseError::Empty);
        }

        let (numbers, prerelease) = match body.split_once(PRERELEASE_MARKER) {
            Some((numbers, pre)) => (numbers, Some(pre)),
            None => (body, None),
        };

        let mut parts = numbers.split('.');
        let (Some(major), Some(minor), Some(patch), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ParseError::Shape {
                input: input.to_owned(),
            });
        };

        let version = Self::new(
            parse_component(input, "major", major)?,
            parse_component(input, "minor", minor)?,
            parse_component(input, "patch", patch)?,
        );

        match prerelease {
            None => Ok(version),
            Some(raw) => {
                let number = parse_component(input, "prerelease", raw)?;
                if number == 0 {
                    return Err(ParseError::ZeroPrerelease {
                        input: input.to_owned(),
                    });
                }
                Ok(version.with_prerelease_unchecked(number))
            }
        }
    }
}

impl TryFrom<String> for Version {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.bare()
    }
}

/// Parse one numeric component as plain decimal digits.
///
/// `u32::from_str` accepts a leading `+`, so digits are checked first.
fn parse_component(input: &str, component: &'static str, value: &str) -> Result<u32, ParseError> {
    let malformed = || ParseError::Component {
        input: input.to_owned(),
        component,
        value: value.to_owned(),
    };
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    value.parse().map_err(|_| malformed())
}

//! Version allocation for publishing.
//!
//! Given the current stable version, a bump kind and whether the publish is
//! a prerelease, [`allocate`] mints the next version and decides whether the
//! publish may move the latest pointer. Only stable publishes update it, so
//! prereleases can never become visible through `latest`.

use crate::release::version::{BumpKind, Version};
use std::fmt;
use thiserror::Error;

/// The outcome of a version allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishPlan {
    /// The version to publish.
    pub version: Version,
    /// The stable target the version belongs to.
    pub target: Version,
    /// Whether this publish replaces the latest pointer and the generic
    /// install entry point.
    pub updates_latest: bool,
}

impl fmt::Display for PublishPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.updates_latest {
            write!(f, "{} (stable, becomes latest)", self.version)
        } else {
            write!(f, "{} (prerelease of {})", self.version, self.target)
        }
    }
}

/// Errors raised while allocating a version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// The base version passed in is itself a prerelease.
    #[error("base version {base} is a prerelease; allocation starts from the current stable release")]
    BaseNotStable {
        /// The rejected base.
        base: Version,
    },

    /// A component would exceed `u32::MAX`.
    #[error("cannot apply a {kind} bump to {base}: version component overflow")]
    Overflow {
        /// The base version.
        base: Version,
        /// The requested bump.
        kind: BumpKind,
    },

    /// The bumped stable target has already been published.
    #[error("{target} is already published; bump from it instead of from {base}")]
    TargetAlreadyPublished {
        /// The base version.
        base: Version,
        /// The existing stable target.
        target: Version,
    },
}

/// Allocate the next version to publish.
///
/// The target is `current_stable` bumped by `kind`. A stable publish takes
/// the target itself, however many prereleases of it exist. A prerelease
/// publish takes the target with prerelease number `n + 1`, where `n` is the
/// highest prerelease of that target in `existing` (zero when none).
///
/// # Errors
///
/// Returns [`AllocationError`] when the base is a prerelease, a component
/// overflows, or the stable target is already present in `existing`.
///
/// # Examples
///
/// ```
/// use keel_installer::allocator::allocate;
/// use keel_installer::release::version::{BumpKind, Version};
///
/// let existing: Vec<Version> = ["0.1.6", "0.1.7b1", "0.1.7b2"]
///     .iter()
///     .map(|v| v.parse().expect("valid version"))
///     .collect();
/// let base = Version::new(0, 1, 6);
///
/// let beta = allocate(base, BumpKind::Patch, true, &existing).expect("allocates");
/// assert_eq!(beta.version.to_string(), "v0.1.7b3");
/// assert!(!beta.updates_latest);
///
/// let stable = allocate(base, BumpKind::Patch, false, &existing).expect("allocates");
/// assert_eq!(stable.version.to_string(), "v0.1.7");
/// assert!(stable.updates_latest);
/// ```
pub fn allocate(
    current_stable: Version,
    kind: BumpKind,
    prerelease: bool,
    existing: &[Version],
) -> Result<PublishPlan, AllocationError> {
    if current_stable.is_prerelease() {
        return Err(AllocationError::BaseNotStable {
            base: current_stable,
        });
    }
    let overflow = || AllocationError::Overflow {
        base: current_stable,
        kind,
    };
    let target = current_stable.bump(kind).ok_or_else(overflow)?;
    if existing.contains(&target) {
        return Err(AllocationError::TargetAlreadyPublished {
            base: current_stable,
            target,
        });
    }

    if !prerelease {
        return Ok(PublishPlan {
            version: target,
            target,
            updates_latest: true,
        });
    }

    let highest = highest_prerelease(target, existing);
    let next = highest.checked_add(1).ok_or_else(overflow)?;
    let version = Version::prerelease(target.major(), target.minor(), target.patch(), next)
        .map_err(|_| overflow())?;
    log::debug!("highest existing prerelease of {target} is b{highest}; allocating {version}");
    Ok(PublishPlan {
        version,
        target,
        updates_latest: false,
    })
}

/// Return the highest prerelease number published for `target`, or zero.
#[must_use]
pub fn highest_prerelease(target: Version, existing: &[Version]) -> u32 {
    existing
        .iter()
        .filter(|v| v.same_target(&target))
        .filter_map(Version::prerelease_number)
        .max()
        .unwrap_or(0)
}

/// Return the newest stable version in `existing`, if any.
#[must_use]
pub fn newest_stable(existing: &[Version]) -> Option<Version> {
    existing.iter().filter(|v| !v.is_prerelease()).max().copied()
}

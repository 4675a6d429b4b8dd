//! Release identity and metadata: versions, digests, records, and naming.
//!
//! # Sub-modules
//!
//! - [`version`] - Version tags, ordering, and bump arithmetic (`Version`).
//! - [`sha256_digest`] - SHA-256 digest newtype (`Sha256Digest`).
//! - [`record`] - Release records and the latest pointer.
//! - [`naming`] - Artifact archive naming policy (`ArtifactName`).
//! - [`error`] - Validation errors for record values.

pub mod error;
pub mod naming;
pub mod record;
pub mod sha256_digest;
pub mod version;

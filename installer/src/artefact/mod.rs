//! Artifact handling: retrieval, integrity checks, extraction, packaging.
//!
//! # Sub-modules
//!
//! - [`download`] - `ArchiveFetcher` trait, URL fetcher, and the scoped
//!   `FetchedArchive` guard.
//! - [`verification`] - SHA-256 verification and the unverified-install
//!   policy.
//! - [`extraction`] - `.tar.gz` extraction with path traversal protection.
//! - [`packaging`] - Archive creation for the publish side.
//! - [`packaging_error`] - Error types for packaging operations.

pub mod download;
pub mod extraction;
pub mod packaging;
pub mod packaging_error;
pub mod verification;

//! keel installer library.
//!
//! This crate provides the release distribution protocol behind the
//! `keel-install` and `keel-release` binaries: version allocation and
//! publishing on one side, resolution, verified download and transactional
//! installation on the other. It can be consumed programmatically for
//! testing or custom deployment workflows.
//!
//! # Modules
//!
//! - [`allocator`] - Next-version allocation for publishes
//! - [`artefact`] - Archive download, verification, extraction and packaging
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Layered configuration from `keel.toml` and the environment
//! - [`dirs`] - Directory resolution abstraction for platform-specific paths
//! - [`error`] - Top-level error type with recovery hints
//! - [`exec`] - External command execution with timeouts
//! - [`git`] - Release tags and release commits in the source repository
//! - [`host`] - Local and ssh install targets
//! - [`install_flow`] - End-to-end install orchestration
//! - [`lock`] - Host-level install lock
//! - [`logging`] - Terminal logger setup
//! - [`metadata`] - Release metadata stores
//! - [`output`] - User-facing output formatting
//! - [`publish`] - Packaging and publishing a release
//! - [`release`] - Versions, digests, records and artifact naming
//! - [`resolution`] - Resolving a version request to a release record
//! - [`transaction`] - The install state machine

pub mod allocator;
pub mod artefact;
pub mod cli;
pub mod config;
pub mod dirs;
pub mod error;
pub mod exec;
pub mod git;
pub mod host;
pub mod install_flow;
pub mod lock;
pub mod logging;
pub mod metadata;
pub mod output;
pub mod publish;
pub mod release;
pub mod resolution;
pub mod transaction;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

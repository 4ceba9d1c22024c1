//! Rule fingerprinting and cache-validity decisions for incremental builds.
//!
//! This crate computes a content-addressed fingerprint for every build rule
//! from its complete observable state (label, flags, source digests, dependency
//! fingerprints) and answers whether a previously cached output for that
//! fingerprint may be reused. All cache reads are fail-safe: corruption,
//! unreadable inputs, or probe failures result in cache misses and rebuilds,
//! never in false cache hits.

#![warn(missing_docs)]

pub mod artifact;
pub mod builder;
pub mod error;
pub mod fingerprint;
pub mod rule;
pub mod validity;

pub use artifact::{ArtifactCache, DirArtifactCache};
pub use builder::FingerprintBuilder;
pub use error::CacheError;
pub use fingerprint::Fingerprint;
pub use rule::{fingerprint_builder, BuildRule};
pub use validity::{CacheProbe, CacheValidity, ValidityOracle};

//! Shared foundational types used across the Mason build tool.
//!
//! This crate provides the content-hash primitive that the caching core uses
//! to digest file contents and address cached artifacts.

#![warn(missing_docs)]

pub mod hash;

pub use hash::ContentHash;

//! Cache-validity decisions: may a rule's previous output be reused?
//!
//! The oracle answers three independent questions per rule; the build
//! orchestrator combines them and skips execution only when all three line
//! up. Every predicate is total: probe failures (unreadable files, cache
//! I/O errors) are absorbed as `false`, conservatively forcing a rebuild.

use mason_common::ContentHash;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::artifact::ArtifactCache;
use crate::rule::BuildRule;

/// The per-rule cache-validity verdict consumed by the build orchestrator.
///
/// Computed fresh for every build invocation and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheValidity {
    /// An artifact exists for this rule's fingerprint.
    pub self_cached: bool,

    /// The currently observed on-disk inputs still match the digests the
    /// cached output was built from.
    pub inputs_valid: bool,

    /// Some transitive dependency fails its own cache-validity check.
    pub has_uncached_descendants: bool,
}

impl CacheValidity {
    /// Returns `true` iff the rule's previous output may be reused without
    /// re-executing it. Any single failing dimension forces a rebuild.
    pub fn safe_to_skip(&self) -> bool {
        self.self_cached && self.inputs_valid && !self.has_uncached_descendants
    }
}

/// The three independent cache-validity predicates.
///
/// [`ValidityOracle`] is the production implementation; tests inject doubles
/// that fix each dimension independently, without a filesystem or a real
/// artifact cache behind them.
pub trait CacheProbe {
    /// Whether an artifact already exists keyed by the rule's fingerprint.
    /// A pure lookup; never mutates cache state.
    fn self_output_cached(&self, rule: &dyn BuildRule) -> bool;

    /// Whether the rule's declared inputs still match the content digests
    /// recorded when its output was cached. Independent of
    /// [`self_output_cached`](Self::self_output_cached): a cached rule whose
    /// inputs drifted (schema gap, manual tampering) is stale.
    fn inputs_still_valid(&self, rule: &dyn BuildRule) -> bool;

    /// Whether any transitive dependency fails its own validity check.
    /// Short-circuits on the first uncached descendant; traversal order
    /// affects only early exit, never the result.
    fn has_uncached_descendants(&self, rule: &dyn BuildRule) -> bool;

    /// Evaluates all three predicates into one verdict.
    fn check(&self, rule: &dyn BuildRule) -> CacheValidity {
        CacheValidity {
            self_cached: self.self_output_cached(rule),
            inputs_valid: self.inputs_still_valid(rule),
            has_uncached_descendants: self.has_uncached_descendants(rule),
        }
    }
}

/// Production cache-validity oracle backed by an [`ArtifactCache`] and fresh
/// file hashing.
///
/// Per-rule verdicts are memoized for the lifetime of the oracle so shared
/// subgraphs are not re-derived exponentially. Filesystem and cache state
/// may change between builds, so construct a fresh oracle per build
/// invocation; memoized results must never outlive one.
pub struct ValidityOracle<'a> {
    cache: &'a dyn ArtifactCache,
    /// Fully-valid verdicts keyed by fully-qualified rule name.
    memo: Mutex<HashMap<String, bool>>,
}

impl<'a> ValidityOracle<'a> {
    /// Creates an oracle for one build invocation.
    pub fn new(cache: &'a dyn ArtifactCache) -> Self {
        Self {
            cache,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Hashes the file at `path`, absorbing read failures into `None`.
    fn observed_digest(path: &Path) -> Option<ContentHash> {
        match std::fs::read(path) {
            Ok(bytes) => Some(ContentHash::from_bytes(&bytes)),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "input probe failed");
                None
            }
        }
    }

    fn memo_get(&self, name: &str) -> Option<bool> {
        // A poisoned lock just means another thread panicked mid-insert;
        // the map contents are still usable booleans.
        let memo = match self.memo.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        memo.get(name).copied()
    }

    fn memo_put(&self, name: &str, valid: bool) {
        let mut memo = match self.memo.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        memo.insert(name.to_string(), valid);
    }

    /// Whether the rule passes its entire cache-validity check, memoized
    /// per rule name within this build invocation.
    fn rule_fully_valid(&self, rule: &dyn BuildRule) -> bool {
        if let Some(valid) = self.memo_get(rule.name()) {
            return valid;
        }
        let valid = self.self_output_cached(rule)
            && self.inputs_still_valid(rule)
            && !self.has_uncached_descendants(rule);
        self.memo_put(rule.name(), valid);
        valid
    }
}

impl CacheProbe for ValidityOracle<'_> {
    fn self_output_cached(&self, rule: &dyn BuildRule) -> bool {
        // Non-idempotent fingerprints have no cache key, so the probe is
        // false for them by construction.
        self.cache.has_artifact(&rule.fingerprint())
    }

    fn inputs_still_valid(&self, rule: &dyn BuildRule) -> bool {
        rule.input_digests().iter().all(|(path, expected)| {
            match Self::observed_digest(path) {
                Some(observed) => observed == *expected,
                None => false,
            }
        })
    }

    fn has_uncached_descendants(&self, rule: &dyn BuildRule) -> bool {
        rule.deps().into_iter().any(|dep| !self.rule_fully_valid(dep))
    }
}

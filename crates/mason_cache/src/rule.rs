//! Boundary contract for build rules supplied by the rule-graph collaborator.

use mason_common::ContentHash;
use std::path::PathBuf;

use crate::builder::FingerprintBuilder;
use crate::fingerprint::Fingerprint;

/// A unit of build work as seen by the caching core.
///
/// The core consumes rules, it never owns them: parsing build files into
/// rules, ordering the dependency graph, and executing tools all live in
/// other components. Implementations must compute fingerprints in dependency
/// order (leaves first) and memoize them, since a rule's fingerprint is
/// computed once and immutable for the rest of the build.
pub trait BuildRule {
    /// The fully-qualified rule name, unique within one build graph.
    fn name(&self) -> &str;

    /// The declared rule kind (e.g. `"cc_library"`).
    fn kind(&self) -> &str;

    /// Direct dependency rules, each already carrying a computed fingerprint.
    fn deps(&self) -> Vec<&dyn BuildRule>;

    /// This rule's memoized fingerprint.
    fn fingerprint(&self) -> Fingerprint;

    /// The on-disk inputs this rule's cached output was built from, paired
    /// with the content digests observed at that time. Used for drift
    /// detection by the validity oracle.
    fn input_digests(&self) -> Vec<(PathBuf, ContentHash)>;
}

/// Seeds a [`FingerprintBuilder`] with the state every rule contributes:
/// the fully-qualified name as the schema header, the rule kind, and the
/// dependency fingerprints in the caller-supplied (already deterministic)
/// order.
///
/// Rule kinds append their own fields to the returned builder and call
/// `finish`. The kind is keyed as `mason.kind` rather than `kind` in case a
/// rule declares its own `kind` attribute. Feeding dependency fingerprints
/// here means a non-idempotent dependency poisons every rule above it
/// without any extra bookkeeping.
pub fn fingerprint_builder(rule: &dyn BuildRule) -> FingerprintBuilder {
    let dep_fingerprints: Vec<Fingerprint> =
        rule.deps().iter().map(|dep| dep.fingerprint()).collect();
    FingerprintBuilder::new(rule.name())
        .set_string("mason.kind", Some(rule.kind()))
        .set_fingerprints("deps", dep_fingerprints.iter())
}

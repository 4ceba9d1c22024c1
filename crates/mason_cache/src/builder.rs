//! Deterministic digestion of a rule's state vector into a [`Fingerprint`].
//!
//! The builder conceptually constructs an ordered map: a rule-label header
//! followed by `set_*(key, value)` calls, digested through an internal
//! framing that guarantees a 1:1 mapping for each distinct vector
//! `<rule_label, k1, .., kn>`. Every key frame and value is bounded by a
//! separator byte, so adjacent entries can never be mistaken for one longer
//! entry regardless of value content.
//!
//! To reliably avoid accidental collisions, each fingerprint schema (as
//! defined by its key vector) must use a distinct rule label, and all rules
//! of one kind must issue the identical sequence of `set_*` calls, even when
//! a value is absent. Absent values still consume their key frame and
//! terminating separator; skipping the frame would shift the byte alignment
//! of every subsequent field and defeat schema distinctness. The `set_*`
//! methods accept `Option` values specifically to support this regime.

use mason_common::ContentHash;
use sha1::{Digest, Sha1};
use std::path::Path;
use tracing::Level;

use crate::fingerprint::Fingerprint;

/// Frame boundary byte. Value bytes are never escaped; framing relies only
/// on the presence of separators around keys and after values, never on
/// sniffing value content.
const SEPARATOR: u8 = 0;

/// Accumulates an ordered sequence of labeled values into a running SHA-1
/// digest, producing one [`Fingerprint`] via [`finish`](Self::finish).
///
/// A builder is exclusively owned by one rule's fingerprint computation.
/// All setters chain by value and `finish` consumes the builder, so reuse
/// after finalization is a compile error rather than a runtime contract
/// violation.
///
/// The builder optionally records a human-readable trace of everything it
/// fed, emitted through `tracing` at debug level when the fingerprint is
/// finalized. The trace is purely observational and never influences the
/// digest.
pub struct FingerprintBuilder {
    hasher: Sha1,
    idempotent: bool,
    trace: Option<Vec<String>>,
}

impl FingerprintBuilder {
    /// Starts a builder for the given rule label.
    ///
    /// The label and a separator are fed immediately as the schema header,
    /// which is why distinct rule kinds must use distinct labels.
    pub fn new(rule_label: &str) -> Self {
        let mut builder = Self {
            hasher: Sha1::new(),
            idempotent: true,
            trace: tracing::event_enabled!(Level::DEBUG).then(Vec::new),
        };
        builder.log(|| format!("header({rule_label}):"));
        builder.feed(rule_label.as_bytes());
        builder.separate();
        builder
    }

    /// Forces trace recording on, regardless of the `tracing` level.
    pub fn with_trace(mut self) -> Self {
        self.trace.get_or_insert_with(Vec::new);
        self
    }

    fn feed(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    fn separate(&mut self) {
        self.hasher.update([SEPARATOR]);
    }

    fn log(&mut self, entry: impl FnOnce() -> String) {
        if let Some(trace) = &mut self.trace {
            trace.push(entry());
        }
    }

    /// Emits a key frame: separator, label bytes, separator.
    fn set_key(mut self, label: &str) -> Self {
        self.log(|| format!(":key({label}):"));
        self.separate();
        self.feed(label.as_bytes());
        self.separate();
        self
    }

    fn string_value(mut self, value: Option<&str>) -> Self {
        if let Some(s) = value {
            self.log(|| format!("string(\"{s}\"):"));
            self.feed(s.as_bytes());
        }
        self.separate();
        self
    }

    fn file_value(mut self, path: Option<&Path>) -> Self {
        if let Some(path) = path {
            // Feed the file's own content digest rather than its raw bytes:
            // separator bytes inside file content never need escaping, and
            // the builder's cost stays constant per file.
            match std::fs::read(path) {
                Ok(bytes) => {
                    let digest = ContentHash::from_bytes(&bytes);
                    self.log(|| format!("file(path=\"{}\", sha1={digest}):", path.display()));
                    self.feed(digest.as_bytes());
                }
                Err(_) => {
                    // A rule referencing unreadable state cannot be trusted
                    // to be reproducible; poison the fingerprint so nothing
                    // is ever cache-hit against it.
                    self.log(|| {
                        format!("file(path=\"{}\", sha1=unreadable):", path.display())
                    });
                    self.idempotent = false;
                }
            }
        }
        self.separate();
        self
    }

    fn fingerprint_value(mut self, value: Option<&Fingerprint>) -> Self {
        if let Some(fp) = value {
            self.log(|| {
                let prefix = if fp.is_idempotent() { "" } else { "non-idempotent " };
                format!("{prefix}fingerprint({}):", fp.render(false))
            });
            self.feed(fp.render(false).as_bytes());
            if !fp.is_idempotent() {
                self.idempotent = false;
            }
        }
        self.separate();
        self
    }

    /// Sets a string value; `None` feeds zero value bytes but still consumes
    /// the key frame.
    pub fn set_string(self, key: &str, value: Option<&str>) -> Self {
        self.set_key(key).string_value(value)
    }

    /// Sets a boolean value as a single distinguishing byte.
    pub fn set_bool(self, key: &str, value: bool) -> Self {
        let mut builder = self.set_key(key);
        builder.log(|| format!("boolean(\"{value}\"):"));
        builder.feed(if value { b"t" } else { b"f" });
        builder.separate();
        builder
    }

    /// Sets a file reference by feeding the file's content digest.
    ///
    /// An unreadable or missing file is not an error: it degrades the whole
    /// fingerprint to non-idempotent.
    pub fn set_file(self, key: &str, path: Option<&Path>) -> Self {
        self.set_key(key).file_value(path)
    }

    /// Sets a nested fingerprint (typically a dependency's), feeding its
    /// rendered form and propagating non-idempotence: the result is only as
    /// strong as its weakest input.
    pub fn set_fingerprint(self, key: &str, value: Option<&Fingerprint>) -> Self {
        self.set_key(key).fingerprint_value(value)
    }

    /// Sets an ordered sequence of strings in caller-supplied order.
    ///
    /// Order is semantically meaningful; an empty sequence hashes
    /// identically to an absent one.
    pub fn set_strings<'a, I>(self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut builder = self.set_key(key);
        for value in values {
            builder = builder.string_value(Some(value));
        }
        builder.separate();
        builder
    }

    /// Sets an unordered set of strings, canonicalized by sorting so that
    /// iteration order never leaks into the digest.
    pub fn set_string_set<'a, I>(self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut sorted: Vec<&str> = values.into_iter().collect();
        sorted.sort_unstable();
        let mut builder = self.set_key(key);
        for value in sorted {
            builder = builder.string_value(Some(value));
        }
        builder.separate();
        builder
    }

    /// Sets an ordered sequence of nested fingerprints, propagating
    /// non-idempotence from every element.
    pub fn set_fingerprints<'a, I>(self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = &'a Fingerprint>,
    {
        let mut builder = self.set_key(key);
        for value in values {
            builder = builder.fingerprint_value(Some(value));
        }
        builder.separate();
        builder
    }

    /// Unconditionally marks the eventual fingerprint non-idempotent,
    /// independent of everything fed before or after. Used for rules whose
    /// state cannot be captured at all.
    pub fn force_non_idempotent(mut self) -> Self {
        self.log(|| "force_non_idempotent():".to_string());
        self.idempotent = false;
        self
    }

    /// Folds an externally determined idempotence flag into the builder;
    /// a single `false` poisons the result.
    pub fn merge_idempotence(mut self, idempotent: bool) -> Self {
        if !idempotent {
            self.idempotent = false;
        }
        self
    }

    /// Finalizes the digest into a [`Fingerprint`], consuming the builder.
    pub fn finish(self) -> Fingerprint {
        let Self {
            hasher,
            idempotent,
            trace,
        } = self;
        let fingerprint = if idempotent {
            Fingerprint::from_digest(hasher.finalize().into())
        } else {
            Fingerprint::non_idempotent()
        };
        if let Some(trace) = trace {
            tracing::debug!(
                fingerprint = %fingerprint,
                schema = trace.concat(),
                "finalized rule fingerprint"
            );
        }
        fingerprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn determinism_across_runs() {
        let build = || {
            FingerprintBuilder::new("lib")
                .set_string("name", Some("//core:parser"))
                .set_bool("debug", true)
                .set_strings("srcs", ["a.c", "b.c"])
                .finish()
        };
        let first = build();
        for _ in 0..3 {
            assert!(build().matches(&first));
        }
    }

    #[test]
    fn distinct_labels_distinct_fingerprints() {
        let a = FingerprintBuilder::new("lib").finish();
        let b = FingerprintBuilder::new("bin").finish();
        assert!(!a.matches(&b));
    }

    #[test]
    fn distinct_key_vectors_distinct_fingerprints() {
        // Same label, same value, different key: the schema-distinctness
        // convention this builder relies on.
        let a = FingerprintBuilder::new("lib").set_string("srcs", Some("x")).finish();
        let b = FingerprintBuilder::new("lib").set_string("flags", Some("x")).finish();
        assert!(!a.matches(&b));
    }

    #[test]
    fn ordered_sequence_is_order_sensitive() {
        let ab = FingerprintBuilder::new("lib").set_strings("srcs", ["a", "b"]).finish();
        let ba = FingerprintBuilder::new("lib").set_strings("srcs", ["b", "a"]).finish();
        assert!(!ab.matches(&ba));
    }

    #[test]
    fn string_set_is_order_independent() {
        let ab = FingerprintBuilder::new("lib").set_string_set("deps", ["a", "b"]).finish();
        let ba = FingerprintBuilder::new("lib").set_string_set("deps", ["b", "a"]).finish();
        assert!(ab.matches(&ba));
    }

    #[test]
    fn absent_value_still_consumes_its_frame() {
        // If the absent "a" frame were skipped, the "b" value would slide
        // into its position and these would collide.
        let first = FingerprintBuilder::new("lib")
            .set_string("a", None)
            .set_string("b", Some("v"))
            .finish();
        let second = FingerprintBuilder::new("lib")
            .set_string("a", Some("v"))
            .set_string("b", None)
            .finish();
        assert!(!first.matches(&second));
    }

    #[test]
    fn bool_values_distinct() {
        let t = FingerprintBuilder::new("lib").set_bool("debug", true).finish();
        let f = FingerprintBuilder::new("lib").set_bool("debug", false).finish();
        assert!(!t.matches(&f));
    }

    #[test]
    fn nested_non_idempotence_propagates() {
        let poisoned = FingerprintBuilder::new("dep").force_non_idempotent().finish();
        let enclosing = FingerprintBuilder::new("lib")
            .set_string("name", Some("top"))
            .set_fingerprint("dep", Some(&poisoned))
            .finish();
        assert!(!enclosing.is_idempotent());
    }

    #[test]
    fn nested_idempotent_fingerprint_changes_digest() {
        let dep_a = FingerprintBuilder::new("dep").set_string("v", Some("1")).finish();
        let dep_b = FingerprintBuilder::new("dep").set_string("v", Some("2")).finish();
        let with_a = FingerprintBuilder::new("lib").set_fingerprint("dep", Some(&dep_a)).finish();
        let with_b = FingerprintBuilder::new("lib").set_fingerprint("dep", Some(&dep_b)).finish();
        assert!(!with_a.matches(&with_b));
    }

    #[test]
    fn forced_non_idempotent_never_equal() {
        let build = || {
            FingerprintBuilder::new("lib")
                .set_string("name", Some("same"))
                .force_non_idempotent()
                .finish()
        };
        let a = build();
        let b = build();
        assert!(!a.matches(&b));
        assert!(!a.matches(&a.clone()));
    }

    #[test]
    fn merge_idempotence_false_poisons() {
        let fp = FingerprintBuilder::new("lib").merge_idempotence(false).finish();
        assert!(!fp.is_idempotent());
        let fp = FingerprintBuilder::new("lib").merge_idempotence(true).finish();
        assert!(fp.is_idempotent());
    }

    #[test]
    fn file_feeds_content_digest_only() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.src");
        let second = dir.path().join("second.src");
        std::fs::write(&first, b"int main() {}").unwrap();
        std::fs::write(&second, b"int main() {}").unwrap();

        // Identical content at different paths digests identically: only
        // the content hash is fed, never the path or raw bytes.
        let a = FingerprintBuilder::new("lib").set_file("src", Some(&first)).finish();
        let b = FingerprintBuilder::new("lib").set_file("src", Some(&second)).finish();
        assert!(a.matches(&b));

        // Rewriting the same bytes leaves the fingerprint unchanged.
        let mut f = std::fs::File::create(&first).unwrap();
        f.write_all(b"int main() {}").unwrap();
        drop(f);
        let rewritten = FingerprintBuilder::new("lib").set_file("src", Some(&first)).finish();
        assert!(a.matches(&rewritten));

        // Changing content changes the fingerprint.
        std::fs::write(&first, b"int main() { return 1; }").unwrap();
        let changed = FingerprintBuilder::new("lib").set_file("src", Some(&first)).finish();
        assert!(!a.matches(&changed));
    }

    #[test]
    fn unreadable_file_poisons_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist.src");
        let fp = FingerprintBuilder::new("lib")
            .set_string("name", Some("x"))
            .set_file("src", Some(&missing))
            .finish();
        assert!(!fp.is_idempotent());
    }

    #[test]
    fn absent_file_is_not_poisonous() {
        let fp = FingerprintBuilder::new("lib").set_file("src", None).finish();
        assert!(fp.is_idempotent());
    }

    #[test]
    fn trace_never_influences_digest() {
        let plain = FingerprintBuilder::new("lib")
            .set_string("name", Some("traced"))
            .finish();
        let traced = FingerprintBuilder::new("lib")
            .with_trace()
            .set_string("name", Some("traced"))
            .finish();
        assert!(plain.matches(&traced));
    }

    #[test]
    fn empty_sequence_hashes_like_absent_one() {
        let none = std::iter::empty::<&str>();
        let empty = FingerprintBuilder::new("lib").set_strings("srcs", none).finish();
        let other_empty = FingerprintBuilder::new("lib")
            .set_strings("srcs", std::iter::empty::<&str>())
            .finish();
        assert!(empty.matches(&other_empty));
        // But an empty sequence differs from one element.
        let one = FingerprintBuilder::new("lib").set_strings("srcs", ["a"]).finish();
        assert!(!empty.matches(&one));
    }
}

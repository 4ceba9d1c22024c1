//! The fingerprint value identifying a build rule's complete relevant state.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Number of bytes in an idempotent fingerprint digest.
pub const FINGERPRINT_LEN: usize = 20;

/// Rendered width of a fingerprint: two hex characters per digest byte.
pub const FINGERPRINT_HEX_LEN: usize = 2 * FINGERPRINT_LEN;

/// The content-addressed identity of one build rule's observable state.
///
/// A fingerprint is either *idempotent*, backed by a 20-byte SHA-1 digest of
/// the rule's state vector and safe to use as a cache key, or *non-idempotent*,
/// a poisoned marker for rules whose state could not be reliably captured
/// (for example a source file that was unreadable while fingerprinting).
///
/// Non-idempotent fingerprints are unequal to everything, including other
/// non-idempotent fingerprints and a second instance of themselves, so a rule
/// carrying one can never be cache-hit. Because of that, `Fingerprint`
/// deliberately implements neither `PartialEq` nor `Ord`: the conservative
/// equality used for cache lookups ([`matches`](Self::matches)) and the total
/// order used for sorting report output ([`compare`](Self::compare)) are
/// different relations, and both are explicit methods.
#[derive(Clone, Serialize, Deserialize)]
pub struct Fingerprint(Option<[u8; FINGERPRINT_LEN]>);

impl Fingerprint {
    /// Wraps a finalized digest. Only the builder produces these.
    pub(crate) fn from_digest(digest: [u8; FINGERPRINT_LEN]) -> Self {
        Self(Some(digest))
    }

    /// The poisoned marker carrying no digest.
    pub(crate) fn non_idempotent() -> Self {
        Self(None)
    }

    /// Returns `true` iff a digest is present.
    pub fn is_idempotent(&self) -> bool {
        self.0.is_some()
    }

    /// Returns the raw digest bytes, or `None` for a non-idempotent value.
    pub fn digest(&self) -> Option<&[u8; FINGERPRINT_LEN]> {
        self.0.as_ref()
    }

    /// Conservative equality for cache lookups.
    ///
    /// Returns `false` whenever either side is non-idempotent, so a poisoned
    /// fingerprint never matches anything, itself included. Two idempotent
    /// fingerprints match iff their digests are byte-identical.
    pub fn matches(&self, other: &Fingerprint) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Total order for sorting fingerprint lists: non-idempotent values sort
    /// strictly below all idempotent values, and idempotent values sort by
    /// lexicographic digest order.
    ///
    /// Two non-idempotent values compare `Equal` here even though
    /// [`matches`](Self::matches) treats them as unequal; the order must be
    /// total for sorting while equality must stay conservative.
    pub fn compare(&self, other: &Fingerprint) -> Ordering {
        match (&self.0, &other.0) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }

    /// Returns the hex cache key for an idempotent fingerprint.
    ///
    /// Non-idempotent fingerprints yield `None`: they must never be memoized
    /// or used to address stored artifacts.
    pub fn cache_key(&self) -> Option<String> {
        self.0.map(|_| self.render(false))
    }

    /// Renders the fingerprint as a fixed-width string.
    ///
    /// Idempotent values render as 40 lower-case hex characters.
    /// Non-idempotent values render as 40 repeated `'x'` characters, or `'y'`
    /// when `mangle` is set, so that two builds' fingerprint reports can be
    /// diffed without their non-idempotent placeholders comparing as equal
    /// text.
    pub fn render(&self, mangle: bool) -> String {
        match &self.0 {
            Some(digest) => {
                let mut out = String::with_capacity(FINGERPRINT_HEX_LEN);
                for byte in digest {
                    use fmt::Write;
                    // Writing to a String cannot fail.
                    let _ = write!(out, "{byte:02x}");
                }
                out
            }
            None => {
                let sentinel = if mangle { 'y' } else { 'x' };
                std::iter::repeat(sentinel).take(FINGERPRINT_HEX_LEN).collect()
            }
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(digest) => write!(f, "Fingerprint({:02x}{:02x}..)", digest[0], digest[1]),
            None => write!(f, "Fingerprint(non-idempotent)"),
        }
    }
}
